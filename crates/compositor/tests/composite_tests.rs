//! End-to-end composite builds over in-memory and GeoTIFF granules.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use atlas_common::BoundingBox;
use common::{bbox, geographic_raster, granule, source_with, test_config};
use compositor::{
    AggregationMethod, BuildEpoch, BuildPhase, CompositeOutcome, CompositeRequest, Compositor,
    CoverageConfidence, DecodedRaster, InMemorySource, LocalFileSource, NoDataReason, PixelWindow,
    RasterCrs, RasterHandle, RasterInfo, RasterSource,
};
use test_utils::{
    acquisition, create_constant_grid, create_lst_grid, punch_holes, region, utm_tile,
    write_temp_geotiff, GeoTiffParams,
};

fn lst_raster() -> compositor::DecodedRaster {
    geographic_raster(region::RHINE_MAIN, 64, 64, create_lst_grid(64, 64), None)
}

// =============================================================================
// Pixel conservation and clipping
// =============================================================================

#[tokio::test]
async fn test_every_pixel_is_value_or_transparent() {
    let data = punch_holes(create_lst_grid(64, 64), 7, f32::NAN);
    let source = source_with(vec![(
        "a",
        geographic_raster(region::RHINE_MAIN, 64, 64, data, None),
    )]);
    let compositor = Compositor::new(source, test_config()).unwrap();

    let request = CompositeRequest::new(
        bbox(region::FRANKFURT),
        vec![granule("a", acquisition::EARLY)],
    );
    let result = compositor.build(&request).await.unwrap().into_result().unwrap();

    assert_eq!(result.values.len(), result.width * result.height);
    assert_eq!(result.image.width() as usize, result.width);
    assert_eq!(result.image.height() as usize, result.height);

    for (i, value) in result.values.iter().enumerate() {
        let px = result.image.pixels()[i * 4 + 3];
        if value.is_nan() {
            assert_eq!(px, 0, "nodata cell {} must be transparent", i);
        } else {
            assert_eq!(px, 255, "valid cell {} must be opaque", i);
        }
    }

    let stats = &result.stats;
    assert_eq!(stats.valid_pixels + stats.nodata_pixels, stats.total_pixels);
    assert!(stats.nodata_pixels > 0);
    assert!(stats.valid_pixels > 0);
}

#[tokio::test]
async fn test_output_clipped_to_data_extent() {
    let source = source_with(vec![("a", lst_raster())]);
    let compositor = Compositor::new(source, test_config()).unwrap();

    // Region runs east of the raster (which ends at 9.2°E)
    let request = CompositeRequest::new(
        bbox((9.0, 50.0, 9.6, 50.3)),
        vec![granule("a", acquisition::EARLY)],
    );
    let result = compositor.build(&request).await.unwrap().into_result().unwrap();

    assert!((result.bounds.min_x - 9.0).abs() < 1e-9);
    assert!((result.bounds.max_x - 9.2).abs() < 1e-9);
    assert!(result.stats.valid_pixels > 0);
}

#[tokio::test]
async fn test_value_at_reads_composite() {
    let source = source_with(vec![(
        "a",
        geographic_raster(region::RHINE_MAIN, 16, 16, create_constant_grid(16, 16, 305.0), None),
    )]);
    let compositor = Compositor::new(source, test_config()).unwrap();
    let request = CompositeRequest::new(
        bbox(region::FRANKFURT),
        vec![granule("a", acquisition::EARLY)],
    );
    let result = compositor.build(&request).await.unwrap().into_result().unwrap();

    assert_eq!(result.value_at(8.6, 50.1), Some(305.0));
    assert_eq!(result.value_at(13.4, 52.5), None);
    let summary = result.stats.summary.unwrap();
    assert_eq!(summary.min, 305.0);
    assert_eq!(summary.max, 305.0);
}

#[tokio::test]
async fn test_style_scale_replaces_builtin_ramp() {
    let source = source_with(vec![(
        "a",
        geographic_raster(region::RHINE_MAIN, 16, 16, create_constant_grid(16, 16, 305.0), None),
    )]);
    let style = renderer::style::StyleConfig::from_json(
        r##"{"version":"1.0","styles":{"flat":{"name":"Flat","stops":[
            {"value":250,"color":"#00ff00"},{"value":350,"color":"#00ff00"}]}}}"##,
    )
    .unwrap();
    let config = compositor::CompositorConfig {
        color_scale: renderer::ScaleMode::Fixed,
        ..test_config()
    };
    let compositor = Compositor::new(source, config)
        .unwrap()
        .with_fixed_scale(style.scale("flat").unwrap());

    let request = CompositeRequest::new(
        bbox(region::FRANKFURT),
        vec![granule("a", acquisition::EARLY)],
    );
    let result = compositor.build(&request).await.unwrap().into_result().unwrap();

    assert_eq!(&result.image.pixels()[0..4], &[0, 255, 0, 255]);
}

// =============================================================================
// Quality filtering
// =============================================================================

#[tokio::test]
async fn test_cloud_filter_scenario() {
    let source = source_with(vec![
        ("clear", lst_raster()),
        ("hazy", lst_raster()),
        ("overcast", lst_raster()),
    ]);
    let compositor = Compositor::new(source, test_config()).unwrap();

    let request = CompositeRequest::new(
        bbox(region::FRANKFURT),
        vec![
            granule("clear", acquisition::EARLY).with_cloud_percent(10.0),
            granule("hazy", acquisition::MID).with_cloud_percent(50.0),
            granule("overcast", acquisition::LATE).with_cloud_percent(95.0),
        ],
    );
    let result = compositor.build(&request).await.unwrap().into_result().unwrap();

    assert_eq!(result.stats.granules_requested, 3);
    assert_eq!(result.stats.granules_admitted, 2);
    assert_eq!(result.stats.discards.cloud, 1);
    assert_eq!(result.stats.granules_contributing, 2);
    assert_eq!(result.provenance.contributing_granules, vec!["clear", "hazy"]);
}

#[tokio::test]
async fn test_everything_filtered() {
    let source = source_with(vec![("a", lst_raster())]);
    let compositor = Compositor::new(source, test_config()).unwrap();

    let request = CompositeRequest::new(
        bbox(region::FRANKFURT),
        vec![granule("a", acquisition::EARLY).with_coverage_percent(1.0)],
    );
    match compositor.build(&request).await.unwrap() {
        CompositeOutcome::NoData(report) => {
            assert_eq!(report.reason, NoDataReason::NoGranulesAdmitted);
            assert_eq!(report.stats.discards.coverage, 1);
        }
        other => panic!("expected no data, got {}", other.as_str()),
    }
    assert_eq!(compositor.phase(), BuildPhase::Failed);
}

// =============================================================================
// No-data outcomes
// =============================================================================

#[tokio::test]
async fn test_non_intersecting_region_is_no_data() {
    let source = source_with(vec![("a", lst_raster()), ("b", lst_raster())]);
    let compositor = Compositor::new(source, test_config()).unwrap();

    let request = CompositeRequest::new(
        bbox(region::SOUTH_PACIFIC),
        vec![
            granule("a", acquisition::EARLY),
            granule("b", acquisition::LATE),
        ],
    );
    match compositor.build(&request).await.unwrap() {
        CompositeOutcome::NoData(report) => {
            assert_eq!(report.reason, NoDataReason::NoGranulesFetched);
            assert_eq!(report.stats.discards.no_overlap, 2);
        }
        other => panic!("expected no data, got {}", other.as_str()),
    }
}

#[tokio::test]
async fn test_implausible_values_masked() {
    // 0 K is a fill value for land-surface temperature
    let source = source_with(vec![(
        "a",
        geographic_raster(region::RHINE_MAIN, 16, 16, create_constant_grid(16, 16, 0.0), None),
    )]);
    let compositor = Compositor::new(source, test_config()).unwrap();

    let request = CompositeRequest::new(
        bbox(region::FRANKFURT),
        vec![granule("a", acquisition::EARLY)],
    );
    match compositor.build(&request).await.unwrap() {
        CompositeOutcome::NoData(report) => {
            assert_eq!(report.reason, NoDataReason::NoValidPixels);
            assert_eq!(report.stats.valid_pixels, 0);
        }
        other => panic!("expected no data, got {}", other.as_str()),
    }
}

#[tokio::test]
async fn test_fetch_failure_counted_not_fatal() {
    let source = source_with(vec![("a", lst_raster())]);
    let compositor = Compositor::new(source, test_config()).unwrap();

    let request = CompositeRequest::new(
        bbox(region::FRANKFURT),
        vec![
            granule("a", acquisition::EARLY),
            granule("missing", acquisition::LATE),
        ],
    );
    let result = compositor.build(&request).await.unwrap().into_result().unwrap();
    assert_eq!(result.stats.discards.fetch_failed, 1);
    assert_eq!(result.stats.granules_fetched, 1);
    assert_eq!(result.provenance.coverage_confidence, CoverageConfidence::Medium);
}

#[tokio::test]
async fn test_invalid_geometry_dropped_others_composite() {
    // Zone 1 easting far out of range reprojects past -180°
    let bad_utm = DecodedRaster::new(
        RasterInfo {
            width: 16,
            height: 16,
            native_bounds: bbox((-9_000_000.0, 1_000_000.0, 100_000.0, 2_000_000.0)),
            crs: RasterCrs::Projected(32601),
            nodata: None,
        },
        create_constant_grid(16, 16, 300.0),
    )
    .unwrap();
    let source = source_with(vec![
        ("good-a", lst_raster()),
        ("bad-utm", bad_utm),
        ("bad-declared", lst_raster()),
        ("good-b", lst_raster()),
    ]);
    let compositor = Compositor::new(source, test_config()).unwrap();

    let request = CompositeRequest::new(
        bbox(region::FRANKFURT),
        vec![
            granule("good-a", acquisition::EARLY),
            granule("bad-utm", acquisition::MID),
            granule("bad-declared", acquisition::MID)
                .with_declared_bounds(BoundingBox::new(200.0, 50.0, 210.0, 51.0)),
            granule("good-b", acquisition::LATE),
        ],
    );
    let result = compositor.build(&request).await.unwrap().into_result().unwrap();

    assert_eq!(result.stats.discards.invalid_geometry, 2);
    assert_eq!(result.stats.granules_fetched, 2);
    assert_eq!(result.provenance.contributing_granules, vec!["good-a", "good-b"]);
    assert!(result.stats.valid_pixels > 0);
}

#[tokio::test]
async fn test_single_invalid_geometry_counted() {
    let source = source_with(vec![("good", lst_raster()), ("bad", lst_raster())]);
    let compositor = Compositor::new(source, test_config()).unwrap();

    let request = CompositeRequest::new(
        bbox(region::FRANKFURT),
        vec![
            granule("good", acquisition::EARLY),
            granule("bad", acquisition::LATE)
                .with_declared_bounds(BoundingBox::new(9.0, 50.0, 8.0, 51.0)),
        ],
    );
    match compositor.build(&request).await.unwrap() {
        CompositeOutcome::Ready(result) => {
            assert_eq!(result.stats.discards.invalid_geometry, 1);
            assert_eq!(result.provenance.contributing_granules, vec!["good"]);
        }
        other => panic!("expected a composite, got {}", other.as_str()),
    }
}

#[tokio::test]
async fn test_declared_bounds_skip_reprojection() {
    // Native bounds would fail reprojection; declared bounds must win
    let raster = DecodedRaster::new(
        RasterInfo {
            width: 16,
            height: 16,
            native_bounds: bbox((-9_000_000.0, 1_000_000.0, 100_000.0, 2_000_000.0)),
            crs: RasterCrs::Projected(32601),
            nodata: None,
        },
        create_constant_grid(16, 16, 302.0),
    )
    .unwrap();
    let source = source_with(vec![("declared", raster)]);
    let compositor = Compositor::new(source, test_config()).unwrap();

    let declared = BoundingBox::new(8.5, 50.0, 8.7, 50.2);
    let request = CompositeRequest::new(
        bbox(region::RHINE_MAIN),
        vec![granule("declared", acquisition::EARLY).with_declared_bounds(declared)],
    );
    let result = compositor.build(&request).await.unwrap().into_result().unwrap();

    assert!((result.bounds.min_x - declared.min_x).abs() < 1e-9);
    assert!((result.bounds.min_y - declared.min_y).abs() < 1e-9);
    assert!((result.bounds.max_x - declared.max_x).abs() < 1e-9);
    assert!((result.bounds.max_y - declared.max_y).abs() < 1e-9);
    assert_eq!(result.stats.discards.invalid_geometry, 0);
    assert_eq!(result.value_at(8.6, 50.1), Some(302.0));
}

// =============================================================================
// Ordering, methods and cancellation
// =============================================================================

#[tokio::test]
async fn test_contributors_listed_oldest_first() {
    let source = source_with(vec![
        ("late", lst_raster()),
        ("early", lst_raster()),
        ("mid", lst_raster()),
    ]);
    let compositor = Compositor::new(source, test_config()).unwrap();

    let request = CompositeRequest::new(
        bbox(region::FRANKFURT),
        vec![
            granule("late", acquisition::LATE),
            granule("early", acquisition::EARLY),
            granule("mid", acquisition::MID),
        ],
    );
    let result = compositor.build(&request).await.unwrap().into_result().unwrap();

    assert_eq!(
        result.provenance.contributing_granules,
        vec!["early", "mid", "late"]
    );
    let window = result.provenance.time_window.unwrap();
    assert!(window.start < window.end);
    assert_eq!(result.provenance.coverage_confidence, CoverageConfidence::High);
}

/// Wraps an in-memory source and tracks concurrent window reads.
struct CountingSource {
    inner: InMemorySource,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    started: Arc<Mutex<Vec<String>>>,
}

struct CountingHandle {
    url: String,
    inner: Arc<dyn RasterHandle>,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    started: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl RasterSource for CountingSource {
    async fn open(&self, url: &str) -> compositor::Result<Arc<dyn RasterHandle>> {
        let inner = self.inner.open(url).await?;
        Ok(Arc::new(CountingHandle {
            url: url.to_string(),
            inner,
            in_flight: self.in_flight.clone(),
            peak: self.peak.clone(),
            started: self.started.clone(),
        }))
    }

    fn name(&self) -> &str {
        "counting"
    }
}

#[async_trait]
impl RasterHandle for CountingHandle {
    fn info(&self) -> &RasterInfo {
        self.inner.info()
    }

    async fn read_window(
        &self,
        window: PixelWindow,
        out_width: u32,
        out_height: u32,
        fill: f32,
    ) -> compositor::Result<Vec<f32>> {
        self.started.lock().unwrap().push(self.url.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(20)).await;
        let data = self.inner.read_window(window, out_width, out_height, fill).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        data
    }
}

#[tokio::test]
async fn test_fetch_concurrency_is_bounded() {
    let inner = InMemorySource::new();
    let ids = ["g6", "g2", "g5", "g1", "g4", "g3"];
    for id in ids {
        inner.insert(format!("mem://{}", id), lst_raster());
    }
    let source = Arc::new(CountingSource {
        inner,
        in_flight: Arc::new(AtomicUsize::new(0)),
        peak: Arc::new(AtomicUsize::new(0)),
        started: Arc::new(Mutex::new(Vec::new())),
    });
    let config = compositor::CompositorConfig {
        fetch_concurrency: 2,
        ..test_config()
    };
    let compositor = Compositor::new(source.clone(), config).unwrap();

    // gN acquired on July N
    let granules = ids
        .iter()
        .map(|id| granule(id, &format!("2024-07-0{}T10:00:00Z", &id[1..])))
        .collect();
    let request = CompositeRequest::new(bbox(region::FRANKFURT), granules);
    let result = compositor.build(&request).await.unwrap().into_result().unwrap();

    let peak = source.peak.load(Ordering::SeqCst);
    assert!(peak <= 2, "peak of {} concurrent reads exceeds the limit", peak);
    assert!(peak >= 2, "reads never overlapped");
    assert_eq!(source.in_flight.load(Ordering::SeqCst), 0);

    let oldest_first = vec!["g1", "g2", "g3", "g4", "g5", "g6"];
    let started: Vec<String> = source.started.lock().unwrap().clone();
    let expected: Vec<String> = oldest_first.iter().map(|id| format!("mem://{}", id)).collect();
    assert_eq!(started, expected);
    assert_eq!(result.provenance.contributing_granules, oldest_first);
}

#[tokio::test]
async fn test_max_composite_dominates_median() {
    let cool = create_constant_grid(16, 16, 295.0);
    let hot = create_constant_grid(16, 16, 315.0);
    let warm = create_constant_grid(16, 16, 300.0);
    let source = source_with(vec![
        ("cool", geographic_raster(region::RHINE_MAIN, 16, 16, cool, None)),
        ("hot", geographic_raster(region::RHINE_MAIN, 16, 16, hot, None)),
        ("warm", geographic_raster(region::RHINE_MAIN, 16, 16, warm, None)),
    ]);
    let compositor = Compositor::new(source, test_config()).unwrap();

    let granules = vec![
        granule("cool", acquisition::EARLY),
        granule("hot", acquisition::MID),
        granule("warm", acquisition::LATE),
    ];
    let base = CompositeRequest::new(bbox(region::FRANKFURT), granules);

    let max = compositor
        .build(&base.clone().with_method(AggregationMethod::Max))
        .await
        .unwrap()
        .into_result()
        .unwrap();
    let mean = compositor
        .build(&base.with_method(AggregationMethod::Mean))
        .await
        .unwrap()
        .into_result()
        .unwrap();

    assert_eq!(max.method, AggregationMethod::Max);
    assert_eq!(max.value_at(8.6, 50.1), Some(315.0));
    let mean_value = mean.value_at(8.6, 50.1).unwrap();
    assert!((mean_value - 303.333).abs() < 0.01);
}

#[tokio::test]
async fn test_stale_ticket_is_superseded() {
    let source = source_with(vec![("a", lst_raster())]);
    let compositor = Compositor::new(source, test_config()).unwrap();
    let request = CompositeRequest::new(
        bbox(region::FRANKFURT),
        vec![granule("a", acquisition::EARLY)],
    );

    let epoch = BuildEpoch::new();
    let stale = epoch.begin(compositor.key_for(&request));
    let fresh = epoch.begin(compositor.key_for(&request));

    let outcome = compositor
        .build_with_ticket(&request, &epoch, &stale)
        .await
        .unwrap();
    assert!(matches!(outcome, CompositeOutcome::Superseded));

    let outcome = compositor
        .build_with_ticket(&request, &epoch, &fresh)
        .await
        .unwrap();
    assert!(outcome.into_result().is_some());
}

#[tokio::test]
async fn test_phase_channel_reports_ready() {
    let source = source_with(vec![("a", lst_raster())]);
    let compositor = Compositor::new(source, test_config()).unwrap();
    let mut phase = compositor.subscribe();
    assert_eq!(*phase.borrow(), BuildPhase::Idle);

    let request = CompositeRequest::new(
        bbox(region::FRANKFURT),
        vec![granule("a", acquisition::EARLY)],
    );
    compositor.build(&request).await.unwrap();

    assert!(phase.has_changed().unwrap());
    assert_eq!(*phase.borrow_and_update(), BuildPhase::Ready);
}

// =============================================================================
// GeoTIFF granules
// =============================================================================

#[tokio::test]
async fn test_utm_geotiff_granule() {
    let width = 64;
    let params = GeoTiffParams::utm(utm_tile::T32UMA, width, 32632).with_nodata(-9999.0);
    let data = punch_holes(create_constant_grid(64, 64, 305.0), 5, -9999.0);
    let (_dir, path) =
        write_temp_geotiff("ECO_L2T_LSTE_32UMA_20240701.tif", width, 64, &data, &params).unwrap();

    let compositor = Compositor::new(Arc::new(LocalFileSource::new()), test_config()).unwrap();
    let granule = atlas_common::GranuleDescriptor::new(
        "eco",
        path.to_string_lossy(),
        atlas_common::parse_timestamp(acquisition::EARLY).unwrap(),
    );
    let roi = bbox(region::FRANKFURT);
    let request = CompositeRequest::new(roi, vec![granule]);

    let result = compositor.build(&request).await.unwrap().into_result().unwrap();

    assert!((result.bounds.min_x - roi.min_x).abs() < 1e-6);
    assert!((result.bounds.max_y - roi.max_y).abs() < 1e-6);
    let summary = result.stats.summary.unwrap();
    assert_eq!(summary.min, 305.0);
    assert_eq!(summary.max, 305.0);
}

#[tokio::test]
async fn test_unreadable_file_is_fetch_failure() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.tif");
    std::fs::write(&path, b"not a tiff").unwrap();

    let compositor = Compositor::new(Arc::new(LocalFileSource::new()), test_config()).unwrap();
    let granule = atlas_common::GranuleDescriptor::new(
        "broken",
        path.to_string_lossy(),
        atlas_common::parse_timestamp(acquisition::EARLY).unwrap(),
    );
    let request = CompositeRequest::new(bbox(region::FRANKFURT), vec![granule]);

    match compositor.build(&request).await.unwrap() {
        CompositeOutcome::NoData(report) => {
            assert_eq!(report.reason, NoDataReason::NoGranulesFetched);
            assert_eq!(report.stats.discards.fetch_failed, 1);
        }
        other => panic!("expected no data, got {}", other.as_str()),
    }
}
