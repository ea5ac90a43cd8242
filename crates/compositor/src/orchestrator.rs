//! Composite build pipeline.
//!
//! `filtering → fetching → aggregating → colorizing → ready | failed`
//!
//! The current phase is published on a `tokio::sync::watch` channel so a
//! dashboard can show progress without polling the compositor.

use std::sync::Arc;
use std::time::Instant;

use atlas_common::{BoundingBox, GranuleDescriptor, TimeWindow};
use futures::stream::{self, StreamExt};
use rayon::prelude::*;
use renderer::{ColorScale, RgbaBitmap, ScaleMode};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::aggregate::{aggregate, WeightedValue};
use crate::cache::CompositeKey;
use crate::config::CompositorConfig;
use crate::epoch::{BuildEpoch, BuildTicket};
use crate::error::{CompositeError, Result};
use crate::grid::OutputGrid;
use crate::quality::{DiscardCounts, DiscardReason, QualityFilter};
use crate::reader::GranuleReader;
use crate::source::RasterSource;
use crate::stats::{percentile_sorted, CompositeStats, CoverageConfidence, Provenance, ValueSummary};
use crate::types::{AggregationMethod, CompositeResult, PercentileMode, RasterSample};

/// What to composite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeRequest {
    /// WGS84 region of interest
    pub region: BoundingBox,
    pub granules: Vec<GranuleDescriptor>,
    /// Overrides the configured aggregation method
    #[serde(default)]
    pub method: Option<AggregationMethod>,
}

impl CompositeRequest {
    pub fn new(region: BoundingBox, granules: Vec<GranuleDescriptor>) -> Self {
        Self {
            region,
            granules,
            method: None,
        }
    }

    pub fn with_method(mut self, method: AggregationMethod) -> Self {
        self.method = Some(method);
        self
    }
}

/// Observable build progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildPhase {
    Idle,
    Filtering,
    Fetching,
    Aggregating,
    Colorizing,
    Ready,
    Failed,
}

impl BuildPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Filtering => "filtering",
            Self::Fetching => "fetching",
            Self::Aggregating => "aggregating",
            Self::Colorizing => "colorizing",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            Self::Filtering | Self::Fetching | Self::Aggregating | Self::Colorizing
        )
    }
}

/// Why a build produced no overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoDataReason {
    NoGranulesAdmitted,
    NoGranulesFetched,
    DegenerateBounds,
    NoValidPixels,
}

impl NoDataReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoGranulesAdmitted => "no_granules_admitted",
            Self::NoGranulesFetched => "no_granules_fetched",
            Self::DegenerateBounds => "degenerate_bounds",
            Self::NoValidPixels => "no_valid_pixels",
        }
    }
}

impl std::fmt::Display for NoDataReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoDataReport {
    pub reason: NoDataReason,
    pub stats: CompositeStats,
}

/// Result of one build.
#[derive(Debug, Clone)]
pub enum CompositeOutcome {
    Ready(Arc<CompositeResult>),
    NoData(NoDataReport),
    /// A newer build started before this one finished.
    Superseded,
}

impl CompositeOutcome {
    pub fn into_result(self) -> Option<Arc<CompositeResult>> {
        match self {
            Self::Ready(result) => Some(result),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready(_) => "ready",
            Self::NoData(_) => "no_data",
            Self::Superseded => "superseded",
        }
    }
}

/// Builds composites from a raster source.
pub struct Compositor {
    reader: GranuleReader,
    filter: QualityFilter,
    config: CompositorConfig,
    /// Replaces the quantity's built-in ramp in fixed mode
    fixed_scale: Option<ColorScale>,
    phase: watch::Sender<BuildPhase>,
}

impl Compositor {
    pub fn new(source: Arc<dyn RasterSource>, config: CompositorConfig) -> Result<Self> {
        config.validate().map_err(CompositeError::ConfigError)?;

        let reader = GranuleReader::new(
            source,
            config.window_size,
            config.default_utm_zone,
            config.quantity,
        );
        let filter = QualityFilter::new(config.max_cloud_percent, config.min_coverage_percent);
        let (phase, _) = watch::channel(BuildPhase::Idle);

        Ok(Self {
            reader,
            filter,
            config,
            fixed_scale: None,
            phase,
        })
    }

    /// Use `scale` instead of the quantity's calibrated ramp when the
    /// configured scale mode is fixed, e.g. one loaded from a style file.
    pub fn with_fixed_scale(mut self, scale: ColorScale) -> Self {
        self.fixed_scale = Some(scale);
        self
    }

    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    pub fn reader(&self) -> &GranuleReader {
        &self.reader
    }

    /// Watch the build phase.
    pub fn subscribe(&self) -> watch::Receiver<BuildPhase> {
        self.phase.subscribe()
    }

    pub fn phase(&self) -> BuildPhase {
        *self.phase.borrow()
    }

    /// Aggregation method a request resolves to.
    pub fn method_for(&self, request: &CompositeRequest) -> AggregationMethod {
        request.method.unwrap_or(self.config.aggregation)
    }

    /// Content-derived key for a request under this configuration.
    pub fn key_for(&self, request: &CompositeRequest) -> CompositeKey {
        CompositeKey::new(
            &request.granules,
            &request.region,
            self.method_for(request),
            self.config.percentile_mode,
            self.config.target_resolution_m,
            self.config.max_output_dim,
        )
    }

    /// Build a composite.
    pub async fn build(&self, request: &CompositeRequest) -> Result<CompositeOutcome> {
        self.run(request, None).await
    }

    /// Build a composite that yields to newer builds started on `epoch`.
    pub async fn build_with_ticket(
        &self,
        request: &CompositeRequest,
        epoch: &BuildEpoch,
        ticket: &BuildTicket,
    ) -> Result<CompositeOutcome> {
        self.run(request, Some((epoch, ticket))).await
    }

    async fn run(
        &self,
        request: &CompositeRequest,
        guard: Option<(&BuildEpoch, &BuildTicket)>,
    ) -> Result<CompositeOutcome> {
        let start = Instant::now();
        let outcome = match self.run_phases(request, guard).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.set_phase(BuildPhase::Failed);
                metrics::counter!("composite_builds_total", "outcome" => "error").increment(1);
                return Err(e);
            }
        };

        match &outcome {
            CompositeOutcome::Ready(_) => self.set_phase(BuildPhase::Ready),
            CompositeOutcome::NoData(report) => {
                warn!(reason = %report.reason, discarded = report.stats.discards.total(), "Composite has no data");
                self.set_phase(BuildPhase::Failed);
            }
            CompositeOutcome::Superseded => {
                debug!("Composite superseded by a newer build");
            }
        }

        metrics::counter!("composite_builds_total", "outcome" => outcome.as_str()).increment(1);
        metrics::histogram!("composite_build_duration_seconds").record(start.elapsed().as_secs_f64());
        Ok(outcome)
    }

    #[instrument(skip_all, fields(granules = request.granules.len(), method = %self.method_for(request)))]
    async fn run_phases(
        &self,
        request: &CompositeRequest,
        guard: Option<(&BuildEpoch, &BuildTicket)>,
    ) -> Result<CompositeOutcome> {
        let superseded = || guard.map_or(false, |(epoch, ticket)| !epoch.is_current(ticket));
        let method = self.method_for(request);
        let mut stats = CompositeStats {
            granules_requested: request.granules.len(),
            ..Default::default()
        };

        if !request.region.is_well_formed() {
            return Err(CompositeError::invalid_geometry(format!(
                "region {:?} is not a valid bounding box",
                request.region
            )));
        }

        // Filtering
        self.set_phase(BuildPhase::Filtering);
        let mut ordered: Vec<&GranuleDescriptor> = request.granules.iter().collect();
        ordered.sort_by_key(|g| g.acquisition_time);

        let mut admitted = Vec::with_capacity(ordered.len());
        for granule in ordered {
            match self.filter.admit(granule) {
                Ok(()) => admitted.push(granule.clone()),
                Err(reason) => {
                    debug!(granule = %granule.id, reason = %reason, "Granule filtered");
                    record_discard(&mut stats.discards, reason);
                }
            }
        }
        stats.granules_admitted = admitted.len();

        if admitted.is_empty() {
            return Ok(no_data(NoDataReason::NoGranulesAdmitted, stats));
        }

        // Fetching: oldest first, bounded concurrency, results in input order
        self.set_phase(BuildPhase::Fetching);
        let region = request.region;
        let outcomes: Vec<_> = stream::iter(admitted)
            .map(|granule| {
                let reader = self.reader.clone();
                async move {
                    let outcome = reader.read_outcome(&granule, &region).await;
                    (granule, outcome)
                }
            })
            .buffered(self.config.fetch_concurrency)
            .collect()
            .await;

        if superseded() {
            return Ok(CompositeOutcome::Superseded);
        }

        let mut samples = Vec::with_capacity(outcomes.len());
        for (granule, outcome) in outcomes {
            if let Some(reason) = outcome.discard_reason() {
                debug!(granule = %granule.id, reason = %reason, "Granule discarded");
                record_discard(&mut stats.discards, reason);
            }
            if let Some(sample) = outcome.into_sample() {
                samples.push(sample);
            }
        }
        stats.granules_fetched = samples.len();

        if samples.is_empty() {
            return Ok(no_data(NoDataReason::NoGranulesFetched, stats));
        }

        // Output extent: region clipped to the union of what was read
        let Some(bounds) = output_bounds(&region, &samples) else {
            return Ok(no_data(NoDataReason::DegenerateBounds, stats));
        };
        let grid = OutputGrid::for_bounds(
            bounds,
            self.config.target_resolution_m,
            self.config.max_output_dim,
        );
        debug!(width = grid.width, height = grid.height, ?bounds, "Output grid");

        // Aggregating
        self.set_phase(BuildPhase::Aggregating);
        let mode = self.config.percentile_mode;
        let min_stack = self.config.min_stack_for_percentile;
        let samples = Arc::new(samples);
        let pass_samples = samples.clone();
        let aggregated = tokio::task::spawn_blocking(move || {
            aggregate_grid(&pass_samples, &grid, method, mode, min_stack)
        })
        .await?;

        if superseded() {
            return Ok(CompositeOutcome::Superseded);
        }

        stats.total_pixels = grid.len();
        stats.valid_pixels = aggregated.values.iter().filter(|v| !v.is_nan()).count();
        stats.nodata_pixels = stats.total_pixels - stats.valid_pixels;
        stats.regional_p5 = aggregated.regional.map(|(p5, _)| p5);
        stats.regional_p95 = aggregated.regional.map(|(_, p95)| p95);

        let contributing: Vec<&RasterSample> = samples
            .iter()
            .zip(&aggregated.contributed)
            .filter_map(|(s, &used)| used.then_some(s))
            .collect();
        stats.granules_contributing = contributing.len();

        let Some((p5, p95)) = aggregated.regional.filter(|_| stats.valid_pixels > 0) else {
            return Ok(no_data(NoDataReason::NoValidPixels, stats));
        };

        // Colorizing
        self.set_phase(BuildPhase::Colorizing);
        let scale = match self.config.color_scale {
            ScaleMode::Fixed => self
                .fixed_scale
                .clone()
                .unwrap_or_else(|| ColorScale::fixed(self.config.quantity)),
            ScaleMode::Dynamic => ColorScale::dynamic(p5, p95),
        };
        let values = aggregated.values;
        let (width, height) = (grid.width, grid.height);
        let (pixels, values) = tokio::task::spawn_blocking(move || {
            let pixels = scale.render(&values, width, height);
            (pixels, values)
        })
        .await?;
        let image = RgbaBitmap::new(width as u32, height as u32, pixels)?;

        stats.summary = ValueSummary::from_values(&values);

        let provenance = Provenance {
            time_window: TimeWindow::spanning(contributing.iter().map(|s| s.acquisition_time)),
            contributing_granules: contributing.iter().map(|s| s.granule_id.clone()).collect(),
            coverage_confidence: CoverageConfidence::assess(
                stats.granules_contributing,
                stats.valid_fraction(),
            ),
        };

        if superseded() {
            return Ok(CompositeOutcome::Superseded);
        }

        info!(
            width,
            height,
            method = %method,
            valid_pixels = stats.valid_pixels,
            contributing = stats.granules_contributing,
            discarded = stats.discards.total(),
            confidence = provenance.coverage_confidence.as_str(),
            "Composite ready"
        );

        Ok(CompositeOutcome::Ready(Arc::new(CompositeResult {
            image: Arc::new(image),
            values,
            width,
            height,
            bounds: grid.bounds,
            method,
            stats,
            provenance,
        })))
    }

    fn set_phase(&self, phase: BuildPhase) {
        self.phase.send_replace(phase);
    }
}

fn record_discard(counts: &mut DiscardCounts, reason: DiscardReason) {
    counts.record(reason);
    metrics::counter!("composite_granules_discarded_total", "reason" => reason.as_str())
        .increment(1);
}

fn no_data(reason: NoDataReason, stats: CompositeStats) -> CompositeOutcome {
    CompositeOutcome::NoData(NoDataReport { reason, stats })
}

/// Region clipped to the union of the sample bounds and to WGS84.
fn output_bounds(region: &BoundingBox, samples: &[RasterSample]) -> Option<BoundingBox> {
    let union = samples
        .iter()
        .map(|s| s.bounds)
        .reduce(|acc, b| acc.union(&b))?;
    let clipped = region.intersection(&union)?.clamp_to_wgs84();
    clipped.is_well_formed().then_some(clipped)
}

struct AggregatedGrid {
    values: Vec<f32>,
    /// Regional (P5, P95) over every valid sample value
    regional: Option<(f32, f32)>,
    /// Per sample: whether it supplied at least one cell value
    contributed: Vec<bool>,
}

/// Both aggregation passes. CPU-bound; run on a blocking thread.
fn aggregate_grid(
    samples: &[RasterSample],
    grid: &OutputGrid,
    method: AggregationMethod,
    mode: PercentileMode,
    min_stack: usize,
) -> AggregatedGrid {
    // Pass 1: regional distribution for the dynamic scale
    let mut all: Vec<f32> = samples.iter().flat_map(|s| s.valid_values()).collect();
    all.par_sort_unstable_by(f32::total_cmp);
    let regional = (!all.is_empty())
        .then(|| (percentile_sorted(&all, 0.05), percentile_sorted(&all, 0.95)));
    drop(all);

    // Pass 2: per-cell stacks, rows in parallel
    let mut values = vec![f32::NAN; grid.len()];
    let contributed = values
        .par_chunks_mut(grid.width.max(1))
        .enumerate()
        .map(|(row, out)| {
            let mut used = vec![false; samples.len()];
            let mut stack = Vec::with_capacity(samples.len());
            for (col, cell) in out.iter_mut().enumerate() {
                let (lon, lat) = grid.cell_center(col, row);
                stack.clear();
                for (i, sample) in samples.iter().enumerate() {
                    if let Some(value) = sample.value_at(lon, lat) {
                        stack.push(WeightedValue::new(value, sample.weight));
                        used[i] = true;
                    }
                }
                if let Some(value) = aggregate(&mut stack, method, mode, min_stack) {
                    *cell = value;
                }
            }
            used
        })
        .reduce(
            || vec![false; samples.len()],
            |mut acc, row| {
                for (a, b) in acc.iter_mut().zip(row) {
                    *a |= b;
                }
                acc
            },
        );

    AggregatedGrid {
        values,
        regional,
        contributed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sample(id: &str, bounds: BoundingBox, value: f32) -> RasterSample {
        RasterSample {
            granule_id: id.into(),
            acquisition_time: Utc.with_ymd_and_hms(2024, 7, 1, 10, 0, 0).unwrap(),
            data: vec![value; 4],
            width: 2,
            height: 2,
            bounds,
            weight: 1.0,
        }
    }

    #[test]
    fn test_output_bounds_clip_to_union() {
        let region = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let samples = vec![
            sample("a", BoundingBox::new(-5.0, 2.0, 4.0, 6.0), 300.0),
            sample("b", BoundingBox::new(3.0, 1.0, 6.0, 5.0), 300.0),
        ];
        assert_eq!(
            output_bounds(&region, &samples),
            Some(BoundingBox::new(0.0, 1.0, 6.0, 6.0))
        );
    }

    #[test]
    fn test_output_bounds_disjoint() {
        let region = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        let samples = vec![sample("a", BoundingBox::new(5.0, 5.0, 6.0, 6.0), 300.0)];
        assert_eq!(output_bounds(&region, &samples), None);
    }

    #[test]
    fn test_aggregate_grid_overlap() {
        let grid = OutputGrid {
            bounds: BoundingBox::new(0.0, 0.0, 4.0, 1.0),
            width: 4,
            height: 1,
        };
        let samples = vec![
            sample("left", BoundingBox::new(0.0, 0.0, 2.0, 1.0), 290.0),
            sample("right", BoundingBox::new(1.0, 0.0, 3.0, 1.0), 310.0),
            sample("unused", BoundingBox::new(8.0, 0.0, 9.0, 1.0), 350.0),
        ];
        let out = aggregate_grid(
            &samples,
            &grid,
            AggregationMethod::Max,
            PercentileMode::Weighted,
            5,
        );
        assert_eq!(out.values[0], 290.0);
        assert_eq!(out.values[1], 310.0);
        assert_eq!(out.values[2], 310.0);
        assert!(out.values[3].is_nan());
        assert_eq!(out.contributed, vec![true, true, false]);
        assert!(out.regional.is_some());
    }
}
