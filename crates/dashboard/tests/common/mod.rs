//! Common helpers for dashboard integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use atlas_common::{parse_timestamp, BoundingBox, GranuleDescriptor};
use compositor::{
    CompositeRequest, Compositor, CompositorConfig, DecodedRaster, InMemorySource, RasterCrs,
    RasterInfo,
};
use dashboard::{kostra, CompositeChannel, DashboardController, HEAT_LAYER, KOSTRA_LAYER};
use overlay::{HeadlessHost, Viewport};
use test_utils::{acquisition, create_constant_grid, region};

pub const HEAT_EXTENT: (f64, f64, f64, f64) = (8.0, 49.5, 9.5, 50.5);
pub const KOSTRA_BASE: &str = "mem://kostra";

pub fn bbox(t: (f64, f64, f64, f64)) -> BoundingBox {
    BoundingBox::new(t.0, t.1, t.2, t.3)
}

pub fn frankfurt() -> BoundingBox {
    bbox(region::FRANKFURT)
}

pub fn berlin() -> BoundingBox {
    bbox(region::BERLIN)
}

pub fn raster(bounds: BoundingBox, width: u32, height: u32, data: Vec<f32>, nodata: Option<f64>) -> DecodedRaster {
    let info = RasterInfo {
        width,
        height,
        native_bounds: bounds,
        crs: RasterCrs::Geographic,
        nodata,
    };
    DecodedRaster::new(info, data).expect("raster dimensions match data")
}

pub fn granule(id: &str, acquired: &str) -> GranuleDescriptor {
    let time = parse_timestamp(acquired).expect("valid fixture timestamp");
    GranuleDescriptor::new(id, format!("mem://{}", id), time)
}

pub fn test_config() -> CompositorConfig {
    CompositorConfig {
        window_size: 32,
        max_output_dim: 64,
        target_resolution_m: 500.0,
        ..Default::default()
    }
}

/// Source with two LST granules over the Rhine-Main area and the 60 min /
/// 10 a KOSTRA grid.
pub fn source() -> Arc<InMemorySource> {
    let source = InMemorySource::new();
    let extent = bbox(HEAT_EXTENT);
    source.insert("mem://lst-a", raster(extent, 32, 32, create_constant_grid(32, 32, 300.0), None));
    source.insert("mem://lst-b", raster(extent, 32, 32, create_constant_grid(32, 32, 304.0), None));

    let mut depths = create_constant_grid(64, 64, 32.5);
    // Sea cells carry the fill value
    for value in depths.iter_mut().take(64) {
        *value = kostra::KOSTRA_NODATA as f32;
    }
    source.insert(
        format!("{}/kostra_d60min_t10a.tif", KOSTRA_BASE),
        raster(kostra::GERMANY_BOUNDS, 64, 64, depths, Some(kostra::KOSTRA_NODATA)),
    );
    Arc::new(source)
}

pub fn heat_request(region: BoundingBox) -> CompositeRequest {
    CompositeRequest::new(
        region,
        vec![
            granule("lst-a", acquisition::EARLY).with_cloud_percent(5.0),
            granule("lst-b", acquisition::MID).with_cloud_percent(20.0),
        ],
    )
}

pub fn controller() -> DashboardController {
    let source = source();
    let heat = Compositor::new(source.clone(), test_config()).expect("valid config");
    let kostra_compositor = Compositor::new(source, kostra::compositor_config(&test_config()))
        .expect("valid config");

    DashboardController::new(CompositeChannel::new(HEAT_LAYER, Arc::new(heat)))
        .with_kostra(CompositeChannel::new(KOSTRA_LAYER, Arc::new(kostra_compositor)))
}

pub fn host() -> HeadlessHost {
    HeadlessHost::new(1, Viewport::new(1280, 800, 2.0))
}
