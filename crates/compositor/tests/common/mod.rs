//! Common helpers for compositor integration tests.
//!
//! Rasters are registered in an [`InMemorySource`] under `mem://` URLs so the
//! full pipeline runs without touching the network or the filesystem.

#![allow(dead_code)]

use std::sync::Arc;

use atlas_common::{parse_timestamp, BoundingBox, GranuleDescriptor};
use compositor::{CompositorConfig, DecodedRaster, InMemorySource, RasterCrs, RasterInfo};

/// Bounding box from a `(west, south, east, north)` fixture tuple.
pub fn bbox(t: (f64, f64, f64, f64)) -> BoundingBox {
    BoundingBox::new(t.0, t.1, t.2, t.3)
}

/// A WGS84 raster covering `bounds`.
pub fn geographic_raster(
    bounds: (f64, f64, f64, f64),
    width: u32,
    height: u32,
    data: Vec<f32>,
    nodata: Option<f64>,
) -> DecodedRaster {
    let info = RasterInfo {
        width,
        height,
        native_bounds: bbox(bounds),
        crs: RasterCrs::Geographic,
        nodata,
    };
    DecodedRaster::new(info, data).expect("raster dimensions match data")
}

/// Granule descriptor pointing at `mem://{id}`.
pub fn granule(id: &str, acquired: &str) -> GranuleDescriptor {
    let time = parse_timestamp(acquired).expect("valid fixture timestamp");
    GranuleDescriptor::new(id, format!("mem://{}", id), time)
}

/// Source with one raster per `(id, raster)` pair.
pub fn source_with(rasters: Vec<(&str, DecodedRaster)>) -> Arc<InMemorySource> {
    let source = InMemorySource::new();
    for (id, raster) in rasters {
        source.insert(format!("mem://{}", id), raster);
    }
    Arc::new(source)
}

/// Small grids so tests stay fast.
pub fn test_config() -> CompositorConfig {
    CompositorConfig {
        window_size: 32,
        max_output_dim: 64,
        target_resolution_m: 500.0,
        ..Default::default()
    }
}
