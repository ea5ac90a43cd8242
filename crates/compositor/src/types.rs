//! Core types for composite building.

use std::sync::Arc;

use atlas_common::BoundingBox;
use chrono::{DateTime, Utc};
use renderer::RgbaBitmap;
use serde::{Deserialize, Serialize};

use crate::stats::{CompositeStats, Provenance};

/// A rectangular pixel window in a raster's native grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelWindow {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelWindow {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Coordinate reference system declared by raster metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "epsg")]
pub enum RasterCrs {
    /// WGS84 longitude/latitude (EPSG:4326)
    Geographic,
    /// Projected CRS with an EPSG code (expected UTM)
    Projected(u32),
    /// No usable CRS key; treated as UTM with zone detection
    Unknown,
}

impl RasterCrs {
    pub fn projected_epsg(&self) -> Option<u32> {
        match self {
            Self::Projected(code) => Some(*code),
            _ => None,
        }
    }
}

/// Raster metadata needed to place a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterInfo {
    pub width: u32,
    pub height: u32,
    /// Native-CRS bounds of the full raster (degrees or meters)
    pub native_bounds: BoundingBox,
    pub crs: RasterCrs,
    /// Declared nodata sentinel
    pub nodata: Option<f64>,
}

/// One granule's decoded window over the region of interest.
#[derive(Debug, Clone)]
pub struct RasterSample {
    pub granule_id: String,
    pub acquisition_time: DateTime<Utc>,
    /// Row-major, top-down values; NaN marks nodata
    pub data: Vec<f32>,
    pub width: usize,
    pub height: usize,
    /// WGS84 bounds of the window
    pub bounds: BoundingBox,
    /// Quality weight in [0, 1]
    pub weight: f32,
}

impl RasterSample {
    /// Nearest-pixel value at a WGS84 position. `None` outside the window or on nodata.
    pub fn value_at(&self, lon: f64, lat: f64) -> Option<f32> {
        if self.width == 0 || self.height == 0 || !self.bounds.contains_point(lon, lat) {
            return None;
        }

        let fx = (lon - self.bounds.min_x) / self.bounds.width();
        let fy = (self.bounds.max_y - lat) / self.bounds.height();
        let col = ((fx * self.width as f64).floor() as usize).min(self.width - 1);
        let row = ((fy * self.height as f64).floor() as usize).min(self.height - 1);

        let value = self.data[row * self.width + col];
        if value.is_nan() {
            None
        } else {
            Some(value)
        }
    }

    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| !v.is_nan()).count()
    }

    /// Iterator over valid values.
    pub fn valid_values(&self) -> impl Iterator<Item = f32> + '_ {
        self.data.iter().copied().filter(|v| !v.is_nan())
    }
}

/// Per-pixel reducer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMethod {
    Max,
    Mean,
    Median,
    P90,
    P95,
}

impl Default for AggregationMethod {
    fn default() -> Self {
        Self::Median
    }
}

impl AggregationMethod {
    /// Parse from string (case-insensitive). Unknown values fall back to median.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "max" | "maximum" => Self::Max,
            "mean" | "avg" | "average" => Self::Mean,
            "p90" | "percentile90" => Self::P90,
            "p95" | "percentile95" => Self::P95,
            _ => Self::Median,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Max => "max",
            Self::Mean => "mean",
            Self::Median => "median",
            Self::P90 => "p90",
            Self::P95 => "p95",
        }
    }

    /// Target percentile for percentile methods.
    pub fn percentile(&self) -> Option<f64> {
        match self {
            Self::P90 => Some(0.90),
            Self::P95 => Some(0.95),
            _ => None,
        }
    }
}

impl std::fmt::Display for AggregationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How percentiles are picked from a pixel stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PercentileMode {
    /// Cumulative quality weight with linear interpolation at the crossing
    Weighted,
    /// Position in the sorted stack, never the maximum's index
    StrictIndex,
}

impl Default for PercentileMode {
    fn default() -> Self {
        Self::Weighted
    }
}

impl PercentileMode {
    /// Parse from string (case-insensitive).
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "strict" | "strict_index" | "index" => Self::StrictIndex,
            _ => Self::Weighted,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weighted => "weighted",
            Self::StrictIndex => "strict_index",
        }
    }
}

impl std::fmt::Display for PercentileMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A finished composite ready for the overlay.
#[derive(Debug, Clone)]
pub struct CompositeResult {
    pub image: Arc<RgbaBitmap>,
    /// Aggregated values, row-major, NaN where no granule contributed
    pub values: Vec<f32>,
    pub width: usize,
    pub height: usize,
    /// WGS84 bounds of the bitmap
    pub bounds: BoundingBox,
    pub method: AggregationMethod,
    pub stats: CompositeStats,
    pub provenance: Provenance,
}

impl CompositeResult {
    /// Aggregated value under a WGS84 position, for hover read-outs.
    pub fn value_at(&self, lon: f64, lat: f64) -> Option<f32> {
        if self.width == 0 || self.height == 0 || !self.bounds.contains_point(lon, lat) {
            return None;
        }
        let fx = (lon - self.bounds.min_x) / self.bounds.width();
        let fy = (self.bounds.max_y - lat) / self.bounds.height();
        let col = ((fx * self.width as f64).floor() as usize).min(self.width - 1);
        let row = ((fy * self.height as f64).floor() as usize).min(self.height - 1);
        let value = self.values[row * self.width + col];
        (!value.is_nan()).then_some(value)
    }
}
