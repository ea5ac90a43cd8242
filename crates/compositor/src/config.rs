//! Configuration for the compositor.

use atlas_common::PhysicalQuantity;
use projection::UtmZone;
use renderer::ScaleMode;
use serde::{Deserialize, Serialize};

use crate::types::{AggregationMethod, PercentileMode};

/// Configuration for composite builds.
///
/// Quality thresholds default to permissive values so sparse catalogues
/// still produce an overlay; tighten them through the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositorConfig {
    /// Granules with more cloud cover than this are discarded.
    pub max_cloud_percent: f64,

    /// Granules covering less of the region than this are discarded.
    pub min_coverage_percent: f64,

    /// Maximum granule reads in flight.
    pub fetch_concurrency: usize,

    /// Side length of the square buffer each window read is resampled to.
    pub window_size: u32,

    /// Upper bound on the longer side of the output bitmap.
    pub max_output_dim: u32,

    /// Target ground resolution of the output grid in meters.
    pub target_resolution_m: f64,

    /// Stacks shorter than this fall back to the median for p90/p95.
    pub min_stack_for_percentile: usize,

    /// Default per-pixel reducer.
    pub aggregation: AggregationMethod,

    /// Weighted or strict-index percentile selection.
    pub percentile_mode: PercentileMode,

    /// Fixed physical breakpoints or regional P5..P95 stretch.
    pub color_scale: ScaleMode,

    /// Quantity the granules carry; drives validity masking and fixed scales.
    pub quantity: PhysicalQuantity,

    /// Zone used when neither the file name nor the metadata names one.
    pub default_utm_zone: UtmZone,

    /// Optional CORS proxy prefix for raster requests.
    pub proxy_url: Option<String>,

    /// Number of finished composites kept in memory.
    pub cache_entries: usize,

    /// Number of opened granules kept in memory by URL; 0 disables.
    pub granule_cache_entries: usize,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            max_cloud_percent: 90.0,
            min_coverage_percent: 10.0,
            fetch_concurrency: 4,
            window_size: 512,
            max_output_dim: 1024,
            target_resolution_m: 70.0,
            min_stack_for_percentile: 5,
            aggregation: AggregationMethod::Median,
            percentile_mode: PercentileMode::Weighted,
            color_scale: ScaleMode::Dynamic,
            quantity: PhysicalQuantity::LandSurfaceTemperature,
            default_utm_zone: default_zone(),
            proxy_url: None,
            cache_entries: 16,
            granule_cache_entries: 8,
        }
    }
}

// Zone 32N covers most of Germany
fn default_zone() -> UtmZone {
    UtmZone::from_epsg(32632).unwrap_or_else(|| UtmZone::containing(9.0, 51.0))
}

impl CompositorConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("COMPOSITE_MAX_CLOUD_PERCENT") {
            if let Ok(v) = val.parse() {
                config.max_cloud_percent = v;
            }
        }

        if let Ok(val) = std::env::var("COMPOSITE_MIN_COVERAGE_PERCENT") {
            if let Ok(v) = val.parse() {
                config.min_coverage_percent = v;
            }
        }

        if let Ok(val) = std::env::var("COMPOSITE_FETCH_CONCURRENCY") {
            if let Ok(v) = val.parse() {
                config.fetch_concurrency = v;
            }
        }

        if let Ok(val) = std::env::var("COMPOSITE_WINDOW_SIZE") {
            if let Ok(v) = val.parse() {
                config.window_size = v;
            }
        }

        if let Ok(val) = std::env::var("COMPOSITE_MAX_OUTPUT_DIM") {
            if let Ok(v) = val.parse() {
                config.max_output_dim = v;
            }
        }

        if let Ok(val) = std::env::var("COMPOSITE_TARGET_RESOLUTION_M") {
            if let Ok(v) = val.parse() {
                config.target_resolution_m = v;
            }
        }

        if let Ok(val) = std::env::var("COMPOSITE_AGGREGATION") {
            config.aggregation = AggregationMethod::from_str(&val);
        }

        if let Ok(val) = std::env::var("COMPOSITE_PERCENTILE_MODE") {
            config.percentile_mode = PercentileMode::from_str(&val);
        }

        if let Ok(val) = std::env::var("COMPOSITE_COLOR_SCALE") {
            config.color_scale = ScaleMode::from_str(&val);
        }

        if let Ok(val) = std::env::var("COMPOSITE_QUANTITY") {
            config.quantity = PhysicalQuantity::from_str(&val);
        }

        if let Ok(val) = std::env::var("COMPOSITE_DEFAULT_UTM_ZONE") {
            if let Some(zone) = UtmZone::parse(&val) {
                config.default_utm_zone = zone;
            }
        }

        if let Ok(val) = std::env::var("RASTER_PROXY_URL") {
            if !val.trim().is_empty() {
                config.proxy_url = Some(val);
            }
        }

        if let Ok(val) = std::env::var("COMPOSITE_CACHE_ENTRIES") {
            if let Ok(v) = val.parse() {
                config.cache_entries = v;
            }
        }

        if let Ok(val) = std::env::var("COMPOSITE_GRANULE_CACHE_ENTRIES") {
            if let Ok(v) = val.parse() {
                config.granule_cache_entries = v;
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=100.0).contains(&self.max_cloud_percent) {
            return Err("max_cloud_percent must be 0-100".to_string());
        }

        if !(0.0..=100.0).contains(&self.min_coverage_percent) {
            return Err("min_coverage_percent must be 0-100".to_string());
        }

        if self.fetch_concurrency == 0 {
            return Err("fetch_concurrency must be > 0".to_string());
        }

        if self.window_size == 0 {
            return Err("window_size must be > 0".to_string());
        }

        if self.max_output_dim == 0 {
            return Err("max_output_dim must be > 0".to_string());
        }

        if !(self.target_resolution_m.is_finite() && self.target_resolution_m > 0.0) {
            return Err("target_resolution_m must be > 0".to_string());
        }

        if self.min_stack_for_percentile < 2 {
            return Err("min_stack_for_percentile must be >= 2".to_string());
        }

        Ok(())
    }
}
