//! KOSTRA-DWD-2020 design rainfall scenarios.
//!
//! Each scenario is one duration / return period pair. The DWD publishes
//! them as gzipped ASCII grids (`hN_D060m_T010a.asc.gz`); the preparation
//! step converts them to Cloud-Optimized GeoTIFFs named
//! `kostra_d60min_t10a.tif` with nodata -999, which the compositor reads
//! like any other single-granule layer.

use std::fmt;

use atlas_common::{BoundingBox, GranuleDescriptor, PhysicalQuantity};
use chrono::{DateTime, TimeZone, Utc};
use compositor::{AggregationMethod, CompositeRequest, CompositorConfig};
use renderer::ScaleMode;
use serde::{Deserialize, Serialize};

use crate::error::{DashboardError, Result};

/// Upstream directory of the KOSTRA-DWD-2020 grids.
pub const DWD_BASE_URL: &str = "https://opendata.dwd.de/climate_environment/CDC/grids_germany/return_periods/precipitation/KOSTRA/KOSTRA_DWD_2020_v2021.01/";

/// Fill value written into the converted grids.
pub const KOSTRA_NODATA: f64 = -999.0;

/// Extent of the KOSTRA grid in WGS84.
pub const GERMANY_BOUNDS: BoundingBox = BoundingBox {
    min_x: 5.87,
    min_y: 47.27,
    max_x: 15.04,
    max_y: 55.06,
};

// 2020-01-01T00:00:00Z, the KOSTRA-DWD-2020 reference period end
const REFERENCE_TIMESTAMP: i64 = 1_577_836_800;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Duration {
    #[serde(rename = "60min")]
    Minutes60,
    #[serde(rename = "12h")]
    Hours12,
    #[serde(rename = "24h")]
    Hours24,
}

impl Duration {
    pub const ALL: [Duration; 3] = [Self::Minutes60, Self::Hours12, Self::Hours24];

    /// Key used in converted file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minutes60 => "60min",
            Self::Hours12 => "12h",
            Self::Hours24 => "24h",
        }
    }

    /// Zero-padded minute code used in DWD file names.
    pub fn dwd_code(&self) -> &'static str {
        match self {
            Self::Minutes60 => "060",
            Self::Hours12 => "720",
            Self::Hours24 => "1440",
        }
    }

    pub fn minutes(&self) -> u32 {
        match self {
            Self::Minutes60 => 60,
            Self::Hours12 => 720,
            Self::Hours24 => 1440,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "60min" | "60" | "1h" | "060" => Some(Self::Minutes60),
            "12h" | "720" | "720min" => Some(Self::Hours12),
            "24h" | "1440" | "1440min" => Some(Self::Hours24),
            _ => None,
        }
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReturnPeriod {
    #[serde(rename = "10a")]
    Years10,
    #[serde(rename = "100a")]
    Years100,
}

impl ReturnPeriod {
    pub const ALL: [ReturnPeriod; 2] = [Self::Years10, Self::Years100];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Years10 => "10a",
            Self::Years100 => "100a",
        }
    }

    pub fn dwd_code(&self) -> &'static str {
        match self {
            Self::Years10 => "010",
            Self::Years100 => "100",
        }
    }

    pub fn years(&self) -> u32 {
        match self {
            Self::Years10 => 10,
            Self::Years100 => 100,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "10a" | "10" | "010" | "t10" => Some(Self::Years10),
            "100a" | "100" | "t100" => Some(Self::Years100),
            _ => None,
        }
    }
}

impl fmt::Display for ReturnPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One design rainfall grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KostraScenario {
    pub duration: Duration,
    pub return_period: ReturnPeriod,
}

impl KostraScenario {
    pub fn new(duration: Duration, return_period: ReturnPeriod) -> Self {
        Self {
            duration,
            return_period,
        }
    }

    /// Every published combination, durations outermost.
    pub fn all() -> Vec<Self> {
        Duration::ALL
            .iter()
            .flat_map(|d| ReturnPeriod::ALL.iter().map(move |p| Self::new(*d, *p)))
            .collect()
    }

    /// Parse `"<duration>/<period>"`, e.g. `"60min/100a"` or `"24h/10a"`.
    pub fn parse(s: &str) -> Result<Self> {
        let (duration, period) = s
            .split_once('/')
            .ok_or_else(|| DashboardError::UnknownScenario(s.to_string()))?;
        let duration =
            Duration::parse(duration).ok_or_else(|| DashboardError::UnknownScenario(s.to_string()))?;
        let period =
            ReturnPeriod::parse(period).ok_or_else(|| DashboardError::UnknownScenario(s.to_string()))?;
        Ok(Self::new(duration, period))
    }

    /// Converted COG name, e.g. `kostra_d60min_t10a.tif`.
    pub fn file_name(&self) -> String {
        format!(
            "kostra_d{}_t{}.tif",
            self.duration.as_str(),
            self.return_period.as_str()
        )
    }

    /// Upstream DWD name, e.g. `hN_D060m_T010a.asc.gz`.
    pub fn dwd_file_name(&self) -> String {
        format!(
            "hN_D{}m_T{}a.asc.gz",
            self.duration.dwd_code(),
            self.return_period.dwd_code()
        )
    }

    pub fn dwd_url(&self) -> String {
        format!("{}{}", DWD_BASE_URL, self.dwd_file_name())
    }

    pub fn granule_id(&self) -> String {
        format!("kostra-d{}-t{}", self.duration, self.return_period)
    }

    /// Descriptor for the converted grid under `base_url`.
    ///
    /// The grid is a complete national product, so it is declared cloud
    /// free with full coverage and its bounds bypass reprojection.
    pub fn granule(&self, base_url: &str) -> GranuleDescriptor {
        GranuleDescriptor::new(
            self.granule_id(),
            format!("{}/{}", base_url.trim_end_matches('/'), self.file_name()),
            reference_time(),
        )
        .with_cloud_percent(0.0)
        .with_coverage_percent(100.0)
        .with_quality_score(1.0)
        .with_declared_bounds(GERMANY_BOUNDS)
    }

    pub fn request(&self, base_url: &str, region: BoundingBox) -> CompositeRequest {
        CompositeRequest::new(region, vec![self.granule(base_url)])
            .with_method(AggregationMethod::Max)
    }
}

impl fmt::Display for KostraScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.duration, self.return_period)
    }
}

/// Compositor settings for precipitation depth grids.
///
/// Depths are colored on the calibrated millimetre scale so scenarios stay
/// comparable with each other.
pub fn compositor_config(base: &CompositorConfig) -> CompositorConfig {
    CompositorConfig {
        quantity: PhysicalQuantity::Precipitation,
        color_scale: ScaleMode::Fixed,
        aggregation: AggregationMethod::Max,
        ..base.clone()
    }
}

fn reference_time() -> DateTime<Utc> {
    Utc.timestamp_opt(REFERENCE_TIMESTAMP, 0)
        .single()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_names() {
        let scenario = KostraScenario::new(Duration::Minutes60, ReturnPeriod::Years10);
        assert_eq!(scenario.file_name(), "kostra_d60min_t10a.tif");
        assert_eq!(scenario.dwd_file_name(), "hN_D060m_T010a.asc.gz");

        let scenario = KostraScenario::new(Duration::Hours24, ReturnPeriod::Years100);
        assert_eq!(scenario.file_name(), "kostra_d24h_t100a.tif");
        assert_eq!(scenario.dwd_file_name(), "hN_D1440m_T100a.asc.gz");
        assert!(scenario.dwd_url().ends_with("KOSTRA_DWD_2020_v2021.01/hN_D1440m_T100a.asc.gz"));
    }

    #[test]
    fn test_all_scenarios() {
        let all = KostraScenario::all();
        assert_eq!(all.len(), 6);
        assert_eq!(all[0].to_string(), "60min/10a");
        assert_eq!(all[5].to_string(), "24h/100a");
    }

    #[test]
    fn test_parse() {
        let scenario = KostraScenario::parse("12h/100a").unwrap();
        assert_eq!(scenario.duration, Duration::Hours12);
        assert_eq!(scenario.return_period, ReturnPeriod::Years100);
        assert_eq!(KostraScenario::parse("1440/010").unwrap().duration.minutes(), 1440);
        assert!(KostraScenario::parse("6h/10a").is_err());
        assert!(KostraScenario::parse("60min").is_err());
    }

    #[test]
    fn test_granule() {
        let scenario = KostraScenario::new(Duration::Hours12, ReturnPeriod::Years10);
        let granule = scenario.granule("https://data.example.org/kostra/");
        assert_eq!(
            granule.source_url,
            "https://data.example.org/kostra/kostra_d12h_t10a.tif"
        );
        assert_eq!(granule.id, "kostra-d12h-t10a");
        assert_eq!(granule.declared_bounds, Some(GERMANY_BOUNDS));
        assert_eq!(granule.acquisition_time.to_rfc3339(), "2020-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_compositor_config() {
        let config = compositor_config(&CompositorConfig::default());
        assert_eq!(config.quantity, PhysicalQuantity::Precipitation);
        assert_eq!(config.color_scale, ScaleMode::Fixed);
        assert!(config.validate().is_ok());
    }
}
