//! Granule descriptors handed over by the catalogue.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::bbox::BoundingBox;
use crate::error::{AtlasError, AtlasResult};
use crate::time::parse_timestamp;

/// Neutral cloud cover assumed when the catalogue does not report one.
pub const DEFAULT_CLOUD_PERCENT: f64 = 50.0;
/// Neutral coverage assumed when the catalogue does not report one.
pub const DEFAULT_COVERAGE_PERCENT: f64 = 50.0;
/// Neutral quality score assumed when the catalogue does not report one.
pub const DEFAULT_QUALITY_SCORE: f64 = 0.5;

/// One independently georeferenced raster file covering part of the region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GranuleDescriptor {
    pub id: String,
    pub source_url: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub acquisition_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<f64>,
    /// Authoritative WGS84 bounds. When present, reprojection is skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declared_bounds: Option<BoundingBox>,
}

impl GranuleDescriptor {
    pub fn new(
        id: impl Into<String>,
        source_url: impl Into<String>,
        acquisition_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            source_url: source_url.into(),
            acquisition_time,
            cloud_percent: None,
            coverage_percent: None,
            quality_score: None,
            declared_bounds: None,
        }
    }

    pub fn with_cloud_percent(mut self, cloud: f64) -> Self {
        self.cloud_percent = Some(cloud);
        self
    }

    pub fn with_coverage_percent(mut self, coverage: f64) -> Self {
        self.coverage_percent = Some(coverage);
        self
    }

    pub fn with_quality_score(mut self, quality: f64) -> Self {
        self.quality_score = Some(quality);
        self
    }

    pub fn with_declared_bounds(mut self, bounds: BoundingBox) -> Self {
        self.declared_bounds = Some(bounds);
        self
    }

    pub fn cloud_or_default(&self) -> f64 {
        self.cloud_percent.unwrap_or(DEFAULT_CLOUD_PERCENT)
    }

    pub fn coverage_or_default(&self) -> f64 {
        self.coverage_percent.unwrap_or(DEFAULT_COVERAGE_PERCENT)
    }

    pub fn quality_or_default(&self) -> f64 {
        self.quality_score.unwrap_or(DEFAULT_QUALITY_SCORE)
    }

    /// Reject out-of-range quality signals and malformed declared bounds.
    pub fn validate(&self) -> AtlasResult<()> {
        if self.id.trim().is_empty() {
            return Err(AtlasError::invalid_granule(&self.id, "id must not be empty"));
        }
        if self.source_url.trim().is_empty() {
            return Err(AtlasError::invalid_granule(&self.id, "source url must not be empty"));
        }

        check_range(&self.id, "cloud percent", self.cloud_percent, 0.0, 100.0)?;
        check_range(&self.id, "coverage percent", self.coverage_percent, 0.0, 100.0)?;
        check_range(&self.id, "quality score", self.quality_score, 0.0, 1.0)?;

        if let Some(bounds) = &self.declared_bounds {
            if !bounds.is_valid_wgs84() {
                return Err(AtlasError::invalid_granule(
                    &self.id,
                    format!("declared bounds {:?} are not a valid WGS84 box", bounds),
                ));
            }
        }

        Ok(())
    }
}

fn check_range(id: &str, name: &str, value: Option<f64>, lo: f64, hi: f64) -> AtlasResult<()> {
    match value {
        Some(v) if !(lo..=hi).contains(&v) => Err(AtlasError::invalid_granule(
            id,
            format!("{} {} outside [{}, {}]", name, v, lo, hi),
        )),
        _ => Ok(()),
    }
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}

/// A catalogue response: the granules selected for one composite.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GranuleList {
    pub granules: Vec<GranuleDescriptor>,
}

impl GranuleList {
    /// Parse either `{"granules": [...]}` or a bare array.
    pub fn from_json(json: &str) -> AtlasResult<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let list = if value.is_array() {
            GranuleList {
                granules: serde_json::from_value(value)?,
            }
        } else {
            serde_json::from_value(value)?
        };
        list.validate()?;
        Ok(list)
    }

    /// Validate every descriptor and require unique ids.
    pub fn validate(&self) -> AtlasResult<()> {
        let mut seen = HashSet::new();
        for granule in &self.granules {
            granule.validate()?;
            if !seen.insert(granule.id.as_str()) {
                return Err(AtlasError::invalid_granule(&granule.id, "duplicate id"));
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.granules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.granules.is_empty()
    }
}
