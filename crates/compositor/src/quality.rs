//! Quality filtering and weighting of granules.

use atlas_common::GranuleDescriptor;
use serde::{Deserialize, Serialize};

/// Why a granule did not contribute to a composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscardReason {
    Cloud,
    Coverage,
    FetchFailed,
    InvalidGeometry,
    NoOverlap,
}

impl DiscardReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cloud => "cloud",
            Self::Coverage => "coverage",
            Self::FetchFailed => "fetch_failed",
            Self::InvalidGeometry => "invalid_geometry",
            Self::NoOverlap => "no_overlap",
        }
    }
}

impl std::fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Discard tallies per reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscardCounts {
    pub cloud: usize,
    pub coverage: usize,
    pub fetch_failed: usize,
    pub invalid_geometry: usize,
    pub no_overlap: usize,
}

impl DiscardCounts {
    pub fn record(&mut self, reason: DiscardReason) {
        match reason {
            DiscardReason::Cloud => self.cloud += 1,
            DiscardReason::Coverage => self.coverage += 1,
            DiscardReason::FetchFailed => self.fetch_failed += 1,
            DiscardReason::InvalidGeometry => self.invalid_geometry += 1,
            DiscardReason::NoOverlap => self.no_overlap += 1,
        }
    }

    pub fn get(&self, reason: DiscardReason) -> usize {
        match reason {
            DiscardReason::Cloud => self.cloud,
            DiscardReason::Coverage => self.coverage,
            DiscardReason::FetchFailed => self.fetch_failed,
            DiscardReason::InvalidGeometry => self.invalid_geometry,
            DiscardReason::NoOverlap => self.no_overlap,
        }
    }

    pub fn total(&self) -> usize {
        self.cloud + self.coverage + self.fetch_failed + self.invalid_geometry + self.no_overlap
    }

    /// Discards that happened before any data was fetched.
    pub fn filtered(&self) -> usize {
        self.cloud + self.coverage
    }
}

/// Admission thresholds and the weighting formula.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityFilter {
    pub max_cloud_percent: f64,
    pub min_coverage_percent: f64,
}

impl QualityFilter {
    pub fn new(max_cloud_percent: f64, min_coverage_percent: f64) -> Self {
        Self {
            max_cloud_percent,
            min_coverage_percent,
        }
    }

    /// Admit or reject a granule. Missing signals take their neutral defaults.
    pub fn admit(&self, granule: &GranuleDescriptor) -> Result<(), DiscardReason> {
        if granule.cloud_or_default() > self.max_cloud_percent {
            return Err(DiscardReason::Cloud);
        }
        if granule.coverage_or_default() < self.min_coverage_percent {
            return Err(DiscardReason::Coverage);
        }
        Ok(())
    }

    /// Quality weight in [0, 1]:
    /// `0.4 * clear-sky fraction + 0.3 * coverage fraction + 0.3 * quality score`.
    pub fn weight(granule: &GranuleDescriptor) -> f32 {
        let clear = (100.0 - granule.cloud_or_default()) / 100.0;
        let coverage = granule.coverage_or_default() / 100.0;
        let quality = granule.quality_or_default();
        let w = 0.4 * clear + 0.3 * coverage + 0.3 * quality;
        if w.is_finite() {
            w.clamp(0.0, 1.0) as f32
        } else {
            0.0
        }
    }
}

impl Default for QualityFilter {
    fn default() -> Self {
        Self::new(90.0, 10.0)
    }
}
