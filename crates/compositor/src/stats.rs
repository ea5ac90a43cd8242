//! Composite statistics and provenance.

use atlas_common::TimeWindow;
use serde::{Deserialize, Serialize};

use crate::quality::DiscardCounts;

/// Summary of the aggregated values of a composite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueSummary {
    pub min: f32,
    pub max: f32,
    pub mean: f32,
    pub p5: f32,
    pub p50: f32,
    pub p95: f32,
    pub count: usize,
}

impl ValueSummary {
    /// Summarize the valid (non-NaN) entries of `values`.
    pub fn from_values(values: &[f32]) -> Option<Self> {
        let mut valid: Vec<f32> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        if valid.is_empty() {
            return None;
        }
        valid.sort_by(f32::total_cmp);

        let sum: f64 = valid.iter().map(|&v| v as f64).sum();
        Some(Self {
            min: valid[0],
            max: valid[valid.len() - 1],
            mean: (sum / valid.len() as f64) as f32,
            p5: percentile_sorted(&valid, 0.05),
            p50: percentile_sorted(&valid, 0.50),
            p95: percentile_sorted(&valid, 0.95),
            count: valid.len(),
        })
    }
}

/// Linear-interpolated percentile of an ascending slice. `p` in [0, 1].
///
/// Returns NaN for an empty slice.
pub fn percentile_sorted(sorted: &[f32], p: f64) -> f32 {
    match sorted.len() {
        0 => f32::NAN,
        1 => sorted[0],
        n => {
            let rank = p.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            let frac = (rank - lo as f64) as f32;
            sorted[lo] + frac * (sorted[hi] - sorted[lo])
        }
    }
}

/// How much of the region the composite can vouch for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageConfidence {
    High,
    Medium,
    Low,
}

impl CoverageConfidence {
    /// High: at least 3 granules and 80% valid pixels.
    /// Medium: at least 2 granules or 50% valid pixels.
    pub fn assess(contributing: usize, valid_fraction: f64) -> Self {
        if contributing >= 3 && valid_fraction >= 0.8 {
            Self::High
        } else if contributing >= 2 || valid_fraction >= 0.5 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// Counters and value statistics for one composite build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompositeStats {
    pub total_pixels: usize,
    pub valid_pixels: usize,
    pub nodata_pixels: usize,
    pub summary: Option<ValueSummary>,
    /// Regional P5 over all valid sample values (pass 1)
    pub regional_p5: Option<f32>,
    /// Regional P95 over all valid sample values (pass 1)
    pub regional_p95: Option<f32>,
    pub granules_requested: usize,
    pub granules_admitted: usize,
    pub granules_fetched: usize,
    pub granules_contributing: usize,
    pub discards: DiscardCounts,
}

impl CompositeStats {
    pub fn valid_fraction(&self) -> f64 {
        if self.total_pixels == 0 {
            0.0
        } else {
            self.valid_pixels as f64 / self.total_pixels as f64
        }
    }
}

/// Where a composite came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    /// Acquisition span of the contributing granules
    pub time_window: Option<TimeWindow>,
    /// Contributing granule ids, oldest first
    pub contributing_granules: Vec<String>,
    pub coverage_confidence: CoverageConfidence,
}
