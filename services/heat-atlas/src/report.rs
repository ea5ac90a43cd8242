//! JSON summary of one run.

use atlas_common::BoundingBox;
use compositor::{AggregationMethod, CompositeResult, CompositeStats, Provenance};
use dashboard::Applied;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct CompositeSummary {
    pub width: usize,
    pub height: usize,
    pub bounds: BoundingBox,
    pub method: AggregationMethod,
    pub stats: CompositeStats,
    pub provenance: Provenance,
}

impl From<&CompositeResult> for CompositeSummary {
    fn from(result: &CompositeResult) -> Self {
        Self {
            width: result.width,
            height: result.height,
            bounds: result.bounds,
            method: result.method,
            stats: result.stats.clone(),
            provenance: result.provenance.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LayerReport {
    pub id: String,
    pub result: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub composite: Option<CompositeSummary>,
}

impl LayerReport {
    pub fn new(id: &str, applied: Applied, composite: Option<&CompositeResult>) -> Self {
        Self {
            id: id.to_string(),
            result: applied.as_str(),
            composite: composite.map(CompositeSummary::from),
        }
    }
}

/// Everything the run produced, written with `--stats`.
#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    pub layers: Vec<LayerReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events_shown: Option<usize>,
    /// Layer ids in draw order as the overlay received them
    pub rendered: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub png: Option<String>,
}
