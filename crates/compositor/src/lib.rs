//! Multi-granule raster compositing.
//!
//! Builds a single colorized overlay from several independently
//! georeferenced, partially overlapping granules:
//!
//! ```text
//! CompositeRequest (region, granules, method)
//!      │
//!      ▼
//! QualityFilter::admit ──► discard: cloud / coverage
//!      │
//!      ▼
//! GranuleReader::read_outcome (oldest first, bounded concurrency)
//!      │
//!      ├─► resolve bounds: declared ─► geographic ─► UTM reprojection
//!      ├─► region → pixel window, clamped to the raster
//!      └─► window read + validity mask ──► discard: fetch / geometry / overlap
//!      │
//!      ▼
//! Pass 1: regional P5/P95 over all valid sample values
//! Pass 2: per-cell pixel stack ─► aggregate (max/mean/median/p90/p95)
//!      │
//!      ▼
//! ColorScale (fixed or P5..P95 dynamic) ─► RGBA bitmap + stats + provenance
//! ```
//!
//! # Example
//!
//! ```ignore
//! use compositor::{Compositor, CompositeRequest, CompositorConfig, HttpCogSource};
//!
//! let source = Arc::new(HttpCogSource::new(config.proxy_url.clone())?);
//! let compositor = Compositor::new(source, config)?;
//! let outcome = compositor.build(&request).await?;
//! if let Some(result) = outcome.into_result() {
//!     // hand result.image and result.bounds to the overlay manager
//! }
//! ```

pub mod aggregate;
pub mod cache;
pub mod cog;
pub mod config;
pub mod epoch;
pub mod error;
pub mod grid;
pub mod orchestrator;
pub mod quality;
pub mod reader;
pub mod source;
pub mod stats;
pub mod types;

// Re-export commonly used types at crate root
pub use aggregate::{aggregate, WeightedValue};
pub use cache::{CachingSource, CompositeCache, CompositeKey};
pub use cog::{decode_geotiff, HttpCogSource, LocalFileSource};
pub use config::CompositorConfig;
pub use epoch::{BuildEpoch, BuildTicket};
pub use error::{CompositeError, Result};
pub use orchestrator::{
    BuildPhase, CompositeOutcome, CompositeRequest, Compositor, NoDataReason, NoDataReport,
};
pub use quality::{DiscardCounts, DiscardReason, QualityFilter};
pub use reader::{GranuleReader, ReadOutcome};
pub use source::{DecodedRaster, InMemorySource, RasterHandle, RasterSource};
pub use stats::{CompositeStats, CoverageConfidence, Provenance, ValueSummary};
pub use types::{
    AggregationMethod, CompositeResult, PercentileMode, PixelWindow, RasterCrs, RasterInfo,
    RasterSample,
};
