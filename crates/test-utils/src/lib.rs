//! Shared test utilities for the heat atlas workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Synthetic raster generators (LST gradients, hotspots, nodata holes)
//! - Region and tile fixtures
//! - An in-memory GeoTIFF writer for decoder tests
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```

pub mod fixtures;
pub mod generators;
pub mod geotiff;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;
pub use geotiff::*;
