//! Colorization and image packaging for composite overlays.
//!
//! - Fixed and dynamic (percentile-stretched) color scales
//! - Style files with hex color stops
//! - RGBA bitmaps and PNG export

pub mod bitmap;
pub mod error;
pub mod export;
pub mod gradient;
pub mod style;

pub use bitmap::RgbaBitmap;
pub use error::{RenderError, RenderResult};
pub use gradient::{Color, ColorRamp, ColorScale, RampStop, ScaleMode};
