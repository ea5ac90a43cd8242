//! Style files: named color scales with hex color stops.
//!
//! ```json
//! {
//!   "version": "1.0",
//!   "styles": {
//!     "lst": {
//!       "name": "Land surface temperature",
//!       "units": "K",
//!       "stops": [
//!         { "value": 270, "color": "#313695" },
//!         { "value": 330, "color": "#a50026", "label": "hot" }
//!       ]
//!     }
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::{RenderError, RenderResult};
use crate::gradient::{Color, ColorRamp, ColorScale, RampStop};

/// Style configuration loaded from JSON
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StyleConfig {
    pub version: String,
    pub styles: HashMap<String, StyleDefinition>,
}

/// A single style definition
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StyleDefinition {
    pub name: String,
    pub description: Option<String>,
    pub units: Option<String>,
    pub stops: Vec<ColorStop>,
}

/// Color stop for gradient
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ColorStop {
    pub value: f32,
    pub color: String,
    pub label: Option<String>,
}

impl StyleConfig {
    pub fn from_json(json_str: &str) -> RenderResult<Self> {
        Ok(serde_json::from_str(json_str)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> RenderResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_json(&content)?;
        tracing::debug!(path = %path.display(), styles = config.styles.len(), "Loaded style file");
        Ok(config)
    }

    pub fn get_style(&self, name: &str) -> Option<&StyleDefinition> {
        self.styles.get(name)
    }

    /// Fixed color scale for a named style.
    pub fn scale(&self, name: &str) -> RenderResult<ColorScale> {
        let style = self
            .get_style(name)
            .ok_or_else(|| RenderError::StyleNotFound(name.to_string()))?;
        Ok(ColorScale::Fixed(style.to_ramp()?))
    }
}

impl StyleDefinition {
    /// Convert hex stops into an opaque color ramp.
    pub fn to_ramp(&self) -> RenderResult<ColorRamp> {
        let stops = self
            .stops
            .iter()
            .map(|stop| {
                let (r, g, b) = hex_to_rgb(&stop.color)
                    .ok_or_else(|| RenderError::InvalidColor(stop.color.clone()))?;
                Ok(RampStop::new(stop.value, Color::rgb(r, g, b)))
            })
            .collect::<RenderResult<Vec<_>>>()?;
        ColorRamp::new(stops)
    }
}

/// Parse hex color string to RGB
pub fn hex_to_rgb(hex: &str) -> Option<(u8, u8, u8)> {
    let hex = hex.trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }

    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;

    Some((r, g, b))
}
