//! Color ramps and scales for composite rasters.
//!
//! Two scale families:
//! - fixed scales with calibrated physical breakpoints (Kelvin, °C, mm)
//! - a dynamic scale that stretches the regional P5..P95 range over a
//!   seven-stop hue ramp
//!
//! NaN is the nodata marker and is the only input rendered transparent.

use atlas_common::PhysicalQuantity;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{RenderError, RenderResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Fully opaque color.
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn transparent() -> Self {
        Self { r: 0, g: 0, b: 0, a: 0 }
    }

    pub fn to_array(&self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Linear color interpolation, `t` clamped to [0, 1].
pub fn interpolate_color(color1: Color, color2: Color, t: f32) -> Color {
    let t = t.clamp(0.0, 1.0);
    let t_inv = 1.0 - t;

    Color::new(
        ((color1.r as f32 * t_inv) + (color2.r as f32 * t)).round() as u8,
        ((color1.g as f32 * t_inv) + (color2.g as f32 * t)).round() as u8,
        ((color1.b as f32 * t_inv) + (color2.b as f32 * t)).round() as u8,
        ((color1.a as f32 * t_inv) + (color2.a as f32 * t)).round() as u8,
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RampStop {
    pub value: f32,
    pub color: Color,
}

impl RampStop {
    pub fn new(value: f32, color: Color) -> Self {
        Self { value, color }
    }
}

/// Piecewise-linear color ramp over sorted stops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorRamp {
    stops: Vec<RampStop>,
}

impl ColorRamp {
    /// Build a ramp. Stops are sorted by value; at least two finite stops are required.
    pub fn new(mut stops: Vec<RampStop>) -> RenderResult<Self> {
        if stops.len() < 2 {
            return Err(RenderError::InvalidRamp(format!(
                "need at least 2 stops, got {}",
                stops.len()
            )));
        }
        if stops.iter().any(|s| !s.value.is_finite()) {
            return Err(RenderError::InvalidRamp("stop values must be finite".into()));
        }
        stops.sort_by(|a, b| a.value.total_cmp(&b.value));
        Ok(Self { stops })
    }

    /// Ramp from `(value, [r, g, b])` tuples, all opaque.
    fn from_rgb(stops: &[(f32, [u8; 3])]) -> Self {
        Self {
            stops: stops
                .iter()
                .map(|&(v, [r, g, b])| RampStop::new(v, Color::rgb(r, g, b)))
                .collect(),
        }
    }

    pub fn stops(&self) -> &[RampStop] {
        &self.stops
    }

    pub fn min_value(&self) -> f32 {
        self.stops[0].value
    }

    pub fn max_value(&self) -> f32 {
        self.stops[self.stops.len() - 1].value
    }

    /// Color for a finite value; values beyond the ends take the terminal colors.
    pub fn color_at(&self, value: f32) -> Color {
        let first = self.stops[0];
        let last = self.stops[self.stops.len() - 1];

        if value <= first.value {
            return first.color;
        }
        if value >= last.value {
            return last.color;
        }

        for pair in self.stops.windows(2) {
            let (lo, hi) = (pair[0], pair[1]);
            if value <= hi.value {
                let span = hi.value - lo.value;
                if span <= f32::EPSILON {
                    return hi.color;
                }
                return interpolate_color(lo.color, hi.color, (value - lo.value) / span);
            }
        }

        last.color
    }
}

/// Seven-stop hue ramp over [0, 1]: blue, cyan, green, yellow, orange, red, magenta.
pub fn hue_ramp() -> ColorRamp {
    ColorRamp::from_rgb(&[
        (0.0, [0, 0, 255]),
        (1.0 / 6.0, [0, 255, 255]),
        (2.0 / 6.0, [0, 200, 0]),
        (3.0 / 6.0, [255, 255, 0]),
        (4.0 / 6.0, [255, 165, 0]),
        (5.0 / 6.0, [255, 0, 0]),
        (1.0, [255, 0, 255]),
    ])
}

/// Land-surface temperature in Kelvin, 270 K to 330 K.
pub fn lst_kelvin_ramp() -> ColorRamp {
    ColorRamp::from_rgb(&[
        (270.0, [49, 54, 149]),
        (280.0, [69, 117, 180]),
        (290.0, [116, 173, 209]),
        (295.0, [171, 217, 233]),
        (300.0, [254, 224, 144]),
        (305.0, [253, 174, 97]),
        (310.0, [244, 109, 67]),
        (320.0, [215, 48, 39]),
        (330.0, [165, 0, 38]),
    ])
}

/// 2 m air temperature in °C, -10 °C to 40 °C.
pub fn air_temperature_ramp() -> ColorRamp {
    ColorRamp::from_rgb(&[
        (-10.0, [0, 0, 255]),
        (0.0, [0, 255, 255]),
        (10.0, [0, 255, 0]),
        (20.0, [255, 255, 0]),
        (25.0, [255, 165, 0]),
        (30.0, [255, 0, 0]),
        (35.0, [139, 0, 0]),
        (40.0, [128, 0, 128]),
    ])
}

/// Design precipitation depth in mm, 0 to 150 mm.
pub fn precipitation_ramp() -> ColorRamp {
    ColorRamp::from_rgb(&[
        (0.0, [255, 255, 204]),
        (10.0, [199, 233, 180]),
        (20.0, [127, 205, 187]),
        (30.0, [65, 182, 196]),
        (45.0, [29, 145, 192]),
        (60.0, [34, 94, 168]),
        (90.0, [37, 52, 148]),
        (150.0, [8, 29, 88]),
    ])
}

/// Fixed ramp calibrated for a physical quantity.
pub fn ramp_for(quantity: PhysicalQuantity) -> ColorRamp {
    match quantity {
        PhysicalQuantity::LandSurfaceTemperature => lst_kelvin_ramp(),
        PhysicalQuantity::AirTemperature => air_temperature_ramp(),
        PhysicalQuantity::Precipitation => precipitation_ramp(),
    }
}

/// How a composite picks its color scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleMode {
    /// Calibrated physical breakpoints, comparable across regions.
    Fixed,
    /// Regional P5..P95 stretch, maximizing local contrast.
    Dynamic,
}

impl Default for ScaleMode {
    fn default() -> Self {
        Self::Dynamic
    }
}

impl ScaleMode {
    /// Parse from string (case-insensitive).
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "fixed" | "physical" => Self::Fixed,
            _ => Self::Dynamic,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Dynamic => "dynamic",
        }
    }
}

impl std::fmt::Display for ScaleMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A value-to-color mapping for one composite.
#[derive(Debug, Clone, PartialEq)]
pub enum ColorScale {
    Fixed(ColorRamp),
    Dynamic { p5: f32, p95: f32, ramp: ColorRamp },
}

impl ColorScale {
    pub fn fixed(quantity: PhysicalQuantity) -> Self {
        Self::Fixed(ramp_for(quantity))
    }

    pub fn dynamic(p5: f32, p95: f32) -> Self {
        Self::Dynamic {
            p5,
            p95,
            ramp: hue_ramp(),
        }
    }

    /// Value range spanned by the scale, for legends.
    pub fn range(&self) -> (f32, f32) {
        match self {
            Self::Fixed(ramp) => (ramp.min_value(), ramp.max_value()),
            Self::Dynamic { p5, p95, .. } => (*p5, *p95),
        }
    }

    /// Color for one aggregated value. NaN is transparent; everything else is opaque.
    pub fn color_for(&self, value: f32) -> Color {
        if value.is_nan() {
            return Color::transparent();
        }

        let color = match self {
            Self::Fixed(ramp) => ramp.color_at(value),
            Self::Dynamic { p5, p95, ramp } => {
                let range = p95 - p5;
                // Flat region: everything sits mid-ramp
                let t = if range.abs() <= f32::EPSILON || !range.is_finite() {
                    0.5
                } else {
                    ((value - p5) / range).clamp(0.0, 1.0)
                };
                ramp.color_at(t)
            }
        };

        Color { a: 255, ..color }
    }

    /// Colorize a row-major value grid into RGBA bytes.
    pub fn render(&self, data: &[f32], width: usize, height: usize) -> Vec<u8> {
        render_grid(data, width, height, |v| self.color_for(v))
    }
}

/// Render a value grid as RGBA (4 bytes per pixel), rows in parallel.
///
/// Cells beyond `data.len()` stay transparent.
pub fn render_grid<F>(data: &[f32], width: usize, height: usize, color_fn: F) -> Vec<u8>
where
    F: Fn(f32) -> Color + Sync,
{
    let mut pixels = vec![0u8; width * height * 4];
    if width == 0 {
        return pixels;
    }

    pixels
        .par_chunks_mut(width * 4)
        .enumerate()
        .for_each(|(y, row)| {
            for x in 0..width {
                let idx = y * width + x;
                if let Some(&value) = data.get(idx) {
                    let color = color_fn(value);
                    row[x * 4..x * 4 + 4].copy_from_slice(&color.to_array());
                }
            }
        });

    pixels
}
