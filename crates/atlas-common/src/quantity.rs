//! Physical quantities carried by raster layers and their validity rules.

use serde::{Deserialize, Serialize};

/// Open interval of physically plausible values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidityRange {
    pub min: f32,
    pub max: f32,
}

impl ValidityRange {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// True when `value` is finite, not the nodata sentinel, and strictly inside the range.
    pub fn accepts(&self, value: f32, nodata: Option<f32>) -> bool {
        if !value.is_finite() {
            return false;
        }
        if let Some(sentinel) = nodata {
            if value == sentinel {
                return false;
            }
        }
        value > self.min && value < self.max
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhysicalQuantity {
    /// Satellite land-surface temperature in Kelvin (ECOSTRESS, MODIS).
    LandSurfaceTemperature,
    /// Gridded 2 m air temperature in degrees Celsius (DWD).
    AirTemperature,
    /// Precipitation depth in millimetres (KOSTRA design rainfall).
    Precipitation,
}

impl PhysicalQuantity {
    pub fn validity(&self) -> ValidityRange {
        match self {
            // Kelvin values at or below zero are fill values in the LST products
            PhysicalQuantity::LandSurfaceTemperature => ValidityRange::new(200.0, 400.0),
            PhysicalQuantity::AirTemperature => ValidityRange::new(-80.0, 70.0),
            PhysicalQuantity::Precipitation => ValidityRange::new(0.0, 2000.0),
        }
    }

    pub fn units(&self) -> &'static str {
        match self {
            PhysicalQuantity::LandSurfaceTemperature => "K",
            PhysicalQuantity::AirTemperature => "°C",
            PhysicalQuantity::Precipitation => "mm",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PhysicalQuantity::LandSurfaceTemperature => "land_surface_temperature",
            PhysicalQuantity::AirTemperature => "air_temperature",
            PhysicalQuantity::Precipitation => "precipitation",
        }
    }

    /// Parse from string (case-insensitive). Unknown values fall back to LST.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "air_temperature" | "air" | "t2m" => Self::AirTemperature,
            "precipitation" | "precip" | "kostra" => Self::Precipitation,
            _ => Self::LandSurfaceTemperature,
        }
    }
}

impl Default for PhysicalQuantity {
    fn default() -> Self {
        Self::LandSurfaceTemperature
    }
}

impl std::fmt::Display for PhysicalQuantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lst_validity() {
        let range = PhysicalQuantity::LandSurfaceTemperature.validity();
        assert!(range.accepts(300.0, None));
        assert!(!range.accepts(200.0, None));
        assert!(!range.accepts(400.0, None));
        assert!(!range.accepts(0.0, None));
        assert!(!range.accepts(-5.0, None));
        assert!(!range.accepts(f32::NAN, None));
        assert!(!range.accepts(f32::INFINITY, None));
        assert!(!range.accepts(300.0, Some(300.0)));
    }

    #[test]
    fn test_precipitation_nodata() {
        let range = PhysicalQuantity::Precipitation.validity();
        assert!(!range.accepts(-999.0, Some(-999.0)));
        assert!(range.accepts(42.5, Some(-999.0)));
    }

    #[test]
    fn test_from_str() {
        assert_eq!(PhysicalQuantity::from_str("KOSTRA"), PhysicalQuantity::Precipitation);
        assert_eq!(PhysicalQuantity::from_str("t2m"), PhysicalQuantity::AirTemperature);
        assert_eq!(
            PhysicalQuantity::from_str("unknown"),
            PhysicalQuantity::LandSurfaceTemperature
        );
    }
}
