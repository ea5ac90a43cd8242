//! Universal Transverse Mercator on the WGS84 ellipsoid.
//!
//! The inverse uses the footpoint latitude from the rectifying-latitude
//! series (terms up to sin 8μ) followed by the latitude and longitude
//! correction series up to the sixth and fifth power of the normalized
//! easting. The forward series mirrors it and is accurate to millimetres
//! inside a zone.

use std::f64::consts::PI;

use atlas_common::BoundingBox;
use serde::{Deserialize, Serialize};

use crate::error::ProjectionError;

/// WGS84 semi-major axis (meters)
const WGS84_A: f64 = 6_378_137.0;
/// WGS84 flattening
const WGS84_F: f64 = 1.0 / 298.257_223_563;
/// UTM central scale factor
const K0: f64 = 0.9996;
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// A UTM zone: number 1-60 plus hemisphere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UtmZone {
    number: u8,
    north: bool,
}

impl UtmZone {
    pub fn new(number: u8, north: bool) -> Result<Self, ProjectionError> {
        if !(1..=60).contains(&number) {
            return Err(ProjectionError::InvalidZone(number));
        }
        Ok(Self { number, north })
    }

    /// Zone from a WGS84 / UTM EPSG code (32601-32660 north, 32701-32760 south).
    pub fn from_epsg(code: u32) -> Option<Self> {
        match code {
            32601..=32660 => Some(Self {
                number: (code - 32600) as u8,
                north: true,
            }),
            32701..=32760 => Some(Self {
                number: (code - 32700) as u8,
                north: false,
            }),
            _ => None,
        }
    }

    /// Standard zone containing a WGS84 position (no Norway/Svalbard exceptions).
    pub fn containing(lon: f64, lat: f64) -> Self {
        let lon = ((lon + 180.0).rem_euclid(360.0)) - 180.0;
        let number = (((lon + 180.0) / 6.0).floor() as i64 + 1).clamp(1, 60) as u8;
        Self {
            number,
            north: lat >= 0.0,
        }
    }

    /// Parse "32N", "33S", "32" (north assumed).
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_uppercase();
        let (digits, north) = match s.chars().last()? {
            'N' => (&s[..s.len() - 1], true),
            'S' => (&s[..s.len() - 1], false),
            _ => (s.as_str(), true),
        };
        let number: u8 = digits.parse().ok()?;
        Self::new(number, north).ok()
    }

    pub fn number(&self) -> u8 {
        self.number
    }

    pub fn is_north(&self) -> bool {
        self.north
    }

    /// Central meridian in degrees.
    pub fn central_meridian(&self) -> f64 {
        (self.number as f64 - 1.0) * 6.0 - 180.0 + 3.0
    }

    pub fn epsg(&self) -> u32 {
        if self.north {
            32600 + self.number as u32
        } else {
            32700 + self.number as u32
        }
    }

    /// Inverse projection: easting/northing in meters to (lon, lat) in degrees.
    pub fn to_wgs84(&self, easting: f64, northing: f64) -> (f64, f64) {
        utm_to_wgs84(easting, northing, *self)
    }

    /// Forward projection: (lon, lat) in degrees to easting/northing in meters.
    pub fn from_wgs84(&self, lon: f64, lat: f64) -> (f64, f64) {
        wgs84_to_utm(lon, lat, *self)
    }
}

impl std::fmt::Display for UtmZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.number, if self.north { 'N' } else { 'S' })
    }
}

/// Ellipsoid-derived constants shared by the forward and inverse series.
struct Ellipsoid {
    e2: f64,
    ep2: f64,
}

impl Ellipsoid {
    fn wgs84() -> Self {
        let e2 = WGS84_F * (2.0 - WGS84_F);
        Self {
            e2,
            ep2: e2 / (1.0 - e2),
        }
    }

    /// Meridional arc length from the equator to latitude `phi` (radians).
    fn meridian_arc(&self, phi: f64) -> f64 {
        let e2 = self.e2;
        let e4 = e2 * e2;
        let e6 = e4 * e2;
        WGS84_A
            * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
                - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
                + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
                - (35.0 * e6 / 3072.0) * (6.0 * phi).sin())
    }

    /// Footpoint latitude for a meridional distance `m`.
    fn footpoint_latitude(&self, m: f64) -> f64 {
        let e2 = self.e2;
        let e4 = e2 * e2;
        let e6 = e4 * e2;
        let mu = m / (WGS84_A * (1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));

        let sqrt_1me2 = (1.0 - e2).sqrt();
        let e1 = (1.0 - sqrt_1me2) / (1.0 + sqrt_1me2);
        let e1_2 = e1 * e1;
        let e1_3 = e1_2 * e1;
        let e1_4 = e1_3 * e1;

        mu + (3.0 * e1 / 2.0 - 27.0 * e1_3 / 32.0) * (2.0 * mu).sin()
            + (21.0 * e1_2 / 16.0 - 55.0 * e1_4 / 32.0) * (4.0 * mu).sin()
            + (151.0 * e1_3 / 96.0) * (6.0 * mu).sin()
            + (1097.0 * e1_4 / 512.0) * (8.0 * mu).sin()
    }
}

/// Convert UTM easting/northing (meters) to WGS84 (lon, lat) in degrees.
pub fn utm_to_wgs84(easting: f64, northing: f64, zone: UtmZone) -> (f64, f64) {
    let ellipsoid = Ellipsoid::wgs84();
    let (e2, ep2) = (ellipsoid.e2, ellipsoid.ep2);

    let x = easting - FALSE_EASTING;
    let y = if zone.north {
        northing
    } else {
        northing - FALSE_NORTHING_SOUTH
    };

    let phi1 = ellipsoid.footpoint_latitude(y / K0);
    let sin1 = phi1.sin();
    let cos1 = phi1.cos();
    let tan1 = phi1.tan();

    let c1 = ep2 * cos1 * cos1;
    let t1 = tan1 * tan1;
    let w = 1.0 - e2 * sin1 * sin1;
    let n1 = WGS84_A / w.sqrt();
    let r1 = WGS84_A * (1.0 - e2) / (w * w.sqrt());
    let d = x / (n1 * K0);

    let d2 = d * d;
    let d3 = d2 * d;
    let d4 = d3 * d;
    let d5 = d4 * d;
    let d6 = d5 * d;

    let lat = phi1
        - (n1 * tan1 / r1)
            * (d2 / 2.0 - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d4 / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * ep2 - 3.0 * c1 * c1)
                    * d6
                    / 720.0);

    let lon_offset = (d - (1.0 + 2.0 * t1 + c1) * d3 / 6.0
        + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1) * d5 / 120.0)
        / cos1;

    let lon = zone.central_meridian() + lon_offset * 180.0 / PI;
    (lon, lat * 180.0 / PI)
}

/// Convert WGS84 (lon, lat) in degrees to UTM easting/northing (meters) in `zone`.
pub fn wgs84_to_utm(lon: f64, lat: f64, zone: UtmZone) -> (f64, f64) {
    let ellipsoid = Ellipsoid::wgs84();
    let (e2, ep2) = (ellipsoid.e2, ellipsoid.ep2);

    let phi = lat.to_radians();
    let lam = (lon - zone.central_meridian()).to_radians();

    let sin = phi.sin();
    let cos = phi.cos();
    let tan = phi.tan();

    let n = WGS84_A / (1.0 - e2 * sin * sin).sqrt();
    let t = tan * tan;
    let c = ep2 * cos * cos;
    let a = lam * cos;
    let m = ellipsoid.meridian_arc(phi);

    let a2 = a * a;
    let a3 = a2 * a;
    let a4 = a3 * a;
    let a5 = a4 * a;
    let a6 = a5 * a;

    let x = K0
        * n
        * (a + (1.0 - t + c) * a3 / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a5 / 120.0);

    let y = K0
        * (m + n
            * tan
            * (a2 / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c * c) * a4 / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a6 / 720.0));

    let easting = x + FALSE_EASTING;
    let northing = if zone.north {
        y
    } else {
        y + FALSE_NORTHING_SOUTH
    };
    (easting, northing)
}

/// Reproject a UTM bounding box to WGS84.
///
/// All four corners are transformed and their axis-aligned envelope is
/// returned. Fails when any corner lands outside the WGS84 range, in which
/// case the raster must be dropped.
pub fn convert_bounds_to_wgs84(
    bounds: &BoundingBox,
    zone: UtmZone,
) -> Result<BoundingBox, ProjectionError> {
    let corners = [
        (bounds.min_x, bounds.min_y),
        (bounds.min_x, bounds.max_y),
        (bounds.max_x, bounds.min_y),
        (bounds.max_x, bounds.max_y),
    ];

    let mut transformed = Vec::with_capacity(corners.len());
    for (x, y) in corners {
        if !x.is_finite() || !y.is_finite() {
            return Err(ProjectionError::NonFinite { x, y });
        }
        let (lon, lat) = utm_to_wgs84(x, y, zone);
        if !lon.is_finite() || !lat.is_finite() || lon.abs() > 180.0 || lat.abs() > 90.0 {
            return Err(ProjectionError::OutOfRange { lon, lat });
        }
        transformed.push((lon, lat));
    }

    BoundingBox::from_points(transformed).ok_or(ProjectionError::NonFinite {
        x: bounds.min_x,
        y: bounds.min_y,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_constants() {
        let zone = UtmZone::new(32, true).unwrap();
        assert_eq!(zone.central_meridian(), 9.0);
        assert_eq!(zone.epsg(), 32632);
        assert_eq!(zone.to_string(), "32N");

        assert!(UtmZone::new(0, true).is_err());
        assert!(UtmZone::new(61, true).is_err());
    }

    #[test]
    fn test_from_epsg() {
        assert_eq!(UtmZone::from_epsg(32633), UtmZone::new(33, true).ok());
        assert_eq!(UtmZone::from_epsg(32756), UtmZone::new(56, false).ok());
        assert_eq!(UtmZone::from_epsg(4326), None);
        assert_eq!(UtmZone::from_epsg(32661), None);
    }

    #[test]
    fn test_central_meridian_maps_to_false_easting() {
        let zone = UtmZone::new(32, true).unwrap();
        let (e, n) = wgs84_to_utm(9.0, 0.0, zone);
        assert!((e - 500_000.0).abs() < 1e-6);
        assert!(n.abs() < 1e-6);

        let (lon, lat) = utm_to_wgs84(500_000.0, 0.0, zone);
        assert!((lon - 9.0).abs() < 1e-9);
        assert!(lat.abs() < 1e-9);
    }

    #[test]
    fn test_known_point_frankfurt() {
        // Frankfurt am Main, 8.6821E 50.1109N in zone 32N
        let zone = UtmZone::new(32, true).unwrap();
        let (e, n) = wgs84_to_utm(8.6821, 50.1109, zone);
        assert!((e - 477_277.0).abs() < 150.0, "easting {}", e);
        assert!((n - 5_551_009.0).abs() < 150.0, "northing {}", n);
    }

    #[test]
    fn test_parse_zone() {
        assert_eq!(UtmZone::parse("32N"), UtmZone::new(32, true).ok());
        assert_eq!(UtmZone::parse("19s"), UtmZone::new(19, false).ok());
        assert_eq!(UtmZone::parse("33"), UtmZone::new(33, true).ok());
        assert_eq!(UtmZone::parse("99N"), None);
        assert_eq!(UtmZone::parse(""), None);
    }

    #[test]
    fn test_containing_zone() {
        assert_eq!(UtmZone::containing(8.68, 50.11).number(), 32);
        assert_eq!(UtmZone::containing(13.4, 52.5).number(), 33);
        assert_eq!(UtmZone::containing(-180.0, 0.0).number(), 1);
        assert_eq!(UtmZone::containing(179.99, 0.0).number(), 60);
        assert!(!UtmZone::containing(151.2, -33.9).is_north());
    }
}
