//! Coordinate reference system transformations.
//!
//! Implements the UTM transverse Mercator series from scratch without
//! external dependencies. Input rasters arrive in UTM; everything downstream
//! works in WGS84 longitude/latitude.

pub mod error;
pub mod utm;
pub mod zone;

pub use error::ProjectionError;
pub use utm::{convert_bounds_to_wgs84, utm_to_wgs84, wgs84_to_utm, UtmZone};
pub use zone::{detect_utm_zone, zone_from_tile_name, ZoneDetection, ZoneSource};
