//! Common test fixtures: regions of interest and UTM tile extents.
//!
//! Tuples are `(west, south, east, north)`; UTM extents are
//! `(min_easting, min_northing, max_easting, max_northing)` in meters.

/// Regions of interest in WGS84 degrees.
pub mod region {
    /// Frankfurt am Main city area
    pub const FRANKFURT: (f64, f64, f64, f64) = (8.47, 50.02, 8.80, 50.23);

    /// Rhine-Main metropolitan area
    pub const RHINE_MAIN: (f64, f64, f64, f64) = (8.0, 49.7, 9.2, 50.4);

    /// Berlin
    pub const BERLIN: (f64, f64, f64, f64) = (13.08, 52.33, 13.77, 52.68);

    /// Germany
    pub const GERMANY: (f64, f64, f64, f64) = (5.8, 47.2, 15.1, 55.1);

    /// Far from every granule fixture
    pub const SOUTH_PACIFIC: (f64, f64, f64, f64) = (-150.0, -40.0, -140.0, -30.0);
}

/// UTM tile extents matching the ECOSTRESS 109.8 km tiling grid.
pub mod utm_tile {
    /// Tile 32UMA (zone 32N) covering Frankfurt
    pub const T32UMA: (f64, f64, f64, f64) = (399_960.0, 5_490_240.0, 509_760.0, 5_600_040.0);

    /// Tile 33UUU (zone 33N) covering Berlin
    pub const T33UUU: (f64, f64, f64, f64) = (300_000.0, 5_790_240.0, 409_800.0, 5_900_040.0);
}

/// Acquisition timestamps for ordering tests (RFC 3339).
pub mod acquisition {
    pub const EARLY: &str = "2024-07-01T10:30:00Z";
    pub const MID: &str = "2024-07-05T11:10:00Z";
    pub const LATE: &str = "2024-07-09T09:45:00Z";
}
