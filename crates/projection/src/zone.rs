//! UTM zone detection for granules.
//!
//! Tried in order: an MGRS tile name embedded in the source URL, the
//! projected CRS EPSG code from the raster metadata, then the caller's
//! default.

use serde::{Deserialize, Serialize};

use crate::utm::UtmZone;

/// Which rule produced a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneSource {
    TileName,
    Epsg,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneDetection {
    pub zone: UtmZone,
    pub source: ZoneSource,
}

/// Resolve the UTM zone of a granule.
pub fn detect_utm_zone(
    source_url: &str,
    projected_cs: Option<u32>,
    default: UtmZone,
) -> ZoneDetection {
    if let Some(zone) = zone_from_tile_name(source_url) {
        return ZoneDetection {
            zone,
            source: ZoneSource::TileName,
        };
    }

    if let Some(zone) = projected_cs.and_then(UtmZone::from_epsg) {
        return ZoneDetection {
            zone,
            source: ZoneSource::Epsg,
        };
    }

    ZoneDetection {
        zone: default,
        source: ZoneSource::Default,
    }
}

/// MGRS latitude bands: C..X without I and O. N and above are northern.
fn is_band_letter(c: u8) -> bool {
    (b'C'..=b'X').contains(&c) && c != b'I' && c != b'O'
}

fn is_boundary(c: Option<&u8>) -> bool {
    match c {
        None => true,
        Some(c) => !c.is_ascii_alphanumeric(),
    }
}

/// Find a tile name such as `32UPU` (or a bare `32U`) in a file name or URL.
///
/// A full MGRS tile (zone, band, two-letter 100 km square) anywhere in the
/// string wins over a bare zone+band token, which must stand alone between
/// separators.
pub fn zone_from_tile_name(name: &str) -> Option<UtmZone> {
    let bytes = name.as_bytes();
    let mut bare = None;

    for i in 0..bytes.len().saturating_sub(2) {
        let (d0, d1, band) = (bytes[i], bytes[i + 1], bytes[i + 2]);
        if !d0.is_ascii_digit() || !d1.is_ascii_digit() || !is_band_letter(band) {
            continue;
        }
        if i > 0 && bytes[i - 1].is_ascii_digit() {
            continue;
        }

        let number = (d0 - b'0') * 10 + (d1 - b'0');
        let Ok(zone) = UtmZone::new(number, band >= b'N') else {
            continue;
        };

        let square = bytes.get(i + 3..i + 5);
        let full_tile = matches!(square, Some([a, b]) if a.is_ascii_uppercase() && b.is_ascii_uppercase())
            && is_boundary(bytes.get(i + 5));
        if full_tile {
            return Some(zone);
        }

        let standalone = (i == 0 || !bytes[i - 1].is_ascii_alphanumeric())
            && is_boundary(bytes.get(i + 3));
        if standalone && bare.is_none() {
            bare = Some(zone);
        }
    }

    bare
}
