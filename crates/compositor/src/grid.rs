//! Output grid geometry.

use atlas_common::BoundingBox;

/// Meters per degree of latitude (mean)
const METERS_PER_DEGREE: f64 = 111_320.0;

/// Regular lon/lat grid the composite is aggregated on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputGrid {
    pub bounds: BoundingBox,
    pub width: usize,
    pub height: usize,
}

impl OutputGrid {
    /// Grid over `bounds` at roughly `resolution_m` per cell.
    ///
    /// The longer side is capped at `max_dim`; the aspect ratio follows the
    /// ground extent of the bounds. Each side is at least one cell.
    pub fn for_bounds(bounds: BoundingBox, resolution_m: f64, max_dim: u32) -> Self {
        let (_, center_lat) = bounds.center();
        let cos_lat = center_lat.to_radians().cos().max(0.01);
        let ground_w = bounds.width() * METERS_PER_DEGREE * cos_lat;
        let ground_h = bounds.height() * METERS_PER_DEGREE;

        let mut cols = (ground_w / resolution_m).ceil().max(1.0);
        let mut rows = (ground_h / resolution_m).ceil().max(1.0);

        let max_dim = max_dim.max(1) as f64;
        let longest = cols.max(rows);
        if longest > max_dim {
            let scale = max_dim / longest;
            cols = (cols * scale).round().clamp(1.0, max_dim);
            rows = (rows * scale).round().clamp(1.0, max_dim);
        }

        Self {
            bounds,
            width: cols as usize,
            height: rows as usize,
        }
    }

    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// WGS84 position of a cell center. Row 0 is the northern edge.
    pub fn cell_center(&self, col: usize, row: usize) -> (f64, f64) {
        let lon = self.bounds.min_x + (col as f64 + 0.5) * self.bounds.width() / self.width as f64;
        let lat = self.bounds.max_y - (row as f64 + 0.5) * self.bounds.height() / self.height as f64;
        (lon, lat)
    }
}
