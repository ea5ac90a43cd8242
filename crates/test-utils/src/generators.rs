//! Test data generators for synthetic raster granules.
//!
//! These generators create predictable, verifiable patterns that can be
//! used across the test suite. All grids are row-major, top row first.

/// Creates a test grid with predictable values.
///
/// Each cell value is calculated as: `col * 1000 + row`
///
/// # Example
///
/// ```
/// use test_utils::create_test_grid;
///
/// let grid = create_test_grid(10, 5);
/// assert_eq!(grid.len(), 50);
/// assert_eq!(grid[1], 1000.0); // col=1, row=0
/// assert_eq!(grid[10], 1.0);   // col=0, row=1
/// ```
pub fn create_test_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((col * 1000 + row) as f32);
        }
    }
    data
}

/// Creates a land-surface temperature grid in Kelvin.
///
/// Values run from 290 K (top-left) to 320 K (bottom-right), well inside the
/// plausible LST range.
pub fn create_lst_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let x_factor = col as f32 / width.max(1) as f32;
            let y_factor = row as f32 / height.max(1) as f32;
            data.push(290.0 + x_factor * 15.0 + y_factor * 15.0);
        }
    }
    data
}

/// Creates a grid with a radial hotspot: `peak` at the center, decaying to `base` at the corners.
pub fn create_hotspot_grid(width: usize, height: usize, base: f32, peak: f32) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    let center_x = width as f32 / 2.0;
    let center_y = height as f32 / 2.0;
    let max_dist = ((center_x * center_x) + (center_y * center_y)).sqrt().max(1.0);

    for row in 0..height {
        for col in 0..width {
            let dx = col as f32 + 0.5 - center_x;
            let dy = row as f32 + 0.5 - center_y;
            let dist = (dx * dx + dy * dy).sqrt() / max_dist;
            data.push(peak - (peak - base) * dist.min(1.0));
        }
    }
    data
}

/// Creates a grid where every cell has the same value.
pub fn create_constant_grid(width: usize, height: usize, value: f32) -> Vec<f32> {
    vec![value; width * height]
}

/// Replaces every `every`-th cell with `fill` (e.g. NaN, 0.0 or a nodata sentinel).
pub fn punch_holes(mut data: Vec<f32>, every: usize, fill: f32) -> Vec<f32> {
    if every == 0 {
        return data;
    }
    for (i, v) in data.iter_mut().enumerate() {
        if i % every == 0 {
            *v = fill;
        }
    }
    data
}

/// Creates a KOSTRA-like design precipitation grid in mm with -999 nodata
/// along the left column (outside the national border).
pub fn create_precipitation_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            if col == 0 {
                data.push(-999.0);
            } else {
                let y_factor = row as f32 / height.max(1) as f32;
                data.push(20.0 + 40.0 * y_factor + col as f32 * 0.5);
            }
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lst_grid_range() {
        let grid = create_lst_grid(16, 16);
        assert_eq!(grid.len(), 256);
        assert!(grid.iter().all(|&v| (290.0..320.0).contains(&v)));
        assert!(grid[0] < grid[255]);
    }

    #[test]
    fn test_hotspot_peak_in_center() {
        let grid = create_hotspot_grid(9, 9, 300.0, 330.0);
        let center = grid[4 * 9 + 4];
        assert!(grid.iter().all(|&v| v <= center));
        assert!(grid[0] < center);
    }

    #[test]
    fn test_punch_holes() {
        let grid = punch_holes(create_constant_grid(4, 1, 1.0), 2, f32::NAN);
        assert!(grid[0].is_nan());
        assert_eq!(grid[1], 1.0);
        assert!(grid[2].is_nan());
    }

    #[test]
    fn test_precipitation_nodata_column() {
        let grid = create_precipitation_grid(5, 3);
        assert_eq!(grid[0], -999.0);
        assert_eq!(grid[5], -999.0);
        assert!(grid[1] > 0.0);
    }
}
