//! Windowed granule reads over a region of interest.

use std::sync::Arc;

use atlas_common::{BoundingBox, GranuleDescriptor, PhysicalQuantity};
use projection::{convert_bounds_to_wgs84, detect_utm_zone, UtmZone};
use tracing::{debug, instrument, warn};

use crate::error::{CompositeError, Result};
use crate::quality::{DiscardReason, QualityFilter};
use crate::source::{RasterHandle, RasterSource};
use crate::types::{PixelWindow, RasterCrs, RasterInfo, RasterSample};

/// What came back from reading one granule.
#[derive(Debug, Clone)]
pub enum ReadOutcome {
    Sample(RasterSample),
    NoOverlap,
    InvalidGeometry(String),
    FetchFailed(String),
}

impl ReadOutcome {
    /// Discard reason for everything but a sample.
    pub fn discard_reason(&self) -> Option<DiscardReason> {
        match self {
            Self::Sample(_) => None,
            Self::NoOverlap => Some(DiscardReason::NoOverlap),
            Self::InvalidGeometry(_) => Some(DiscardReason::InvalidGeometry),
            Self::FetchFailed(_) => Some(DiscardReason::FetchFailed),
        }
    }

    pub fn into_sample(self) -> Option<RasterSample> {
        match self {
            Self::Sample(sample) => Some(sample),
            _ => None,
        }
    }
}

/// Reads the part of a granule that covers a region.
#[derive(Clone)]
pub struct GranuleReader {
    source: Arc<dyn RasterSource>,
    window_size: u32,
    default_zone: UtmZone,
    quantity: PhysicalQuantity,
}

impl GranuleReader {
    pub fn new(
        source: Arc<dyn RasterSource>,
        window_size: u32,
        default_zone: UtmZone,
        quantity: PhysicalQuantity,
    ) -> Self {
        Self {
            source,
            window_size: window_size.max(1),
            default_zone,
            quantity,
        }
    }

    /// Read a granule's window over `region`, or `None` when it contributes nothing.
    pub async fn read_window(
        &self,
        granule: &GranuleDescriptor,
        region: &BoundingBox,
    ) -> Option<RasterSample> {
        self.read_outcome(granule, region).await.into_sample()
    }

    /// Like [`read_window`](Self::read_window) but reports why nothing came back.
    ///
    /// Errors never propagate: a failing granule is logged and reported.
    #[instrument(skip(self, granule, region), fields(granule = %granule.id, source = self.source.name()))]
    pub async fn read_outcome(&self, granule: &GranuleDescriptor, region: &BoundingBox) -> ReadOutcome {
        let handle = match self.source.open(&granule.source_url).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!(granule = %granule.id, error = %e, "Failed to open granule");
                return ReadOutcome::FetchFailed(e.to_string());
            }
        };

        let bounds = match self.resolve_bounds(granule, handle.info()) {
            Ok(bounds) => bounds,
            Err(e) => {
                warn!(granule = %granule.id, error = %e, "Dropping granule with unusable geometry");
                return ReadOutcome::InvalidGeometry(e.to_string());
            }
        };

        let info = handle.info();
        let Some((window, window_bounds)) = region_window(&bounds, region, info.width, info.height)
        else {
            debug!(granule = %granule.id, ?bounds, "Granule does not overlap region");
            return ReadOutcome::NoOverlap;
        };

        match self.read_masked(handle.as_ref(), window).await {
            Ok(data) => {
                let sample = RasterSample {
                    granule_id: granule.id.clone(),
                    acquisition_time: granule.acquisition_time,
                    data,
                    width: self.window_size as usize,
                    height: self.window_size as usize,
                    bounds: window_bounds,
                    weight: QualityFilter::weight(granule),
                };
                debug!(
                    granule = %granule.id,
                    x = window.x,
                    y = window.y,
                    width = window.width,
                    height = window.height,
                    valid = sample.valid_count(),
                    "Read granule window"
                );
                ReadOutcome::Sample(sample)
            }
            Err(e) => {
                warn!(granule = %granule.id, error = %e, "Failed to read granule window");
                ReadOutcome::FetchFailed(e.to_string())
            }
        }
    }

    /// WGS84 bounds of the full raster.
    ///
    /// Declared bounds win, then geographic metadata, then UTM reprojection
    /// with zone detection.
    pub fn resolve_bounds(&self, granule: &GranuleDescriptor, info: &RasterInfo) -> Result<BoundingBox> {
        if let Some(declared) = granule.declared_bounds {
            if !declared.is_valid_wgs84() {
                return Err(CompositeError::invalid_geometry(format!(
                    "declared bounds {:?} are not valid WGS84",
                    declared
                )));
            }
            return Ok(declared);
        }

        if info.crs == RasterCrs::Geographic {
            if !info.native_bounds.is_valid_wgs84() {
                return Err(CompositeError::invalid_geometry(format!(
                    "geographic bounds {:?} out of range",
                    info.native_bounds
                )));
            }
            return Ok(info.native_bounds);
        }

        let detection = detect_utm_zone(
            &granule.source_url,
            info.crs.projected_epsg(),
            self.default_zone,
        );
        debug!(granule = %granule.id, zone = %detection.zone, source = ?detection.source, "Resolved UTM zone");

        let bounds = convert_bounds_to_wgs84(&info.native_bounds, detection.zone)?;
        if !bounds.is_valid_wgs84() {
            return Err(CompositeError::invalid_geometry(format!(
                "reprojected bounds {:?} are not valid WGS84",
                bounds
            )));
        }
        Ok(bounds)
    }

    async fn read_masked(&self, handle: &dyn RasterHandle, window: PixelWindow) -> Result<Vec<f32>> {
        let mut data = handle
            .read_window(window, self.window_size, self.window_size, f32::NAN)
            .await?;

        let validity = self.quantity.validity();
        let nodata = handle.info().nodata.map(|v| v as f32);
        for value in data.iter_mut() {
            if !validity.accepts(*value, nodata) {
                *value = f32::NAN;
            }
        }
        Ok(data)
    }
}

/// Map a WGS84 region onto a raster's pixel grid.
///
/// The window is floored/ceiled outward, clamped to the raster extent, and
/// returned together with the WGS84 bounds it actually covers. `None` when
/// nothing is left after clamping.
pub fn region_window(
    bounds: &BoundingBox,
    region: &BoundingBox,
    width: u32,
    height: u32,
) -> Option<(PixelWindow, BoundingBox)> {
    if width == 0 || height == 0 || !bounds.is_well_formed() || !bounds.intersects(region) {
        return None;
    }

    let px_w = bounds.width() / width as f64;
    let px_h = bounds.height() / height as f64;

    let clamp_x = |v: f64| v.clamp(0.0, width as f64);
    let clamp_y = |v: f64| v.clamp(0.0, height as f64);

    let x0 = clamp_x(((region.min_x - bounds.min_x) / px_w).floor());
    let x1 = clamp_x(((region.max_x - bounds.min_x) / px_w).ceil());
    let y0 = clamp_y(((bounds.max_y - region.max_y) / px_h).floor());
    let y1 = clamp_y(((bounds.max_y - region.min_y) / px_h).ceil());

    if x1 <= x0 || y1 <= y0 || !(x0.is_finite() && y0.is_finite() && x1.is_finite() && y1.is_finite()) {
        return None;
    }

    let window = PixelWindow::new(x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32);
    let window_bounds = BoundingBox::new(
        bounds.min_x + x0 * px_w,
        bounds.max_y - y1 * px_h,
        bounds.min_x + x1 * px_w,
        bounds.max_y - y0 * px_h,
    );
    Some((window, window_bounds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_inside_raster() {
        let bounds = BoundingBox::new(0.0, 0.0, 16.0, 16.0);
        let region = BoundingBox::new(2.5, 2.5, 5.5, 7.0);
        let (window, wb) = region_window(&bounds, &region, 64, 64).unwrap();
        assert_eq!(window, PixelWindow::new(10, 36, 12, 18));
        assert_eq!(wb, region);
    }

    #[test]
    fn test_region_clamped() {
        let bounds = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let region = BoundingBox::new(-5.0, 5.0, 5.0, 15.0);
        let (window, wb) = region_window(&bounds, &region, 10, 10).unwrap();
        assert_eq!(window, PixelWindow::new(0, 0, 5, 5));
        assert_eq!(wb, BoundingBox::new(0.0, 5.0, 5.0, 10.0));
    }

    #[test]
    fn test_disjoint_region() {
        let bounds = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let region = BoundingBox::new(20.0, 20.0, 30.0, 30.0);
        assert!(region_window(&bounds, &region, 10, 10).is_none());
    }
}
