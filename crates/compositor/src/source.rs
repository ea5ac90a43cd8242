//! Raster data sources.
//!
//! A [`RasterSource`] opens a granule by URL and returns a [`RasterHandle`]
//! that answers metadata queries and windowed reads. Concrete sources live
//! in [`crate::cog`]; [`InMemorySource`] serves pre-decoded rasters.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::error::{CompositeError, Result};
use crate::types::{PixelWindow, RasterInfo};

/// Opens granules by URL.
#[async_trait]
pub trait RasterSource: Send + Sync {
    async fn open(&self, url: &str) -> Result<Arc<dyn RasterHandle>>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

/// An opened raster.
#[async_trait]
pub trait RasterHandle: Send + Sync {
    fn info(&self) -> &RasterInfo;

    /// Read `window`, resampled (nearest) to `out_width × out_height`.
    ///
    /// Cells that fall outside the raster are set to `fill`.
    async fn read_window(
        &self,
        window: PixelWindow,
        out_width: u32,
        out_height: u32,
        fill: f32,
    ) -> Result<Vec<f32>>;
}

/// A fully decoded single-band raster held in memory.
#[derive(Debug, Clone)]
pub struct DecodedRaster {
    info: RasterInfo,
    data: Vec<f32>,
}

impl DecodedRaster {
    pub fn new(info: RasterInfo, data: Vec<f32>) -> Result<Self> {
        let expected = info.width as usize * info.height as usize;
        if data.len() != expected {
            return Err(CompositeError::decode_failed(format!(
                "raster has {} values, expected {}x{}={}",
                data.len(),
                info.width,
                info.height,
                expected
            )));
        }
        Ok(Self { info, data })
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Nearest-neighbor resample of a window.
    pub fn resample_window(
        &self,
        window: PixelWindow,
        out_width: u32,
        out_height: u32,
        fill: f32,
    ) -> Vec<f32> {
        let (w, h) = (self.info.width as u64, self.info.height as u64);
        let mut out = Vec::with_capacity(out_width as usize * out_height as usize);

        for oy in 0..out_height as u64 {
            // Sample at output cell centers
            let sy = window.y as u64 + ((2 * oy + 1) * window.height as u64) / (2 * out_height as u64);
            for ox in 0..out_width as u64 {
                let sx =
                    window.x as u64 + ((2 * ox + 1) * window.width as u64) / (2 * out_width as u64);
                if sx < w && sy < h {
                    out.push(self.data[(sy * w + sx) as usize]);
                } else {
                    out.push(fill);
                }
            }
        }

        out
    }
}

#[async_trait]
impl RasterHandle for DecodedRaster {
    fn info(&self) -> &RasterInfo {
        &self.info
    }

    async fn read_window(
        &self,
        window: PixelWindow,
        out_width: u32,
        out_height: u32,
        fill: f32,
    ) -> Result<Vec<f32>> {
        if window.is_empty() || out_width == 0 || out_height == 0 {
            return Err(CompositeError::read_failed(format!(
                "empty window {:?} or output {}x{}",
                window, out_width, out_height
            )));
        }
        Ok(self.resample_window(window, out_width, out_height, fill))
    }
}

/// Serves rasters registered under a URL.
#[derive(Default)]
pub struct InMemorySource {
    rasters: RwLock<HashMap<String, Arc<DecodedRaster>>>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: impl Into<String>, raster: DecodedRaster) {
        self.rasters
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(url.into(), Arc::new(raster));
    }

    pub fn len(&self) -> usize {
        self.rasters.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RasterSource for InMemorySource {
    async fn open(&self, url: &str) -> Result<Arc<dyn RasterHandle>> {
        let raster = self
            .rasters
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(url)
            .cloned()
            .ok_or_else(|| CompositeError::open_failed(format!("no raster registered for {}", url)))?;
        Ok(raster)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RasterCrs;
    use atlas_common::BoundingBox;

    fn raster(width: u32, height: u32) -> DecodedRaster {
        let info = RasterInfo {
            width,
            height,
            native_bounds: BoundingBox::new(0.0, 0.0, width as f64, height as f64),
            crs: RasterCrs::Geographic,
            nodata: None,
        };
        let data = (0..width * height).map(|v| v as f32).collect();
        DecodedRaster::new(info, data).unwrap()
    }

    #[test]
    fn test_length_checked() {
        let info = raster(2, 2).info.clone();
        assert!(DecodedRaster::new(info, vec![0.0; 3]).is_err());
    }

    #[test]
    fn test_identity_resample() {
        let r = raster(4, 3);
        let out = r.resample_window(PixelWindow::full(4, 3), 4, 3, f32::NAN);
        assert_eq!(out, r.data());
    }

    #[test]
    fn test_downsample_picks_centers() {
        let r = raster(4, 4);
        let out = r.resample_window(PixelWindow::full(4, 4), 2, 2, f32::NAN);
        // centers of 2x2 blocks land on pixels (1,1), (3,1), (1,3), (3,3)
        assert_eq!(out, vec![5.0, 7.0, 13.0, 15.0]);
    }

    #[test]
    fn test_window_outside_raster_filled() {
        let r = raster(2, 2);
        let out = r.resample_window(PixelWindow::new(1, 1, 2, 2), 2, 2, -1.0);
        assert_eq!(out, vec![3.0, -1.0, -1.0, -1.0]);
    }

    #[tokio::test]
    async fn test_in_memory_source() {
        let source = InMemorySource::new();
        source.insert("mem://a", raster(2, 2));
        assert_eq!(source.len(), 1);

        let handle = source.open("mem://a").await.unwrap();
        assert_eq!(handle.info().width, 2);
        assert!(source.open("mem://missing").await.is_err());
    }
}
