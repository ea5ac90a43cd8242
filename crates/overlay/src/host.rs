//! Host map and graphics context seams.
//!
//! The overlay manager never talks to a map library directly. A host
//! exposes its identity, a style-loaded readiness signal and its viewport,
//! and hands out overlay contexts. Keeping the render surface aligned with
//! the container is the host's job.

use renderer::RgbaBitmap;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::layer::RenderLayer;

/// Identity of a live map instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostId(pub u64);

impl std::fmt::Display for HostId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "host-{}", self.0)
    }
}

/// Handle to an uploaded bitmap texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextureId(pub u64);

/// Container size in CSS pixels plus the device pixel ratio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub css_width: u32,
    pub css_height: u32,
    pub device_pixel_ratio: f64,
}

impl Viewport {
    pub fn new(css_width: u32, css_height: u32, device_pixel_ratio: f64) -> Self {
        Self {
            css_width,
            css_height,
            device_pixel_ratio,
        }
    }

    /// Drawing-buffer size in physical pixels.
    pub fn physical_size(&self) -> (u32, u32) {
        let dpr = if self.device_pixel_ratio.is_finite() && self.device_pixel_ratio > 0.0 {
            self.device_pixel_ratio
        } else {
            1.0
        };
        (
            (self.css_width as f64 * dpr).round() as u32,
            (self.css_height as f64 * dpr).round() as u32,
        )
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(800, 600, 1.0)
    }
}

/// A live interactive map.
pub trait HostMap {
    fn id(&self) -> HostId;

    /// True once the basemap style has finished loading.
    fn is_style_loaded(&self) -> bool;

    fn viewport(&self) -> Viewport;

    /// Create a graphics overlay bound to this map.
    fn create_overlay(&self) -> Result<Box<dyn OverlayContext>>;
}

/// A graphics overlay bound to one host.
pub trait OverlayContext: Send {
    /// Replace the full layer list in one call.
    fn set_layers(&mut self, layers: &[RenderLayer]) -> Result<()>;

    fn upload_bitmap(&mut self, bitmap: &RgbaBitmap) -> Result<TextureId>;

    fn release_texture(&mut self, texture: TextureId);

    fn resize(&mut self, viewport: Viewport);

    /// Tear down the context and every GPU resource it still holds.
    fn finalize(&mut self);
}
