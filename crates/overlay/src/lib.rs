//! Map overlay management.
//!
//! One persistent graphics overlay per map, driven by an ordered list of
//! layer records:
//!
//! ```text
//! set_layer / remove_layer
//!      │
//!      ▼
//! Vec<LayerState> ──filter visible──► Vec<RenderLayer> ──► OverlayContext::set_layers
//! ```

pub mod error;
pub mod headless;
pub mod host;
pub mod layer;
pub mod manager;

pub use error::{OverlayError, Result};
pub use headless::{HeadlessHost, HeadlessLog, HeadlessOverlay};
pub use host::{HostId, HostMap, OverlayContext, TextureId, Viewport};
pub use layer::{LayerContent, LayerState, PointFeature, RenderLayer, VectorTileSource};
pub use manager::OverlayManager;
