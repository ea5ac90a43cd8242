//! Layer records and the renderable primitives built from them.

use std::sync::Arc;

use atlas_common::BoundingBox;
use renderer::{Color, RgbaBitmap};
use serde::{Deserialize, Serialize};

use crate::host::TextureId;

/// One point of a point layer, styled up front.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointFeature {
    pub lon: f64,
    pub lat: f64,
    /// Radius in meters on the ground
    pub radius_m: f32,
    pub color: Color,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// A vector tile source referenced by URL (e.g. `pmtiles://…`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorTileSource {
    pub url: String,
    pub source_layer: String,
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub fill_color: Color,
}

/// What a layer draws.
#[derive(Debug, Clone)]
pub enum LayerContent {
    /// A composite bitmap stretched over WGS84 bounds.
    Bitmap {
        image: Arc<RgbaBitmap>,
        bounds: BoundingBox,
    },
    Points(Arc<Vec<PointFeature>>),
    VectorTiles(VectorTileSource),
}

impl LayerContent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bitmap { .. } => "bitmap",
            Self::Points(_) => "points",
            Self::VectorTiles(_) => "vector_tiles",
        }
    }
}

/// The manager's record for one layer id.
#[derive(Debug, Clone)]
pub struct LayerState {
    pub id: String,
    pub visible: bool,
    /// Clamped to [0, 1] when rendered
    pub opacity: f32,
    pub content: LayerContent,
}

impl LayerState {
    /// Visible layer at full opacity.
    pub fn new(id: impl Into<String>, content: LayerContent) -> Self {
        Self {
            id: id.into(),
            visible: true,
            opacity: 1.0,
            content,
        }
    }

    pub fn bitmap(id: impl Into<String>, image: Arc<RgbaBitmap>, bounds: BoundingBox) -> Self {
        Self::new(id, LayerContent::Bitmap { image, bounds })
    }

    pub fn points(id: impl Into<String>, features: Vec<PointFeature>) -> Self {
        Self::new(id, LayerContent::Points(Arc::new(features)))
    }

    pub fn vector_tiles(id: impl Into<String>, source: VectorTileSource) -> Self {
        Self::new(id, LayerContent::VectorTiles(source))
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub(crate) fn effective_opacity(&self) -> f32 {
        if self.opacity.is_nan() {
            1.0
        } else {
            self.opacity.clamp(0.0, 1.0)
        }
    }
}

/// A primitive handed to the overlay context.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderLayer {
    Bitmap {
        id: String,
        texture: TextureId,
        bounds: BoundingBox,
        opacity: f32,
    },
    Points {
        id: String,
        features: Arc<Vec<PointFeature>>,
        opacity: f32,
    },
    VectorTiles {
        id: String,
        source: VectorTileSource,
        opacity: f32,
    },
}

impl RenderLayer {
    pub fn id(&self) -> &str {
        match self {
            Self::Bitmap { id, .. } | Self::Points { id, .. } | Self::VectorTiles { id, .. } => id,
        }
    }

    pub fn opacity(&self) -> f32 {
        match self {
            Self::Bitmap { opacity, .. }
            | Self::Points { opacity, .. }
            | Self::VectorTiles { opacity, .. } => *opacity,
        }
    }
}
