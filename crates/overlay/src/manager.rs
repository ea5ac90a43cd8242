//! The single overlay instance bound to the map.
//!
//! `OverlayManager` owns at most one overlay context and an insertion-ordered
//! list of [`LayerState`] records. Every mutation rebuilds the full render
//! list from that list and hands it to the context in a single
//! `set_layers` call; the context never receives incremental patches.
//!
//! Bitmap layers are uploaded once per image (`Arc` identity) and their
//! textures are released when the layer is replaced, removed, or the
//! context is torn down.

use std::collections::HashMap;
use std::sync::Arc;

use renderer::RgbaBitmap;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::host::{HostId, HostMap, OverlayContext, TextureId, Viewport};
use crate::layer::{LayerContent, LayerState, RenderLayer};

struct UploadedTexture {
    image: Arc<RgbaBitmap>,
    texture: TextureId,
}

#[derive(Default)]
pub struct OverlayManager {
    host: Option<HostId>,
    context: Option<Box<dyn OverlayContext>>,
    layers: Vec<LayerState>,
    textures: HashMap<String, UploadedTexture>,
    rendered: Vec<RenderLayer>,
}

impl OverlayManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind to `host`.
    ///
    /// A new context is created only when none exists for this host or
    /// `force_reinit` is set. Switching to a different host clears the layer
    /// list; re-attaching to the same host keeps it and reapplies it to the
    /// new context.
    pub fn attach(&mut self, host: &dyn HostMap, force_reinit: bool) -> Result<()> {
        let host_id = host.id();
        let same_host = self.host == Some(host_id);

        if same_host && self.context.is_some() && !force_reinit {
            debug!(host = %host_id, "Overlay already attached");
            self.resize(host.viewport());
            return Ok(());
        }

        if !host.is_style_loaded() {
            warn!(host = %host_id, "Map style not loaded yet; attach ignored");
            return Ok(());
        }

        self.teardown_context();
        if !same_host && !self.layers.is_empty() {
            info!(
                host = %host_id,
                dropped = self.layers.len(),
                "Attaching to a different map; clearing layers"
            );
            self.layers.clear();
        }

        let mut context = host.create_overlay()?;
        context.resize(host.viewport());
        self.context = Some(context);
        self.host = Some(host_id);
        info!(host = %host_id, layers = self.layers.len(), force_reinit, "Overlay attached");

        self.rebuild();
        Ok(())
    }

    /// Insert or replace a layer by id, then rebuild.
    pub fn set_layer(&mut self, state: LayerState) {
        if self.context.is_none() {
            warn!(layer = %state.id, "Overlay not attached; set_layer ignored");
            return;
        }

        // The texture survives only a replacement with the same image
        let release = match (&state.content, self.textures.get(&state.id)) {
            (LayerContent::Bitmap { image, .. }, Some(uploaded)) => {
                !Arc::ptr_eq(image, &uploaded.image)
            }
            (_, Some(_)) => true,
            (_, None) => false,
        };
        if release {
            self.release_texture_for(&state.id);
        }

        match self.layers.iter_mut().find(|l| l.id == state.id) {
            Some(existing) => *existing = state,
            None => self.layers.push(state),
        }
        self.rebuild();
    }

    /// Remove a layer by id, then rebuild.
    pub fn remove_layer(&mut self, id: &str) {
        if self.context.is_none() {
            warn!(layer = %id, "Overlay not attached; remove_layer ignored");
            return;
        }

        let before = self.layers.len();
        self.layers.retain(|l| l.id != id);
        if self.layers.len() == before {
            debug!(layer = %id, "No such layer");
        }
        self.release_texture_for(id);
        self.rebuild();
    }

    /// Clear the render list, release the context and forget every layer.
    pub fn detach(&mut self) {
        if let Some(host) = self.host {
            info!(host = %host, "Overlay detached");
        }
        self.teardown_context();
        self.layers.clear();
        self.host = None;
    }

    /// Keep the drawing buffer aligned with the host container.
    pub fn resize(&mut self, viewport: Viewport) {
        if let Some(context) = self.context.as_mut() {
            context.resize(viewport);
        }
    }

    /// The render list from the latest rebuild.
    pub fn rendered_layers(&self) -> &[RenderLayer] {
        &self.rendered
    }

    pub fn layer(&self, id: &str) -> Option<&LayerState> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn layer_ids(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.id.as_str()).collect()
    }

    pub fn is_attached(&self) -> bool {
        self.context.is_some()
    }

    pub fn host(&self) -> Option<HostId> {
        self.host
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    fn rebuild(&mut self) {
        let Some(context) = self.context.as_mut() else {
            return;
        };

        let mut rendered = Vec::with_capacity(self.layers.len());
        for layer in self.layers.iter().filter(|l| l.visible) {
            let opacity = layer.effective_opacity();
            match &layer.content {
                LayerContent::Bitmap { image, bounds } => {
                    match ensure_texture(&mut **context, &mut self.textures, &layer.id, image) {
                        Ok(texture) => rendered.push(RenderLayer::Bitmap {
                            id: layer.id.clone(),
                            texture,
                            bounds: *bounds,
                            opacity,
                        }),
                        // The layer stays in the list; the next rebuild uploads again
                        Err(e) => warn!(layer = %layer.id, error = %e, "Bitmap upload failed; layer skipped"),
                    }
                }
                LayerContent::Points(features) => rendered.push(RenderLayer::Points {
                    id: layer.id.clone(),
                    features: features.clone(),
                    opacity,
                }),
                LayerContent::VectorTiles(source) => rendered.push(RenderLayer::VectorTiles {
                    id: layer.id.clone(),
                    source: source.clone(),
                    opacity,
                }),
            }
        }

        if let Err(e) = context.set_layers(&rendered) {
            warn!(error = %e, "Overlay rejected layer list");
        }
        debug!(rendered = rendered.len(), total = self.layers.len(), "Overlay rebuilt");
        metrics::counter!("overlay_rebuilds_total").increment(1);
        self.rendered = rendered;
    }

    fn release_texture_for(&mut self, id: &str) {
        if let Some(uploaded) = self.textures.remove(id) {
            if let Some(context) = self.context.as_mut() {
                context.release_texture(uploaded.texture);
            }
        }
    }

    fn teardown_context(&mut self) {
        if let Some(mut context) = self.context.take() {
            if let Err(e) = context.set_layers(&[]) {
                warn!(error = %e, "Failed to clear overlay layers");
            }
            for (_, uploaded) in self.textures.drain() {
                context.release_texture(uploaded.texture);
            }
            context.finalize();
        }
        self.textures.clear();
        self.rendered.clear();
    }
}

impl Drop for OverlayManager {
    fn drop(&mut self) {
        self.teardown_context();
    }
}

fn ensure_texture(
    context: &mut dyn OverlayContext,
    textures: &mut HashMap<String, UploadedTexture>,
    id: &str,
    image: &Arc<RgbaBitmap>,
) -> Result<TextureId> {
    if let Some(uploaded) = textures.get(id) {
        if Arc::ptr_eq(&uploaded.image, image) {
            return Ok(uploaded.texture);
        }
    }

    let texture = context.upload_bitmap(image)?;
    let previous = textures.insert(
        id.to_string(),
        UploadedTexture {
            image: image.clone(),
            texture,
        },
    );
    if let Some(previous) = previous {
        context.release_texture(previous.texture);
    }
    Ok(texture)
}
