//! Dashboard state transitions.
//!
//! A composite layer update is split into three explicit steps so that
//! builds can run concurrently while the overlay is only ever touched from
//! one place:
//!
//! ```text
//! begin_build(request) ──► BuildTicket        (supersedes older tickets)
//! run_build(request, ticket) ──► outcome      (cache, then compositor)
//! apply(channel, ticket, outcome) ──► overlay (stale tickets dropped)
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use atlas_common::BoundingBox;
use compositor::{
    BuildEpoch, BuildTicket, CompositeCache, CompositeOutcome, CompositeRequest, CompositeResult,
    Compositor,
};
use overlay::{HostMap, LayerState, OverlayManager};
use tracing::{debug, info, instrument};

use crate::catrare::{event_layer, RainEvent};
use crate::error::{DashboardError, Result};
use crate::flood::{flood_layer, FloodScenario};
use crate::kostra::KostraScenario;

pub const HEAT_LAYER: &str = "heat-composite";
pub const KOSTRA_LAYER: &str = "kostra";
pub const CATRARE_LAYER: &str = "catrare-events";
pub const FLOOD_LAYER: &str = "flood-risk";

/// Builds composites for one overlay layer.
///
/// Cheap to clone; clones share the compositor, the generation counter and
/// the cache.
#[derive(Clone)]
pub struct CompositeChannel {
    layer_id: String,
    compositor: Arc<Compositor>,
    epoch: BuildEpoch,
    cache: Arc<CompositeCache>,
    opacity: f32,
}

impl CompositeChannel {
    pub fn new(layer_id: impl Into<String>, compositor: Arc<Compositor>) -> Self {
        let cache = Arc::new(CompositeCache::new(compositor.config().cache_entries));
        Self {
            layer_id: layer_id.into(),
            compositor,
            epoch: BuildEpoch::new(),
            cache,
            opacity: 0.8,
        }
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn layer_id(&self) -> &str {
        &self.layer_id
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    pub fn cache(&self) -> &CompositeCache {
        &self.cache
    }

    /// Start a build, superseding every earlier ticket on this channel.
    pub fn begin_build(&self, request: &CompositeRequest) -> BuildTicket {
        let ticket = self.epoch.begin(self.compositor.key_for(request));
        debug!(layer = %self.layer_id, generation = ticket.generation, key = %ticket.key, "Build started");
        ticket
    }

    pub fn is_current(&self, ticket: &BuildTicket) -> bool {
        self.epoch.is_current(ticket)
    }

    /// Produce the outcome for `ticket`, from the cache when possible.
    #[instrument(skip_all, fields(layer = %self.layer_id, generation = ticket.generation))]
    pub async fn run_build(
        &self,
        request: &CompositeRequest,
        ticket: &BuildTicket,
    ) -> Result<CompositeOutcome> {
        if !self.is_current(ticket) {
            return Ok(CompositeOutcome::Superseded);
        }

        if let Some(result) = self.cache.get(&ticket.key).await {
            return Ok(CompositeOutcome::Ready(result));
        }

        let outcome = self
            .compositor
            .build_with_ticket(request, &self.epoch, ticket)
            .await?;

        if let CompositeOutcome::Ready(result) = &outcome {
            self.cache.insert(ticket.key.clone(), result.clone()).await;
        }
        Ok(outcome)
    }
}

/// What `apply` did to the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The composite is now the layer's bitmap.
    Shown,
    /// No data; the layer was removed.
    Cleared,
    /// The outcome belonged to a superseded build.
    Dropped,
    /// No map is attached; nothing was drawn.
    Detached,
}

impl Applied {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shown => "shown",
            Self::Cleared => "cleared",
            Self::Dropped => "dropped",
            Self::Detached => "detached",
        }
    }
}

impl std::fmt::Display for Applied {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Owns the map overlay and every source feeding it.
pub struct DashboardController {
    overlay: OverlayManager,
    heat: CompositeChannel,
    kostra: Option<CompositeChannel>,
    /// Composite currently shown per layer id
    shown: HashMap<String, Arc<CompositeResult>>,
}

impl DashboardController {
    pub fn new(heat: CompositeChannel) -> Self {
        Self {
            overlay: OverlayManager::new(),
            heat,
            kostra: None,
            shown: HashMap::new(),
        }
    }

    pub fn with_kostra(mut self, channel: CompositeChannel) -> Self {
        self.kostra = Some(channel);
        self
    }

    pub fn heat(&self) -> &CompositeChannel {
        &self.heat
    }

    pub fn kostra(&self) -> Option<&CompositeChannel> {
        self.kostra.as_ref()
    }

    pub fn overlay(&self) -> &OverlayManager {
        &self.overlay
    }

    /// Bind the overlay to a map. See [`OverlayManager::attach`].
    pub fn attach(&mut self, host: &dyn HostMap, force_reinit: bool) -> Result<()> {
        self.overlay.attach(host, force_reinit)?;
        if !self.overlay.is_attached() {
            return Ok(());
        }
        // A different map starts from an empty layer list
        let ids: Vec<String> = self.overlay.layer_ids().iter().map(|s| s.to_string()).collect();
        self.shown.retain(|id, _| ids.contains(id));
        Ok(())
    }

    pub fn detach(&mut self) {
        self.overlay.detach();
        self.shown.clear();
    }

    /// Publish a finished build to the overlay.
    ///
    /// Outcomes whose ticket is no longer current never reach the overlay,
    /// and nothing is recorded as shown while no map is attached.
    pub fn apply(
        &mut self,
        channel: &CompositeChannel,
        ticket: &BuildTicket,
        outcome: CompositeOutcome,
    ) -> Applied {
        let layer = channel.layer_id().to_string();

        let applied = if !channel.is_current(ticket) {
            debug!(layer = %layer, generation = ticket.generation, "Dropping stale build");
            Applied::Dropped
        } else if !self.overlay.is_attached() {
            debug!(layer = %layer, generation = ticket.generation, "Overlay not attached; build not shown");
            Applied::Detached
        } else {
            match outcome {
                CompositeOutcome::Ready(result) => {
                    info!(
                        layer = %layer,
                        width = result.width,
                        height = result.height,
                        contributing = result.provenance.contributing_granules.len(),
                        confidence = result.provenance.coverage_confidence.as_str(),
                        "Showing composite"
                    );
                    self.overlay.set_layer(
                        LayerState::bitmap(layer.clone(), result.image.clone(), result.bounds)
                            .with_opacity(channel.opacity),
                    );
                    self.shown.insert(layer.clone(), result);
                    Applied::Shown
                }
                CompositeOutcome::NoData(report) => {
                    info!(layer = %layer, reason = %report.reason, "Composite has no data; clearing layer");
                    self.overlay.remove_layer(&layer);
                    self.shown.remove(&layer);
                    Applied::Cleared
                }
                CompositeOutcome::Superseded => Applied::Dropped,
            }
        };

        metrics::counter!("dashboard_layer_updates_total", "layer" => layer, "result" => applied.as_str())
            .increment(1);
        applied
    }

    /// Run one build on `channel` to completion and apply it.
    pub async fn refresh(
        &mut self,
        channel: &CompositeChannel,
        request: &CompositeRequest,
    ) -> Result<Applied> {
        let ticket = channel.begin_build(request);
        let outcome = channel.run_build(request, &ticket).await?;
        Ok(self.apply(channel, &ticket, outcome))
    }

    /// Rebuild the heat composite for new inputs.
    pub async fn update_heat(&mut self, request: &CompositeRequest) -> Result<Applied> {
        let channel = self.heat.clone();
        self.refresh(&channel, request).await
    }

    /// Show a KOSTRA design rainfall scenario over `region`.
    pub async fn show_kostra(
        &mut self,
        scenario: KostraScenario,
        base_url: &str,
        region: BoundingBox,
    ) -> Result<Applied> {
        let channel = self
            .kostra
            .clone()
            .ok_or_else(|| DashboardError::NotConfigured(KOSTRA_LAYER.to_string()))?;
        info!(scenario = %scenario, "Loading KOSTRA scenario");
        self.refresh(&channel, &scenario.request(base_url, region)).await
    }

    pub fn show_events(&mut self, events: &[RainEvent]) {
        self.overlay.set_layer(event_layer(CATRARE_LAYER, events));
    }

    pub fn show_flood(&mut self, archive_url: &str, scenario: FloodScenario) {
        self.overlay
            .set_layer(flood_layer(FLOOD_LAYER, archive_url, scenario));
    }

    /// Remove any layer by id.
    pub fn hide(&mut self, layer_id: &str) {
        self.overlay.remove_layer(layer_id);
        self.shown.remove(layer_id);
    }

    /// Composite currently shown on `layer_id`.
    pub fn composite(&self, layer_id: &str) -> Option<&Arc<CompositeResult>> {
        self.shown.get(layer_id)
    }

    /// Hover read-out from the composite shown on `layer_id`.
    pub fn value_at(&self, layer_id: &str, lon: f64, lat: f64) -> Option<f32> {
        self.shown.get(layer_id)?.value_at(lon, lat)
    }
}
