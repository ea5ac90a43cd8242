//! A host map without a screen.
//!
//! Records every call the overlay manager makes so the CLI can report what
//! would be drawn and tests can assert on the exact call sequence.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use renderer::RgbaBitmap;

use crate::error::{OverlayError, Result};
use crate::host::{HostId, HostMap, OverlayContext, TextureId, Viewport};
use crate::layer::RenderLayer;

/// Everything a headless host has seen.
#[derive(Debug, Default)]
pub struct HeadlessLog {
    pub contexts_created: usize,
    pub contexts_finalized: usize,
    pub set_layers_calls: usize,
    /// Layer list from the most recent `set_layers`
    pub last_layers: Vec<RenderLayer>,
    pub uploads: usize,
    pub releases: usize,
    pub live_textures: HashSet<TextureId>,
    pub viewport: Option<Viewport>,
    /// Reject every upload while set
    pub fail_uploads: bool,
    next_texture: u64,
}

impl HeadlessLog {
    pub fn last_layer_ids(&self) -> Vec<String> {
        self.last_layers.iter().map(|l| l.id().to_string()).collect()
    }
}

type SharedLog = Arc<Mutex<HeadlessLog>>;

fn lock(log: &SharedLog) -> MutexGuard<'_, HeadlessLog> {
    log.lock().unwrap_or_else(|e| e.into_inner())
}

pub struct HeadlessHost {
    id: HostId,
    style_loaded: AtomicBool,
    viewport: Viewport,
    log: SharedLog,
}

impl HeadlessHost {
    /// A host whose style is already loaded.
    pub fn new(id: u64, viewport: Viewport) -> Self {
        Self {
            id: HostId(id),
            style_loaded: AtomicBool::new(true),
            viewport,
            log: Arc::new(Mutex::new(HeadlessLog::default())),
        }
    }

    pub fn set_style_loaded(&self, loaded: bool) {
        self.style_loaded.store(loaded, Ordering::SeqCst);
    }

    /// Make every bitmap upload fail until switched off again.
    pub fn set_fail_uploads(&self, fail: bool) {
        lock(&self.log).fail_uploads = fail;
    }

    pub fn log(&self) -> MutexGuard<'_, HeadlessLog> {
        lock(&self.log)
    }
}

impl HostMap for HeadlessHost {
    fn id(&self) -> HostId {
        self.id
    }

    fn is_style_loaded(&self) -> bool {
        self.style_loaded.load(Ordering::SeqCst)
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn create_overlay(&self) -> Result<Box<dyn OverlayContext>> {
        let mut log = lock(&self.log);
        log.contexts_created += 1;
        log.viewport = Some(self.viewport);
        Ok(Box::new(HeadlessOverlay {
            log: self.log.clone(),
        }))
    }
}

pub struct HeadlessOverlay {
    log: SharedLog,
}

impl OverlayContext for HeadlessOverlay {
    fn set_layers(&mut self, layers: &[RenderLayer]) -> Result<()> {
        let mut log = lock(&self.log);
        log.set_layers_calls += 1;
        log.last_layers = layers.to_vec();
        Ok(())
    }

    fn upload_bitmap(&mut self, _bitmap: &RgbaBitmap) -> Result<TextureId> {
        let mut log = lock(&self.log);
        if log.fail_uploads {
            return Err(OverlayError::Upload("headless host rejects uploads".into()));
        }
        log.next_texture += 1;
        let texture = TextureId(log.next_texture);
        log.uploads += 1;
        log.live_textures.insert(texture);
        Ok(texture)
    }

    fn release_texture(&mut self, texture: TextureId) {
        let mut log = lock(&self.log);
        if log.live_textures.remove(&texture) {
            log.releases += 1;
        }
    }

    fn resize(&mut self, viewport: Viewport) {
        lock(&self.log).viewport = Some(viewport);
    }

    fn finalize(&mut self) {
        let mut log = lock(&self.log);
        log.contexts_finalized += 1;
        log.last_layers.clear();
    }
}
