//! In-memory LRU caches.
//!
//! [`CompositeCache`] holds finished composites. Keys are derived from the
//! request content (sorted granule ids, method, percentile mode, region,
//! grid resolution), so the same selection from a different UI path hits the
//! same entry.
//!
//! [`CachingSource`] holds opened granules by URL so a rebuild over the same
//! granules skips the download and decode.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use atlas_common::{BoundingBox, GranuleDescriptor};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::Result;
use crate::source::{RasterHandle, RasterSource};
use crate::types::{AggregationMethod, CompositeResult, PercentileMode};

/// Content-derived cache and generation key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompositeKey(String);

impl CompositeKey {
    pub fn new(
        granules: &[GranuleDescriptor],
        region: &BoundingBox,
        method: AggregationMethod,
        mode: PercentileMode,
        resolution_m: f64,
        max_dim: u32,
    ) -> Self {
        let mut ids: Vec<&str> = granules.iter().map(|g| g.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();

        let mut hasher = DefaultHasher::new();
        ids.hash(&mut hasher);

        Self(format!(
            "{}:{}:{}:{:.1}m:{}:{:016x}",
            method.as_str(),
            mode.as_str(),
            region.cache_key(),
            resolution_m,
            max_dim,
            hasher.finish()
        ))
    }

    pub fn from_raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cache hit/miss counters.
#[derive(Debug, Default)]
pub struct CompositeCacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
}

impl CompositeCacheStats {
    /// Hit rate as a percentage (0-100).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            (hits as f64 / total as f64) * 100.0
        }
    }
}

/// LRU of finished composites, shared behind an `Arc`.
pub struct CompositeCache {
    cache: Mutex<LruCache<CompositeKey, Arc<CompositeResult>>>,
    stats: CompositeCacheStats,
}

impl CompositeCache {
    /// A capacity of zero is treated as one entry.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
            stats: CompositeCacheStats::default(),
        }
    }

    pub async fn get(&self, key: &CompositeKey) -> Option<Arc<CompositeResult>> {
        let mut cache = self.cache.lock().await;
        match cache.get(key) {
            Some(result) => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "Composite cache hit");
                Some(result.clone())
            }
            None => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub async fn insert(&self, key: CompositeKey, result: Arc<CompositeResult>) {
        let mut cache = self.cache.lock().await;
        cache.put(key, result);
    }

    pub async fn len(&self) -> usize {
        self.cache.lock().await.len()
    }

    pub async fn clear(&self) {
        self.cache.lock().await.clear();
    }

    pub fn stats(&self) -> &CompositeCacheStats {
        &self.stats
    }
}

/// A [`RasterSource`] that remembers the last opened rasters.
pub struct CachingSource {
    inner: Arc<dyn RasterSource>,
    handles: Mutex<LruCache<String, Arc<dyn RasterHandle>>>,
    stats: CompositeCacheStats,
}

impl CachingSource {
    /// A capacity of zero is treated as one entry.
    pub fn new(inner: Arc<dyn RasterSource>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            handles: Mutex::new(LruCache::new(capacity)),
            stats: CompositeCacheStats::default(),
        }
    }

    pub fn stats(&self) -> &CompositeCacheStats {
        &self.stats
    }

    pub async fn len(&self) -> usize {
        self.handles.lock().await.len()
    }
}

#[async_trait]
impl RasterSource for CachingSource {
    async fn open(&self, url: &str) -> Result<Arc<dyn RasterHandle>> {
        if let Some(handle) = self.handles.lock().await.get(url).cloned() {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("granule_cache_hits_total").increment(1);
            debug!(url = %url, "Granule cache hit");
            return Ok(handle);
        }

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("granule_cache_misses_total").increment(1);
        // Failed opens are not remembered
        let handle = self.inner.open(url).await?;
        self.handles
            .lock()
            .await
            .put(url.to_string(), handle.clone());
        Ok(handle)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
