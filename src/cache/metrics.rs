use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::path::VirtualPath;

#[derive(Debug, Default, Clone, Copy)]
struct LoadStats {
    count: u64,
    total: Duration,
    last: Duration,
}

/// Tracks performance metrics for asset loading and caching
#[derive(Debug, Default)]
pub struct AssetMetrics {
    loads: RwLock<HashMap<VirtualPath, LoadStats>>,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    fallbacks: AtomicU64,
}

impl AssetMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed load (async or sync) of `path`
    pub fn record_load(&self, path: &VirtualPath, duration: Duration) {
        let mut loads = self.loads.write();
        let stats = loads.entry(path.clone()).or_default();
        stats.count += 1;
        stats.total += duration;
        stats.last = duration;
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a fallback substituted for an unresolved dependency
    pub fn record_fallback(&self) {
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the cache hit rate as a percentage
    pub fn cache_hit_rate(&self) -> f32 {
        let hits = self.cache_hits() as f32;
        let misses = self.cache_misses() as f32;

        if hits + misses > 0.0 {
            hits / (hits + misses) * 100.0
        } else {
            0.0
        }
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn cache_misses(&self) -> u64 {
        self.cache_misses.load(Ordering::Relaxed)
    }

    pub fn fallback_count(&self) -> u64 {
        self.fallbacks.load(Ordering::Relaxed)
    }

    /// How many times `path` was loaded
    pub fn load_count(&self, path: &str) -> u64 {
        self.loads.read().get(path).map_or(0, |s| s.count)
    }

    pub fn average_load_time(&self, path: &str) -> Option<Duration> {
        let loads = self.loads.read();
        let stats = loads.get(path)?;
        let count = u32::try_from(stats.count).ok().filter(|c| *c > 0)?;
        Some(stats.total / count)
    }

    pub fn last_load_time(&self, path: &str) -> Option<Duration> {
        self.loads.read().get(path).map(|s| s.last)
    }

    /// Total number of loads across all paths
    pub fn total_loads(&self) -> u64 {
        self.loads.read().values().map(|s| s.count).sum()
    }
}

/// A thread-safe wrapper around AssetMetrics
#[derive(Debug, Clone, Default)]
pub struct AssetMetricsHandle(Arc<AssetMetrics>);

impl AssetMetricsHandle {
    pub fn new() -> Self {
        Self(Arc::new(AssetMetrics::new()))
    }

    pub fn inner(&self) -> &AssetMetrics {
        &self.0
    }
}

impl std::ops::Deref for AssetMetricsHandle {
    type Target = AssetMetrics;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
