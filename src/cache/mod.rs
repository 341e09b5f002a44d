//! Single-flight cache of asset references
//!
//! One entry per `(type, virtual path)`. The first request for a key inserts
//! a pending [`AssetReference`] and is told to start the load; every later
//! request gets that same reference back, pending or not.
//!
//! The cache is unbounded. Entries leave it when the change watcher
//! invalidates their path, when their background load fails, through
//! [`AssetCache::evict_unused`], or through [`AssetCache::clear`].

pub mod metrics;

use std::any::{Any, TypeId};
use std::collections::HashMap;

use parking_lot::Mutex;

use crate::path::VirtualPath;
use crate::reference::AssetReference;
use metrics::AssetMetricsHandle;

trait CachedReference: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn handle_count(&self) -> usize;
    fn is_failed(&self) -> bool;
}

impl<T: Send + Sync + 'static> CachedReference for AssetReference<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn handle_count(&self) -> usize {
        AssetReference::handle_count(self)
    }

    fn is_failed(&self) -> bool {
        AssetReference::is_failed(self)
    }
}

type Key = (TypeId, VirtualPath);

/// Whether [`AssetCache::get_or_insert_with`] found or created the entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Hit,
    Inserted,
}

#[derive(Default)]
pub struct AssetCache {
    entries: Mutex<HashMap<Key, Box<dyn CachedReference>>>,
    metrics: AssetMetricsHandle,
}

impl std::fmt::Debug for AssetCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetCache")
            .field("entries", &self.len())
            .finish()
    }
}

impl AssetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached reference for `(T, path)`, or insert the one `make` builds
    ///
    /// Check and insert happen under one lock, so of any number of concurrent
    /// callers exactly one sees [`Lookup::Inserted`]. Hit/miss accounting is
    /// left to the caller, which knows whether the lookup was a real request.
    pub fn get_or_insert_with<T, F>(
        &self,
        path: &VirtualPath,
        make: F,
    ) -> (AssetReference<T>, Lookup)
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> AssetReference<T>,
    {
        let key = (TypeId::of::<T>(), path.clone());
        let mut entries = self.entries.lock();
        if let Some(existing) = entries
            .get(&key)
            .and_then(|entry| entry.as_any().downcast_ref::<AssetReference<T>>())
        {
            return (existing.clone(), Lookup::Hit);
        }

        let reference = make();
        entries.insert(key, Box::new(reference.clone()));
        (reference, Lookup::Inserted)
    }

    /// Cached reference for `(T, path)`
    pub fn get<T: Send + Sync + 'static>(&self, path: &VirtualPath) -> Option<AssetReference<T>> {
        self.entries
            .lock()
            .get(&(TypeId::of::<T>(), path.clone()))
            .and_then(|entry| entry.as_any().downcast_ref::<AssetReference<T>>())
            .cloned()
    }

    pub fn contains<T: Send + Sync + 'static>(&self, path: &VirtualPath) -> bool {
        self.entries
            .lock()
            .contains_key(&(TypeId::of::<T>(), path.clone()))
    }

    /// Drop the entry for `(T, path)` only if it is still `reference`
    pub fn remove_if_same<T: Send + Sync + 'static>(&self, reference: &AssetReference<T>) -> bool {
        let key = (TypeId::of::<T>(), reference.path().clone());
        let mut entries = self.entries.lock();
        let same = entries
            .get(&key)
            .and_then(|entry| entry.as_any().downcast_ref::<AssetReference<T>>())
            .is_some_and(|cached| cached.ptr_eq(reference));
        if same {
            entries.remove(&key);
        }
        same
    }

    /// Drop every type's entry for `path`; returns how many went
    pub fn invalidate(&self, path: &VirtualPath) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|(_, cached), _| cached != path);
        before - entries.len()
    }

    /// Drop entries whose load failed
    pub fn remove_failed(&self) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_failed());
        before - entries.len()
    }

    /// Drop entries nobody outside the cache holds any more
    pub fn evict_unused(&self) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.handle_count() > 1);
        let evicted = before - entries.len();
        if evicted > 0 {
            log::debug!("Evicted {} unused cache entries", evicted);
        }
        evicted
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Get a reference to the metrics handle
    pub fn metrics(&self) -> &AssetMetricsHandle {
        &self.metrics
    }
}
