//! Debounced hot reload
//!
//! Raw filesystem events go through [`ChangeWatcher::handle`]. Each event
//! (re)arms a wait for its path: after a quiet period the file is polled
//! until it is stable, then the identity registry is updated and, on the
//! main thread, the registry is saved, cached assets at the path are
//! invalidated and the [`ReloadListener`] is told.
//!
//! A newer event for the same path supersedes the pending wait, so a burst
//! of writes produces a single notification.

#[cfg(feature = "fs-watch")]
mod fs;
mod listener;
mod stability;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::cache::AssetCache;
use crate::config::{ProjectLayout, WatcherConfig};
use crate::dispatch::{Dispatcher, MainThread};
use crate::error::AssetError;
use crate::path::VirtualPath;
use crate::registry::IdentityRegistry;
use crate::runtime::AsyncSpawner;

#[cfg(feature = "fs-watch")]
pub use fs::FsWatcher;
pub use listener::{ReloadHooks, ReloadListener};
use stability::Stability;

/// A raw filesystem notification, with absolute paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Created(PathBuf),
    Changed(PathBuf),
    Renamed { from: PathBuf, to: PathBuf },
    Removed(PathBuf),
}

#[derive(Debug)]
struct DebounceEntry {
    generation: u64,
    last_event: Instant,
    /// Where the file lived before a pending rename
    rename_from: Option<VirtualPath>,
}

struct Inner {
    layout: ProjectLayout,
    config: WatcherConfig,
    registry: Arc<IdentityRegistry>,
    cache: Option<Arc<AssetCache>>,
    dispatcher: Arc<dyn Dispatcher>,
    listener: Arc<dyn ReloadListener>,
    pending: Mutex<HashMap<VirtualPath, DebounceEntry>>,
    generations: AtomicU64,
}

/// Turns filesystem events into registry updates and reload notifications
pub struct ChangeWatcher<S: AsyncSpawner> {
    inner: Arc<Inner>,
    spawner: S,
}

impl<S: AsyncSpawner> Clone for ChangeWatcher<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            spawner: self.spawner.clone(),
        }
    }
}

impl<S: AsyncSpawner> ChangeWatcher<S> {
    pub fn new(
        layout: ProjectLayout,
        config: WatcherConfig,
        registry: Arc<IdentityRegistry>,
        cache: Option<Arc<AssetCache>>,
        dispatcher: Arc<dyn Dispatcher>,
        spawner: S,
        listener: Arc<dyn ReloadListener>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                layout,
                config,
                registry,
                cache,
                dispatcher,
                listener,
                pending: Mutex::new(HashMap::new()),
                generations: AtomicU64::new(0),
            }),
            spawner,
        }
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.inner.layout
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.inner.config
    }

    /// Paths with a wait in flight
    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Feed one raw event
    ///
    /// Directories, the registry file and paths outside the asset root are
    /// ignored.
    pub fn handle(&self, event: WatchEvent) {
        match event {
            WatchEvent::Created(path) | WatchEvent::Changed(path) => {
                if let Some(virt) = self.file_path(&path) {
                    self.schedule(virt, path, None);
                }
            }
            WatchEvent::Renamed { from, to } => {
                let Some(to_virt) = self.file_path(&to) else {
                    return;
                };
                match self.inner.layout.to_virtual(&from) {
                    Some(from_virt) => self.schedule(to_virt, to, Some(from_virt)),
                    // Moved in from outside the project: a new file here
                    None => self.schedule(to_virt, to, None),
                }
            }
            WatchEvent::Removed(path) => {
                if self.inner.layout.is_registry_file(&path) {
                    return;
                }
                if let Some(virt) = self.inner.layout.to_virtual(&path) {
                    self.inner.removed(virt);
                }
            }
        }
    }

    fn file_path(&self, path: &Path) -> Option<VirtualPath> {
        // Registry saves are not asset changes
        if path.is_dir() || self.inner.layout.is_registry_file(path) {
            return None;
        }
        let virt = self.inner.layout.to_virtual(path);
        if virt.is_none() {
            log::debug!("Ignoring event outside the asset root: {}", path.display());
        }
        virt
    }

    fn schedule(&self, path: VirtualPath, absolute: PathBuf, from: Option<VirtualPath>) {
        let inner = &self.inner;
        let generation = inner.generations.fetch_add(1, Ordering::Relaxed) + 1;
        {
            let mut pending = inner.pending.lock();
            let mut rename_from = from;
            // A file renamed twice before settling keeps its first origin
            if let Some(from_path) = &rename_from {
                if let Some(earlier) = pending.remove(from_path) {
                    if earlier.rename_from.is_some() {
                        rename_from = earlier.rename_from;
                    }
                }
            }
            if rename_from.is_none() {
                rename_from = pending.get(&path).and_then(|e| e.rename_from.clone());
            }
            pending.insert(
                path.clone(),
                DebounceEntry {
                    generation,
                    last_event: Instant::now(),
                    rename_from,
                },
            );
        }

        let inner = Arc::clone(inner);
        let spawner = self.spawner.clone();
        self.spawner.spawn(async move {
            let config = inner.config;
            let started = Instant::now();
            let mut stability = Stability::default();
            spawner.sleep(config.settle_delay).await;
            loop {
                if !inner.is_current(&path, generation) {
                    return;
                }
                if stability.check(&absolute).is_ok() {
                    break;
                }
                if started.elapsed() >= config.timeout {
                    let error = AssetError::Timeout {
                        path: absolute.clone(),
                        waited: started.elapsed(),
                    };
                    log::warn!("Dropping change event: {}", error);
                    inner.finish(&path, generation);
                    return;
                }
                spawner.sleep(config.poll_interval).await;
            }
            if let Some(entry) = inner.finish(&path, generation) {
                log::debug!(
                    "{} settled {:?} after its last event",
                    path,
                    entry.last_event.elapsed()
                );
                inner.settled(path, entry.rename_from);
            }
        });
    }
}

impl Inner {
    fn is_current(&self, path: &VirtualPath, generation: u64) -> bool {
        self.pending
            .lock()
            .get(path)
            .is_some_and(|e| e.generation == generation)
    }

    /// Remove the entry for `path` if `generation` still owns it
    fn finish(&self, path: &VirtualPath, generation: u64) -> Option<DebounceEntry> {
        let mut pending = self.pending.lock();
        if pending.get(path)?.generation != generation {
            return None;
        }
        pending.remove(path)
    }

    fn settled(&self, path: VirtualPath, rename_from: Option<VirtualPath>) {
        let mut stale = vec![path.clone()];
        match rename_from {
            Some(from) if from != path => {
                if !self.registry.rename(&from, &path) {
                    self.registry.ensure_id(&path);
                }
                stale.push(from);
            }
            _ => {
                self.registry.ensure_id(&path);
            }
        }

        let registry = Arc::clone(&self.registry);
        let cache = self.cache.clone();
        let listener = Arc::clone(&self.listener);
        self.dispatcher.queue(Box::new(move |main: &MainThread| {
            if let Err(e) = registry.save() {
                log::error!("Failed to save registry after change to {}: {}", path, e);
            }
            if let Some(cache) = &cache {
                for stale_path in &stale {
                    cache.invalidate(stale_path);
                }
            }
            listener.asset_changed(&path, main);
        }));
    }

    fn removed(&self, path: VirtualPath) {
        let prefix = format!("{}/", path);
        self.pending
            .lock()
            .retain(|pending, _| *pending != path && !pending.as_str().starts_with(&prefix));

        let mut gone = Vec::new();
        if self.registry.remove(&path).is_some() {
            gone.push(path.clone());
        } else {
            // A removed directory takes its files with it
            for record in self.registry.records() {
                if record.path.as_str().starts_with(&prefix) {
                    self.registry.remove(&record.path);
                    gone.push(record.path);
                }
            }
        }
        if gone.is_empty() {
            log::debug!("Removed path {} had no asset id", path);
            return;
        }

        let registry = Arc::clone(&self.registry);
        let cache = self.cache.clone();
        let listener = Arc::clone(&self.listener);
        self.dispatcher.queue(Box::new(move |main: &MainThread| {
            if let Err(e) = registry.save() {
                log::error!("Failed to save registry after removal: {}", e);
            }
            for path in &gone {
                if let Some(cache) = &cache {
                    cache.invalidate(path);
                }
                listener.asset_removed(path, main);
            }
        }));
    }
}
