//! The asset server: cache lookup, loader dispatch and main-thread handoff
//!
//! ```ignore
//! let queue = Arc::new(MainThreadQueue::new());
//! let server = AssetServer::open(&layout, MockGpu::new(), TokioSpawner::new(), queue.clone())?;
//! server.register_default_loaders();
//!
//! let texture = server.load::<Texture<MockGpu>>("textures/brick.png")?;
//! texture.subscribe(|t| println!("{}x{}", t.width, t.height));
//!
//! // once per frame, on the main thread
//! queue.drain(&main);
//! ```

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use crate::cache::metrics::AssetMetricsHandle;
use crate::cache::{AssetCache, Lookup};
use crate::config::{ProjectLayout, WatcherConfig};
use crate::dispatch::{panic_message, BackgroundScope, Dispatcher, MainThread};
use crate::error::{AssetError, Result};
use crate::gpu::{GpuDevice, MockGpu};
use crate::id::AssetId;
use crate::loader::{
    AssetLoader, ErasedLoader, LoadContext, LoaderRegistry, MaterialLoader, MeshLoader,
    ResourceType, TextureLoader,
};
use crate::path::VirtualPath;
use crate::reference::AssetReference;
use crate::registry::IdentityRegistry;
use crate::runtime::{AsyncSpawner, MockSpawner};
use crate::vfs::{DiskFileSystem, FileSystem};
use crate::watcher::{ChangeWatcher, ReloadListener};

/// State shared between the server, its background tasks and load contexts
pub(crate) struct Shared<G: GpuDevice> {
    pub(crate) registry: Arc<IdentityRegistry>,
    pub(crate) loaders: LoaderRegistry<G>,
    pub(crate) cache: Arc<AssetCache>,
    pub(crate) vfs: Arc<dyn FileSystem>,
    pub(crate) gpu: G,
}

impl<G: GpuDevice> Shared<G> {
    pub(crate) fn load_sync_by_id<T: Send + Sync + 'static>(
        &self,
        id: AssetId,
        main: &MainThread,
    ) -> Result<Arc<T>> {
        let path = self.registry.lookup_path(id);
        if path.is_empty() {
            return Err(AssetError::UnresolvedId(id));
        }
        self.load_sync(&path, main)
    }

    pub(crate) fn load_sync<T: Send + Sync + 'static>(
        &self,
        path: &VirtualPath,
        main: &MainThread,
    ) -> Result<Arc<T>> {
        let loader = self.loaders.get::<T>()?;
        let metrics = self.cache.metrics();
        if let Some(value) = self.cache.get::<T>(path).and_then(|r| r.value()) {
            metrics.record_cache_hit();
            return Ok(value);
        }
        metrics.record_cache_miss();

        let start = Instant::now();
        let bytes = self.vfs.open(path)?;
        let decoded = loader.decode_any(path, bytes)?;
        let value = Arc::new(loader.finalize_any(decoded, &LoadContext::new(self, path), main)?);
        metrics.record_load(path, start.elapsed());

        let (reference, lookup) = self
            .cache
            .get_or_insert_with(path, || AssetReference::loaded(path.clone(), Arc::clone(&value)));
        if lookup == Lookup::Inserted || reference.set_shared(Arc::clone(&value), main) {
            return Ok(value);
        }
        if let Some(current) = reference.value() {
            return Ok(current);
        }
        // The cached reference failed; this load replaces it
        self.cache.remove_if_same(&reference);
        self.cache
            .get_or_insert_with(path, || AssetReference::loaded(path.clone(), Arc::clone(&value)));
        Ok(value)
    }

    fn fail_load<T: Send + Sync + 'static>(
        &self,
        reference: &AssetReference<T>,
        error: &AssetError,
    ) {
        log::error!("Failed to load {}: {}", reference.path(), error);
        reference.fail(error.to_string());
        self.cache.remove_if_same(reference);
    }
}

/// Run one loader stage, turning a panic into [`AssetError::LoadFailed`]
fn catch_panic<T>(stage: impl FnOnce() -> Result<T>) -> Result<T> {
    catch_unwind(AssertUnwindSafe(stage)).unwrap_or_else(|payload| {
        Err(AssetError::LoadFailed(format!(
            "loader panicked: {}",
            panic_message(&*payload)
        )))
    })
}

/// Loads assets by path or id, once per `(type, path)`
pub struct AssetServer<G: GpuDevice = MockGpu, S: AsyncSpawner = MockSpawner> {
    shared: Arc<Shared<G>>,
    spawner: S,
    dispatcher: Arc<dyn Dispatcher>,
}

impl<G: GpuDevice, S: AsyncSpawner> AssetServer<G, S> {
    pub fn new(
        registry: IdentityRegistry,
        vfs: impl FileSystem,
        gpu: G,
        spawner: S,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                registry: Arc::new(registry),
                loaders: LoaderRegistry::new(),
                cache: Arc::new(AssetCache::new()),
                vfs: Arc::new(vfs),
                gpu,
            }),
            spawner,
            dispatcher,
        }
    }

    /// Open the project at `layout` and serve its asset directory from disk
    pub fn open(
        layout: &ProjectLayout,
        gpu: G,
        spawner: S,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Result<Self> {
        let registry = IdentityRegistry::open(layout)?;
        Ok(Self::new(
            registry,
            DiskFileSystem::new(layout.clone()),
            gpu,
            spawner,
            dispatcher,
        ))
    }

    /// Register a loader; the last one registered for an asset type wins
    pub fn register_loader<L: AssetLoader<G>>(&self, loader: L) -> &Self {
        self.shared.loaders.register(loader);
        self
    }

    /// Register the texture, material and mesh loaders
    pub fn register_default_loaders(&self) -> &Self {
        self.register_loader(TextureLoader::new())
            .register_loader(MaterialLoader::new())
            .register_loader(MeshLoader::<G>::new())
    }

    /// Reference to the `T` at `path`, loading it in the background if needed
    ///
    /// Concurrent and repeated calls for the same `(T, path)` return the same
    /// reference and trigger a single load. The reference becomes `Loaded`
    /// when the main thread drains the dispatcher after decoding finished,
    /// or `Failed` if reading, decoding or finalizing failed; a failed entry
    /// leaves the cache so the next call retries.
    pub fn load<T: Send + Sync + 'static>(
        &self,
        path: impl Into<VirtualPath>,
    ) -> Result<AssetReference<T>> {
        let path = path.into();
        let loader = self.shared.loaders.get::<T>()?;
        let (reference, lookup) = self
            .shared
            .cache
            .get_or_insert_with(&path, || AssetReference::new(path.clone()));
        let metrics = self.shared.cache.metrics();
        if lookup == Lookup::Hit {
            metrics.record_cache_hit();
            return Ok(reference);
        }
        metrics.record_cache_miss();
        log::debug!("Loading {} in the background", path);
        self.dispatch(loader, reference.clone());
        Ok(reference)
    }

    fn dispatch<T: Send + Sync + 'static>(
        &self,
        loader: Arc<dyn ErasedLoader<G, T>>,
        reference: AssetReference<T>,
    ) {
        let shared = Arc::clone(&self.shared);
        let dispatcher = Arc::clone(&self.dispatcher);
        self.spawner.spawn(async move {
            let start = Instant::now();
            let path = reference.path().clone();
            let decoded = catch_panic(|| {
                let _background = BackgroundScope::enter();
                shared
                    .vfs
                    .open(&path)
                    .and_then(|bytes| loader.decode_any(&path, bytes))
            });
            let decoded = match decoded {
                Ok(decoded) => decoded,
                Err(e) => return shared.fail_load(&reference, &e),
            };

            dispatcher.queue(Box::new(move |main: &MainThread| {
                // Fulfilled by a synchronous load in the meantime
                if !reference.is_pending() {
                    return;
                }
                let cx = LoadContext::new(&shared, &path);
                match catch_panic(|| loader.finalize_any(decoded, &cx, main)) {
                    Ok(value) => {
                        shared.cache.metrics().record_load(&path, start.elapsed());
                        reference.set_value(value, main);
                    }
                    Err(e) => shared.fail_load(&reference, &e),
                }
            }));
        });
    }

    /// [`load`](Self::load) by asset id
    pub fn load_by_id<T: Send + Sync + 'static>(&self, id: AssetId) -> Result<AssetReference<T>> {
        let path = self.shared.registry.lookup_path(id);
        if path.is_empty() {
            return Err(AssetError::UnresolvedId(id));
        }
        self.load(path)
    }

    /// Load on the calling (main) thread and return the value
    ///
    /// Uses the same cache as [`load`](Self::load): a loaded entry is returned
    /// as is, and a pending one is fulfilled with the value built here.
    /// Errors propagate to the caller.
    pub fn load_sync<T: Send + Sync + 'static>(
        &self,
        path: impl Into<VirtualPath>,
        main: &MainThread,
    ) -> Result<Arc<T>> {
        self.shared.load_sync(&path.into(), main)
    }

    /// [`load_sync`](Self::load_sync) by asset id
    pub fn load_sync_by_id<T: Send + Sync + 'static>(
        &self,
        id: AssetId,
        main: &MainThread,
    ) -> Result<Arc<T>> {
        self.shared.load_sync_by_id(id, main)
    }

    /// Asset type whose loader claims the extension of `path`
    pub fn guess_type(&self, path: impl Into<VirtualPath>) -> Option<ResourceType> {
        self.shared.loaders.guess_type(&path.into())
    }

    /// Forget every cached asset at `path`
    pub fn invalidate(&self, path: impl Into<VirtualPath>) -> usize {
        self.shared.cache.invalidate(&path.into())
    }

    /// Change watcher over `layout` that shares this server's registry,
    /// cache, spawner and dispatcher
    ///
    /// Settled changes invalidate the cached assets at the changed path
    /// before `listener` hears about them.
    pub fn change_watcher(
        &self,
        layout: ProjectLayout,
        config: WatcherConfig,
        listener: Arc<dyn ReloadListener>,
    ) -> ChangeWatcher<S> {
        ChangeWatcher::new(
            layout,
            config,
            Arc::clone(&self.shared.registry),
            Some(Arc::clone(&self.shared.cache)),
            Arc::clone(&self.dispatcher),
            self.spawner.clone(),
            listener,
        )
    }

    pub fn registry(&self) -> &Arc<IdentityRegistry> {
        &self.shared.registry
    }

    pub fn loaders(&self) -> &LoaderRegistry<G> {
        &self.shared.loaders
    }

    pub fn cache(&self) -> &Arc<AssetCache> {
        &self.shared.cache
    }

    pub fn metrics(&self) -> &AssetMetricsHandle {
        self.shared.cache.metrics()
    }

    pub fn gpu(&self) -> &G {
        &self.shared.gpu
    }

    pub fn spawner(&self) -> &S {
        &self.spawner
    }

    pub fn dispatcher(&self) -> &Arc<dyn Dispatcher> {
        &self.dispatcher
    }

    pub fn file_system(&self) -> &Arc<dyn FileSystem> {
        &self.shared.vfs
    }
}
