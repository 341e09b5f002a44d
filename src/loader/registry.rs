//! Type-erased loader lookup by asset type and by file extension

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::{AssetLoader, ErasedLoader};
use crate::error::{AssetError, Result};
use crate::gpu::GpuDevice;
use crate::path::VirtualPath;

/// A registered asset type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceType {
    pub type_id: TypeId,
    pub type_name: &'static str,
}

impl ResourceType {
    pub fn of<T: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
        }
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

struct Entry {
    resource: ResourceType,
    extensions: Vec<String>,
    /// `Arc<dyn ErasedLoader<G, T>>` for the entry's `T`
    loader: Box<dyn Any + Send + Sync>,
    order: usize,
}

/// One loader per asset type
pub struct LoaderRegistry<G: GpuDevice> {
    entries: RwLock<HashMap<TypeId, Entry>>,
    /// Registration counter; ranks are never reused
    next_order: AtomicUsize,
    _gpu: PhantomData<fn() -> G>,
}

impl<G: GpuDevice> Default for LoaderRegistry<G> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            next_order: AtomicUsize::new(0),
            _gpu: PhantomData,
        }
    }
}

impl<G: GpuDevice> std::fmt::Debug for LoaderRegistry<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.types().iter().map(|t| t.type_name))
            .finish()
    }
}

impl<G: GpuDevice> LoaderRegistry<G> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `loader` to its asset type, replacing any earlier loader
    ///
    /// A replacement counts as a new registration for extension priority.
    pub fn register<L: AssetLoader<G>>(&self, loader: L) {
        let resource = ResourceType::of::<L::Asset>();
        let extensions = loader
            .extensions()
            .iter()
            .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
            .collect();
        let erased: Arc<dyn ErasedLoader<G, L::Asset>> = Arc::new(loader);

        let mut entries = self.entries.write();
        let order = self.next_order.fetch_add(1, Ordering::Relaxed);
        let previous = entries.insert(
            resource.type_id,
            Entry {
                resource,
                extensions,
                loader: Box::new(erased),
                order,
            },
        );
        if previous.is_some() {
            log::debug!("Replaced loader for {}", resource.type_name);
        }
    }

    /// Loader producing `T`
    pub fn get<T: Send + Sync + 'static>(&self) -> Result<Arc<dyn ErasedLoader<G, T>>> {
        self.entries
            .read()
            .get(&TypeId::of::<T>())
            .and_then(|entry| {
                entry
                    .loader
                    .downcast_ref::<Arc<dyn ErasedLoader<G, T>>>()
                    .cloned()
            })
            .ok_or(AssetError::MissingLoader {
                type_name: type_name::<T>(),
            })
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.entries.read().contains_key(&TypeId::of::<T>())
    }

    /// Asset type whose loader claims the extension of `path`
    ///
    /// Matching ignores case. When several loaders claim the extension the
    /// earliest registered one wins.
    pub fn guess_type(&self, path: &VirtualPath) -> Option<ResourceType> {
        let ext = path.extension()?;
        self.entries
            .read()
            .values()
            .filter(|entry| entry.extensions.iter().any(|e| *e == ext))
            .min_by_key(|entry| entry.order)
            .map(|entry| entry.resource)
    }

    /// Every registered asset type, in registration order
    pub fn types(&self) -> Vec<ResourceType> {
        let entries = self.entries.read();
        let mut types: Vec<_> = entries.values().map(|e| (e.order, e.resource)).collect();
        types.sort_by_key(|(order, _)| *order);
        types.into_iter().map(|(_, resource)| resource).collect()
    }

    /// Extensions claimed by the loader for `T`
    pub fn extensions_of<T: 'static>(&self) -> Vec<String> {
        self.entries
            .read()
            .get(&TypeId::of::<T>())
            .map(|entry| entry.extensions.clone())
            .unwrap_or_default()
    }
}
