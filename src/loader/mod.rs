//! Loaders turn file bytes into finished assets
//!
//! Loading is split in two stages. [`AssetLoader::decode`] is pure CPU work
//! and runs on any thread; [`AssetLoader::finalize`] builds GPU resources and
//! only runs on the main thread. The server derives both the asynchronous
//! and the synchronous load paths from these two stages.

pub mod material;
pub mod mesh;
pub mod registry;
pub mod texture;

use std::any::Any;
use std::sync::Arc;

use crate::dispatch::MainThread;
use crate::error::{AssetError, Result};
use crate::gpu::GpuDevice;
use crate::id::AssetId;
use crate::path::VirtualPath;
use crate::registry::IdentityRegistry;
use crate::server::Shared;

pub use material::{Material, MaterialFile, MaterialLoader};
pub use mesh::{Mesh, MeshFile, MeshLoader, Vertex};
pub use registry::{LoaderRegistry, ResourceType};
pub use texture::{Texture, TextureLoader};

/// Decoder for one asset type
pub trait AssetLoader<G: GpuDevice>: Send + Sync + 'static {
    /// What `finalize` produces
    type Asset: Send + Sync + 'static;
    /// What `decode` hands to `finalize`
    type Decoded: Send + 'static;

    /// Lowercase extensions without the dot
    fn extensions(&self) -> &[&'static str];

    /// Parse raw file bytes; runs off the main thread
    fn decode(&self, path: &VirtualPath, bytes: Vec<u8>) -> Result<Self::Decoded>;

    /// Build the asset from decoded data; runs on the main thread
    fn finalize(
        &self,
        decoded: Self::Decoded,
        cx: &LoadContext<'_, G>,
        main: &MainThread,
    ) -> Result<Self::Asset>;
}

/// An [`AssetLoader`] with its intermediate type erased
///
/// Implemented for every `AssetLoader`; the registry stores loaders in this
/// form so requests only need to name the asset type.
pub trait ErasedLoader<G: GpuDevice, T>: Send + Sync {
    fn decode_any(&self, path: &VirtualPath, bytes: Vec<u8>) -> Result<Box<dyn Any + Send>>;

    fn finalize_any(
        &self,
        decoded: Box<dyn Any + Send>,
        cx: &LoadContext<'_, G>,
        main: &MainThread,
    ) -> Result<T>;
}

impl<G: GpuDevice, L: AssetLoader<G>> ErasedLoader<G, L::Asset> for L {
    fn decode_any(&self, path: &VirtualPath, bytes: Vec<u8>) -> Result<Box<dyn Any + Send>> {
        Ok(Box::new(self.decode(path, bytes)?))
    }

    fn finalize_any(
        &self,
        decoded: Box<dyn Any + Send>,
        cx: &LoadContext<'_, G>,
        main: &MainThread,
    ) -> Result<L::Asset> {
        let decoded = decoded.downcast::<L::Decoded>().map_err(|_| {
            AssetError::LoadFailed(format!(
                "decoded data for {} has the wrong type",
                cx.path()
            ))
        })?;
        self.finalize(*decoded, cx, main)
    }
}

/// What a loader may reach while finalizing one asset
pub struct LoadContext<'a, G: GpuDevice> {
    shared: &'a Shared<G>,
    path: &'a VirtualPath,
}

impl<'a, G: GpuDevice> LoadContext<'a, G> {
    pub(crate) fn new(shared: &'a Shared<G>, path: &'a VirtualPath) -> Self {
        Self { shared, path }
    }

    /// Path of the asset being finalized
    pub fn path(&self) -> &VirtualPath {
        self.path
    }

    pub fn gpu(&self) -> &G {
        &self.shared.gpu
    }

    pub fn registry(&self) -> &IdentityRegistry {
        &self.shared.registry
    }

    /// Id of the asset being finalized, minted and persisted if it has none
    pub fn asset_id(&self) -> AssetId {
        let (id, created) = self.shared.registry.ensure_id(self.path);
        if created {
            if let Err(e) = self.shared.registry.save() {
                log::warn!("Failed to persist new id for {}: {}", self.path, e);
            }
        }
        id
    }

    /// Load a sub-asset by id, synchronously
    ///
    /// Shares the cache with every other load, so a dependency already loaded
    /// elsewhere is returned without touching the file again.
    pub fn load_dependency<T: Send + Sync + 'static>(
        &self,
        id: AssetId,
        main: &MainThread,
    ) -> Result<Arc<T>> {
        self.shared.load_sync_by_id::<T>(id, main)
    }

    /// Note that a fallback stood in for an unresolved dependency
    pub fn record_fallback(&self, id: AssetId, error: &AssetError) {
        log::warn!(
            "{}",
            AssetError::MissingDependency {
                id,
                reason: format!("{} (required by {})", error, self.path),
            }
        );
        self.shared.cache.metrics().record_fallback();
    }
}
