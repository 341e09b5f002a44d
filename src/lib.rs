//! kiln_asset - Asset identity and streaming for a game editor
//!
//! # Features
//! - Persistent `AssetId` <-> path registry, reconciled against disk on open
//! - Loaders selected by asset type, with extension-based type guessing
//! - One load per `(type, path)`: concurrent requests share a reference
//! - Decoding off the main thread, GPU finalization on it
//! - Debounced hot reload that keeps ids stable across renames
//!
//! # Quick Start
//!
//! ```ignore
//! use kiln_asset::{
//!     AssetServer, MainThread, MainThreadQueue, MockGpu, ProjectLayout, Texture, TokioSpawner,
//! };
//!
//! let main = MainThread::claim();
//! let queue = Arc::new(MainThreadQueue::new());
//! let layout = ProjectLayout::new("my_game");
//! let server = AssetServer::open(&layout, MockGpu::new(), TokioSpawner::new(), queue.clone())?;
//! server.register_default_loaders();
//!
//! let brick = server.load::<Texture<MockGpu>>("textures/brick.png")?;
//! loop {
//!     queue.drain(&main);
//!     if let Some(texture) = brick.value() { /* draw */ }
//! }
//! ```
//!
//! # Feature Flags
//!
//! - `runtime-tokio`: Enable the Tokio spawner (default)
//! - `fs-watch`: Drive the change watcher from native filesystem events (default)

// Core modules
pub mod cache;
pub mod loader;
pub mod registry;
pub mod server;
pub mod watcher;

// Backends
pub mod gpu;
pub mod runtime;
pub mod vfs;

// Support modules
pub mod config;
pub mod dispatch;
pub mod id;
pub mod kind;
pub mod path;
pub mod reference;

// Error types
mod error;
pub use error::{AssetError, Result};

// Identity
pub use id::AssetId;
pub use kind::AssetKind;
pub use path::VirtualPath;
pub use registry::{AssetRecord, IdentityRegistry};

// Loading
pub use cache::metrics::{AssetMetrics, AssetMetricsHandle};
pub use cache::{AssetCache, Lookup};
pub use loader::{
    AssetLoader, LoadContext, LoaderRegistry, Material, MaterialFile, MaterialLoader, Mesh,
    MeshFile, MeshLoader, ResourceType, Texture, TextureLoader, Vertex,
};
pub use reference::{AssetReference, LoadState};
pub use server::AssetServer;

// Threads and backends
pub use dispatch::{Dispatcher, MainThread, MainThreadQueue, MainThreadTask};
pub use gpu::{
    BufferUsage, GpuDevice, GpuError, GpuResult, GpuTextureFormat, MaterialDescriptor, MockGpu,
    TextureDescriptor,
};
#[cfg(feature = "runtime-tokio")]
pub use runtime::TokioSpawner;
pub use runtime::{AsyncSpawner, JoinHandle, MockSpawner};
pub use vfs::{DiskFileSystem, FileSystem, MemoryFileSystem};

// Configuration and hot reload
pub use config::{ProjectLayout, WatcherConfig};
#[cfg(feature = "fs-watch")]
pub use watcher::FsWatcher;
pub use watcher::{ChangeWatcher, ReloadHooks, ReloadListener, WatchEvent};

// Version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_default_server_types() {
        let queue = std::sync::Arc::new(MainThreadQueue::new());
        let server: AssetServer = AssetServer::new(
            IdentityRegistry::in_memory(),
            MemoryFileSystem::new(),
            MockGpu::new(),
            MockSpawner::new(),
            queue,
        );
        server.register_default_loaders();
        assert_eq!(server.loaders().types().len(), 3);
    }
}
