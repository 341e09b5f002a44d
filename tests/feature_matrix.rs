//! Feature matrix tests - verify the default and optional surfaces are present

use std::sync::Arc;

use kiln_asset::{
    AssetKind, AssetServer, AsyncSpawner, IdentityRegistry, MainThreadQueue, MemoryFileSystem,
    MockGpu, MockSpawner, Texture,
};

#[test]
fn test_default_features() {
    let server = AssetServer::new(
        IdentityRegistry::in_memory(),
        MemoryFileSystem::new(),
        MockGpu::new(),
        MockSpawner::new(),
        Arc::new(MainThreadQueue::new()),
    );
    server.register_default_loaders();

    let mut extensions = server.loaders().extensions_of::<Texture<MockGpu>>();
    extensions.sort();
    assert_eq!(extensions, vec!["exr", "jpeg", "jpg", "png", "tga"]);
    assert_eq!(server.spawner().runtime_name(), "Mock");
}

#[test]
fn test_asset_kinds_cover_loader_extensions() {
    assert_eq!(AssetKind::from_extension("mat"), AssetKind::Material);
    assert_eq!(AssetKind::from_extension("mesh"), AssetKind::Mesh);
    assert_eq!(AssetKind::from_extension("exr"), AssetKind::Texture);
    assert_eq!(AssetKind::from_extension("glb"), AssetKind::Model);
}

#[cfg(feature = "runtime-tokio")]
#[test]
fn test_tokio_spawner_available() {
    use kiln_asset::TokioSpawner;

    let spawner = TokioSpawner::default();
    assert_eq!(spawner.runtime_name(), "Tokio");
}

#[cfg(feature = "fs-watch")]
#[test]
fn test_fs_watcher_available() {
    use kiln_asset::{ChangeWatcher, FsWatcher, ProjectLayout, WatcherConfig};

    let dir = tempfile::tempdir().unwrap();
    let layout = ProjectLayout::new(dir.path());
    std::fs::create_dir_all(layout.asset_root()).unwrap();
    let watcher = ChangeWatcher::new(
        layout.clone(),
        WatcherConfig::default(),
        Arc::new(IdentityRegistry::in_memory()),
        None,
        Arc::new(MainThreadQueue::new()),
        MockSpawner::new(),
        Arc::new(|_: &kiln_asset::VirtualPath, _: &kiln_asset::MainThread| {}),
    );
    let native = FsWatcher::start(watcher, &layout.asset_root());
    assert!(native.is_ok());
}
