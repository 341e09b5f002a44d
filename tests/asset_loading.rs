//! Integration tests for loading through the asset server

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use kiln_asset::{
    AssetError, AssetId, AssetReference, AssetServer, IdentityRegistry, MainThread,
    MainThreadQueue, Material, MaterialFile, MemoryFileSystem, Mesh, MeshFile, MockGpu,
    MockSpawner, ProjectLayout, Texture, Vertex, VirtualPath,
};

type Server = AssetServer<MockGpu, MockSpawner>;

fn png(size: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(size, size, image::Rgba([200, 80, 40, 255]));
    let mut bytes = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

fn quad(material: AssetId) -> MeshFile {
    MeshFile {
        vertices: vec![
            Vertex::new([0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0]),
            Vertex::new([1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0]),
            Vertex::new([1.0, 1.0, 0.0], [0.0, 0.0, 1.0], [1.0, 1.0]),
            Vertex::new([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0]),
        ],
        indices: vec![0, 1, 2, 0, 2, 3],
        material,
    }
}

fn server(spawner: MockSpawner) -> (Server, MemoryFileSystem, Arc<MainThreadQueue>) {
    let vfs = MemoryFileSystem::new();
    let queue = Arc::new(MainThreadQueue::new());
    let server = AssetServer::new(
        IdentityRegistry::in_memory(),
        vfs.clone(),
        MockGpu::new(),
        spawner,
        queue.clone(),
    );
    server.register_default_loaders();
    (server, vfs, queue)
}

#[test]
fn test_concurrent_requests_share_one_load() {
    let (server, vfs, queue) = server(MockSpawner::blocking());
    vfs.insert("textures/brick.png", png(8));

    let references: Vec<AssetReference<Texture<MockGpu>>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| server.load::<Texture<MockGpu>>("textures/brick.png").unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let main = MainThread::claim();
    queue.drain(&main);

    for reference in &references {
        assert!(reference.ptr_eq(&references[0]));
        assert!(reference.is_loaded());
    }
    assert_eq!(vfs.reads(), 1);
    assert_eq!(server.gpu().textures_created(), 1);
    assert_eq!(server.metrics().load_count("textures/brick.png"), 1);
    assert_eq!(server.metrics().cache_misses(), 1);
    assert_eq!(server.metrics().cache_hits(), 7);
}

#[test]
fn test_loaded_reference_never_changes() {
    let (server, vfs, queue) = server(MockSpawner::blocking());
    vfs.insert("a.png", png(2));
    let main = MainThread::claim();

    let reference = server.load::<Texture<MockGpu>>("a.png").unwrap();
    queue.drain(&main);
    let first = reference.value().unwrap();

    // A later synchronous load and a direct set both leave the value alone
    let again = server.load_sync::<Texture<MockGpu>>("a.png", &main).unwrap();
    assert!(Arc::ptr_eq(&first, &again));
    assert!(!reference.fail("late failure"));
    assert!(Arc::ptr_eq(&first, &reference.value().unwrap()));
}

#[test]
fn test_subscribers_fire_once_in_order() {
    let (server, vfs, queue) = server(MockSpawner::blocking());
    vfs.insert("a.png", png(2));
    let main = MainThread::claim();
    let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

    let reference = server.load::<Texture<MockGpu>>("a.png").unwrap();
    for i in 0..3 {
        let order = Arc::clone(&order);
        reference.subscribe(move |_| order.lock().push(i));
    }
    assert!(order.lock().is_empty());

    queue.drain(&main);
    assert_eq!(*order.lock(), vec![0, 1, 2]);

    // Already loaded: runs right away
    let late = Arc::new(AtomicUsize::new(0));
    let l = Arc::clone(&late);
    reference.subscribe(move |texture| {
        assert_eq!(texture.width, 2);
        l.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(late.load(Ordering::SeqCst), 1);
    assert_eq!(*order.lock(), vec![0, 1, 2]);
}

#[test]
fn test_failed_load_is_retried() {
    let (server, vfs, queue) = server(MockSpawner::blocking());
    let main = MainThread::claim();

    let failed = server.load::<Texture<MockGpu>>("late.png").unwrap();
    assert!(failed.is_failed());
    assert!(failed.error().is_some());

    vfs.insert("late.png", png(4));
    let retry = server.load::<Texture<MockGpu>>("late.png").unwrap();
    assert!(!retry.ptr_eq(&failed));
    queue.drain(&main);
    assert!(retry.is_loaded());
    assert!(failed.is_failed());
}

#[test]
fn test_decode_failure_fails_reference() {
    let (server, vfs, queue) = server(MockSpawner::blocking());
    vfs.insert("broken.mesh", vec![1, 2, 3]);

    let reference = server.load::<Mesh<MockGpu>>("broken.mesh").unwrap();
    assert!(reference.is_failed());
    assert!(queue.is_empty());
}

#[test]
fn test_missing_loader() {
    let vfs = MemoryFileSystem::new();
    vfs.insert("a.png", png(2));
    let server: Server = AssetServer::new(
        IdentityRegistry::in_memory(),
        vfs,
        MockGpu::new(),
        MockSpawner::blocking(),
        Arc::new(MainThreadQueue::new()),
    );

    let err = server.load::<Texture<MockGpu>>("a.png").unwrap_err();
    assert!(matches!(err, AssetError::MissingLoader { .. }));
    assert!(server.cache().is_empty());
}

#[test]
fn test_mesh_with_unresolvable_material_uses_fallback() {
    let (server, vfs, _queue) = server(MockSpawner::new());
    vfs.insert("props/crate.mesh", quad(AssetId::new()).to_bytes().unwrap());
    let main = MainThread::claim();

    let mesh = server
        .load_sync::<Mesh<MockGpu>>("props/crate.mesh", &main)
        .unwrap();
    assert_eq!(mesh.index_count, 6);
    assert_eq!(mesh.vertex_count, 4);
    assert!(mesh.material.id.is_nil());
    assert_eq!(server.metrics().fallback_count(), 1);

    // Every mesh shares the one fallback material
    vfs.insert("props/barrel.mesh", quad(AssetId::new()).to_bytes().unwrap());
    let other = server
        .load_sync::<Mesh<MockGpu>>("props/barrel.mesh", &main)
        .unwrap();
    assert!(Arc::ptr_eq(&mesh.material, &other.material));
    assert_eq!(server.metrics().fallback_count(), 2);
}

#[test]
fn test_mesh_resolves_material_and_texture_by_id() {
    let (server, vfs, queue) = server(MockSpawner::blocking());
    let registry = server.registry();

    let texture_id = registry.register_file(AssetId::new(), &VirtualPath::new("textures/wood.png"));
    let material_id =
        registry.register_file(AssetId::new(), &VirtualPath::new("materials/wood.mat"));
    vfs.insert("textures/wood.png", png(4));
    vfs.insert(
        "materials/wood.mat",
        MaterialFile {
            name: "wood".into(),
            base_color_texture: Some(texture_id),
            ..Default::default()
        }
        .to_bytes()
        .unwrap(),
    );
    vfs.insert("props/crate.mesh", quad(material_id).to_bytes().unwrap());

    let main = MainThread::claim();
    let mesh = server.load::<Mesh<MockGpu>>("props/crate.mesh").unwrap();
    queue.drain(&main);

    let mesh = mesh.value().unwrap();
    assert_eq!(mesh.material.id, material_id);
    assert_eq!(mesh.material.texture.as_ref().unwrap().id, texture_id);
    assert_eq!(server.metrics().fallback_count(), 0);

    // The dependency landed in the cache under its own path
    let material = server
        .load_sync::<Material<MockGpu>>("materials/wood.mat", &main)
        .unwrap();
    assert!(Arc::ptr_eq(&material, &mesh.material));
}

#[test]
fn test_load_by_id() {
    let (server, vfs, queue) = server(MockSpawner::blocking());
    let id = server
        .registry()
        .register_file(AssetId::new(), &VirtualPath::new("a.png"));
    vfs.insert("a.png", png(2));

    let main = MainThread::claim();
    let reference = server.load_by_id::<Texture<MockGpu>>(id).unwrap();
    queue.drain(&main);
    assert_eq!(reference.value().unwrap().id, id);
    assert_eq!(reference.path(), &VirtualPath::new("a.png"));
}

#[test]
fn test_invalidate_forces_reload() {
    let (server, vfs, queue) = server(MockSpawner::blocking());
    vfs.insert("a.png", png(2));
    let main = MainThread::claim();

    let first = server.load::<Texture<MockGpu>>("a.png").unwrap();
    queue.drain(&main);
    assert_eq!(server.invalidate("a.png"), 1);

    vfs.insert("a.png", png(6));
    let second = server.load::<Texture<MockGpu>>("a.png").unwrap();
    queue.drain(&main);
    assert!(!second.ptr_eq(&first));
    assert_eq!(second.value().unwrap().width, 6);
    assert_eq!(first.value().unwrap().width, 2);
}

#[test]
fn test_open_project_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let layout = ProjectLayout::new(dir.path());
    let file = layout.resolve(&VirtualPath::new("textures/brick.png"));
    std::fs::create_dir_all(file.parent().unwrap()).unwrap();
    std::fs::write(&file, png(4)).unwrap();

    let queue = Arc::new(MainThreadQueue::new());
    let server: Server =
        AssetServer::open(&layout, MockGpu::new(), MockSpawner::blocking(), queue.clone())
            .unwrap();
    server.register_default_loaders();
    let id = server.registry().lookup_id(&VirtualPath::new("textures/brick.png"));
    assert!(!id.is_nil());

    let main = MainThread::claim();
    let texture = server
        .load_sync::<Texture<MockGpu>>("textures/brick.png", &main)
        .unwrap();
    assert_eq!(texture.id, id);
}

#[cfg(feature = "runtime-tokio")]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tokio_background_load() {
    use kiln_asset::TokioSpawner;

    let vfs = MemoryFileSystem::new();
    vfs.insert("big.png", png(64));
    let queue = Arc::new(MainThreadQueue::new());
    let server = AssetServer::new(
        IdentityRegistry::in_memory(),
        vfs,
        MockGpu::new(),
        TokioSpawner::new(),
        queue.clone(),
    );
    server.register_default_loaders();

    let main = MainThread::claim();
    let reference = server.load::<Texture<MockGpu>>("big.png").unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    while reference.is_pending() && Instant::now() < deadline {
        queue.drain(&main);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(reference.value().unwrap().width, 64);
}
