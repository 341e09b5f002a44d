//! Persistent bijection between asset ids and virtual paths
//!
//! The registry is opened once per project. Opening reads the registry file,
//! reconciles it against the files actually present under the asset root
//! (new files get fresh ids, vanished files lose theirs) and writes the
//! result straight back. After that it is mutated by loaders (new ids) and
//! by the change watcher (renames, creations, deletions).
//!
//! All state sits behind one `RwLock`, so lookups never observe a rename
//! half-applied and a save always serializes a consistent snapshot.

mod file;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use parking_lot::RwLock;
use walkdir::WalkDir;

use crate::config::ProjectLayout;
use crate::error::{AssetError, Result};
use crate::id::AssetId;
use crate::kind::AssetKind;
use crate::path::VirtualPath;

pub(crate) use file::temp_path;
use file::RegistryFile;

/// One `(id, path)` binding
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssetRecord {
    pub id: AssetId,
    pub path: VirtualPath,
}

impl AssetRecord {
    /// Kind of the file, judged by its extension
    pub fn kind(&self) -> AssetKind {
        AssetKind::of(&self.path)
    }
}

#[derive(Debug)]
struct Maps {
    by_id: HashMap<AssetId, VirtualPath>,
    by_path: HashMap<VirtualPath, AssetId>,
    last_write: SystemTime,
}

impl Default for Maps {
    fn default() -> Self {
        Self {
            by_id: HashMap::new(),
            by_path: HashMap::new(),
            last_write: SystemTime::UNIX_EPOCH,
        }
    }
}

impl Maps {
    fn from_file(file: RegistryFile) -> Self {
        let mut maps = Maps {
            last_write: file.last_write,
            ..Default::default()
        };
        for (id, raw) in file.metadata {
            let path = VirtualPath::new(raw);
            if id.is_nil() || path.is_empty() {
                continue;
            }
            if maps.by_path.contains_key(&path) {
                log::warn!("Registry binds {} twice; keeping one id", path);
                continue;
            }
            maps.bind(id, path);
        }
        maps
    }

    fn to_file(&self) -> RegistryFile {
        RegistryFile {
            last_write: self.last_write,
            metadata: self
                .by_id
                .iter()
                .map(|(id, path)| (*id, path.as_str().to_string()))
                .collect(),
        }
    }

    fn bind(&mut self, id: AssetId, path: VirtualPath) {
        self.by_id.insert(id, path.clone());
        self.by_path.insert(path, id);
    }

    fn unbind_path(&mut self, path: &VirtualPath) -> Option<AssetId> {
        let id = self.by_path.remove(path)?;
        self.by_id.remove(&id);
        Some(id)
    }

    fn register(&mut self, id: AssetId, path: VirtualPath) -> AssetId {
        if let Some(existing) = self.by_path.get(&path) {
            return *existing;
        }
        // The id already names another file (e.g. a copy): the new path gets its own
        let id = if id.is_nil() || self.by_id.contains_key(&id) {
            AssetId::new()
        } else {
            id
        };
        self.bind(id, path);
        id
    }
}

/// The project's id <-> path map
#[derive(Debug)]
pub struct IdentityRegistry {
    file: Option<PathBuf>,
    maps: RwLock<Maps>,
}

impl IdentityRegistry {
    /// Load, reconcile and persist the registry of a project
    ///
    /// A missing or malformed registry file is treated as empty; either way a
    /// valid file is written before this returns.
    pub fn open(layout: &ProjectLayout) -> Result<Self> {
        let file = layout.registry_path();
        let mut maps = match RegistryFile::read(&file) {
            Ok(Some(stored)) => Maps::from_file(stored),
            Ok(None) => Maps::default(),
            Err(AssetError::MalformedRegistry(reason)) => {
                log::warn!(
                    "Registry {} is malformed ({}); rebuilding from disk",
                    file.display(),
                    reason
                );
                Maps::default()
            }
            Err(e) => return Err(e),
        };

        let on_disk = scan(layout);
        let mut minted = 0usize;
        for path in &on_disk {
            if !maps.by_path.contains_key(path) {
                maps.bind(AssetId::new(), path.clone());
                minted += 1;
            }
        }
        let orphans: Vec<VirtualPath> = maps
            .by_path
            .keys()
            .filter(|path| !on_disk.contains(*path))
            .cloned()
            .collect();
        for path in &orphans {
            maps.unbind_path(path);
        }
        log::debug!(
            "Registry reconciled: {} files, {} new ids, {} orphans removed",
            on_disk.len(),
            minted,
            orphans.len()
        );

        let registry = Self {
            file: Some(file),
            maps: RwLock::new(maps),
        };
        registry.save()?;
        log::info!(
            "Opened asset registry with {} records at {}",
            registry.len(),
            layout.registry_path().display()
        );
        Ok(registry)
    }

    /// A registry that is never written to disk
    pub fn in_memory() -> Self {
        Self {
            file: None,
            maps: RwLock::new(Maps::default()),
        }
    }

    /// Bind `path` to `id` unless the path is already bound
    ///
    /// Returns the id that ends up bound to `path`: the existing one when the
    /// path was already registered, a freshly minted one when `id` is nil or
    /// already names a different path, and `id` otherwise. The empty path is
    /// never bound and yields [`AssetId::NIL`].
    pub fn register_file(&self, id: AssetId, path: &VirtualPath) -> AssetId {
        if path.is_empty() {
            return AssetId::NIL;
        }
        self.maps.write().register(id, path.clone())
    }

    /// Bound id of `path`, minting one when unbound
    ///
    /// The flag is `true` when a new binding was created.
    pub fn ensure_id(&self, path: &VirtualPath) -> (AssetId, bool) {
        if path.is_empty() {
            return (AssetId::NIL, false);
        }
        if let Some(id) = self.maps.read().by_path.get(path) {
            return (*id, false);
        }
        let mut maps = self.maps.write();
        let before = maps.by_path.len();
        let id = maps.register(AssetId::new(), path.clone());
        (id, maps.by_path.len() != before)
    }

    /// Move the id bound to `from` over to `to`
    ///
    /// Returns `false` (and changes nothing) when `from` is unbound. A
    /// different id previously bound to `to` is dropped, since that file has
    /// just been replaced.
    pub fn rename(&self, from: &VirtualPath, to: &VirtualPath) -> bool {
        if to.is_empty() {
            return false;
        }
        let mut maps = self.maps.write();
        if !maps.by_path.contains_key(from) {
            return false;
        }
        if from == to {
            return true;
        }
        if let Some(displaced) = maps.unbind_path(to) {
            log::debug!("{} replaced asset {}", to, displaced);
        }
        if let Some(id) = maps.unbind_path(from) {
            maps.bind(id, to.clone());
        }
        true
    }

    /// Drop the binding of `path`, returning the id it had
    pub fn remove(&self, path: &VirtualPath) -> Option<AssetId> {
        self.maps.write().unbind_path(path)
    }

    /// Path bound to `id`; the empty path when unbound
    pub fn lookup_path(&self, id: AssetId) -> VirtualPath {
        self.maps
            .read()
            .by_id
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    /// Id bound to `path`; [`AssetId::NIL`] when unbound
    pub fn lookup_id(&self, path: &VirtualPath) -> AssetId {
        self.maps
            .read()
            .by_path
            .get(path)
            .copied()
            .unwrap_or(AssetId::NIL)
    }

    pub fn contains_path(&self, path: &VirtualPath) -> bool {
        self.maps.read().by_path.contains_key(path)
    }

    pub fn contains_id(&self, id: AssetId) -> bool {
        self.maps.read().by_id.contains_key(&id)
    }

    /// Snapshot of every binding, ordered by path
    pub fn records(&self) -> Vec<AssetRecord> {
        let maps = self.maps.read();
        let mut records: Vec<AssetRecord> = maps
            .by_path
            .iter()
            .map(|(path, id)| AssetRecord {
                id: *id,
                path: path.clone(),
            })
            .collect();
        records.sort_by(|a, b| a.path.cmp(&b.path));
        records
    }

    pub fn len(&self) -> usize {
        self.maps.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.read().by_id.is_empty()
    }

    /// Time of the last successful save
    pub fn last_write(&self) -> SystemTime {
        self.maps.read().last_write
    }

    /// Where the registry is persisted; `None` for in-memory registries
    pub fn file_path(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    /// Rewrite the registry file with the current bindings
    ///
    /// Holds the write lock for the whole save so no mutation can interleave
    /// with serialization.
    pub fn save(&self) -> Result<()> {
        let mut maps = self.maps.write();
        let Some(path) = &self.file else {
            maps.last_write = SystemTime::now();
            return Ok(());
        };
        let previous = maps.last_write;
        maps.last_write = SystemTime::now();
        if let Err(e) = maps.to_file().write_atomic(path) {
            maps.last_write = previous;
            return Err(e);
        }
        log::debug!("Saved {} registry records", maps.by_id.len());
        Ok(())
    }
}

/// Every file under the asset root, as virtual paths
fn scan(layout: &ProjectLayout) -> HashSet<VirtualPath> {
    let root = layout.asset_root();
    if !root.is_dir() {
        return HashSet::new();
    }
    WalkDir::new(&root)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::warn!("Skipping unreadable entry during registry scan: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| !layout.is_registry_file(entry.path()))
        .filter_map(|entry| {
            let relative = entry.path().strip_prefix(&root).ok()?;
            let path = VirtualPath::new(relative.to_string_lossy());
            (!path.is_empty()).then_some(path)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let registry = IdentityRegistry::in_memory();
        let id = AssetId::new();
        let path = VirtualPath::new("textures/a.png");

        assert_eq!(registry.register_file(id, &path), id);
        assert_eq!(registry.lookup_id(&path), id);
        assert_eq!(registry.lookup_path(id), path);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_misses_return_sentinels() {
        let registry = IdentityRegistry::in_memory();
        assert!(registry.lookup_id(&VirtualPath::new("nope")).is_nil());
        assert!(registry.lookup_path(AssetId::new()).is_empty());
    }

    #[test]
    fn test_first_writer_wins() {
        let registry = IdentityRegistry::in_memory();
        let path = VirtualPath::new("x");
        let first = AssetId::new();
        registry.register_file(first, &path);

        assert_eq!(registry.register_file(AssetId::new(), &path), first);
        assert_eq!(registry.lookup_id(&path), first);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_id_bound_elsewhere_gets_fresh_id() {
        let registry = IdentityRegistry::in_memory();
        let id = AssetId::new();
        registry.register_file(id, &VirtualPath::new("a.png"));

        let copy = registry.register_file(id, &VirtualPath::new("a_copy.png"));
        assert_ne!(copy, id);
        assert!(!copy.is_nil());
        assert_eq!(registry.lookup_path(id).as_str(), "a.png");
    }

    #[test]
    fn test_empty_path_is_never_bound() {
        let registry = IdentityRegistry::in_memory();
        assert!(registry
            .register_file(AssetId::new(), &VirtualPath::empty())
            .is_nil());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_rename_unbound_is_noop() {
        let registry = IdentityRegistry::in_memory();
        assert!(!registry.rename(&VirtualPath::new("a"), &VirtualPath::new("b")));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_rename_over_bound_path_drops_displaced_id() {
        let registry = IdentityRegistry::in_memory();
        let a = registry.register_file(AssetId::new(), &VirtualPath::new("a"));
        let b = registry.register_file(AssetId::new(), &VirtualPath::new("b"));

        assert!(registry.rename(&VirtualPath::new("a"), &VirtualPath::new("b")));
        assert_eq!(registry.lookup_id(&VirtualPath::new("b")), a);
        assert!(!registry.contains_id(b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_ensure_id_reports_creation() {
        let registry = IdentityRegistry::in_memory();
        let path = VirtualPath::new("m.mat");
        let (id, created) = registry.ensure_id(&path);
        assert!(created);
        assert_eq!(registry.ensure_id(&path), (id, false));
    }

    #[test]
    fn test_in_memory_save_stamps_time() {
        let registry = IdentityRegistry::in_memory();
        registry.save().unwrap();
        assert!(registry.last_write() > SystemTime::UNIX_EPOCH);
        assert!(registry.file_path().is_none());
    }
}
