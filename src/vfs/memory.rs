use std::collections::BTreeMap;
use std::io::{Cursor, ErrorKind, Read};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::FileSystem;
use crate::error::{AssetError, Result};
use crate::path::VirtualPath;

/// In-memory file tree for tests and tools
///
/// Clones share the same files. Every successful `open`/`open_stream`
/// bumps a read counter.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileSystem {
    files: Arc<RwLock<BTreeMap<VirtualPath, Arc<Vec<u8>>>>>,
    reads: Arc<AtomicUsize>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<VirtualPath>, bytes: impl Into<Vec<u8>>) {
        self.files
            .write()
            .insert(path.into(), Arc::new(bytes.into()));
    }

    pub fn remove(&self, path: &VirtualPath) -> bool {
        self.files.write().remove(path).is_some()
    }

    /// Number of successful reads so far
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn get(&self, path: &VirtualPath) -> Result<Arc<Vec<u8>>> {
        let bytes = self.files.read().get(path).cloned().ok_or_else(|| {
            AssetError::Io(std::io::Error::new(
                ErrorKind::NotFound,
                format!("{} not found", path),
            ))
        })?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(bytes)
    }
}

impl FileSystem for MemoryFileSystem {
    fn open(&self, path: &VirtualPath) -> Result<Vec<u8>> {
        Ok(self.get(path)?.as_ref().clone())
    }

    fn open_stream(&self, path: &VirtualPath) -> Result<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(self.open(path)?)))
    }

    fn exists(&self, path: &VirtualPath) -> bool {
        let files = self.files.read();
        files.contains_key(path) || files.keys().any(|file| is_under(file, path))
    }

    fn enumerate_current_level(&self, path: &VirtualPath) -> Result<Vec<VirtualPath>> {
        let files = self.files.read();
        let mut children: Vec<VirtualPath> = files
            .keys()
            .filter(|file| is_under(file, path))
            .filter_map(|file| {
                let rest = if path.is_empty() {
                    file.as_str()
                } else {
                    &file.as_str()[path.as_str().len() + 1..]
                };
                rest.split('/').next().map(|child| path.join(child))
            })
            .collect();
        children.sort();
        children.dedup();
        Ok(children)
    }

    fn resolve_path(&self, path: &VirtualPath) -> PathBuf {
        PathBuf::from(path.as_str())
    }
}

fn is_under(file: &VirtualPath, dir: &VirtualPath) -> bool {
    if dir.is_empty() {
        return true;
    }
    file.as_str()
        .strip_prefix(dir.as_str())
        .is_some_and(|rest| rest.starts_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_counts_reads() {
        let vfs = MemoryFileSystem::new();
        vfs.insert("a.png", vec![1, 2, 3]);

        assert_eq!(vfs.open(&VirtualPath::new("a.png")).unwrap(), vec![1, 2, 3]);
        assert!(vfs.open(&VirtualPath::new("b.png")).is_err());
        assert_eq!(vfs.reads(), 1);
    }

    #[test]
    fn test_enumerate_current_level() {
        let vfs = MemoryFileSystem::new();
        vfs.insert("meshes/rock.mesh", vec![]);
        vfs.insert("meshes/rock.mat", vec![]);
        vfs.insert("meshes/lod/rock1.mesh", vec![]);
        vfs.insert("top.png", vec![]);

        let root = vfs.enumerate_current_level(&VirtualPath::empty()).unwrap();
        assert_eq!(root, vec![VirtualPath::new("meshes"), VirtualPath::new("top.png")]);

        let meshes = vfs
            .enumerate_current_level(&VirtualPath::new("meshes"))
            .unwrap();
        assert_eq!(
            meshes,
            vec![
                VirtualPath::new("meshes/lod"),
                VirtualPath::new("meshes/rock.mat"),
                VirtualPath::new("meshes/rock.mesh"),
            ]
        );
        assert!(vfs.exists(&VirtualPath::new("meshes/lod")));
        assert!(!vfs.exists(&VirtualPath::new("mesh")));
    }
}
