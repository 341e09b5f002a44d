//! Path resolution and raw IO behind the loaders
//!
//! Loaders and the server only ever see virtual paths; a [`FileSystem`]
//! turns them into bytes. Implementations do no caching of their own.

mod disk;
mod memory;

use std::io::Read;
use std::path::PathBuf;

use crate::error::Result;
use crate::path::VirtualPath;

pub use disk::DiskFileSystem;
pub use memory::MemoryFileSystem;

pub trait FileSystem: Send + Sync + 'static {
    /// Read the whole file
    fn open(&self, path: &VirtualPath) -> Result<Vec<u8>>;

    /// Open the file for incremental reading
    fn open_stream(&self, path: &VirtualPath) -> Result<Box<dyn Read + Send>>;

    fn exists(&self, path: &VirtualPath) -> bool;

    /// Direct children (files and directories) of a directory
    fn enumerate_current_level(&self, path: &VirtualPath) -> Result<Vec<VirtualPath>>;

    /// Absolute location backing `path`
    fn resolve_path(&self, path: &VirtualPath) -> PathBuf;
}
