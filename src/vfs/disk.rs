use std::fs;
use std::io::{BufReader, Read};
use std::path::PathBuf;

use super::FileSystem;
use crate::config::ProjectLayout;
use crate::error::Result;
use crate::path::VirtualPath;

/// Files under a project's asset root
#[derive(Debug, Clone)]
pub struct DiskFileSystem {
    layout: ProjectLayout,
}

impl DiskFileSystem {
    pub fn new(layout: ProjectLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }
}

impl FileSystem for DiskFileSystem {
    fn open(&self, path: &VirtualPath) -> Result<Vec<u8>> {
        Ok(fs::read(self.layout.resolve(path))?)
    }

    fn open_stream(&self, path: &VirtualPath) -> Result<Box<dyn Read + Send>> {
        let file = fs::File::open(self.layout.resolve(path))?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn exists(&self, path: &VirtualPath) -> bool {
        self.layout.resolve(path).exists()
    }

    fn enumerate_current_level(&self, path: &VirtualPath) -> Result<Vec<VirtualPath>> {
        let mut children = Vec::new();
        for entry in fs::read_dir(self.layout.resolve(path))? {
            let entry = entry?;
            children.push(path.join(entry.file_name().to_string_lossy()));
        }
        children.sort();
        Ok(children)
    }

    fn resolve_path(&self, path: &VirtualPath) -> PathBuf {
        self.layout.resolve(path)
    }
}
