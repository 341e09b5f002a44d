//! On-disk registry format
//!
//! A single bincode record `{ last_write, metadata: id -> path }`, always
//! rewritten in full.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::error::{AssetError, Result};
use crate::id::AssetId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct RegistryFile {
    pub last_write: SystemTime,
    pub metadata: HashMap<AssetId, String>,
}

impl RegistryFile {
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serde::encode_to_vec(
            self,
            bincode::config::standard(),
        )?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (file, read) = bincode::serde::decode_from_slice::<Self, _>(
            bytes,
            bincode::config::standard(),
        )
        .map_err(|e| AssetError::MalformedRegistry(e.to_string()))?;
        if read != bytes.len() {
            return Err(AssetError::MalformedRegistry(format!(
                "{} trailing bytes",
                bytes.len() - read
            )));
        }
        Ok(file)
    }

    /// Read `path`; `Ok(None)` when there is no file yet
    pub fn read(path: &Path) -> Result<Option<Self>> {
        match fs::read(path) {
            Ok(bytes) => Self::decode(&bytes).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write to a sibling temp file, then rename it over `path`
    pub fn write_atomic(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = self.encode()?;
        let tmp = temp_path(path);
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

/// Sibling that [`RegistryFile::write_atomic`] writes before renaming
pub(crate) fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
