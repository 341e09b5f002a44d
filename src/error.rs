//! Error types for kiln_asset

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::id::AssetId;

/// Main error type for asset operations
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("No loader registered for type {type_name}")]
    MissingLoader { type_name: &'static str },

    #[error("File is still being written: {}", .0.display())]
    NotReady(PathBuf),

    #[error("File not ready after {waited:?}: {}", path.display())]
    Timeout { path: PathBuf, waited: Duration },

    #[error("Dependency {id} could not be resolved: {reason}")]
    MissingDependency { id: AssetId, reason: String },

    #[error("Registry file is malformed: {0}")]
    MalformedRegistry(String),

    #[error("No path is bound to asset id {0}")]
    UnresolvedId(AssetId),

    #[error("Failed to decode {path}: {message}")]
    Decode { path: String, message: String },

    #[error("Background load failed: {0}")]
    LoadFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("GPU error: {0}")]
    Gpu(#[from] crate::gpu::GpuError),

    #[error("Encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("Binary decode error: {0}")]
    BinaryDecode(#[from] bincode::error::DecodeError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AssetError {
    /// Build a decode error for `path`
    pub fn decode(path: impl std::fmt::Display, message: impl std::fmt::Display) -> Self {
        Self::Decode {
            path: path.to_string(),
            message: message.to_string(),
        }
    }
}

/// Result type alias for asset operations
pub type Result<T> = std::result::Result<T, AssetError>;
