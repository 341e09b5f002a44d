//! Renderer-facing resource construction
//!
//! Loaders never touch a graphics API directly. They describe what they need
//! and hand the description to a [`GpuDevice`] from the main thread; the
//! device's associated types are opaque to the rest of the pipeline.

pub mod mock;

use std::fmt::Debug;
use thiserror::Error;

/// Error type for GPU operations
#[derive(Error, Debug)]
pub enum GpuError {
    #[error("Buffer allocation failed: {0}")]
    AllocationFailed(String),

    #[error("Buffer upload failed: {0}")]
    UploadFailed(String),

    #[error("Texture creation failed: {0}")]
    TextureCreationFailed(String),

    #[error("Material creation failed: {0}")]
    MaterialCreationFailed(String),

    #[error("Invalid buffer size: {0}")]
    InvalidSize(usize),

    #[error("Device lost")]
    DeviceLost,
}

/// Result type for GPU operations
pub type GpuResult<T> = Result<T, GpuError>;

/// Buffer usage flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    Vertex,
    Index,
    Uniform,
}

/// Texture format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuTextureFormat {
    /// RGBA 8-bit with sRGB color space
    Rgba8Srgb,
    /// RGBA 8-bit unorm
    Rgba8Unorm,
}

/// Texture descriptor for creation
#[derive(Debug, Clone)]
pub struct TextureDescriptor {
    pub width: u32,
    pub height: u32,
    pub format: GpuTextureFormat,
    /// Number of mip levels (1 = no mipmaps)
    pub mip_levels: u32,
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self {
            width: 1,
            height: 1,
            format: GpuTextureFormat::Rgba8Srgb,
            mip_levels: 1,
        }
    }
}

/// Surface parameters of a material
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialDescriptor {
    pub base_color: [f32; 4],
    pub metallic: f32,
    pub roughness: f32,
    pub emissive: [f32; 3],
}

impl Default for MaterialDescriptor {
    fn default() -> Self {
        Self {
            base_color: [1.0, 1.0, 1.0, 1.0],
            metallic: 0.0,
            roughness: 0.5,
            emissive: [0.0; 3],
        }
    }
}

/// Backend that builds GPU-resident resources
///
/// Every method is called from the main thread only; the pipeline enforces
/// that by requiring a [`crate::MainThread`] token on the code paths that
/// reach the device. Handles may still be cloned into other threads.
pub trait GpuDevice: Send + Sync + Clone + Debug + 'static {
    type Buffer: Clone + Send + Sync + Debug;
    type Texture: Clone + Send + Sync + Debug;
    type Material: Clone + Send + Sync + Debug;

    /// Allocate a buffer of `size` bytes
    fn allocate_buffer(&self, size: usize, usage: BufferUsage) -> GpuResult<Self::Buffer>;

    /// Copy `data` into `buffer` at byte `offset`
    fn upload_buffer_data(
        &self,
        buffer: &Self::Buffer,
        offset: usize,
        data: &[u8],
    ) -> GpuResult<()>;

    /// Create a texture from tightly packed pixel data
    fn create_texture(&self, desc: &TextureDescriptor, data: &[u8]) -> GpuResult<Self::Texture>;

    /// Create a material, optionally sampling a base-colour texture
    fn create_material(
        &self,
        desc: &MaterialDescriptor,
        base_color_texture: Option<&Self::Texture>,
    ) -> GpuResult<Self::Material>;

    /// Get the name of this GPU backend (for debugging)
    fn backend_name(&self) -> &'static str;
}

pub use mock::MockGpu;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_texture_descriptor_default() {
        let desc = TextureDescriptor::default();
        assert_eq!(desc.width, 1);
        assert_eq!(desc.height, 1);
        assert_eq!(desc.mip_levels, 1);
    }

    #[test]
    fn test_material_descriptor_default_is_opaque_white() {
        let desc = MaterialDescriptor::default();
        assert_eq!(desc.base_color, [1.0; 4]);
        assert_eq!(desc.emissive, [0.0; 3]);
    }
}
