//! In-memory GPU device
//!
//! Keeps buffer and pixel data in host memory and counts what was created,
//! so loaders can be exercised without graphics hardware.

use super::{
    BufferUsage, GpuDevice, GpuError, GpuResult, GpuTextureFormat, MaterialDescriptor,
    TextureDescriptor,
};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Default)]
struct Counters {
    allocated_bytes: AtomicU64,
    textures: AtomicU64,
    materials: AtomicU64,
}

/// Host-memory [`GpuDevice`]; clones share counters
#[derive(Clone, Debug, Default)]
pub struct MockGpu {
    counters: Arc<Counters>,
}

impl MockGpu {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes allocated by buffers and textures so far
    pub fn allocated_bytes(&self) -> u64 {
        self.counters.allocated_bytes.load(Ordering::Relaxed)
    }

    /// Textures created so far
    pub fn textures_created(&self) -> u64 {
        self.counters.textures.load(Ordering::Relaxed)
    }

    /// Materials created so far
    pub fn materials_created(&self) -> u64 {
        self.counters.materials.load(Ordering::Relaxed)
    }
}

#[derive(Clone, Debug)]
pub struct MockBuffer {
    pub id: u64,
    pub data: Arc<RwLock<Vec<u8>>>,
    pub usage: BufferUsage,
}

impl MockBuffer {
    fn new(size: usize, usage: BufferUsage) -> Self {
        Self {
            id: next_id(),
            data: Arc::new(RwLock::new(vec![0u8; size])),
            usage,
        }
    }

    pub fn size(&self) -> usize {
        self.data.read().len()
    }

    pub fn read_data(&self) -> Vec<u8> {
        self.data.read().clone()
    }
}

#[derive(Clone, Debug)]
pub struct MockTexture {
    pub id: u64,
    pub width: u32,
    pub height: u32,
    pub format: GpuTextureFormat,
    pub data: Arc<Vec<u8>>,
}

#[derive(Clone, Debug)]
pub struct MockMaterial {
    pub id: u64,
    pub desc: MaterialDescriptor,
    /// Id of the sampled base-colour texture, if any
    pub texture: Option<u64>,
}

impl GpuDevice for MockGpu {
    type Buffer = MockBuffer;
    type Texture = MockTexture;
    type Material = MockMaterial;

    fn allocate_buffer(&self, size: usize, usage: BufferUsage) -> GpuResult<Self::Buffer> {
        if size == 0 {
            return Err(GpuError::InvalidSize(size));
        }
        self.counters
            .allocated_bytes
            .fetch_add(size as u64, Ordering::Relaxed);
        Ok(MockBuffer::new(size, usage))
    }

    fn upload_buffer_data(
        &self,
        buffer: &Self::Buffer,
        offset: usize,
        data: &[u8],
    ) -> GpuResult<()> {
        let mut buf_data = buffer.data.write();
        if offset + data.len() > buf_data.len() {
            return Err(GpuError::UploadFailed(format!(
                "Data exceeds buffer size: offset={}, data_len={}, buffer_size={}",
                offset,
                data.len(),
                buf_data.len()
            )));
        }
        buf_data[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn create_texture(&self, desc: &TextureDescriptor, data: &[u8]) -> GpuResult<Self::Texture> {
        if desc.width == 0 || desc.height == 0 {
            return Err(GpuError::TextureCreationFailed(
                "Invalid texture dimensions".to_string(),
            ));
        }
        let expected = desc.width as usize * desc.height as usize * 4;
        if data.len() != expected {
            return Err(GpuError::TextureCreationFailed(format!(
                "Expected {} bytes of RGBA data, got {}",
                expected,
                data.len()
            )));
        }

        self.counters
            .allocated_bytes
            .fetch_add(expected as u64, Ordering::Relaxed);
        self.counters.textures.fetch_add(1, Ordering::Relaxed);
        Ok(MockTexture {
            id: next_id(),
            width: desc.width,
            height: desc.height,
            format: desc.format,
            data: Arc::new(data.to_vec()),
        })
    }

    fn create_material(
        &self,
        desc: &MaterialDescriptor,
        base_color_texture: Option<&Self::Texture>,
    ) -> GpuResult<Self::Material> {
        if !(0.0..=1.0).contains(&desc.metallic) || !(0.0..=1.0).contains(&desc.roughness) {
            return Err(GpuError::MaterialCreationFailed(format!(
                "metallic/roughness out of range: {}/{}",
                desc.metallic, desc.roughness
            )));
        }
        self.counters.materials.fetch_add(1, Ordering::Relaxed);
        Ok(MockMaterial {
            id: next_id(),
            desc: desc.clone(),
            texture: base_color_texture.map(|t| t.id),
        })
    }

    fn backend_name(&self) -> &'static str {
        "Mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_gpu_allocate_and_upload() {
        let gpu = MockGpu::new();
        let buffer = gpu.allocate_buffer(16, BufferUsage::Index).unwrap();
        gpu.upload_buffer_data(&buffer, 4, &[1, 2, 3, 4]).unwrap();

        assert_eq!(buffer.size(), 16);
        assert_eq!(&buffer.read_data()[4..8], &[1, 2, 3, 4]);
        assert_eq!(gpu.allocated_bytes(), 16);
    }

    #[test]
    fn test_mock_gpu_upload_overflow() {
        let gpu = MockGpu::new();
        let buffer = gpu.allocate_buffer(10, BufferUsage::Vertex).unwrap();
        assert!(gpu.upload_buffer_data(&buffer, 0, &[0u8; 20]).is_err());
    }

    #[test]
    fn test_mock_gpu_zero_size_buffer() {
        let gpu = MockGpu::new();
        assert!(gpu.allocate_buffer(0, BufferUsage::Vertex).is_err());
    }

    #[test]
    fn test_mock_gpu_texture_size_checked() {
        let gpu = MockGpu::new();
        let desc = TextureDescriptor {
            width: 2,
            height: 2,
            ..Default::default()
        };
        assert!(gpu.create_texture(&desc, &[0u8; 3]).is_err());

        let texture = gpu.create_texture(&desc, &[0u8; 16]).unwrap();
        assert_eq!(texture.width, 2);
        assert_eq!(gpu.textures_created(), 1);
    }

    #[test]
    fn test_mock_gpu_material_links_texture() {
        let gpu = MockGpu::new();
        let texture = gpu
            .create_texture(&TextureDescriptor::default(), &[255u8; 4])
            .unwrap();
        let material = gpu
            .create_material(&MaterialDescriptor::default(), Some(&texture))
            .unwrap();

        assert_eq!(material.texture, Some(texture.id));
        assert_eq!(gpu.materials_created(), 1);
    }

    #[test]
    fn test_mock_gpu_clones_share_counters() {
        let gpu1 = MockGpu::new();
        let _buffer = gpu1.allocate_buffer(1024, BufferUsage::Vertex).unwrap();

        let gpu2 = gpu1.clone();
        assert_eq!(gpu2.allocated_bytes(), 1024);
    }
}
