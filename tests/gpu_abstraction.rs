//! Integration tests for GPU abstraction layer

use kiln_asset::{
    BufferUsage, GpuDevice, GpuError, GpuTextureFormat, MaterialDescriptor, MockGpu,
    TextureDescriptor,
};

#[test]
fn test_mock_gpu_integration() {
    let gpu = MockGpu::new();

    let buffer = gpu.allocate_buffer(1024, BufferUsage::Vertex).unwrap();
    gpu.upload_buffer_data(&buffer, 0, &[1u8, 2, 3, 4]).unwrap();

    assert!(buffer.size() >= 1024);
    assert_eq!(&buffer.read_data()[..4], &[1, 2, 3, 4]);
    assert_eq!(gpu.allocated_bytes(), 1024);
}

#[test]
fn test_texture_and_material_creation() {
    let gpu = MockGpu::new();
    let desc = TextureDescriptor {
        width: 2,
        height: 2,
        format: GpuTextureFormat::Rgba8Srgb,
        mip_levels: 1,
    };
    let texture = gpu.create_texture(&desc, &[255u8; 16]).unwrap();
    let material = gpu
        .create_material(&MaterialDescriptor::default(), Some(&texture))
        .unwrap();

    assert_eq!(material.texture, Some(texture.id));
    assert_eq!(gpu.textures_created(), 1);
    assert_eq!(gpu.materials_created(), 1);
}

#[test]
fn test_texture_size_mismatch_is_rejected() {
    let gpu = MockGpu::new();
    let desc = TextureDescriptor {
        width: 4,
        height: 4,
        ..Default::default()
    };
    let result = gpu.create_texture(&desc, &[0u8; 3]);
    assert!(matches!(result, Err(GpuError::TextureCreationFailed(_))));
}

#[test]
fn test_gpu_trait_bound() {
    fn use_gpu<G: GpuDevice>(gpu: &G) -> &'static str {
        let _ = gpu.allocate_buffer(64, BufferUsage::Uniform);
        gpu.backend_name()
    }

    assert_eq!(use_gpu(&MockGpu::new()), "Mock");
}
