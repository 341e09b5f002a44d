//! Texture loading and processing

use std::io::Cursor;

use image::{ImageFormat, ImageReader};

use super::{AssetLoader, LoadContext};
use crate::dispatch::MainThread;
use crate::error::{AssetError, Result};
use crate::gpu::{GpuDevice, GpuTextureFormat, TextureDescriptor};
use crate::id::AssetId;
use crate::path::VirtualPath;

/// A texture resident on the GPU
#[derive(Debug, Clone)]
pub struct Texture<G: GpuDevice> {
    pub id: AssetId,
    pub width: u32,
    pub height: u32,
    pub handle: G::Texture,
}

/// Pixels decoded to tightly packed RGBA8
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Decodes PNG, JPEG, TGA and EXR images
#[derive(Debug, Default, Clone)]
pub struct TextureLoader {
    format: Option<GpuTextureFormat>,
}

impl TextureLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upload as `format` instead of sRGB
    pub fn with_format(format: GpuTextureFormat) -> Self {
        Self {
            format: Some(format),
        }
    }

    /// Decode image bytes; TGA has no signature, so the extension decides
    pub fn decode_image(&self, path: &VirtualPath, bytes: &[u8]) -> Result<DecodedImage> {
        let mut reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
        if reader.format().is_none() {
            if let Some(format) = path.extension().and_then(ImageFormat::from_extension) {
                reader.set_format(format);
            }
        }
        if reader.format().is_none() {
            return Err(AssetError::decode(path, "unrecognized image format"));
        }

        let rgba = reader.decode()?.into_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(DecodedImage {
            width,
            height,
            pixels: rgba.into_raw(),
        })
    }
}

impl<G: GpuDevice> AssetLoader<G> for TextureLoader {
    type Asset = Texture<G>;
    type Decoded = DecodedImage;

    fn extensions(&self) -> &[&'static str] {
        &["png", "jpg", "jpeg", "tga", "exr"]
    }

    fn decode(&self, path: &VirtualPath, bytes: Vec<u8>) -> Result<DecodedImage> {
        self.decode_image(path, &bytes)
    }

    fn finalize(
        &self,
        image: DecodedImage,
        cx: &LoadContext<'_, G>,
        _main: &MainThread,
    ) -> Result<Texture<G>> {
        let desc = TextureDescriptor {
            width: image.width,
            height: image.height,
            format: self.format.unwrap_or(GpuTextureFormat::Rgba8Srgb),
            mip_levels: 1,
        };
        let handle = cx.gpu().create_texture(&desc, &image.pixels)?;
        Ok(Texture {
            id: cx.asset_id(),
            width: image.width,
            height: image.height,
            handle,
        })
    }
}
