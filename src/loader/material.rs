//! Material files (`.mat`)

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::texture::Texture;
use super::{AssetLoader, LoadContext};
use crate::dispatch::MainThread;
use crate::error::{AssetError, Result};
use crate::gpu::{GpuDevice, MaterialDescriptor};
use crate::id::AssetId;
use crate::path::VirtualPath;

/// On-disk material description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialFile {
    pub name: String,
    pub base_color: [f32; 4],
    pub metallic: f32,
    pub roughness: f32,
    pub emissive: [f32; 3],
    /// Texture sampled for the base colour
    pub base_color_texture: Option<AssetId>,
}

impl Default for MaterialFile {
    fn default() -> Self {
        let desc = MaterialDescriptor::default();
        Self {
            name: String::new(),
            base_color: desc.base_color,
            metallic: desc.metallic,
            roughness: desc.roughness,
            emissive: desc.emissive,
            base_color_texture: None,
        }
    }
}

impl MaterialFile {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serde::encode_to_vec(
            self,
            bincode::config::standard(),
        )?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (file, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())?;
        Ok(file)
    }

    fn descriptor(&self) -> MaterialDescriptor {
        MaterialDescriptor {
            base_color: self.base_color,
            metallic: self.metallic,
            roughness: self.roughness,
            emissive: self.emissive,
        }
    }
}

/// A material resident on the GPU
#[derive(Debug, Clone)]
pub struct Material<G: GpuDevice> {
    pub id: AssetId,
    pub name: String,
    pub texture: Option<Arc<Texture<G>>>,
    pub handle: G::Material,
}

/// Loads `.mat` files, resolving their texture while finalizing
#[derive(Debug, Default, Clone, Copy)]
pub struct MaterialLoader;

impl MaterialLoader {
    pub fn new() -> Self {
        Self
    }
}

impl<G: GpuDevice> AssetLoader<G> for MaterialLoader {
    type Asset = Material<G>;
    type Decoded = MaterialFile;

    fn extensions(&self) -> &[&'static str] {
        &["mat"]
    }

    fn decode(&self, path: &VirtualPath, bytes: Vec<u8>) -> Result<MaterialFile> {
        MaterialFile::from_bytes(&bytes).map_err(|e| AssetError::decode(path, e))
    }

    fn finalize(
        &self,
        file: MaterialFile,
        cx: &LoadContext<'_, G>,
        main: &MainThread,
    ) -> Result<Material<G>> {
        // A material without its texture still renders
        let texture = file.base_color_texture.and_then(|id| {
            cx.load_dependency::<Texture<G>>(id, main)
                .map_err(|e| cx.record_fallback(id, &e))
                .ok()
        });
        let handle = cx
            .gpu()
            .create_material(&file.descriptor(), texture.as_ref().map(|t| &t.handle))?;

        Ok(Material {
            id: cx.asset_id(),
            name: file.name,
            texture,
            handle,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_material_file_bytes() {
        let file = MaterialFile {
            name: "brick".into(),
            base_color_texture: Some(AssetId::new()),
            ..Default::default()
        };
        assert_eq!(MaterialFile::from_bytes(&file.to_bytes().unwrap()).unwrap(), file);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let result = AssetLoader::<crate::gpu::MockGpu>::decode(
            &MaterialLoader,
            &VirtualPath::new("broken.mat"),
            vec![0xFF; 4],
        );
        assert!(matches!(result, Err(AssetError::Decode { .. })));
    }
}
