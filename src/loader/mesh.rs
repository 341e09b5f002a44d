//! Mesh files (`.mesh`) and the vertex layout they use

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::material::Material;
use super::{AssetLoader, LoadContext};
use crate::dispatch::MainThread;
use crate::error::{AssetError, Result};
use crate::gpu::{BufferUsage, GpuDevice, MaterialDescriptor};
use crate::id::AssetId;
use crate::path::VirtualPath;

/// A vertex with position, normal, UV, tangent, and color data
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    /// Tangent vector (xyz + w handedness)
    pub tangent: [f32; 4],
    pub color: [f32; 4],
}

impl Default for Vertex {
    fn default() -> Self {
        Self::new([0.0; 3], [0.0, 0.0, 1.0], [0.0; 2])
    }
}

impl Vertex {
    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
            tangent: [1.0, 0.0, 0.0, 1.0],
            color: [1.0, 1.0, 1.0, 1.0],
        }
    }

    pub fn with_color(mut self, color: [f32; 4]) -> Self {
        self.color = color;
        self
    }

    /// Size of a vertex in bytes
    pub const fn size() -> usize {
        std::mem::size_of::<Self>()
    }
}

/// On-disk mesh: geometry plus the id of its material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshFile {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub material: AssetId,
}

impl MeshFile {
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

    fn validate(&self) -> std::result::Result<(), String> {
        if self.vertices.is_empty() || self.indices.is_empty() {
            return Err("mesh has no geometry".to_string());
        }
        if let Some(bad) = self
            .indices
            .iter()
            .find(|i| **i as usize >= self.vertices.len())
        {
            return Err(format!(
                "index {} out of range for {} vertices",
                bad,
                self.vertices.len()
            ));
        }
        Ok(())
    }
}

/// A mesh resident on the GPU
#[derive(Debug, Clone)]
pub struct Mesh<G: GpuDevice> {
    pub id: AssetId,
    pub vertex_buffer: G::Buffer,
    pub index_buffer: G::Buffer,
    pub vertex_count: u32,
    pub index_count: u32,
    pub material: Arc<Material<G>>,
}

/// Loads `.mesh` files
///
/// A mesh whose material can't be resolved gets the loader's fallback
/// material instead; the mesh load itself still succeeds.
pub struct MeshLoader<G: GpuDevice> {
    fallback: Mutex<Option<Arc<Material<G>>>>,
}

impl<G: GpuDevice> Default for MeshLoader<G> {
    fn default() -> Self {
        Self {
            fallback: Mutex::new(None),
        }
    }
}

impl<G: GpuDevice> MeshLoader<G> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Designated stand-in for unresolved materials (magenta, id nil)
    ///
    /// Created on first use and shared by every mesh afterwards.
    pub fn fallback_material(&self, gpu: &G, _main: &MainThread) -> Result<Arc<Material<G>>> {
        let mut fallback = self.fallback.lock();
        if let Some(material) = &*fallback {
            return Ok(Arc::clone(material));
        }
        let desc = MaterialDescriptor {
            base_color: [1.0, 0.0, 1.0, 1.0],
            ..Default::default()
        };
        let material = Arc::new(Material {
            id: AssetId::NIL,
            name: "fallback".to_string(),
            texture: None,
            handle: gpu.create_material(&desc, None)?,
        });
        *fallback = Some(Arc::clone(&material));
        Ok(material)
    }

    fn resolve_material(
        &self,
        id: AssetId,
        cx: &LoadContext<'_, G>,
        main: &MainThread,
    ) -> Result<Arc<Material<G>>> {
        if id.is_nil() {
            log::debug!("{} names no material", cx.path());
            return self.fallback_material(cx.gpu(), main);
        }
        match cx.load_dependency::<Material<G>>(id, main) {
            Ok(material) => Ok(material),
            Err(e) => {
                cx.record_fallback(id, &e);
                self.fallback_material(cx.gpu(), main)
            }
        }
    }
}

impl<G: GpuDevice> AssetLoader<G> for MeshLoader<G> {
    type Asset = Mesh<G>;
    type Decoded = MeshFile;

    fn extensions(&self) -> &[&'static str] {
        &["mesh"]
    }

    fn decode(&self, path: &VirtualPath, bytes: Vec<u8>) -> Result<MeshFile> {
        let file = MeshFile::from_bytes(&bytes).map_err(|e| AssetError::decode(path, e))?;
        file.validate().map_err(|e| AssetError::decode(path, e))?;
        Ok(file)
    }

    fn finalize(
        &self,
        file: MeshFile,
        cx: &LoadContext<'_, G>,
        main: &MainThread,
    ) -> Result<Mesh<G>> {
        let gpu = cx.gpu();
        let vertex_bytes: &[u8] = bytemuck::cast_slice(&file.vertices);
        let vertex_buffer = gpu.allocate_buffer(vertex_bytes.len(), BufferUsage::Vertex)?;
        gpu.upload_buffer_data(&vertex_buffer, 0, vertex_bytes)?;

        let index_bytes: &[u8] = bytemuck::cast_slice(&file.indices);
        let index_buffer = gpu.allocate_buffer(index_bytes.len(), BufferUsage::Index)?;
        gpu.upload_buffer_data(&index_buffer, 0, index_bytes)?;

        let material = self.resolve_material(file.material, cx, main)?;

        Ok(Mesh {
            id: cx.asset_id(),
            vertex_buffer,
            index_buffer,
            vertex_count: file.vertices.len() as u32,
            index_count: file.indices.len() as u32,
            material,
        })
    }
}
