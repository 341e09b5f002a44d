//! Coarse asset classification by file extension

use crate::path::VirtualPath;

/// What kind of content a file holds, judged by its extension alone
///
/// This is independent of which loaders are registered; use
/// [`crate::LoaderRegistry::guess_type`] to find the loader for a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Scene,
    Material,
    Mesh,
    Texture,
    Model,
    Unknown,
}

impl AssetKind {
    /// Classify a lowercase or mixed-case extension (with or without the dot)
    pub fn from_extension(ext: &str) -> Self {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        match ext.as_str() {
            "scene" => Self::Scene,
            "mat" => Self::Material,
            "mesh" => Self::Mesh,
            "png" | "jpg" | "jpeg" | "tga" | "exr" => Self::Texture,
            "fbx" | "obj" | "gltf" | "glb" => Self::Model,
            _ => Self::Unknown,
        }
    }

    /// Classify a virtual path
    pub fn of(path: &VirtualPath) -> Self {
        path.extension()
            .map(|ext| Self::from_extension(&ext))
            .unwrap_or(Self::Unknown)
    }

    /// Display label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Scene => "SCENE",
            Self::Material => "MATERIAL",
            Self::Mesh => "MESH",
            Self::Texture => "TEXTURE",
            Self::Model => "MODEL",
            Self::Unknown => "UNKNOWN",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_extensions() {
        assert_eq!(AssetKind::from_extension("PNG"), AssetKind::Texture);
        assert_eq!(AssetKind::from_extension(".mat"), AssetKind::Material);
        assert_eq!(AssetKind::from_extension("gltf"), AssetKind::Model);
        assert_eq!(AssetKind::from_extension("txt"), AssetKind::Unknown);
    }

    #[test]
    fn test_of_path() {
        assert_eq!(AssetKind::of(&VirtualPath::new("levels/one.scene")), AssetKind::Scene);
        assert_eq!(AssetKind::of(&VirtualPath::new("README")), AssetKind::Unknown);
        assert_eq!(AssetKind::Mesh.label(), "MESH");
    }
}
