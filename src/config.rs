//! Project layout and watcher configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::path::VirtualPath;
use crate::registry::temp_path;

/// Where a project keeps its assets and its id registry
///
/// Both locations are relative to the project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    root: PathBuf,
    asset_dir: PathBuf,
    registry_file: PathBuf,
}

impl ProjectLayout {
    /// Default asset directory, relative to the project root
    pub const DEFAULT_ASSET_DIR: &'static str = "assets";
    /// Default registry location, relative to the project root
    pub const DEFAULT_REGISTRY_FILE: &'static str = ".kiln/meta/registry.bin";

    /// Layout with default locations under `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            asset_dir: PathBuf::from(Self::DEFAULT_ASSET_DIR),
            registry_file: PathBuf::from(Self::DEFAULT_REGISTRY_FILE),
        }
    }

    /// Use a different asset directory (relative to the root)
    pub fn with_asset_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.asset_dir = dir.into();
        self
    }

    /// Use a different registry file (relative to the root)
    pub fn with_registry_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.registry_file = file.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute directory holding every asset
    pub fn asset_root(&self) -> PathBuf {
        self.root.join(&self.asset_dir)
    }

    /// Absolute location of the registry file
    pub fn registry_path(&self) -> PathBuf {
        self.root.join(&self.registry_file)
    }

    /// Whether `path` is the registry file or the temp file it is saved through
    ///
    /// Matters when the registry lives under the asset root.
    pub fn is_registry_file(&self, path: &Path) -> bool {
        let registry = self.registry_path();
        path == registry || path == temp_path(&registry)
    }

    /// Absolute filesystem path of a virtual path
    pub fn resolve(&self, path: &VirtualPath) -> PathBuf {
        let mut resolved = self.asset_root();
        for part in path.as_str().split('/').filter(|p| !p.is_empty()) {
            resolved.push(part);
        }
        resolved
    }

    /// Virtual path of an absolute (or asset-root-relative) path
    ///
    /// Returns `None` for paths outside the asset root.
    pub fn to_virtual(&self, path: &Path) -> Option<VirtualPath> {
        if path.is_relative() {
            return Some(VirtualPath::new(path.to_string_lossy()));
        }
        let asset_root = self.asset_root();
        let relative = match path.strip_prefix(&asset_root) {
            Ok(relative) => relative.to_path_buf(),
            // Watchers report canonical paths; the configured root may not be
            Err(_) => {
                let canonical = asset_root.canonicalize().ok()?;
                path.strip_prefix(canonical).ok()?.to_path_buf()
            }
        };
        let virt = VirtualPath::new(relative.to_string_lossy());
        (!virt.is_empty()).then_some(virt)
    }
}

/// Timing of the debounced change watcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatcherConfig {
    /// Quiet period after an event before the first stability check
    pub settle_delay: Duration,
    /// Delay between stability checks
    pub poll_interval: Duration,
    /// Give up on a file that is still not stable after this long
    pub timeout: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(300),
            poll_interval: Duration::from_millis(100),
            timeout: Duration::from_secs(5),
        }
    }
}

impl WatcherConfig {
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let layout = ProjectLayout::new("/projects/demo");
        assert_eq!(layout.asset_root(), PathBuf::from("/projects/demo/assets"));
        assert_eq!(
            layout.registry_path(),
            PathBuf::from("/projects/demo/.kiln/meta/registry.bin")
        );
    }

    #[test]
    fn test_resolve_and_back() {
        let layout = ProjectLayout::new("/projects/demo").with_asset_dir("content");
        let path = VirtualPath::new("textures/brick.png");
        let absolute = layout.resolve(&path);
        assert_eq!(absolute, PathBuf::from("/projects/demo/content/textures/brick.png"));
        assert_eq!(layout.to_virtual(&absolute), Some(path));
    }

    #[test]
    fn test_outside_asset_root() {
        let layout = ProjectLayout::new("/projects/demo");
        assert_eq!(layout.to_virtual(Path::new("/elsewhere/a.png")), None);
        assert_eq!(layout.to_virtual(&layout.asset_root()), None);
    }

    #[test]
    fn test_registry_file_and_its_temp_sibling() {
        let layout =
            ProjectLayout::new("/projects/demo").with_registry_file("assets/.kiln/ids.bin");
        assert!(layout.is_registry_file(Path::new("/projects/demo/assets/.kiln/ids.bin")));
        assert!(layout.is_registry_file(Path::new("/projects/demo/assets/.kiln/ids.bin.tmp")));
        assert!(!layout.is_registry_file(Path::new("/projects/demo/assets/.kiln/ids.bak")));
        assert!(!layout.is_registry_file(&layout.resolve(&VirtualPath::new("a.png"))));
    }

    #[test]
    fn test_watcher_defaults() {
        let config = WatcherConfig::default();
        assert_eq!(config.poll_interval, Duration::from_millis(100));
        assert_eq!(config.timeout, Duration::from_secs(5));
    }
}
