//! Virtual paths: project-relative, separator-normalized asset locations

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// A project-relative asset path using `/` separators
///
/// Construction normalizes the input: `\` becomes `/`, empty and `.`
/// components are dropped, `..` removes the previous component and any
/// leading separator is stripped. The empty path is the "unresolved" sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct VirtualPath(String);

impl VirtualPath {
    /// Normalize `raw` into a virtual path
    pub fn new(raw: impl AsRef<str>) -> Self {
        let raw = raw.as_ref().replace('\\', "/");
        let mut parts: Vec<&str> = Vec::new();
        for part in raw.split('/') {
            match part {
                "" | "." => {}
                ".." => {
                    parts.pop();
                }
                other => parts.push(other),
            }
        }
        Self(parts.join("/"))
    }

    /// The "unresolved" sentinel
    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Lowercase extension without the leading dot
    pub fn extension(&self) -> Option<String> {
        let name = self.file_name()?;
        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }

    /// Last component
    pub fn file_name(&self) -> Option<&str> {
        if self.0.is_empty() {
            return None;
        }
        Some(self.0.rsplit('/').next().unwrap_or(&self.0))
    }

    /// Everything before the last component; empty for top-level files
    pub fn parent(&self) -> VirtualPath {
        match self.0.rsplit_once('/') {
            Some((parent, _)) => Self(parent.to_string()),
            None => Self::empty(),
        }
    }

    /// Append a relative path
    pub fn join(&self, child: impl AsRef<str>) -> VirtualPath {
        if self.0.is_empty() {
            return Self::new(child);
        }
        Self::new(format!("{}/{}", self.0, child.as_ref()))
    }
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VirtualPath {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for VirtualPath {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<&VirtualPath> for VirtualPath {
    fn from(path: &VirtualPath) -> Self {
        path.clone()
    }
}

impl From<VirtualPath> for String {
    fn from(path: VirtualPath) -> Self {
        path.0
    }
}

impl AsRef<str> for VirtualPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for VirtualPath {
    fn borrow(&self) -> &str {
        &self.0
    }
}
