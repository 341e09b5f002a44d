//! Write-stability check for files reported by the watcher

use std::fs::{File, TryLockError};
use std::path::Path;
use std::time::SystemTime;

use crate::error::{AssetError, Result};

/// Size and modification time seen by one check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Fingerprint {
    len: u64,
    modified: Option<SystemTime>,
}

/// Open `path` and take an exclusive lock on it
///
/// Fails with [`AssetError::NotReady`] while the file is missing or another
/// process holds a lock. The lock is released before returning.
pub(crate) fn fingerprint(path: &Path) -> Result<Fingerprint> {
    let not_ready = || AssetError::NotReady(path.to_path_buf());
    let file = File::open(path).map_err(|_| not_ready())?;
    match file.try_lock() {
        Ok(()) => {}
        Err(TryLockError::WouldBlock) => return Err(not_ready()),
        Err(TryLockError::Error(e)) => {
            // Filesystems without lock support: rely on the fingerprint alone
            log::debug!("Cannot lock {}: {}", path.display(), e);
        }
    }
    let metadata = file.metadata()?;
    Ok(Fingerprint {
        len: metadata.len(),
        modified: metadata.modified().ok(),
    })
}

/// Tracks consecutive checks of one file
///
/// The file counts as stable once two checks in a row succeed with the same
/// fingerprint.
#[derive(Debug, Default)]
pub(crate) struct Stability {
    previous: Option<Fingerprint>,
}

impl Stability {
    pub fn check(&mut self, path: &Path) -> Result<()> {
        let current = match fingerprint(path) {
            Ok(fingerprint) => fingerprint,
            Err(e) => {
                self.previous = None;
                return Err(e);
            }
        };
        let stable = self.previous == Some(current);
        self.previous = Some(current);
        if stable {
            Ok(())
        } else {
            Err(AssetError::NotReady(path.to_path_buf()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_is_not_ready() {
        let dir = tempfile::tempdir().unwrap();
        let result = fingerprint(&dir.path().join("nope.png"));
        assert!(matches!(result, Err(AssetError::NotReady(_))));
    }

    #[test]
    fn test_stable_after_two_matching_fingerprints() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, b"one").unwrap();

        let mut stability = Stability::default();
        assert!(stability.check(&path).is_err());
        assert!(stability.check(&path).is_ok());
    }

    #[test]
    fn test_growth_resets_stability() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, b"one").unwrap();

        let mut stability = Stability::default();
        assert!(stability.check(&path).is_err());
        std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap()
            .write_all(b" two")
            .unwrap();
        assert!(stability.check(&path).is_err());
        assert!(stability.check(&path).is_ok());
    }

    #[test]
    fn test_locked_file_is_not_ready() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locked.bin");
        std::fs::write(&path, b"data").unwrap();

        let writer = File::open(&path).unwrap();
        writer.lock().unwrap();
        assert!(matches!(fingerprint(&path), Err(AssetError::NotReady(_))));
        writer.unlock().unwrap();
        assert!(fingerprint(&path).is_ok());
    }
}
