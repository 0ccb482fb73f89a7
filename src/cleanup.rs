//! Process-wide registry of live staging files.
//!
//! A staging copy holds the target's content with world-writable bits, so it
//! must not outlive the process. Normal exits are covered by the staging
//! file's drop; this registry covers termination signals, where destructors
//! on the blocked session thread never run.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::{info, warn};

static GLOBAL: Registry = Registry::new();

/// The registry consulted by the signal handler.
pub fn global() -> &'static Registry {
    &GLOBAL
}

/// A set of paths to delete if the process is told to terminate.
#[derive(Debug)]
pub struct Registry {
    paths: Mutex<BTreeSet<PathBuf>>,
}

impl Registry {
    pub const fn new() -> Self {
        Self {
            paths: Mutex::new(BTreeSet::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeSet<PathBuf>> {
        // A panic while holding the lock cannot leave the set inconsistent.
        self.paths.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Track `path` until [`Registry::forget`] or [`Registry::remove_all`].
    pub fn register(&self, path: &Path) {
        self.lock().insert(path.to_path_buf());
    }

    /// Stop tracking `path`. The file itself is left alone.
    pub fn forget(&self, path: &Path) {
        self.lock().remove(path);
    }

    pub fn is_registered(&self, path: &Path) -> bool {
        self.lock().contains(path)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delete every tracked file and clear the registry. Returns how many
    /// files were removed.
    pub fn remove_all(&self) -> usize {
        let paths = std::mem::take(&mut *self.lock());
        let mut removed = 0;
        for path in paths {
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    info!(path = %path.display(), "removed staging copy");
                    removed += 1;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "could not remove staging copy"),
            }
        }
        removed
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn remove_all_deletes_registered_files() {
        let dir = tempdir().unwrap();
        let registry = Registry::new();
        let a = dir.path().join("a");
        let gone = dir.path().join("already-gone");
        std::fs::write(&a, b"secret").unwrap();
        registry.register(&a);
        registry.register(&gone);
        assert_eq!(registry.len(), 2);

        assert_eq!(registry.remove_all(), 1);
        assert!(!a.exists());
        assert!(registry.is_empty());
    }

    #[test]
    fn forget_leaves_file_in_place() {
        let dir = tempdir().unwrap();
        let registry = Registry::new();
        let b = dir.path().join("b");
        std::fs::write(&b, b"keep").unwrap();
        registry.register(&b);
        registry.forget(&b);
        assert!(!registry.is_registered(&b));
        assert_eq!(registry.remove_all(), 0);
        assert!(b.exists());
    }
}
