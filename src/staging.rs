//! The world-writable staging copy handed to the editing actor.
//!
//! A [`StagingFile`] is created fresh for every run, registered with the
//! cleanup registry for the whole of its life, and deleted when it is closed
//! or dropped. It can never be persisted.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempPath;
use tracing::debug;

use crate::cleanup::Registry;
use crate::common::Mode;
use crate::error::EditError;
use crate::fsx as fs;

const PREFIX: &str = "privedit-";

pub struct StagingFile {
    path: TempPath,
    registry: &'static Registry,
}

impl StagingFile {
    /// Allocate a staging file for `target` inside `scratch_dir`, tracked by
    /// `registry` (normally [`crate::cleanup::global`]).
    pub fn create(
        scratch_dir: &Path,
        target: &Path,
        registry: &'static Registry,
    ) -> Result<Self, EditError> {
        let resource = |source: io::Error| EditError::Resource {
            dir: scratch_dir.to_path_buf(),
            source,
        };

        // Keep the extension so editors still pick the right syntax.
        let suffix = target
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();

        // The name is registered before the file exists, so a signal can
        // never find a staging file the registry does not know about.
        let file = tempfile::Builder::new()
            .prefix(PREFIX)
            .suffix(&suffix)
            .make_in(scratch_dir, |path| {
                registry.register(path);
                OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .open(path)
                    .map_err(|e| {
                        registry.forget(path);
                        e
                    })
            })
            .map_err(resource)?;
        let path = file.into_temp_path();

        let guard = scopeguard::guard(path, |path| registry.forget(&path));
        fs::set_unix_permissions(&guard, Mode::WORLD_WRITABLE).map_err(resource)?;
        let path = scopeguard::ScopeGuard::into_inner(guard);

        debug!(staging = %path.display(), "allocated staging copy");
        Ok(Self { path, registry })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the staging file for overwriting.
    pub fn open_for_write(&self) -> Result<File, EditError> {
        let file = OpenOptions::new().write(true).truncate(true).open(&self.path)?;
        Ok(file)
    }

    /// Delete the staging file, reporting a failure instead of ignoring it.
    pub fn close(self) -> Result<PathBuf, EditError> {
        let path = self.path.to_path_buf();
        // On failure the drop below still forgets the path and retries.
        fs::remove_file(&path)?;
        debug!(staging = %path.display(), "removed staging copy");
        Ok(path)
    }
}

impl Drop for StagingFile {
    fn drop(&mut self) {
        self.registry.forget(&self.path);
    }
}

impl std::fmt::Debug for StagingFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagingFile").field("path", &self.path()).finish()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::tempdir;

    fn registry() -> &'static Registry {
        Box::leak(Box::new(Registry::new()))
    }

    #[test]
    fn staging_is_world_writable_and_keeps_extension() {
        let scratch = tempdir().unwrap();
        let staging = StagingFile::create(scratch.path(), Path::new("/etc/pg_hba.conf"), registry()).unwrap();
        let name = staging.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(PREFIX), "{name}");
        assert!(name.ends_with(".conf"), "{name}");
        assert_eq!(fs::unix_permissions(staging.path()).unwrap(), Mode::WORLD_WRITABLE);
    }

    #[test]
    fn drop_deletes_and_unregisters() {
        let scratch = tempdir().unwrap();
        let registry = registry();
        let staging = StagingFile::create(scratch.path(), Path::new("hosts"), registry).unwrap();
        let path = staging.path().to_path_buf();
        assert!(registry.is_registered(&path));
        drop(staging);
        assert!(!path.exists());
        assert!(registry.is_empty());
    }

    #[test]
    fn close_deletes_and_unregisters() {
        let scratch = tempdir().unwrap();
        let registry = registry();
        let staging = StagingFile::create(scratch.path(), Path::new("hosts"), registry).unwrap();
        let path = staging.close().unwrap();
        assert!(!path.exists());
        assert!(registry.is_empty());
        assert_eq!(fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[test]
    fn missing_scratch_dir_is_resource_error() {
        let scratch = tempdir().unwrap();
        let missing = scratch.path().join("nope");
        let registry = registry();
        let err = StagingFile::create(&missing, Path::new("x"), registry).unwrap_err();
        assert!(matches!(err, EditError::Resource { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn every_staging_file_on_disk_is_registered() {
        let scratch = tempdir().unwrap();
        let registry = registry();
        let _staging = StagingFile::create(scratch.path(), Path::new("hosts"), registry).unwrap();
        for entry in fs::read_dir(scratch.path()).unwrap() {
            assert!(registry.is_registered(&entry.unwrap().path()));
        }
        assert_eq!(registry.remove_all(), 1);
        assert_eq!(fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[test]
    fn concurrent_allocations_never_collide() {
        let scratch = tempdir().unwrap();
        let registry = registry();
        let target = Path::new("/etc/postgresql/16/main/postgresql.conf");

        let files: Vec<StagingFile> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..64)
                .map(|_| s.spawn(|| StagingFile::create(scratch.path(), target, registry).unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let unique: HashSet<&Path> = files.iter().map(StagingFile::path).collect();
        assert_eq!(unique.len(), files.len());
        assert_eq!(registry.len(), files.len());
    }
}
