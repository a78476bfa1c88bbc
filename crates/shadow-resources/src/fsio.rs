//! Crash-safe file writes and cross-process advisory locks.
//!
//! Every file the cache publishes is written to a temporary file in the
//! destination directory and renamed into place, so readers observe either
//! the old content or the complete new content. Writers that may race across
//! processes additionally hold an exclusive [`FileLock`] on a `.lock` sidecar.

use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tempfile::NamedTempFile;

use crate::ResourceError;

/// `path` with `.suffix` appended to its file name (`items.json` ->
/// `items.json.lock`).
pub fn sidecar_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(OsString::new);
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

/// Write `bytes` to `path` via a same-directory temp file and an atomic rename.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), ResourceError> {
    let dir = path
        .parent()
        .ok_or_else(|| ResourceError::InvalidPath {
            name: path.display().to_string(),
        })?;
    std::fs::create_dir_all(dir).map_err(|e| ResourceError::io(dir, e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| ResourceError::io(dir, e))?;
    tmp.write_all(bytes)
        .map_err(|e| ResourceError::io(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| ResourceError::io(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| ResourceError::io(path, e.error))?;
    Ok(())
}

/// Read a small text file, trimmed. `None` if it does not exist or is
/// unreadable.
pub fn read_trimmed(path: &Path) -> Option<String> {
    std::fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_owned())
}

/// Remove a file, treating "already gone" as success.
pub fn remove_if_present(path: &Path) -> Result<(), ResourceError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ResourceError::io(path, e)),
    }
}

// ---------------------------------------------------------------------------
// FileLock
// ---------------------------------------------------------------------------

/// An exclusive advisory lock on a file, released on drop.
///
/// Blocks until the lock is available. Other processes using the same lock
/// path wait; processes that ignore the lock are not prevented from writing.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    pub fn acquire(path: &Path) -> Result<Self, ResourceError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| ResourceError::io(dir, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(|e| ResourceError::io(path, e))?;
        file.lock_exclusive()
            .map_err(|e| ResourceError::io(path, e))?;
        tracing::trace!(lock = %path.display(), "file lock acquired");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(lock = %self.path.display(), error = %e, "failed to release file lock");
        }
    }
}
