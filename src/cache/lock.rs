// src/cache/lock.rs

//! Cross-process lock on a storage root
//!
//! The operation gate only serializes work inside one process. Two knxkit
//! processes pointed at the same storage root would still race on
//! `download.zip` and the release folders, so refresh and acquisition also
//! hold this advisory `flock(LOCK_EX)` for their whole duration.

use fs2::FileExt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Error, Result};

/// Exclusive lock file inside a storage root, released on drop
pub struct StorageLock {
    /// Kept open to hold the lock
    file: File,
    path: PathBuf,
}

impl StorageLock {
    /// Try to take the lock without blocking
    ///
    /// Returns `Ok(None)` if another process holds it.
    pub fn try_acquire<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::IoError(format!("Failed to create {}: {e}", parent.display()))
            })?;
        }

        let file = File::create(&path).map_err(|e| {
            Error::IoError(format!("Failed to open lock file {}: {e}", path.display()))
        })?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!("Acquired storage lock at {}", path.display());
                Ok(Some(Self { file, path }))
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                debug!("Storage lock already held at {}", path.display());
                Ok(None)
            }
            Err(e) => Err(Error::IoError(format!(
                "Failed to lock {}: {e}",
                path.display()
            ))),
        }
    }


    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StorageLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        debug!("Released storage lock at {}", self.path.display());
    }
}
