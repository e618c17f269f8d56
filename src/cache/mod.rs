// src/cache/mod.rs

//! Local cache store
//!
//! Layout of a storage root:
//!
//! ```text
//! <root>/
//!   cache.json              catalog (list of repositories)
//!   .knxkit.lock            cross-process lock
//!   download.zip            transient archive during acquisition
//!   <release folder>/
//!     cache.json            release record
//!     data/                 extracted payload
//! ```
//!
//! Every write goes to a temporary file first and is renamed into place, so
//! a crash never leaves a half-written `cache.json` behind.

mod lock;

pub use lock::StorageLock;

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::catalog::Repository;
use crate::content::{ReleaseContentModel, SCHEMA_VERSION};
use crate::error::{Error, Result};

/// JSON document name, both at the root and inside release folders
pub const CACHE_FILE: &str = "cache.json";

/// Transient archive path used during acquisition
pub const ARCHIVE_FILE: &str = "download.zip";

/// Payload directory inside an extracted release
pub const DATA_DIR: &str = "data";

/// Lock file guarding the root against concurrent processes
pub const LOCK_FILE: &str = ".knxkit.lock";

/// JSON store rooted at one directory
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the storage root if it does not exist
    pub fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root).map_err(|e| {
            Error::IoError(format!(
                "Failed to create storage root {}: {e}",
                self.root.display()
            ))
        })
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.root.join(CACHE_FILE)
    }

    pub fn archive_path(&self) -> PathBuf {
        self.root.join(ARCHIVE_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    pub fn release_dir(&self, folder: &str) -> PathBuf {
        self.root.join(folder)
    }

    /// Try to take the cross-process lock for this root
    pub fn try_lock(&self) -> Result<Option<StorageLock>> {
        StorageLock::try_acquire(self.lock_path())
    }

    /// Read the cached catalog; an absent file is an empty catalog
    pub fn load_catalog(&self) -> Result<Vec<Repository>> {
        let path = self.catalog_path();
        if !path.exists() {
            debug!("No catalog cache at {}", path.display());
            return Ok(Vec::new());
        }
        read_json(&path)
    }

    /// Read every release record stored under the root
    ///
    /// Immediate subdirectories without a `cache.json` are skipped. Products
    /// are re-linked to their records. No particular order is guaranteed.
    pub fn load_local_releases(&self) -> Result<Vec<ReleaseContentModel>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.root).map_err(|e| {
            Error::IoError(format!("Failed to list {}: {e}", self.root.display()))
        })?;

        let mut releases = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }

            let path = entry.path().join(CACHE_FILE);
            if !path.is_file() {
                debug!("Skipping {} (no {})", entry.path().display(), CACHE_FILE);
                continue;
            }

            let mut model: ReleaseContentModel = read_json(&path)?;
            if model.schema_version > SCHEMA_VERSION {
                return Err(Error::CorruptCacheError {
                    path,
                    reason: format!(
                        "schema version {} is newer than supported {}",
                        model.schema_version, SCHEMA_VERSION
                    ),
                });
            }
            model.link_products();
            releases.push(model);
        }

        debug!("Loaded {} local releases", releases.len());
        Ok(releases)
    }

    /// Write the catalog, replacing any previous one
    pub fn save_catalog(&self, repositories: &[Repository]) -> Result<()> {
        self.ensure_root()?;
        write_json_atomic(&self.catalog_path(), repositories)
    }

    /// Write a release record into its folder, replacing any previous one
    pub fn save_release(&self, folder: &str, model: &ReleaseContentModel) -> Result<()> {
        let dir = self.release_dir(folder);
        fs::create_dir_all(&dir).map_err(|e| {
            Error::IoError(format!("Failed to create {}: {e}", dir.display()))
        })?;
        write_json_atomic(&dir.join(CACHE_FILE), model)
    }

    /// Delete a release folder and everything in it
    pub fn remove_release(&self, folder: &str) -> Result<()> {
        let dir = self.release_dir(folder);
        if dir.exists() {
            fs::remove_dir_all(&dir).map_err(|e| {
                Error::IoError(format!("Failed to remove {}: {e}", dir.display()))
            })?;
        }
        Ok(())
    }

    /// Delete the transient archive, logging instead of failing
    pub fn discard_archive(&self) {
        let path = self.archive_path();
        if path.exists()
            && let Err(e) = fs::remove_file(&path)
        {
            warn!("Failed to delete {}: {}", path.display(), e);
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .map_err(|e| Error::IoError(format!("Failed to read {}: {e}", path.display())))?;
    serde_json::from_str(&content).map_err(|e| Error::CorruptCacheError {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)
        .map_err(|e| Error::IoError(format!("Failed to serialize {}: {e}", path.display())))?;

    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, json).map_err(|e| {
        Error::IoError(format!("Failed to write {}: {e}", temp_path.display()))
    })?;
    fs::rename(&temp_path, path).map_err(|e| {
        Error::IoError(format!(
            "Failed to move {} to {}: {e}",
            temp_path.display(),
            path.display()
        ))
    })?;

    debug!("Wrote {}", path.display());
    Ok(())
}
