// src/commands/mod.rs
//! Command handlers for the knxkit CLI

mod catalog;
mod export;
mod release;

pub use catalog::{cmd_refresh, cmd_releases, cmd_repos};
pub use export::{cmd_export, cmd_keygen};
pub use release::{cmd_acquire, cmd_local, cmd_remove};

use anyhow::{Context, Result};
use knxkit::{CacheStore, Capabilities, KnxkitConfig, Toolbox};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Settings shared by every command
pub struct Session {
    pub config: KnxkitConfig,
    pub storage_root: PathBuf,
}

impl Session {
    /// Load the configuration and apply command-line overrides
    pub fn load(config_path: Option<&Path>, storage: Option<PathBuf>) -> Result<Self> {
        let config = match config_path {
            Some(path) => KnxkitConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => match KnxkitConfig::default_path() {
                Some(path) => KnxkitConfig::load(&path)?,
                None => KnxkitConfig::default(),
            },
        };
        let storage_root = storage.unwrap_or_else(|| config.storage_root.clone());
        debug!("Using storage root {}", storage_root.display());

        Ok(Self {
            config,
            storage_root,
        })
    }

    /// Open a toolbox over the storage root with the configured capabilities
    pub fn open_toolbox(&self, show_progress: bool) -> Result<Toolbox> {
        let capabilities = Capabilities::from_config(&self.config, show_progress)?;
        let toolbox = Toolbox::open(
            CacheStore::new(&self.storage_root),
            capabilities,
            self.config.sort_local_releases,
        )
        .with_context(|| format!("Failed to open storage {}", self.storage_root.display()))?;
        Ok(toolbox)
    }
}
