// src/config.rs

//! knxkit configuration
//!
//! # Example config.toml
//!
//! ```toml
//! config_version = 1
//! storage_root = "/home/me/knx/Storage"
//! include_prereleases = false
//! sort_local_releases = true
//!
//! [remote]
//! api_url = "https://api.github.com"
//! organization = "OpenKNX"
//! token = "ghp_..."
//! timeout_secs = 30
//! max_retries = 3
//!
//! [signing]
//! key_path = "/home/me/.config/knxkit/signing.key"
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Error, Result};

/// Current configuration file version
pub const CONFIG_VERSION: u32 = 1;

/// File name looked up inside the user config directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnxkitConfig {
    /// Configuration file version (for forward compatibility)
    #[serde(default = "default_version")]
    pub config_version: u32,

    /// Directory holding the catalog cache and acquired releases
    #[serde(default = "default_storage_root")]
    pub storage_root: PathBuf,

    /// Include prereleases when refreshing the catalog
    #[serde(default)]
    pub include_prereleases: bool,

    /// Keep local releases ordered by repository name
    #[serde(default = "default_true")]
    pub sort_local_releases: bool,

    #[serde(default)]
    pub remote: RemoteConfig,

    #[serde(default)]
    pub signing: SigningConfig,
}

/// Remote release source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Organization whose repositories make up the catalog
    #[serde(default = "default_organization")]
    pub organization: String,

    /// Optional API token, raises rate limits
    #[serde(default)]
    pub token: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

/// Export signing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SigningConfig {
    /// Private key file written by `knxkit keygen`
    #[serde(default)]
    pub key_path: Option<PathBuf>,
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("Storage")
}

fn default_true() -> bool {
    true
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_organization() -> String {
    "OpenKNX".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            organization: default_organization(),
            token: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for KnxkitConfig {
    fn default() -> Self {
        Self {
            config_version: CONFIG_VERSION,
            storage_root: default_storage_root(),
            include_prereleases: false,
            sort_local_releases: true,
            remote: RemoteConfig::default(),
            signing: SigningConfig::default(),
        }
    }
}

impl KnxkitConfig {
    /// Parse configuration from a TOML string
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| Error::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::parse(&content)
    }

    /// Default config location: `<user config dir>/knxkit/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("knxkit").join(CONFIG_FILE_NAME))
    }

    pub fn validate(&self) -> Result<()> {
        if self.config_version > CONFIG_VERSION {
            return Err(Error::ConfigError(format!(
                "Unsupported config version {} (this build understands up to {})",
                self.config_version, CONFIG_VERSION
            )));
        }
        if self.remote.organization.trim().is_empty() {
            return Err(Error::ConfigError("remote.organization is empty".to_string()));
        }
        url::Url::parse(&self.remote.api_url).map_err(|e| {
            Error::ConfigError(format!("Invalid remote.api_url '{}': {e}", self.remote.api_url))
        })?;
        if self.remote.timeout_secs == 0 {
            return Err(Error::ConfigError("remote.timeout_secs must be positive".to_string()));
        }
        Ok(())
    }
}
