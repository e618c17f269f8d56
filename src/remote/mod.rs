// src/remote/mod.rs

//! Remote release capabilities
//!
//! The catalog and the acquisition pipeline talk to the network only through
//! these two traits. [`GitHubClient`] implements both against the GitHub
//! REST API; tests plug in in-memory fakes.

mod github;
mod version;

pub use github::GitHubClient;
pub use version::parse_tag_version;

use async_trait::async_trait;
use std::path::Path;

use crate::catalog::Repository;
use crate::error::Result;

/// Lists repositories together with their published releases
#[async_trait]
pub trait ReleaseLister: Send + Sync {
    /// List every repository and its releases
    ///
    /// Prereleases are included only when `include_prereleases` is set.
    async fn list_releases(&self, include_prereleases: bool) -> Result<Vec<Repository>>;

    /// Human-readable name for logging
    fn name(&self) -> &str;
}

/// Transfers a release archive to a local path
#[async_trait]
pub trait ArchiveDownloader: Send + Sync {
    /// Download `url` to `dest`, replacing any existing file
    async fn download(&self, url: &str, dest: &Path) -> Result<()>;

    /// Human-readable name for logging
    fn name(&self) -> &str;
}
