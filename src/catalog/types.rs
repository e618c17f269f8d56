// src/catalog/types.rs

//! Remote repository and release records
//!
//! Field names are serialized in PascalCase so that catalogs written by
//! earlier toolbox versions keep loading.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A remote repository and the releases it publishes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Repository {
    pub name: String,
    #[serde(default)]
    pub releases: Vec<Release>,
}

impl Repository {
    pub fn new(name: impl Into<String>, releases: Vec<Release>) -> Self {
        Self {
            name: name.into(),
            releases,
        }
    }

    /// Find a release by archive name
    pub fn find_release(&self, name: &str) -> Option<&Release> {
        self.releases.iter().find(|r| r.name == name)
    }

    /// Whether `release` (by identity) belongs to this repository
    pub fn contains(&self, release: &ReleaseId) -> bool {
        self.releases.iter().any(|r| release.matches(r))
    }
}

/// One published release archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Release {
    /// Archive file name, including its extension
    pub name: String,
    /// Archive download location
    pub url: String,
    pub major: u32,
    pub minor: u32,
    pub build: u32,
    pub published: DateTime<Utc>,
    #[serde(default)]
    pub is_prerelease: bool,
}

impl Release {
    /// Version label recorded on acquired releases, e.g. `v1.2.3`
    pub fn version_string(&self) -> String {
        format!("v{}.{}.{}", self.major, self.minor, self.build)
    }

    pub fn id(&self) -> ReleaseId {
        ReleaseId {
            url: self.url.clone(),
            name: self.name.clone(),
        }
    }
}

/// Release identity within its repository
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReleaseId {
    pub url: String,
    pub name: String,
}

impl ReleaseId {
    pub fn matches(&self, release: &Release) -> bool {
        self.url == release.url && self.name == release.name
    }
}
