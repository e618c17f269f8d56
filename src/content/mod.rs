// src/content/mod.rs

//! Release content model
//!
//! A [`ReleaseContentModel`] is the durable local record of one acquired
//! release: where its definition file lives, which products it contains and
//! the catalog facts (repository, release, version) stamped on at
//! acquisition time. It is written once per acquisition and read-only after.
//!
//! Products refer back to their owning record by [`ReleaseKey`] rather than
//! by pointer. The key is not serialized; [`ReleaseContentModel::link_products`]
//! restores it after parsing and after every cache load.

mod parser;

pub use parser::{ContentParser, XmlContentParser};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::acquire::folder_name_for;
use crate::catalog::Release;
use crate::error::{Error, Result};

/// Current on-disk schema of release records
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Identity of a local release
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReleaseKey {
    pub repository_name: String,
    pub release_name: String,
}

impl std::fmt::Display for ReleaseKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.repository_name, self.release_name)
    }
}

/// Addresses one product inside one local release
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProductRef {
    pub release: ReleaseKey,
    pub index: usize,
}

/// A product defined by a release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Product {
    pub name: String,
    #[serde(skip)]
    owner: Option<ReleaseKey>,
}

impl Product {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner: None,
        }
    }

    /// The release this product belongs to, once linked
    pub fn owner(&self) -> Option<&ReleaseKey> {
        self.owner.as_ref()
    }
}

/// The cached record of one acquired release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReleaseContentModel {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub repository_name: String,
    #[serde(default)]
    pub release_name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub published: DateTime<Utc>,
    #[serde(default)]
    pub is_prerelease: bool,
    /// Definition file the signer exports from
    pub xml_file: PathBuf,
    #[serde(default)]
    pub products: Vec<Product>,
}

impl ReleaseContentModel {
    /// A freshly parsed, not yet annotated record
    pub fn new(xml_file: PathBuf, products: Vec<Product>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            repository_name: String::new(),
            release_name: String::new(),
            version: String::new(),
            published: DateTime::<Utc>::default(),
            is_prerelease: false,
            xml_file,
            products,
        }
    }

    pub fn key(&self) -> ReleaseKey {
        ReleaseKey {
            repository_name: self.repository_name.clone(),
            release_name: self.release_name.clone(),
        }
    }

    /// Stamp catalog facts onto the record and link its products
    pub fn annotate(&mut self, repository_name: &str, release: &Release) {
        self.repository_name = repository_name.to_string();
        self.release_name = release.name.clone();
        self.is_prerelease = release.is_prerelease;
        self.published = release.published;
        self.version = release.version_string();
        self.link_products();
    }

    /// Point every product at this record
    pub fn link_products(&mut self) {
        let key = self.key();
        for product in &mut self.products {
            product.owner = Some(key.clone());
        }
    }

    /// Name of the storage folder holding this release
    pub fn folder_name(&self) -> Result<&str> {
        folder_name_for(&self.release_name)
    }

    pub fn product(&self, index: usize) -> Option<&Product> {
        self.products.get(index)
    }

    /// Reference to the first product called `name`
    pub fn find_product(&self, name: &str) -> Option<ProductRef> {
        self.products
            .iter()
            .position(|p| p.name == name)
            .map(|index| ProductRef {
                release: self.key(),
                index,
            })
    }

    /// Reject records a parser or an older cache could produce but the pipeline must not accept
    pub fn validate(&self) -> Result<()> {
        if self.products.is_empty() {
            return Err(Error::ParseError(format!(
                "no products defined in {}",
                self.xml_file.display()
            )));
        }
        Ok(())
    }
}
