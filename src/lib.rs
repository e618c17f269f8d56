// src/lib.rs

//! knxkit: release acquisition and local cache for KNX device firmware
//!
//! Maintains a catalog of remote repositories and their published releases,
//! acquires selected releases into a local storage directory (download,
//! extract, parse, persist), keeps an index of acquired releases and their
//! products, and exports a product as a signed `.knxprod` file.
//!
//! # Architecture
//!
//! - Capabilities at the seams: listing, downloading, extraction, parsing
//!   and signing are traits; [`Capabilities::from_config`] wires the
//!   GitHub/tar/XML/Ed25519 implementations
//! - One operation at a time: [`gate::OperationGate`] serializes refresh,
//!   acquisition and removal; a file lock extends this across processes
//! - JSON documents on disk: `cache.json` at the storage root for the
//!   catalog, one `cache.json` per release folder for local releases

pub mod acquire;
pub mod cache;
pub mod catalog;
pub mod compression;
pub mod config;
pub mod content;
mod error;
pub mod export;
pub mod extract;
pub mod gate;
pub mod remote;
pub mod toolbox;

pub use acquire::{AcquireStep, AcquisitionPipeline, folder_name_for};
pub use cache::CacheStore;
pub use catalog::{Catalog, Release, ReleaseId, Repository};
pub use config::KnxkitConfig;
pub use content::{Product, ProductRef, ReleaseContentModel, ReleaseKey};
pub use error::{Error, Result};
pub use export::{Ed25519Signer, ExportedArtifact, KeyFileSigner, Signer, SigningKeyPair};
pub use gate::{Availability, OperationKind, OperationState};
pub use toolbox::{Capabilities, Toolbox};
