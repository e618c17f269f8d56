// src/export/mod.rs

//! Export step
//!
//! Produces a distributable, signed product database from a product of a
//! local release. The signing itself is delegated to a [`Signer`].

mod signing;

pub use signing::{Ed25519Signer, KeyFileSigner, SignatureRecord, SigningKeyPair};

use std::path::{Path, PathBuf};
use tracing::info;

use crate::acquire::folder_name_for;
use crate::content::ReleaseContentModel;
use crate::error::{Error, Result};

/// File extension of exported product databases
pub const ARTIFACT_EXTENSION: &str = "knxprod";

/// Signs a definition file into a distributable artifact
pub trait Signer: Send + Sync {
    /// Sign `xml_file` and write `<output_dir>/<artifact_name>.knxprod`
    ///
    /// Returns the path of the written artifact.
    fn sign(&self, xml_file: &Path, output_dir: &Path, artifact_name: &str) -> Result<PathBuf>;
}

/// Result of a successful export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedArtifact {
    pub product: String,
    pub path: PathBuf,
}

/// Default artifact name: the owning release name without its extension
pub fn default_artifact_name(model: &ReleaseContentModel) -> Result<String> {
    folder_name_for(&model.release_name).map(str::to_string)
}

/// Export the product at `product_index` of `model`
pub fn export_product(
    model: &ReleaseContentModel,
    product_index: usize,
    signer: &dyn Signer,
    output_dir: &Path,
) -> Result<ExportedArtifact> {
    let product = model
        .product(product_index)
        .ok_or(Error::NoSelectionError("product"))?;
    let artifact_name = default_artifact_name(model)?;

    info!(
        "Exporting {} from {} as {}",
        product.name, model.release_name, artifact_name
    );
    let path = signer
        .sign(&model.xml_file, output_dir, &artifact_name)
        .map_err(|e| match e {
            Error::SigningError(_) => e,
            other => Error::SigningError(other.to_string()),
        })?;

    Ok(ExportedArtifact {
        product: product.name.clone(),
        path,
    })
}
