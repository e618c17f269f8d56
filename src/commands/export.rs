// src/commands/export.rs
//! Export and signing key commands

use anyhow::{Context, Result};
use knxkit::SigningKeyPair;
use std::path::{Path, PathBuf};

use super::Session;

/// Sign a product of a local release into a `.knxprod` file
pub fn cmd_export(
    session: &Session,
    repository: &str,
    release: &str,
    product: &str,
    output: Option<PathBuf>,
) -> Result<()> {
    let toolbox = session.open_toolbox(false)?;
    toolbox.select_product(repository, release, product)?;

    let output_dir = output.unwrap_or_else(|| toolbox.default_export_dir());
    let artifact = toolbox.export(&output_dir)?;
    println!("Exported {} to {}", artifact.product, artifact.path.display());
    Ok(())
}

/// Generate a signing key pair
pub fn cmd_keygen(
    private_path: &Path,
    public_path: &Path,
    key_id: Option<String>,
    force: bool,
) -> Result<()> {
    if !force && (private_path.exists() || public_path.exists()) {
        anyhow::bail!(
            "Key files already exist. Use --force to overwrite.\n  Private: {}\n  Public: {}",
            private_path.display(),
            public_path.display()
        );
    }

    println!("Generating Ed25519 signing key pair...");
    let mut keypair = SigningKeyPair::generate();
    if let Some(id) = key_id {
        keypair = keypair.with_key_id(&id);
    }
    keypair
        .save_to_files(private_path, public_path)
        .context("Failed to save key files")?;

    println!();
    println!("Files created:");
    println!("  Private key: {} (keep this secret!)", private_path.display());
    println!("  Public key:  {}", public_path.display());
    println!();
    println!("Public key (base64):");
    println!("  {}", keypair.public_key_base64());
    println!();
    println!("To sign exports, set in your config:");
    println!("  [signing]");
    println!("  key_path = \"{}\"", private_path.display());
    Ok(())
}
