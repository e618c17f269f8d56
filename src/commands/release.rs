// src/commands/release.rs
//! Local release commands: acquire, list, remove

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::Session;

/// Acquire a release of the cached catalog
pub async fn cmd_acquire(
    session: &Session,
    repository: &str,
    release: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    let toolbox = session.open_toolbox(true)?;
    toolbox.select_repository(repository)?;
    toolbox.select_release(release)?;

    let model = toolbox.acquire(cancel).await?;
    println!(
        "Acquired {} {} ({} products)",
        model.repository_name,
        model.version,
        model.products.len()
    );
    for product in &model.products {
        println!("  {}", product.name);
    }
    Ok(())
}

/// List local releases and their products
pub fn cmd_local(session: &Session) -> Result<()> {
    info!("Listing local releases");
    let toolbox = session.open_toolbox(false)?;
    let local = toolbox.local_releases();

    if local.is_empty() {
        println!("No releases acquired");
        return Ok(());
    }

    println!("Local releases:");
    for model in local {
        let pre = if model.is_prerelease { " (prerelease)" } else { "" };
        println!(
            "  {} {} {}{}",
            model.repository_name, model.release_name, model.version, pre
        );
        for product in &model.products {
            println!("      {}", product.name);
        }
    }
    Ok(())
}

/// Delete a local release
pub fn cmd_remove(session: &Session, repository: &str, release: &str) -> Result<()> {
    let toolbox = session.open_toolbox(false)?;
    toolbox.remove_local(repository, release)?;
    println!("Removed {}/{}", repository, release);
    Ok(())
}
