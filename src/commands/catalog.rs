// src/commands/catalog.rs
//! Catalog commands: refresh and listing

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::Session;

/// Refresh the catalog from the remote source
pub async fn cmd_refresh(session: &Session, prereleases: bool, cancel: &CancellationToken) -> Result<()> {
    let include_prereleases = prereleases || session.config.include_prereleases;
    let toolbox = session.open_toolbox(false)?;

    let count = toolbox.refresh(include_prereleases, cancel).await?;
    let releases: usize = toolbox
        .repositories()
        .iter()
        .map(|r| r.releases.len())
        .sum();
    println!("Catalog refreshed: {} repositories, {} releases", count, releases);
    Ok(())
}

/// List repositories of the cached catalog
pub fn cmd_repos(session: &Session) -> Result<()> {
    info!("Listing repositories");
    let toolbox = session.open_toolbox(false)?;
    let repositories = toolbox.repositories();

    if repositories.is_empty() {
        println!("No repositories cached. Run 'knxkit refresh' first.");
    } else {
        println!("Repositories:");
        for repo in repositories {
            let latest = repo
                .releases
                .first()
                .map(|r| format!("latest {}", r.version_string()))
                .unwrap_or_else(|| "no releases".to_string());
            println!("  {} ({} releases, {})", repo.name, repo.releases.len(), latest);
        }
    }
    Ok(())
}

/// List the releases of one repository
pub fn cmd_releases(session: &Session, repository: &str) -> Result<()> {
    let toolbox = session.open_toolbox(false)?;
    let repo = toolbox.select_repository(repository)?;

    if repo.releases.is_empty() {
        println!("{} has no releases", repo.name);
        return Ok(());
    }

    println!("Releases of {}:", repo.name);
    for release in &repo.releases {
        let local_mark = if toolbox.find_local(&repo.name, &release.name).is_some() {
            "[x]"
        } else {
            "[ ]"
        };
        let pre = if release.is_prerelease { " (prerelease)" } else { "" };
        println!(
            "  {} {} {}{} published {}",
            local_mark,
            release.name,
            release.version_string(),
            pre,
            release.published.format("%Y-%m-%d")
        );
    }
    Ok(())
}
