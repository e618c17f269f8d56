// src/catalog/refresh.rs

//! Catalog refresh from the remote lister

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::Repository;
use crate::cache::CacheStore;
use crate::error::{Error, Result};
use crate::gate::OperationKind;
use crate::remote::ReleaseLister;

/// Fetch the current repository listing and persist it
///
/// Returns the listing exactly as the lister produced it. Nothing is
/// persisted if the lister fails or the token is cancelled, so the caller
/// can keep its previous catalog.
pub async fn fetch_catalog(
    lister: &dyn ReleaseLister,
    include_prereleases: bool,
    store: &CacheStore,
    cancel: &CancellationToken,
) -> Result<Vec<Repository>> {
    info!(
        "Refreshing catalog from {} (prereleases: {})",
        lister.name(),
        include_prereleases
    );

    let repositories = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(Error::Cancelled(OperationKind::Refresh)),
        listed = lister.list_releases(include_prereleases) => listed.map_err(|e| match e {
            Error::RefreshError(_) => e,
            other => Error::RefreshError(other.to_string()),
        })?,
    };

    let release_count: usize = repositories.iter().map(|r| r.releases.len()).sum();
    if repositories.is_empty() {
        warn!("Remote lister returned no repositories");
    }

    store.save_catalog(&repositories)?;
    info!(
        "Catalog refreshed: {} repositories, {} releases",
        repositories.len(),
        release_count
    );
    Ok(repositories)
}
