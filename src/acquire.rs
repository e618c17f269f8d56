// src/acquire.rs

//! Release acquisition pipeline
//!
//! Turns one catalog [`Release`] into a validated, persisted
//! [`ReleaseContentModel`]:
//!
//! 1. derive the release folder name (fails before any I/O)
//! 2. create the storage root
//! 3. remove a stale `download.zip`
//! 4. download the archive
//! 5. recreate the release folder empty
//! 6. extract the archive into it
//! 7. delete the archive (best effort)
//! 8. parse the `data` directory
//! 9. annotate the record with catalog facts
//! 10. persist the record as `<folder>/cache.json`
//!
//! Registering the record in memory is left to the caller, which owns the
//! local release set. On failure the archive is discarded and, once the
//! release folder has been touched, the folder is removed, so a failed run
//! leaves no orphaned payload behind. There is no automatic retry.

use std::fs;
use strum_macros::Display;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{CacheStore, DATA_DIR};
use crate::catalog::Release;
use crate::content::{ContentParser, ReleaseContentModel};
use crate::error::{Error, Result};
use crate::extract::Extractor;
use crate::gate::OperationKind;
use crate::remote::ArchiveDownloader;

/// Pipeline steps, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum AcquireStep {
    FolderName,
    PrepareStorage,
    RemoveStaleArchive,
    Download,
    PrepareFolder,
    Extract,
    CleanupArchive,
    Parse,
    Annotate,
    Persist,
}

/// Folder name for a release: its archive name without the final extension
///
/// `OGM-1.2.3.zip` becomes `OGM-1.2.3`. Names without an extension, with an
/// empty stem, or that would escape the storage root are rejected.
pub fn folder_name_for(release_name: &str) -> Result<&str> {
    let stem = match release_name.rfind('.') {
        Some(idx) if idx > 0 => &release_name[..idx],
        _ => return Err(Error::NameFormatError(release_name.to_string())),
    };

    if stem.contains(['/', '\\']) || stem == "." || stem == ".." {
        return Err(Error::NameFormatError(release_name.to_string()));
    }
    Ok(stem)
}

/// The collaborators one acquisition runs against
pub struct AcquisitionPipeline<'a> {
    store: &'a CacheStore,
    downloader: &'a dyn ArchiveDownloader,
    extractor: &'a dyn Extractor,
    parser: &'a dyn ContentParser,
}

impl<'a> AcquisitionPipeline<'a> {
    pub fn new(
        store: &'a CacheStore,
        downloader: &'a dyn ArchiveDownloader,
        extractor: &'a dyn Extractor,
        parser: &'a dyn ContentParser,
    ) -> Self {
        Self {
            store,
            downloader,
            extractor,
            parser,
        }
    }

    /// Acquire `release` of `repository_name`
    pub async fn run(
        &self,
        repository_name: &str,
        release: &Release,
        cancel: &CancellationToken,
    ) -> Result<ReleaseContentModel> {
        let folder = folder_name_for(&release.name)?;
        info!("Acquiring {}/{} into {}", repository_name, release.name, folder);

        let mut step = AcquireStep::PrepareStorage;
        match self
            .run_steps(repository_name, release, folder, cancel, &mut step)
            .await
        {
            Ok(model) => {
                info!(
                    "Acquired {} {} ({} products)",
                    repository_name,
                    model.version,
                    model.products.len()
                );
                Ok(model)
            }
            Err(e) => {
                warn!(
                    "Acquisition of {}/{} failed at step {}: {}",
                    repository_name, release.name, step, e
                );
                self.cleanup(folder, step);
                Err(e)
            }
        }
    }

    async fn run_steps(
        &self,
        repository_name: &str,
        release: &Release,
        folder: &str,
        cancel: &CancellationToken,
        step: &mut AcquireStep,
    ) -> Result<ReleaseContentModel> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled(OperationKind::Acquire));
        }

        self.store.ensure_root()?;

        *step = AcquireStep::RemoveStaleArchive;
        let archive = self.store.archive_path();
        if archive.exists() {
            fs::remove_file(&archive).map_err(|e| {
                Error::IoError(format!("Failed to remove stale {}: {e}", archive.display()))
            })?;
        }

        *step = AcquireStep::Download;
        debug!(
            "Saving release archive to {} via {}",
            archive.display(),
            self.downloader.name()
        );
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled(OperationKind::Acquire)),
            downloaded = self.downloader.download(&release.url, &archive) => {
                downloaded.map_err(|e| match e {
                    Error::DownloadError(_) | Error::Cancelled(_) => e,
                    other => Error::DownloadError(other.to_string()),
                })?;
            }
        }

        *step = AcquireStep::PrepareFolder;
        let target = self.store.release_dir(folder);
        if target.exists() {
            fs::remove_dir_all(&target).map_err(|e| {
                Error::IoError(format!("Failed to clear {}: {e}", target.display()))
            })?;
        }
        fs::create_dir_all(&target).map_err(|e| {
            Error::IoError(format!("Failed to create {}: {e}", target.display()))
        })?;

        *step = AcquireStep::Extract;
        debug!("Extracting into {} with {}", target.display(), self.extractor.name());
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled(OperationKind::Acquire)),
            extracted = self.extractor.extract(&archive, &target) => {
                extracted.map_err(|e| match e {
                    Error::ExtractError(_) | Error::Cancelled(_) => e,
                    other => Error::ExtractError(other.to_string()),
                })?;
            }
        }

        *step = AcquireStep::CleanupArchive;
        self.store.discard_archive();

        *step = AcquireStep::Parse;
        let mut model = self
            .parser
            .parse(&target.join(DATA_DIR))
            .map_err(|e| match e {
                Error::ParseError(_) => e,
                other => Error::ParseError(other.to_string()),
            })?;
        model.validate()?;

        *step = AcquireStep::Annotate;
        model.annotate(repository_name, release);

        *step = AcquireStep::Persist;
        self.store.save_release(folder, &model)?;

        Ok(model)
    }

    /// Best-effort removal of what a failed run left behind
    fn cleanup(&self, folder: &str, failed_at: AcquireStep) {
        self.store.discard_archive();

        if failed_at >= AcquireStep::PrepareFolder {
            let target = self.store.release_dir(folder);
            if target.exists()
                && let Err(e) = fs::remove_dir_all(&target)
            {
                warn!("Failed to remove partial release {}: {}", target.display(), e);
            }
        }
    }
}
