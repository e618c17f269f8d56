// src/toolbox.rs

//! Release toolbox
//!
//! [`Toolbox`] is the one object a front end drives. It owns the cache store,
//! the catalog with its selections, the set of local releases and the
//! operation gate, and wires the pipeline to whatever capabilities it was
//! built with.
//!
//! Every state-changing operation either takes the gate slot itself
//! (refresh, acquire, remove) or checks that the gate is idle (selections).
//! Long-running operations also take the storage lock so that a second
//! process sharing the same storage root is refused instead of racing.
//! In-memory state is never locked across an `.await`.

use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::acquire::AcquisitionPipeline;
use crate::cache::{CacheStore, StorageLock};
use crate::catalog::{Catalog, Release, Repository, fetch_catalog};
use crate::config::KnxkitConfig;
use crate::content::{ContentParser, ProductRef, ReleaseContentModel, ReleaseKey, XmlContentParser};
use crate::error::{Error, Result};
use crate::export::{ExportedArtifact, KeyFileSigner, Signer, export_product};
use crate::extract::{ArchiveExtractor, Extractor};
use crate::gate::{Availability, OperationGate, OperationKind, OperationState};
use crate::remote::{ArchiveDownloader, GitHubClient, ReleaseLister};

/// The pluggable collaborators a toolbox runs against
#[derive(Clone)]
pub struct Capabilities {
    pub lister: Arc<dyn ReleaseLister>,
    pub downloader: Arc<dyn ArchiveDownloader>,
    pub extractor: Arc<dyn Extractor>,
    pub parser: Arc<dyn ContentParser>,
    /// Absent when no signing key is configured; export then fails
    pub signer: Option<Arc<dyn Signer>>,
}

impl Capabilities {
    /// GitHub lister/downloader, archive extractor, XML parser and, when a
    /// key is configured, the Ed25519 signer
    ///
    /// The key file is not read here; see [`KeyFileSigner`].
    pub fn from_config(config: &KnxkitConfig, show_progress: bool) -> Result<Self> {
        let github = Arc::new(GitHubClient::new(&config.remote)?.with_progress(show_progress));

        let signer = config
            .signing
            .key_path
            .as_ref()
            .map(|path| Arc::new(KeyFileSigner::new(path)) as Arc<dyn Signer>);

        Ok(Self {
            lister: github.clone(),
            downloader: github,
            extractor: Arc::new(ArchiveExtractor::new()),
            parser: Arc::new(XmlContentParser::new()),
            signer,
        })
    }
}

/// Catalog, local releases and the operations over them
pub struct Toolbox {
    store: CacheStore,
    capabilities: Capabilities,
    gate: OperationGate,
    catalog: Mutex<Catalog>,
    local: Mutex<Vec<ReleaseContentModel>>,
    selected_product: Mutex<Option<ProductRef>>,
    sort_local_releases: bool,
}

impl Toolbox {
    /// Open a toolbox over `store`, loading the cached catalog and every
    /// local release record
    ///
    /// A missing cache is an empty one; an undecodable cache file fails.
    pub fn open(store: CacheStore, capabilities: Capabilities, sort_local_releases: bool) -> Result<Self> {
        let repositories = store.load_catalog()?;
        let local = store.load_local_releases()?;
        info!(
            "Opened storage {}: {} repositories, {} local releases",
            store.root().display(),
            repositories.len(),
            local.len()
        );

        let toolbox = Self {
            store,
            capabilities,
            gate: OperationGate::new(),
            catalog: Mutex::new(Catalog::new(repositories)),
            local: Mutex::new(local),
            selected_product: Mutex::new(None),
            sort_local_releases,
        };
        if toolbox.sort_local_releases {
            sort_by_repository(&mut toolbox.local.lock());
        }
        Ok(toolbox)
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn state(&self) -> OperationState {
        self.gate.state()
    }

    /// Availability predicates for the current state and selections
    pub fn availability(&self) -> Availability {
        let catalog = self.catalog.lock();
        Availability {
            can_start_update: self.gate.can_start_update(),
            can_start_download: self.gate.can_start_download(catalog.selected_release().is_some()),
            can_select_release: self
                .gate
                .can_select_release(catalog.selected_repository().is_some()),
            can_select_repository: self.gate.can_select_repository(!catalog.is_empty()),
        }
    }

    /// Snapshot of the catalog's repositories
    pub fn repositories(&self) -> Vec<Repository> {
        self.catalog.lock().repositories().to_vec()
    }

    pub fn find_repository(&self, name: &str) -> Option<Repository> {
        self.catalog.lock().find_repository(name).cloned()
    }

    pub fn selected_repository(&self) -> Option<Repository> {
        self.catalog.lock().selected_repository().cloned()
    }

    pub fn selected_release(&self) -> Option<Release> {
        self.catalog.lock().selected_release().cloned()
    }

    /// Snapshot of the local releases, in display order
    pub fn local_releases(&self) -> Vec<ReleaseContentModel> {
        self.local.lock().clone()
    }

    pub fn find_local(&self, repository_name: &str, release_name: &str) -> Option<ReleaseContentModel> {
        self.local
            .lock()
            .iter()
            .find(|m| m.repository_name == repository_name && m.release_name == release_name)
            .cloned()
    }

    /// Select a repository of the catalog
    pub fn select_repository(&self, name: &str) -> Result<Repository> {
        self.gate.ensure_idle("repository selection")?;
        let mut catalog = self.catalog.lock();
        if catalog.is_empty() {
            return Err(Error::NotFoundError(format!(
                "repository '{name}' (catalog is empty, run a refresh first)"
            )));
        }
        let repo = catalog.select_repository(name)?.clone();
        debug!("Selected repository {}", repo.name);
        Ok(repo)
    }

    /// Select a release of the selected repository
    pub fn select_release(&self, name: &str) -> Result<Release> {
        self.gate.ensure_idle("release selection")?;
        let release = self.catalog.lock().select_release(name)?.clone();
        debug!("Selected release {}", release.name);
        Ok(release)
    }

    /// Select a product of a local release for export
    pub fn select_product(
        &self,
        repository_name: &str,
        release_name: &str,
        product_name: &str,
    ) -> Result<ProductRef> {
        let product = {
            let local = self.local.lock();
            let model = local
                .iter()
                .find(|m| m.repository_name == repository_name && m.release_name == release_name)
                .ok_or_else(|| {
                    Error::NotFoundError(format!("local release {repository_name}/{release_name}"))
                })?;
            model.find_product(product_name).ok_or_else(|| {
                Error::NotFoundError(format!("product '{product_name}' in {}", model.key()))
            })?
        };

        *self.selected_product.lock() = Some(product.clone());
        Ok(product)
    }

    pub fn selected_product(&self) -> Option<ProductRef> {
        self.selected_product.lock().clone()
    }

    /// Replace the catalog with a fresh remote listing
    ///
    /// Returns the number of repositories listed. On any failure the
    /// previous catalog stays in place.
    pub async fn refresh(&self, include_prereleases: bool, cancel: &CancellationToken) -> Result<usize> {
        let _guard = self.gate.try_begin(OperationKind::Refresh)?;
        let _lock = self.lock_storage(OperationKind::Refresh)?;

        let repositories = fetch_catalog(
            self.capabilities.lister.as_ref(),
            include_prereleases,
            &self.store,
            cancel,
        )
        .await?;

        let count = repositories.len();
        self.catalog.lock().replace(repositories);
        Ok(count)
    }

    /// Acquire the selected release and register it as a local release
    ///
    /// Fails with [`Error::NoSelectionError`] before touching the network or
    /// the filesystem when no release is selected. A release that is already
    /// local is replaced.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<ReleaseContentModel> {
        let (repository_name, release) = {
            let catalog = self.catalog.lock();
            match (catalog.selected_repository(), catalog.selected_release()) {
                (Some(repo), Some(release)) => (repo.name.clone(), release.clone()),
                _ => return Err(Error::NoSelectionError("release")),
            }
        };

        let _guard = self.gate.try_begin(OperationKind::Acquire)?;
        let _lock = self.lock_storage(OperationKind::Acquire)?;

        let pipeline = AcquisitionPipeline::new(
            &self.store,
            self.capabilities.downloader.as_ref(),
            self.capabilities.extractor.as_ref(),
            self.capabilities.parser.as_ref(),
        );
        let model = pipeline.run(&repository_name, &release, cancel).await?;

        self.register(model.clone());
        Ok(model)
    }

    /// Delete a local release from storage and from the local set
    pub fn remove_local(&self, repository_name: &str, release_name: &str) -> Result<()> {
        let _guard = self.gate.try_begin(OperationKind::Remove)?;
        let _lock = self.lock_storage(OperationKind::Remove)?;

        let model = self
            .find_local(repository_name, release_name)
            .ok_or_else(|| {
                Error::NotFoundError(format!("local release {repository_name}/{release_name}"))
            })?;
        self.store.remove_release(model.folder_name()?)?;

        let key = model.key();
        self.local.lock().retain(|m| m.key() != key);
        self.forget_product_of(&key);
        info!("Removed local release {}", key);
        Ok(())
    }

    /// Export the selected product into `output_dir`
    pub fn export(&self, output_dir: &Path) -> Result<ExportedArtifact> {
        let product = self
            .selected_product()
            .ok_or(Error::NoSelectionError("product"))?;
        let model = self
            .find_local(&product.release.repository_name, &product.release.release_name)
            .ok_or(Error::NoSelectionError("product"))?;
        let signer = self
            .capabilities
            .signer
            .as_ref()
            .ok_or_else(|| Error::SigningError("no signing key configured".to_string()))?;

        export_product(&model, product.index, signer.as_ref(), output_dir)
    }

    /// Default directory exports are written to: `<storage>/Temp`
    pub fn default_export_dir(&self) -> PathBuf {
        self.store.root().join("Temp")
    }

    /// Add a freshly acquired record, replacing any record with the same key
    /// or stored in the same release folder
    fn register(&self, model: ReleaseContentModel) {
        let key = model.key();
        let folder = model.folder_name().ok().map(str::to_owned);
        let replaced: Vec<ReleaseKey> = {
            let mut local = self.local.lock();
            let (replaced, kept): (Vec<_>, Vec<_>) = local.drain(..).partition(|m| {
                m.key() == key || (folder.is_some() && m.folder_name().ok() == folder.as_deref())
            });
            *local = kept;
            local.push(model);
            if self.sort_local_releases {
                sort_by_repository(&mut local);
            }
            replaced.iter().map(ReleaseContentModel::key).collect()
        };

        for old in replaced.iter().filter(|old| **old != key) {
            info!("Local release {} overwritten by {}", old, key);
            self.forget_product_of(old);
        }
        self.forget_product_of(&key);
        debug!("Registered local release {}", key);
    }

    fn forget_product_of(&self, key: &ReleaseKey) {
        let mut selected = self.selected_product.lock();
        if selected.as_ref().is_some_and(|p| &p.release == key) {
            *selected = None;
        }
    }

    fn lock_storage(&self, kind: OperationKind) -> Result<StorageLock> {
        self.store.ensure_root()?;
        self.store
            .try_lock()?
            .ok_or_else(|| Error::ConcurrentOperationError {
                requested: kind.to_string(),
                reason: format!(
                    "storage {} is locked by another process",
                    self.store.root().display()
                ),
            })
    }
}

/// Stable sort, so releases of one repository keep their insertion order
fn sort_by_repository(local: &mut [ReleaseContentModel]) {
    local.sort_by(|a, b| a.repository_name.cmp(&b.repository_name));
}
