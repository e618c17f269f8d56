// src/catalog/mod.rs

//! Metadata catalog
//!
//! In-memory view of the remote repositories and their releases, plus the
//! current repository/release selection. Refreshes replace the repository
//! set wholesale; see [`refresh`].

mod refresh;
mod types;

pub use refresh::fetch_catalog;
pub use types::{Release, ReleaseId, Repository};

use tracing::debug;

use crate::error::{Error, Result};

/// Known repositories and the user's selection within them
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    repositories: Vec<Repository>,
    selected_repository: Option<String>,
    selected_release: Option<ReleaseId>,
}

impl Catalog {
    pub fn new(repositories: Vec<Repository>) -> Self {
        Self {
            repositories,
            ..Default::default()
        }
    }

    pub fn repositories(&self) -> &[Repository] {
        &self.repositories
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }

    pub fn find_repository(&self, name: &str) -> Option<&Repository> {
        self.repositories.iter().find(|r| r.name == name)
    }

    /// Replace the repository set with a fresh listing
    ///
    /// Nothing from the previous set survives. Selections that no longer
    /// resolve against the new set are cleared.
    pub fn replace(&mut self, repositories: Vec<Repository>) {
        self.repositories = repositories;

        if self.selected_repository().is_none() {
            self.selected_repository = None;
            self.selected_release = None;
        } else if self.selected_release().is_none() {
            self.selected_release = None;
        }
        debug!(
            "Catalog replaced: {} repositories",
            self.repositories.len()
        );
    }

    /// Select a repository by name
    ///
    /// The release selection is kept only if it belongs to the new repository.
    pub fn select_repository(&mut self, name: &str) -> Result<&Repository> {
        let repo = self
            .repositories
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| Error::NotFoundError(format!("repository '{name}'")))?;

        if let Some(release) = &self.selected_release
            && !repo.contains(release)
        {
            self.selected_release = None;
        }
        self.selected_repository = Some(repo.name.clone());
        Ok(repo)
    }

    /// Select a release of the currently selected repository
    pub fn select_release(&mut self, name: &str) -> Result<&Release> {
        let repo_name = self
            .selected_repository
            .clone()
            .ok_or(Error::NoSelectionError("repository"))?;
        let repo = self
            .repositories
            .iter()
            .find(|r| r.name == repo_name)
            .ok_or(Error::NoSelectionError("repository"))?;

        let release = repo.find_release(name).ok_or_else(|| Error::SelectionMismatch {
            repository: repo_name.clone(),
            release: name.to_string(),
        })?;
        self.selected_release = Some(release.id());
        Ok(release)
    }

    pub fn selected_repository(&self) -> Option<&Repository> {
        let name = self.selected_repository.as_deref()?;
        self.find_repository(name)
    }

    pub fn selected_release(&self) -> Option<&Release> {
        let id = self.selected_release.as_ref()?;
        self.selected_repository()?
            .releases
            .iter()
            .find(|r| id.matches(r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn release(name: &str) -> Release {
        Release {
            name: name.to_string(),
            url: format!("https://example/{name}"),
            major: 1,
            minor: 0,
            build: 0,
            published: Utc::now(),
            is_prerelease: false,
        }
    }

    fn catalog() -> Catalog {
        Catalog::new(vec![
            Repository::new("OGM", vec![release("OGM-1.0.0.zip")]),
            Repository::new("SEN", vec![release("SEN-1.0.0.zip")]),
        ])
    }

    #[test]
    fn test_select_release_requires_repository() {
        let mut catalog = catalog();
        let err = catalog.select_release("OGM-1.0.0.zip").unwrap_err();
        assert!(matches!(err, Error::NoSelectionError("repository")));
    }

    #[test]
    fn test_select_release_from_other_repository_is_rejected() {
        let mut catalog = catalog();
        catalog.select_repository("OGM").unwrap();

        let err = catalog.select_release("SEN-1.0.0.zip").unwrap_err();
        assert!(matches!(err, Error::SelectionMismatch { .. }));
        assert!(catalog.selected_release().is_none());
    }

    #[test]
    fn test_switching_repository_drops_foreign_release() {
        let mut catalog = catalog();
        catalog.select_repository("OGM").unwrap();
        catalog.select_release("OGM-1.0.0.zip").unwrap();

        catalog.select_repository("SEN").unwrap();
        assert!(catalog.selected_release().is_none());
        assert_eq!(catalog.selected_repository().unwrap().name, "SEN");
    }

    #[test]
    fn test_replace_drops_stale_entries_and_selection() {
        let mut catalog = catalog();
        catalog.select_repository("OGM").unwrap();
        catalog.select_release("OGM-1.0.0.zip").unwrap();

        let fresh = vec![Repository::new("SEN", vec![release("SEN-2.0.0.zip")])];
        catalog.replace(fresh.clone());

        assert_eq!(catalog.repositories(), fresh.as_slice());
        assert!(catalog.find_repository("OGM").is_none());
        assert!(catalog.selected_repository().is_none());
        assert!(catalog.selected_release().is_none());
    }

    #[test]
    fn test_replace_keeps_selection_that_still_resolves() {
        let mut catalog = catalog();
        catalog.select_repository("OGM").unwrap();
        catalog.select_release("OGM-1.0.0.zip").unwrap();

        let fresh = vec![Repository::new(
            "OGM",
            vec![release("OGM-1.1.0.zip"), release("OGM-1.0.0.zip")],
        )];
        catalog.replace(fresh);

        assert_eq!(catalog.selected_release().unwrap().name, "OGM-1.0.0.zip");
    }

    #[test]
    fn test_unknown_repository() {
        let mut catalog = catalog();
        assert!(matches!(
            catalog.select_repository("XYZ"),
            Err(Error::NotFoundError(_))
        ));
    }
}
