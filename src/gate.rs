// src/gate.rs

//! Single-flight operation gate
//!
//! The gate holds one [`OperationState`] value. Starting a refresh, an
//! acquisition or a local removal takes the slot with an atomic
//! check-and-set and returns an [`OperationGuard`]; dropping the guard puts
//! the gate back to idle, whichever way the operation ended (success, error,
//! cancellation or the future being dropped).
//!
//! The availability predicates the presentation layer binds to are derived
//! from the state plus the caller's selection facts, so they can never drift
//! out of sync with what is actually running.

use parking_lot::Mutex;
use std::sync::Arc;
use strum_macros::{Display, EnumString};
use tracing::debug;

use crate::error::{Error, Result};

/// Kinds of long-running operations guarded by the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum OperationKind {
    /// Catalog refresh from the remote lister
    Refresh,
    /// Release acquisition pipeline
    Acquire,
    /// Deleting a local release
    Remove,
}

/// What the process is doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperationState {
    #[default]
    Idle,
    Running(OperationKind),
}

impl OperationState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// The catalog is being refreshed
    pub fn is_updating(&self) -> bool {
        matches!(self, Self::Running(OperationKind::Refresh))
    }

    /// A release is being acquired or a local release is being modified
    pub fn is_downloading(&self) -> bool {
        matches!(
            self,
            Self::Running(OperationKind::Acquire) | Self::Running(OperationKind::Remove)
        )
    }
}

/// Exclusive operation slot shared by every entry point of a toolbox
#[derive(Debug, Clone, Default)]
pub struct OperationGate {
    state: Arc<Mutex<OperationState>>,
}

impl OperationGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state snapshot
    pub fn state(&self) -> OperationState {
        *self.state.lock()
    }

    /// Take the slot for `kind`, failing if anything is already running
    ///
    /// The check and the transition happen under one lock acquisition.
    pub fn try_begin(&self, kind: OperationKind) -> Result<OperationGuard> {
        let mut state = self.state.lock();
        if let OperationState::Running(active) = *state {
            return Err(Error::ConcurrentOperationError {
                requested: kind.to_string(),
                reason: format!("{active} already in progress"),
            });
        }
        *state = OperationState::Running(kind);
        debug!("Operation gate: {} started", kind);

        Ok(OperationGuard {
            state: Arc::clone(&self.state),
            kind,
        })
    }

    /// Fail unless idle; used by actions that do not take the slot themselves
    pub fn ensure_idle(&self, requested: &str) -> Result<()> {
        match self.state() {
            OperationState::Idle => Ok(()),
            OperationState::Running(active) => Err(Error::ConcurrentOperationError {
                requested: requested.to_string(),
                reason: format!("{active} in progress"),
            }),
        }
    }

    pub fn can_start_update(&self) -> bool {
        self.state().is_idle()
    }

    pub fn can_start_download(&self, release_selected: bool) -> bool {
        release_selected && self.state().is_idle()
    }

    pub fn can_select_release(&self, repository_selected: bool) -> bool {
        repository_selected && self.state().is_idle()
    }

    pub fn can_select_repository(&self, catalog_non_empty: bool) -> bool {
        catalog_non_empty && self.state().is_idle()
    }
}

/// Held while an operation runs; releases the gate on drop
#[derive(Debug)]
pub struct OperationGuard {
    state: Arc<Mutex<OperationState>>,
    kind: OperationKind,
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        *self.state.lock() = OperationState::Idle;
        debug!("Operation gate: {} finished", self.kind);
    }
}

/// Snapshot of every availability predicate, for display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Availability {
    pub can_start_update: bool,
    pub can_start_download: bool,
    pub can_select_release: bool,
    pub can_select_repository: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_idle_gate_allows_everything() {
        let gate = OperationGate::new();
        assert!(gate.can_start_update());
        assert!(gate.can_start_download(true));
        assert!(gate.can_select_release(true));
        assert!(gate.can_select_repository(true));
    }

    #[test]
    fn test_selection_facts_still_apply_when_idle() {
        let gate = OperationGate::new();
        assert!(!gate.can_start_download(false));
        assert!(!gate.can_select_release(false));
        assert!(!gate.can_select_repository(false));
    }

    #[test]
    fn test_running_blocks_all_predicates() {
        let gate = OperationGate::new();
        let guard = gate.try_begin(OperationKind::Acquire).unwrap();

        assert!(gate.state().is_downloading());
        assert!(!gate.state().is_updating());
        assert!(!gate.can_start_update());
        assert!(!gate.can_start_download(true));
        assert!(!gate.can_select_release(true));
        assert!(!gate.can_select_repository(true));

        drop(guard);
        assert!(gate.state().is_idle());
        assert!(gate.can_start_update());
    }

    #[test]
    fn test_second_begin_is_rejected() {
        let gate = OperationGate::new();
        let _guard = gate.try_begin(OperationKind::Refresh).unwrap();

        let err = gate.try_begin(OperationKind::Acquire).unwrap_err();
        assert!(err.is_concurrent());
        assert!(err.to_string().contains("refresh already in progress"));

        let err = gate.try_begin(OperationKind::Refresh).unwrap_err();
        assert!(err.is_concurrent());
    }

    #[test]
    fn test_guard_releases_on_early_return() {
        fn failing(gate: &OperationGate) -> Result<()> {
            let _guard = gate.try_begin(OperationKind::Refresh)?;
            Err(Error::RefreshError("remote unavailable".to_string()))
        }

        let gate = OperationGate::new();
        assert!(failing(&gate).is_err());
        assert!(gate.state().is_idle());
    }

    #[test]
    fn test_ensure_idle() {
        let gate = OperationGate::new();
        gate.ensure_idle("repository selection").unwrap();

        let _guard = gate.try_begin(OperationKind::Acquire).unwrap();
        let err = gate.ensure_idle("repository selection").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot start repository selection: acquire in progress"
        );
    }

    #[test]
    fn test_clones_share_state() {
        let gate = OperationGate::new();
        let other = gate.clone();
        let _guard = gate.try_begin(OperationKind::Remove).unwrap();
        assert!(!other.can_start_update());
    }

    #[test]
    fn test_kind_display_and_parse() {
        assert_eq!(OperationKind::Refresh.to_string(), "refresh");
        assert_eq!(OperationKind::from_str("acquire").unwrap(), OperationKind::Acquire);
    }
}
