// src/error.rs

//! Crate-wide error type
//!
//! Every fallible operation in the library returns [`Result`]. Variants map
//! to the stage that failed so callers can report which step of a refresh,
//! acquisition or export went wrong.

use std::path::PathBuf;
use thiserror::Error;

use crate::acquire::AcquireStep;
use crate::gate::OperationKind;

/// Result type used throughout knxkit
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the cache store, catalog, acquisition pipeline and export step
#[derive(Error, Debug)]
pub enum Error {
    /// A cache document exists but cannot be decoded
    #[error("Corrupt cache file {path}: {reason}")]
    CorruptCacheError { path: PathBuf, reason: String },

    /// The remote lister failed; the catalog was left untouched
    #[error("Failed to refresh release catalog: {0}")]
    RefreshError(String),

    /// Archive transfer failed
    #[error("Download failed: {0}")]
    DownloadError(String),

    /// A release name has no extension to strip
    #[error("Release name '{0}' has no file extension")]
    NameFormatError(String),

    /// The extraction capability failed
    #[error("Extraction failed: {0}")]
    ExtractError(String),

    /// The extracted payload could not be parsed into a release record
    #[error("Failed to parse release content: {0}")]
    ParseError(String),

    /// Another operation holds the gate or the storage lock
    #[error("Cannot start {requested}: {reason}")]
    ConcurrentOperationError { requested: String, reason: String },

    /// The operation needs a selection that has not been made
    #[error("No {0} selected")]
    NoSelectionError(&'static str),

    /// The selected release does not belong to the selected repository
    #[error("Release '{release}' is not part of repository '{repository}'")]
    SelectionMismatch { repository: String, release: String },

    /// The signer failed
    #[error("Signing failed: {0}")]
    SigningError(String),

    /// The operation was cancelled at a suspension point
    #[error("{0} cancelled")]
    Cancelled(OperationKind),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Requested item does not exist
    #[error("Not found: {0}")]
    NotFoundError(String),

    /// Local filesystem failure outside a more specific category
    #[error("I/O error: {0}")]
    IoError(String),
}

impl Error {
    /// The acquisition step this error is attributed to, when it identifies one
    pub fn step(&self) -> Option<AcquireStep> {
        match self {
            Self::DownloadError(_) => Some(AcquireStep::Download),
            Self::NameFormatError(_) => Some(AcquireStep::FolderName),
            Self::ExtractError(_) => Some(AcquireStep::Extract),
            Self::ParseError(_) => Some(AcquireStep::Parse),
            _ => None,
        }
    }

    /// Whether this error came from a gate or lock conflict
    pub fn is_concurrent(&self) -> bool {
        matches!(self, Self::ConcurrentOperationError { .. })
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::IoError(e.to_string())
    }
}
