//! Error types for record and result persistence.

use std::path::PathBuf;

use thiserror::Error;

/// Convenient alias for store results.
pub type StoreResult<T> = Result<T, StoreError>;

/// Failure while reading or writing a persisted artifact.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure (missing file, permissions, full disk, ...).
    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file exists but is not a valid record.
    #[error("invalid record json at {}: {source}", path.display())]
    Serde {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn serde(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        StoreError::Serde {
            path: path.into(),
            source,
        }
    }

    /// Path of the artifact the error refers to.
    pub fn path(&self) -> &std::path::Path {
        match self {
            StoreError::Io { path, .. } | StoreError::Serde { path, .. } => path,
        }
    }
}
