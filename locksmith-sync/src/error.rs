//! Error types for locksmith-sync.
//!
//! Only input-contract violations escape a run. Everything local to one
//! directory (staging writes, generator failures, baseline lookups) is
//! recorded in the outcome instead.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can abort a sync run or a lock-file write-back.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An updated manifest that is not among the known package files.
    #[error("unknown package file '{path}': not present in packageFiles")]
    UnknownPackageFile { path: String },

    /// A package file points at a workspace root that was never declared.
    #[error("package file '{package_file}' references unknown workspace dir '{dir}'")]
    UnknownWorkspaceDir { package_file: String, dir: String },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Manifest content that is not valid JSON.
    #[error("manifest JSON error in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
