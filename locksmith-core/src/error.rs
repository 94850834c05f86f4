//! Error types for locksmith-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from loading or validating a run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure (file not found, permission denied, etc.).
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load: includes file path and line context from serde_yaml.
    #[error("failed to parse run config at {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// JSON parse error on load.
    #[error("failed to parse run config at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A repository path that would escape the staging root or is not relative.
    #[error("invalid repository path '{path}': {reason}")]
    InvalidPath { path: String, reason: &'static str },

    /// Lock file maintenance needs the maintenance branch name to short-circuit.
    #[error("lock file maintenance requested but no branchName configured")]
    MissingBranchName,

    /// `concurrency: 0` would never schedule a generator.
    #[error("concurrency must be at least 1")]
    InvalidConcurrency,
}
