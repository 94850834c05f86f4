//! Locksmith core library: domain types, run configuration, errors.
//!
//! Public API surface:
//! - [`types`]: package files, upgrades, dialects, sync outcome
//! - [`error`]: [`ConfigError`]
//! - [`config`]: [`RunConfig`] load / validate

pub mod config;
pub mod error;
pub mod types;

pub use config::{GeneratorCommand, GeneratorOverrides, RunConfig};
pub use error::ConfigError;
pub use types::{
    Dialect, LockFileError, PackageFile, SyncOutcome, UpdatedLockFile, UpdatedPackageFile,
    Upgrade, UpgradeType, WorkspaceDir,
};
