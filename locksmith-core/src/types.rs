//! Domain types for a lock-file synchronization run.
//!
//! Repository paths are `String`s with `/` separators, relative to the
//! repository root: they name files on a branch, not files on this machine.
//! All types are serializable/deserializable via serde (camelCase keys, the
//! shape upstream stages produce).

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Dialect
// ---------------------------------------------------------------------------

/// A supported lock-file format, each with its own generator and file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// `package-lock.json`, generated by npm.
    Npm,
    /// `yarn.lock`, generated by yarn.
    Yarn,
}

impl Dialect {
    /// Every dialect, in the order lock files are generated and reported.
    pub fn all() -> &'static [Dialect] {
        &[Dialect::Npm, Dialect::Yarn]
    }

    pub fn lock_file_name(self) -> &'static str {
        match self {
            Dialect::Npm => "package-lock.json",
            Dialect::Yarn => "yarn.lock",
        }
    }

    /// The per-directory configuration file the generator reads.
    pub fn config_file_name(self) -> &'static str {
        match self {
            Dialect::Npm => ".npmrc",
            Dialect::Yarn => ".yarnrc",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Npm => write!(f, "npm"),
            Dialect::Yarn => write!(f, "yarn"),
        }
    }
}

// ---------------------------------------------------------------------------
// Upgrades
// ---------------------------------------------------------------------------

/// Discriminator for a proposed change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UpgradeType {
    Pin,
    Digest,
    Patch,
    Minor,
    Major,
    /// Regenerate every existing lock file regardless of manifest edits.
    LockFileMaintenance,
    #[serde(other)]
    Other,
}

/// One proposed change. Only `type` drives the engine; the rest is logged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Upgrade {
    #[serde(rename = "type")]
    pub upgrade_type: UpgradeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dep_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_version: Option<String>,
}

impl Upgrade {
    pub fn new(upgrade_type: UpgradeType) -> Self {
        Self {
            upgrade_type,
            dep_name: None,
            current_version: None,
            new_version: None,
        }
    }

    pub fn is_lock_file_maintenance(&self) -> bool {
        self.upgrade_type == UpgradeType::LockFileMaintenance
    }
}

// ---------------------------------------------------------------------------
// Package files
// ---------------------------------------------------------------------------

/// A manifest known at HEAD, with its lock-file presence flags.
///
/// The flags are the only source of truth for "does this directory have a
/// lock file"; nothing in a run probes the file system to answer that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PackageFile {
    /// Repository-relative manifest path, e.g. `packages/a/package.json`.
    pub package_file: String,
    /// Parsed manifest.
    #[serde(default)]
    pub content: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub npmrc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yarnrc: Option<String>,
    #[serde(default)]
    pub has_package_lock: bool,
    #[serde(default)]
    pub has_yarn_lock: bool,
    /// Directory of the monorepo root owning this package's shared lock file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_dir: Option<String>,
}

impl PackageFile {
    pub fn new(package_file: impl Into<String>, content: serde_json::Value) -> Self {
        Self {
            package_file: package_file.into(),
            content,
            npmrc: None,
            yarnrc: None,
            has_package_lock: false,
            has_yarn_lock: false,
            workspace_dir: None,
        }
    }

    /// Repository directory containing the manifest (`"."` at the root).
    pub fn dir(&self) -> String {
        parent_dir(&self.package_file)
    }

    pub fn has_lock_file(&self, dialect: Dialect) -> bool {
        match dialect {
            Dialect::Npm => self.has_package_lock,
            Dialect::Yarn => self.has_yarn_lock,
        }
    }

    /// Local dialect config override (`.npmrc` / `.yarnrc` content).
    pub fn dialect_config(&self, dialect: Dialect) -> Option<&str> {
        match dialect {
            Dialect::Npm => self.npmrc.as_deref(),
            Dialect::Yarn => self.yarnrc.as_deref(),
        }
    }
}

/// A proposed manifest edit: target path plus serialized new content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdatedPackageFile {
    pub name: String,
    pub contents: String,
}

/// A monorepo root owning a shared lock file for its member packages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WorkspaceDir {
    pub dir: String,
    #[serde(default)]
    pub has_package_lock: bool,
    #[serde(default)]
    pub has_yarn_lock: bool,
}

impl WorkspaceDir {
    pub fn has_lock_file(&self, dialect: Dialect) -> bool {
        match dialect {
            Dialect::Npm => self.has_package_lock,
            Dialect::Yarn => self.has_yarn_lock,
        }
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// A regenerated lock file whose content differs from the baseline branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatedLockFile {
    pub name: String,
    pub contents: String,
}

/// A lock file that could not be regenerated, with the generator's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockFileError {
    pub lock_file: String,
    pub stderr: String,
}

/// Result of one synchronization run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    pub updated_lock_files: Vec<UpdatedLockFile>,
    pub lock_file_errors: Vec<LockFileError>,
}

impl SyncOutcome {
    pub fn has_errors(&self) -> bool {
        !self.lock_file_errors.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.updated_lock_files.is_empty() && self.lock_file_errors.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Repository path helpers
// ---------------------------------------------------------------------------

/// Directory part of a repository path; `"."` for top-level files.
pub fn parent_dir(path: &str) -> String {
    match path.rsplit_once('/') {
        Some((dir, _)) if !dir.is_empty() => dir.to_string(),
        _ => ".".to_string(),
    }
}

/// Join a repository directory and a file name; `"."` joins to the bare name.
pub fn join_repo_path(dir: &str, file: &str) -> String {
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() || dir == "." {
        file.to_string()
    } else {
        format!("{dir}/{file}")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
