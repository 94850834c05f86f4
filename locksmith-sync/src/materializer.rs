//! Staging-directory materialization.
//!
//! Writes a snapshot of the repository's package layout into a staging root
//! so the generators can run against it:
//!
//! 1. repository-root `.npmrc` / `.yarnrc` overrides, once, at the root;
//! 2. per package file: massaged `package.json`, rc files, and (outside lock
//!    file maintenance) the baseline lock files, so generators update
//!    incrementally instead of resolving from scratch;
//! 3. proposed manifest edits over the staged copies.
//!
//! Manifests get the same massaging on both the baseline and the proposed
//! path; otherwise field differences alone would show up as lock diffs.
//!
//! Failures are recorded per repository directory in a [`StagingReport`]
//! and never abort staging of other directories.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use locksmith_core::types::{join_repo_path, parent_dir, Dialect, PackageFile};
use locksmith_core::RunConfig;
use serde_json::Value;

use crate::context::SyncContext;
use crate::error::{io_err, SyncError};

const MANIFEST: &str = "package.json";

/// Manifest fields that only matter at install/run time and trip generators.
const STRIPPED_FIELDS: &[&str] = &["scripts", "engines"];

/// `.yarnrc` directives that stop yarn from writing a lock file.
const BLOCKING_YARNRC_DIRECTIVES: &[&str] = &[
    "--install.pure-lockfile true",
    "--install.frozen-lockfile true",
];

// ---------------------------------------------------------------------------
// Staging report
// ---------------------------------------------------------------------------

/// Directories whose staging failed, keyed by repository directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagingReport {
    root_failure: Option<String>,
    failures: BTreeMap<String, String>,
}

impl StagingReport {
    /// A report where the staging root itself is unusable: every directory fails.
    pub fn root_failed(message: impl Into<String>) -> Self {
        Self {
            root_failure: Some(message.into()),
            failures: BTreeMap::new(),
        }
    }

    pub fn failure_for(&self, dir: &str) -> Option<&str> {
        self.root_failure
            .as_deref()
            .or_else(|| self.failures.get(dir).map(String::as_str))
    }

    pub fn is_clean(&self) -> bool {
        self.root_failure.is_none() && self.failures.is_empty()
    }

    fn record_root(&mut self, message: String) {
        tracing::error!(error = %message, "repository config override failed");
        self.root_failure.get_or_insert(message);
    }

    fn record(&mut self, dir: &str, message: String) {
        tracing::warn!(dir, error = %message, "staging failed");
        // First failure wins; it is usually the cause of any later ones.
        self.failures.entry(dir.to_string()).or_insert(message);
    }
}

// ---------------------------------------------------------------------------
// Massaging
// ---------------------------------------------------------------------------

/// Strip fields irrelevant to lock generation and sanitise `name`.
///
/// Every other key, including dependency maps, passes through in order.
pub fn massage_manifest(content: &Value) -> Value {
    let mut massaged = content.clone();
    if let Value::Object(map) = &mut massaged {
        for field in STRIPPED_FIELDS {
            map.remove(*field);
        }
        if let Some(Value::String(name)) = map.get_mut("name") {
            name.retain(|c| c != '{' && c != '}');
        }
    }
    massaged
}

/// Drop `.yarnrc` directives that would make yarn refuse to update the lock file.
pub fn massage_yarnrc(content: &str) -> String {
    BLOCKING_YARNRC_DIRECTIVES
        .iter()
        .fold(content.to_string(), |acc, directive| acc.replace(directive, ""))
}

fn massage_dialect_config(dialect: Dialect, content: &str) -> String {
    match dialect {
        Dialect::Npm => content.to_string(),
        Dialect::Yarn => massage_yarnrc(content),
    }
}

fn render_manifest(content: &Value) -> Result<String, serde_json::Error> {
    let mut rendered = serde_json::to_string_pretty(&massage_manifest(content))?;
    rendered.push('\n');
    Ok(rendered)
}

/// Whether an updated file is a manifest, judged by file name alone.
pub fn is_manifest(path: &str) -> bool {
    path == MANIFEST || path.ends_with("/package.json")
}

/// Staging directory mirroring repository directory `dir`.
pub fn staged_dir(staging_root: &Path, dir: &str) -> PathBuf {
    if dir == "." || dir.is_empty() {
        staging_root.to_path_buf()
    } else {
        staging_root.join(dir)
    }
}

// ---------------------------------------------------------------------------
// File helpers
// ---------------------------------------------------------------------------

async fn write_file(path: &Path, content: &str) -> Result<(), SyncError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| io_err(parent, e))?;
    }
    tokio::fs::write(path, content)
        .await
        .map_err(|e| io_err(path, e))
}

async fn remove_if_present(path: &Path) -> Result<(), SyncError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_err(path, e)),
    }
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// Populate `staging_root` for the run described by `config`.
///
/// Never reads back what it wrote. Failures are returned as data.
pub async fn stage(ctx: &SyncContext, config: &RunConfig, staging_root: &Path) -> StagingReport {
    let mut report = StagingReport::default();
    write_root_overrides(config, staging_root, &mut report).await;
    write_existing_files(ctx, config, staging_root, &mut report).await;
    write_updated_package_files(config, staging_root, &mut report).await;
    report
}

async fn write_root_overrides(config: &RunConfig, staging_root: &Path, report: &mut StagingReport) {
    for dialect in Dialect::all() {
        let Some(content) = config.dialect_config(*dialect) else {
            continue;
        };
        let path = staging_root.join(dialect.config_file_name());
        tracing::debug!(file = dialect.config_file_name(), "writing repository config override");
        if let Err(e) = write_file(&path, &massage_dialect_config(*dialect, content)).await {
            report.record_root(e.to_string());
        }
    }
}

/// Record a failure for `dir`, and for the workspace root whose shared lock
/// file is generated from it.
fn record_package_failure(
    report: &mut StagingReport,
    config: &RunConfig,
    manifest: &str,
    dir: &str,
    message: String,
) {
    let workspace_dir = config
        .package_files
        .iter()
        .find(|p| p.package_file == manifest)
        .and_then(|p| p.workspace_dir.as_deref());
    if let Some(root) = workspace_dir.filter(|root| *root != dir) {
        report.record(root, format!("workspace member {dir}: {message}"));
    }
    report.record(dir, message);
}

/// Whether `dialect`'s lock file exists at HEAD in `package_file`'s directory,
/// by its own flags or those of a workspace root declared there.
fn has_lock_at_head(config: &RunConfig, package_file: &PackageFile, dialect: Dialect) -> bool {
    let dir = package_file.dir();
    package_file.has_lock_file(dialect)
        || config
            .workspace_dirs
            .iter()
            .any(|w| w.dir == dir && w.has_lock_file(dialect))
}

/// Stage every known package file as it exists on the baseline.
pub async fn write_existing_files(
    ctx: &SyncContext,
    config: &RunConfig,
    staging_root: &Path,
    report: &mut StagingReport,
) {
    let maintenance = config.is_lock_file_maintenance();
    for package_file in &config.package_files {
        let dir = package_file.dir();
        if let Err(e) =
            write_existing_package(ctx, config, package_file, staging_root, maintenance).await
        {
            record_package_failure(report, config, &package_file.package_file, &dir, e);
        }
    }
}

async fn write_existing_package(
    ctx: &SyncContext,
    config: &RunConfig,
    package_file: &PackageFile,
    staging_root: &Path,
    maintenance: bool,
) -> Result<(), String> {
    let dir = package_file.dir();
    let basedir = staged_dir(staging_root, &dir);

    tracing::debug!(dir = %dir, "writing package.json");
    let manifest = render_manifest(&package_file.content).map_err(|e| {
        SyncError::Json {
            path: package_file.package_file.clone(),
            source: e,
        }
        .to_string()
    })?;
    write_file(&basedir.join(MANIFEST), &manifest)
        .await
        .map_err(|e| e.to_string())?;

    let participates = Dialect::all()
        .iter()
        .any(|d| has_lock_at_head(config, package_file, *d));
    for dialect in Dialect::all() {
        let local = package_file.dialect_config(*dialect);
        let content = match local {
            Some(content) => Some(content),
            None if participates => config.dialect_config(*dialect),
            None => None,
        };
        if let Some(content) = content {
            tracing::debug!(dir = %dir, file = dialect.config_file_name(), "writing config");
            write_file(
                &basedir.join(dialect.config_file_name()),
                &massage_dialect_config(*dialect, content),
            )
            .await
            .map_err(|e| e.to_string())?;
        }
    }

    for dialect in Dialect::all() {
        let lock_path = basedir.join(dialect.lock_file_name());
        let existing = if !maintenance && has_lock_at_head(config, package_file, *dialect) {
            let repo_path = join_repo_path(&dir, dialect.lock_file_name());
            ctx.platform()
                .get_file_content(&repo_path, &config.parent_branch)
                .await
                .map_err(|e| format!("failed to read {repo_path} from {}: {e}", config.parent_branch))?
        } else {
            None
        };
        let written = match existing {
            Some(content) => {
                tracing::debug!(dir = %dir, lock_file = dialect.lock_file_name(), "copying existing lock file");
                write_file(&lock_path, &content).await
            }
            // No stale lock may survive in staging: generators treat it as the baseline.
            None => remove_if_present(&lock_path).await,
        };
        written.map_err(|e| e.to_string())?;
    }
    Ok(())
}

/// Overwrite staged manifests with the proposed edits.
pub async fn write_updated_package_files(
    config: &RunConfig,
    staging_root: &Path,
    report: &mut StagingReport,
) {
    if config.updated_package_files.is_empty() {
        tracing::debug!("no updated package files");
        return;
    }
    for updated in &config.updated_package_files {
        if !is_manifest(&updated.name) {
            tracing::debug!(file = %updated.name, "skipping non-manifest update");
            continue;
        }
        let dir = parent_dir(&updated.name);
        tracing::debug!(file = %updated.name, "writing updated package file");

        let result = serde_json::from_str::<Value>(&updated.contents)
            .and_then(|content| render_manifest(&content))
            .map_err(|e| SyncError::Json {
                path: updated.name.clone(),
                source: e,
            });
        let result = match result {
            Ok(manifest) => {
                write_file(&staged_dir(staging_root, &dir).join(MANIFEST), &manifest).await
            }
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            record_package_failure(report, config, &updated.name, &dir, e.to_string());
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
