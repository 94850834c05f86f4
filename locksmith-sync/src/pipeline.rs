//! Sync pipeline entrypoint used by the CLI and embedding callers.

use std::path::{Path, PathBuf};
use std::time::Instant;

use locksmith_core::{RunConfig, SyncOutcome};
use tracing::Instrument;

use crate::context::SyncContext;
use crate::diff::reconcile;
use crate::error::{io_err, SyncError};
use crate::materializer::{stage, StagingReport};
use crate::resolver::determine_lock_file_dirs;

/// Regenerate the lock files affected by `config` and return those that changed.
///
/// Only input-contract violations ([`SyncError::UnknownPackageFile`],
/// [`SyncError::UnknownWorkspaceDir`]) are returned as errors. Every
/// per-directory problem lands in [`SyncOutcome::lock_file_errors`] next to
/// whatever lock files did change.
pub async fn get_updated_lock_files(
    ctx: &SyncContext,
    config: &RunConfig,
) -> Result<SyncOutcome, SyncError> {
    let span = tracing::info_span!(
        parent: ctx.span(),
        "lock_files",
        parent_branch = %config.parent_branch,
        maintenance = config.is_lock_file_maintenance(),
    );
    run(ctx, config).instrument(span).await
}

async fn run(ctx: &SyncContext, config: &RunConfig) -> Result<SyncOutcome, SyncError> {
    let started = Instant::now();

    if config.is_lock_file_maintenance() {
        if let Some(branch) = config.branch_name.as_deref() {
            match ctx.platform().branch_exists(branch).await {
                Ok(true) => {
                    tracing::info!(branch, "lock file maintenance branch already exists, skipping");
                    return Ok(SyncOutcome::default());
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(branch, error = %e, "branch lookup failed, assuming it does not exist");
                }
            }
        }
    }

    let dirs = determine_lock_file_dirs(config)?;
    if dirs.is_empty() {
        tracing::debug!("no lock files to regenerate");
        return Ok(SyncOutcome::default());
    }

    // Held until the run ends; dropping it removes the staging tree.
    let mut _temp_dir = None;
    let (staging_root, root_error) = match &config.staging_dir {
        Some(dir) => (dir.clone(), ensure_dir(dir).err()),
        None => match tempfile::Builder::new().prefix("locksmith-").tempdir() {
            Ok(temp) => {
                let root = temp.path().to_path_buf();
                _temp_dir = Some(temp);
                (root, None)
            }
            Err(e) => (PathBuf::new(), Some(e.to_string())),
        },
    };
    tracing::debug!(staging_root = %staging_root.display(), "staging lock file inputs");

    let staging = match root_error {
        Some(message) => {
            tracing::error!(error = %message, "staging root unavailable");
            StagingReport::root_failed(message)
        }
        None => stage(ctx, config, &staging_root).await,
    };
    if staging.is_clean() {
        tracing::debug!("staging complete");
    }

    let outcome = reconcile(
        ctx,
        &dirs,
        &staging_root,
        &staging,
        &config.parent_branch,
        config.concurrency,
    )
    .await;

    tracing::info!(
        generated = dirs.len(),
        updated = outcome.updated_lock_files.len(),
        errors = outcome.lock_file_errors.len(),
        duration_ms = started.elapsed().as_millis() as u64,
        "lock file sync complete"
    );
    Ok(outcome)
}

fn ensure_dir(dir: &Path) -> Result<(), String> {
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e).to_string())
}
