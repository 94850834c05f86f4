//! Generation fan-out, baseline comparison and failure aggregation.
//!
//! One task per directory runs that directory's dialects in order, so two
//! generators never share a working directory. Directory tasks run
//! concurrently up to the configured limit. Each (directory, dialect) pair
//! ends in exactly one of: changed, unchanged, failed. Failures are data:
//! a broken directory never stops its siblings.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use locksmith_core::types::join_repo_path;
use locksmith_core::{Dialect, LockFileError, SyncOutcome, UpdatedLockFile};
use similar::TextDiff;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::Instrument;

use crate::context::SyncContext;
use crate::materializer::{staged_dir, StagingReport};
use crate::resolver::LockFileDirs;

/// How one (directory, dialect) pair ended.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PairOutcome {
    Changed(UpdatedLockFile),
    Unchanged,
    Failed(LockFileError),
}

/// Generate every resolved lock file and keep the ones that differ from
/// `parent_branch`.
///
/// Output order is deterministic: npm pairs in resolver order, then yarn.
pub async fn reconcile(
    ctx: &SyncContext,
    dirs: &LockFileDirs,
    staging_root: &Path,
    staging: &StagingReport,
    parent_branch: &str,
    concurrency: usize,
) -> SyncOutcome {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut join_set = JoinSet::new();

    for (dir, dialects) in dirs.by_directory() {
        let ctx = ctx.clone();
        let semaphore = Arc::clone(&semaphore);
        let staged = staged_dir(staging_root, &dir);
        let staging_failure = staging.failure_for(&dir).map(str::to_owned);
        let parent_branch = parent_branch.to_owned();

        join_set.spawn(
            async move {
                // The semaphore is never closed.
                let _permit = semaphore.acquire_owned().await.ok();
                let mut results = Vec::with_capacity(dialects.len());
                for dialect in dialects {
                    let outcome = reconcile_pair(
                        &ctx,
                        dialect,
                        &dir,
                        &staged,
                        staging_failure.as_deref(),
                        &parent_branch,
                    )
                    .await;
                    results.push(((dialect, dir.clone()), outcome));
                }
                results
            }
            .in_current_span(),
        );
    }

    let mut outcomes: HashMap<(Dialect, String), PairOutcome> = HashMap::new();
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok(results) => outcomes.extend(results),
            Err(e) => tracing::error!(error = %e, "lock file task aborted"),
        }
    }

    let mut outcome = SyncOutcome::default();
    for dialect in Dialect::all() {
        for dir in dirs.dirs(*dialect) {
            let lock_file = join_repo_path(dir, dialect.lock_file_name());
            match outcomes.remove(&(*dialect, dir.clone())) {
                Some(PairOutcome::Changed(file)) => outcome.updated_lock_files.push(file),
                Some(PairOutcome::Unchanged) => {}
                Some(PairOutcome::Failed(err)) => outcome.lock_file_errors.push(err),
                None => outcome.lock_file_errors.push(LockFileError {
                    lock_file,
                    stderr: "lock file generation task aborted".to_string(),
                }),
            }
        }
    }
    outcome
}

async fn reconcile_pair(
    ctx: &SyncContext,
    dialect: Dialect,
    dir: &str,
    staged: &Path,
    staging_failure: Option<&str>,
    parent_branch: &str,
) -> PairOutcome {
    let lock_file = join_repo_path(dir, dialect.lock_file_name());
    let failed = |stderr: String| {
        PairOutcome::Failed(LockFileError {
            lock_file: lock_file.clone(),
            stderr,
        })
    };

    if let Some(message) = staging_failure {
        tracing::warn!(%dialect, dir, "skipping generation, staging failed");
        return failed(format!("staging failed: {message}"));
    }

    tracing::debug!(%dialect, dir, "generating {}", dialect.lock_file_name());
    let new_content = match ctx.generator().generate(dialect, staged).await {
        Ok(content) => content,
        Err(failure) => {
            tracing::warn!(%dialect, dir, error = %failure, "lock file generation failed");
            return failed(failure.message);
        }
    };

    match ctx
        .platform()
        .get_file_content(&lock_file, parent_branch)
        .await
    {
        Ok(Some(existing)) if existing == new_content => {
            tracing::debug!(lock_file = %lock_file, "lock file hasn't changed");
            PairOutcome::Unchanged
        }
        Ok(_) => {
            tracing::debug!(lock_file = %lock_file, "lock file needs updating");
            PairOutcome::Changed(UpdatedLockFile {
                name: lock_file.clone(),
                contents: new_content,
            })
        }
        Err(e) => {
            tracing::warn!(lock_file = %lock_file, error = %e, "baseline lookup failed");
            failed(format!("failed to read baseline {lock_file}: {e}"))
        }
    }
}

// ---------------------------------------------------------------------------
// Unified diff preview
// ---------------------------------------------------------------------------

/// A single changed lock file rendered as a unified diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    pub path: String,
    pub unified_diff: String,
}

/// Unified diff of `old` → `new` with `a/` / `b/` headers.
pub fn unified_diff(path: &str, old: &str, new: &str) -> String {
    let old_header = format!("a/{path}");
    let new_header = format!("b/{path}");
    TextDiff::from_lines(old, new)
        .unified_diff()
        .header(&old_header, &new_header)
        .context_radius(3)
        .to_string()
}

/// Render each updated lock file against its content on `parent_branch`.
///
/// A file missing from the baseline diffs against empty content.
pub async fn diff_lock_files(
    ctx: &SyncContext,
    outcome: &SyncOutcome,
    parent_branch: &str,
) -> Vec<FileDiff> {
    let mut diffs = Vec::with_capacity(outcome.updated_lock_files.len());
    for file in &outcome.updated_lock_files {
        let existing = match ctx.platform().get_file_content(&file.name, parent_branch).await {
            Ok(content) => content.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(lock_file = %file.name, error = %e, "baseline lookup failed");
                String::new()
            }
        };
        diffs.push(FileDiff {
            path: file.name.clone(),
            unified_diff: unified_diff(&file.name, &existing, &file.contents),
        });
    }
    diffs
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
