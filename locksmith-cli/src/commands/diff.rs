//! `locksmith diff`: show unified diffs for the lock files a run would change.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use locksmith_sync::{diff_lock_files, get_updated_lock_files};

use super::{load_config, runtime, sync_context};

/// Arguments for `locksmith diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Run config (YAML, or JSON when the extension is `.json`).
    #[arg(long)]
    pub config: PathBuf,

    /// Git checkout holding the parent branch.
    #[arg(long, default_value = ".")]
    pub repo: PathBuf,
}

impl DiffArgs {
    pub fn run(self) -> Result<()> {
        let config = load_config(&self.config)?;
        let ctx = sync_context(&self.repo, &config);

        let (outcome, diffs) = runtime()?.block_on(async {
            let outcome = get_updated_lock_files(&ctx, &config).await?;
            let diffs = diff_lock_files(&ctx, &outcome, &config.parent_branch).await;
            Ok::<_, locksmith_sync::SyncError>((outcome, diffs))
        })
        .context("lock file sync failed")?;

        for err in &outcome.lock_file_errors {
            eprintln!("{} {}: {}", "✗".red().bold(), err.lock_file, err.stderr);
        }

        if diffs.is_empty() {
            println!("No lock file differences against '{}'.", config.parent_branch);
            return Ok(());
        }

        for diff in diffs {
            print!("{}", diff.unified_diff);
            if !diff.unified_diff.ends_with('\n') {
                println!();
            }
        }
        Ok(())
    }
}
