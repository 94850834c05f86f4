//! `locksmith sync`: regenerate lock files for a run config.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use locksmith_core::{LockFileError, SyncOutcome, UpdatedLockFile};
use locksmith_sync::{get_updated_lock_files, write_lock_files, WriteResult};

use super::{load_config, runtime, sync_context};

/// Arguments for `locksmith sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Run config (YAML, or JSON when the extension is `.json`).
    #[arg(long)]
    pub config: PathBuf,

    /// Git checkout holding the parent branch.
    #[arg(long, default_value = ".")]
    pub repo: PathBuf,

    /// Emit a machine-readable JSON report.
    #[arg(long)]
    pub json: bool,

    /// Write changed lock files into the checkout.
    #[arg(long)]
    pub write: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SyncReportJson<'a> {
    generated_at: DateTime<Utc>,
    duration_ms: u128,
    updated_lock_files: &'a [UpdatedLockFile],
    lock_file_errors: &'a [LockFileError],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    written: Vec<String>,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let config = load_config(&self.config)?;
        let ctx = sync_context(&self.repo, &config);

        let started = Instant::now();
        let outcome = runtime()?
            .block_on(get_updated_lock_files(&ctx, &config))
            .context("lock file sync failed")?;
        let duration_ms = started.elapsed().as_millis();

        let writes = if self.write {
            write_lock_files(&self.repo, &outcome.updated_lock_files)
                .context("failed to write lock files")?
        } else {
            Vec::new()
        };

        if self.json {
            let payload = SyncReportJson {
                generated_at: Utc::now(),
                duration_ms,
                updated_lock_files: &outcome.updated_lock_files,
                lock_file_errors: &outcome.lock_file_errors,
                written: writes
                    .iter()
                    .filter_map(|w| match w {
                        WriteResult::Written { path } => Some(path.display().to_string()),
                        WriteResult::Unchanged { .. } => None,
                    })
                    .collect(),
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to serialize sync JSON")?
            );
        } else {
            print_outcome(&outcome, &writes);
        }

        if outcome.has_errors() {
            bail!(
                "{} lock file(s) could not be regenerated",
                outcome.lock_file_errors.len()
            );
        }
        Ok(())
    }
}

fn print_outcome(outcome: &SyncOutcome, writes: &[WriteResult]) {
    if outcome.is_empty() {
        println!("✓ no lock files changed");
        return;
    }

    if !outcome.updated_lock_files.is_empty() {
        println!(
            "{} {} lock file(s) changed",
            "✓".green().bold(),
            outcome.updated_lock_files.len()
        );
        for file in &outcome.updated_lock_files {
            println!("  ✎  {}", file.name);
        }
    }
    for w in writes {
        match w {
            WriteResult::Written { path } => println!("  wrote {}", path.display()),
            WriteResult::Unchanged { path } => println!("  ·  {} already up to date", path.display()),
        }
    }

    for err in &outcome.lock_file_errors {
        println!("{} {}", "✗".red().bold(), err.lock_file.bold());
        for line in err.stderr.lines() {
            println!("    {line}");
        }
    }
}
