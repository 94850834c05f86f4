//! `locksmith detect <repo>`: show what a run config would be built from.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use locksmith_core::{Dialect, PackageFile};
use locksmith_detector::{detect_package_files, DetectedRepo};

/// Arguments for `locksmith detect`.
#[derive(Args, Debug)]
pub struct DetectArgs {
    /// Checkout to scan.
    #[arg(default_value = ".")]
    pub repo: PathBuf,

    /// Emit a JSON `packageFiles` / `workspaceDirs` fragment for a run config.
    #[arg(long)]
    pub json: bool,
}

impl DetectArgs {
    pub fn run(self) -> Result<()> {
        let detected = detect_package_files(&self.repo)
            .with_context(|| format!("detection failed for {}", self.repo.display()))?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&detected).context("failed to serialize detection JSON")?
            );
            return Ok(());
        }

        print_table(&detected);
        Ok(())
    }
}

#[derive(Tabled)]
struct PackageFileRow {
    #[tabled(rename = "package file")]
    package_file: String,
    #[tabled(rename = "package-lock.json")]
    package_lock: String,
    #[tabled(rename = "yarn.lock")]
    yarn_lock: String,
    #[tabled(rename = "rc files")]
    rc_files: String,
    #[tabled(rename = "workspace")]
    workspace: String,
}

fn print_table(detected: &DetectedRepo) {
    if detected.package_files.is_empty() {
        println!("No package.json files found.");
        return;
    }

    let rows: Vec<PackageFileRow> = detected.package_files.iter().map(row).collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    let lock_count = detected
        .package_files
        .iter()
        .filter(|pf| Dialect::all().iter().any(|d| pf.has_lock_file(*d)))
        .count();
    println!(
        "{} package files, {} with lock files, {} workspace roots",
        detected.package_files.len(),
        lock_count,
        detected.workspace_dirs.len(),
    );
}

fn row(pf: &PackageFile) -> PackageFileRow {
    let rc_files = Dialect::all()
        .iter()
        .filter(|d| pf.dialect_config(**d).is_some())
        .map(|d| d.config_file_name())
        .collect::<Vec<_>>()
        .join(", ");
    PackageFileRow {
        package_file: pf.package_file.clone(),
        package_lock: flag(pf.has_package_lock),
        yarn_lock: flag(pf.has_yarn_lock),
        rc_files,
        workspace: pf.workspace_dir.clone().unwrap_or_default(),
    }
}

fn flag(present: bool) -> String {
    if present {
        "✓".green().bold().to_string()
    } else {
        "·".bright_black().to_string()
    }
}
