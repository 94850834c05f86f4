//! Typed run configuration.
//!
//! A run configuration enumerates exactly the inputs one synchronization run
//! reads. Unknown keys are rejected at load time, and [`RunConfig::validate`]
//! checks the cross-field rules before the engine sees the value.
//!
//! ```yaml
//! parentBranch: main
//! branchName: renovate/lock-file-maintenance
//! packageFiles:
//!   - packageFile: a/package.json
//!     content: { name: a, dependencies: { lodash: ^4.17.0 } }
//!     hasPackageLock: true
//! upgrades:
//!   - type: minor
//! updatedPackageFiles:
//!   - name: a/package.json
//!     contents: '{"name":"a","dependencies":{"lodash":"^4.18.0"}}'
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::{Dialect, PackageFile, UpdatedPackageFile, Upgrade, WorkspaceDir};

const DEFAULT_GENERATOR_TIMEOUT_SECS: u64 = 300;

fn default_concurrency() -> usize {
    1
}

// ---------------------------------------------------------------------------
// Generator commands
// ---------------------------------------------------------------------------

/// External command producing a dialect's lock file in its working directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GeneratorCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_GENERATOR_TIMEOUT_SECS
}

impl GeneratorCommand {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            timeout_secs: DEFAULT_GENERATOR_TIMEOUT_SECS,
        }
    }

    /// Lock-only install without lifecycle scripts.
    pub fn default_for(dialect: Dialect) -> Self {
        match dialect {
            Dialect::Npm => Self::new(
                "npm",
                ["install", "--package-lock-only", "--no-audit", "--ignore-scripts"],
            ),
            Dialect::Yarn => Self::new(
                "yarn",
                [
                    "install",
                    "--ignore-scripts",
                    "--ignore-engines",
                    "--ignore-platform",
                    "--non-interactive",
                ],
            ),
        }
    }
}

/// Per-dialect replacements for the default generator commands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratorOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub npm: Option<GeneratorCommand>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yarn: Option<GeneratorCommand>,
}

impl GeneratorOverrides {
    pub fn command_for(&self, dialect: Dialect) -> GeneratorCommand {
        let configured = match dialect {
            Dialect::Npm => self.npm.as_ref(),
            Dialect::Yarn => self.yarn.as_ref(),
        };
        configured
            .cloned()
            .unwrap_or_else(|| GeneratorCommand::default_for(dialect))
    }
}

// ---------------------------------------------------------------------------
// RunConfig
// ---------------------------------------------------------------------------

/// Everything one lock-file synchronization run reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RunConfig {
    /// Baseline branch: existing lock files are read from here and diffed against.
    pub parent_branch: String,
    /// Target branch; only consulted to short-circuit maintenance runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_name: Option<String>,
    #[serde(default)]
    pub package_files: Vec<PackageFile>,
    #[serde(default)]
    pub upgrades: Vec<Upgrade>,
    #[serde(default)]
    pub updated_package_files: Vec<UpdatedPackageFile>,
    #[serde(default)]
    pub workspace_dirs: Vec<WorkspaceDir>,
    /// Repository-root `.npmrc` override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub npmrc: Option<String>,
    /// Repository-root `.yarnrc` override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yarnrc: Option<String>,
    /// Staging root to use instead of a fresh temporary directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staging_dir: Option<PathBuf>,
    /// Maximum number of directories generated concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub generators: GeneratorOverrides,
}

impl RunConfig {
    pub fn new(parent_branch: impl Into<String>) -> Self {
        Self {
            parent_branch: parent_branch.into(),
            branch_name: None,
            package_files: vec![],
            upgrades: vec![],
            updated_package_files: vec![],
            workspace_dirs: vec![],
            npmrc: None,
            yarnrc: None,
            staging_dir: None,
            concurrency: default_concurrency(),
            generators: GeneratorOverrides::default(),
        }
    }

    /// True when any upgrade requests lock file maintenance; it wins over every other type.
    pub fn is_lock_file_maintenance(&self) -> bool {
        self.upgrades.iter().any(Upgrade::is_lock_file_maintenance)
    }

    /// Repository-root dialect config override.
    pub fn dialect_config(&self, dialect: Dialect) -> Option<&str> {
        match dialect {
            Dialect::Npm => self.npmrc.as_deref(),
            Dialect::Yarn => self.yarnrc.as_deref(),
        }
    }

    /// Check the cross-field rules serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for pf in &self.package_files {
            validate_repo_path(&pf.package_file)?;
            if let Some(dir) = &pf.workspace_dir {
                validate_repo_path(dir)?;
            }
        }
        for upf in &self.updated_package_files {
            validate_repo_path(&upf.name)?;
        }
        for ws in &self.workspace_dirs {
            validate_repo_path(&ws.dir)?;
        }
        if self.is_lock_file_maintenance()
            && self.branch_name.as_deref().map_or(true, str::is_empty)
        {
            return Err(ConfigError::MissingBranchName);
        }
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency);
        }
        Ok(())
    }
}

/// Repository paths are staged under a root directory, so they must stay inside it.
fn validate_repo_path(path: &str) -> Result<(), ConfigError> {
    let invalid = |reason| ConfigError::InvalidPath {
        path: path.to_string(),
        reason,
    };
    if path.is_empty() {
        return Err(invalid("path is empty"));
    }
    if path.starts_with('/') || Path::new(path).is_absolute() {
        return Err(invalid("path must be relative to the repository root"));
    }
    if path.contains('\\') {
        return Err(invalid("path must use '/' separators"));
    }
    if path.split('/').any(|segment| segment == "..") {
        return Err(invalid("path must not contain '..'"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Load and validate a run configuration.
///
/// `.json` files are parsed with serde_json; anything else as YAML.
pub fn load_at(path: &Path) -> Result<RunConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    let config: RunConfig = if is_json {
        serde_json::from_str(&contents).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?
    } else {
        serde_yaml::from_str(&contents).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })?
    };
    config.validate()?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UpgradeType;

    #[test]
    fn maintenance_wins_over_other_upgrades() {
        let mut config = RunConfig::new("main");
        config.upgrades = vec![
            Upgrade::new(UpgradeType::Minor),
            Upgrade::new(UpgradeType::LockFileMaintenance),
        ];
        assert!(config.is_lock_file_maintenance());
    }

    #[test]
    fn maintenance_requires_branch_name() {
        let mut config = RunConfig::new("main");
        config.upgrades = vec![Upgrade::new(UpgradeType::LockFileMaintenance)];
        assert!(matches!(config.validate(), Err(ConfigError::MissingBranchName)));

        config.branch_name = Some("renovate/lock-file-maintenance".into());
        config.validate().expect("valid");
    }

    #[test]
    fn zero_concurrency_rejected() {
        let mut config = RunConfig::new("main");
        config.concurrency = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidConcurrency)));
    }

    #[test]
    fn generator_overrides_fall_back_to_defaults() {
        let overrides = GeneratorOverrides {
            npm: Some(GeneratorCommand::new("pnpm", ["install"])),
            yarn: None,
        };
        assert_eq!(overrides.command_for(Dialect::Npm).program, "pnpm");
        assert_eq!(overrides.command_for(Dialect::Yarn).program, "yarn");
        assert!(overrides
            .command_for(Dialect::Yarn)
            .args
            .contains(&"--ignore-scripts".to_string()));
    }
}
