//! Lock directory resolution.
//!
//! Decides, per dialect, which repository directories need their lock file
//! regenerated. Works purely from the run configuration: lock presence comes
//! from the package-file flags, never from the file system.

use locksmith_core::types::{parent_dir, Dialect, PackageFile};
use locksmith_core::RunConfig;
use serde::Serialize;

use crate::error::SyncError;

/// Directories to regenerate, one ordered list per dialect.
///
/// Lists keep discovery order and never hold the same directory twice; the
/// same directory may appear under both dialects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockFileDirs {
    pub package_lock_dirs: Vec<String>,
    pub yarn_lock_dirs: Vec<String>,
}

impl LockFileDirs {
    pub fn dirs(&self, dialect: Dialect) -> &[String] {
        match dialect {
            Dialect::Npm => &self.package_lock_dirs,
            Dialect::Yarn => &self.yarn_lock_dirs,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.package_lock_dirs.is_empty() && self.yarn_lock_dirs.is_empty()
    }

    /// Number of (directory, dialect) pairs to generate.
    pub fn len(&self) -> usize {
        self.package_lock_dirs.len() + self.yarn_lock_dirs.len()
    }

    fn push(&mut self, dialect: Dialect, dir: String) {
        let dirs = match dialect {
            Dialect::Npm => &mut self.package_lock_dirs,
            Dialect::Yarn => &mut self.yarn_lock_dirs,
        };
        if !dirs.contains(&dir) {
            dirs.push(dir);
        }
    }

    /// Every directory once, in first-seen order, with the dialects to
    /// generate there (in [`Dialect::all`] order).
    pub fn by_directory(&self) -> Vec<(String, Vec<Dialect>)> {
        let mut grouped: Vec<(String, Vec<Dialect>)> = Vec::new();
        for dialect in Dialect::all() {
            for dir in self.dirs(*dialect) {
                match grouped.iter_mut().find(|(d, _)| d == dir) {
                    Some((_, dialects)) => dialects.push(*dialect),
                    None => grouped.push((dir.clone(), vec![*dialect])),
                }
            }
        }
        grouped
    }
}

fn find_package_file<'a>(
    config: &'a RunConfig,
    package_file: &str,
) -> Result<&'a PackageFile, SyncError> {
    config
        .package_files
        .iter()
        .find(|p| p.package_file == package_file)
        .ok_or_else(|| SyncError::UnknownPackageFile {
            path: package_file.to_string(),
        })
}

/// Whether the manifest at `package_file` has `dialect`'s lock file at HEAD.
///
/// An unknown path means the caller's inputs disagree with each other, so it
/// is an error rather than `false`.
pub fn has_lock_file(
    config: &RunConfig,
    dialect: Dialect,
    package_file: &str,
) -> Result<bool, SyncError> {
    tracing::trace!(package_file, %dialect, "has_lock_file");
    Ok(find_package_file(config, package_file)?.has_lock_file(dialect))
}

pub fn has_package_lock(config: &RunConfig, package_file: &str) -> Result<bool, SyncError> {
    has_lock_file(config, Dialect::Npm, package_file)
}

pub fn has_yarn_lock(config: &RunConfig, package_file: &str) -> Result<bool, SyncError> {
    has_lock_file(config, Dialect::Yarn, package_file)
}

/// Compute the directories whose lock files must be regenerated.
///
/// - Lock file maintenance: every directory that has a lock file, whatever
///   else is in the upgrade list and whatever manifests changed.
/// - Otherwise: the directory of every updated manifest, per dialect present
///   there, plus the workspace root that owns its shared lock file.
pub fn determine_lock_file_dirs(config: &RunConfig) -> Result<LockFileDirs, SyncError> {
    let mut dirs = LockFileDirs::default();

    if config.is_lock_file_maintenance() {
        for package_file in &config.package_files {
            for dialect in Dialect::all() {
                if package_file.has_lock_file(*dialect) {
                    dirs.push(*dialect, package_file.dir());
                }
            }
        }
        tracing::debug!(?dirs, "lock file maintenance dirs");
        return Ok(dirs);
    }

    for updated in &config.updated_package_files {
        let package_file = find_package_file(config, &updated.name)?;
        for dialect in Dialect::all() {
            if package_file.has_lock_file(*dialect) {
                dirs.push(*dialect, parent_dir(&updated.name));
            }
        }

        let Some(workspace_dir) = package_file.workspace_dir.as_deref() else {
            continue;
        };
        let workspace = config
            .workspace_dirs
            .iter()
            .find(|w| w.dir == workspace_dir)
            .ok_or_else(|| SyncError::UnknownWorkspaceDir {
                package_file: package_file.package_file.clone(),
                dir: workspace_dir.to_string(),
            })?;
        for dialect in Dialect::all() {
            if workspace.has_lock_file(*dialect) {
                dirs.push(*dialect, workspace.dir.clone());
            }
        }
    }

    tracing::debug!(?dirs, "lock file dirs");
    Ok(dirs)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use locksmith_core::types::{UpdatedPackageFile, Upgrade, UpgradeType, WorkspaceDir};
    use serde_json::json;

    fn package_file(path: &str, npm: bool, yarn: bool) -> PackageFile {
        let mut pf = PackageFile::new(path, json!({}));
        pf.has_package_lock = npm;
        pf.has_yarn_lock = yarn;
        pf
    }

    fn updated(name: &str) -> UpdatedPackageFile {
        UpdatedPackageFile {
            name: name.to_string(),
            contents: "{}".to_string(),
        }
    }

    fn config(package_files: Vec<PackageFile>, updates: &[&str]) -> RunConfig {
        let mut config = RunConfig::new("main");
        config.package_files = package_files;
        config.updated_package_files = updates.iter().map(|n| updated(n)).collect();
        config.upgrades = vec![Upgrade::new(UpgradeType::Minor)];
        config
    }

    #[test]
    fn single_package_lock_dir() {
        let config = config(vec![package_file("a/package.json", true, false)], &["a/package.json"]);
        let dirs = determine_lock_file_dirs(&config).expect("dirs");
        assert_eq!(dirs.package_lock_dirs, vec!["a"]);
        assert!(dirs.yarn_lock_dirs.is_empty());
    }

    #[test]
    fn unchanged_manifests_contribute_nothing() {
        let config = config(
            vec![
                package_file("a/package.json", true, true),
                package_file("b/package.json", true, true),
            ],
            &["b/package.json"],
        );
        let dirs = determine_lock_file_dirs(&config).expect("dirs");
        assert_eq!(dirs.package_lock_dirs, vec!["b"]);
        assert_eq!(dirs.yarn_lock_dirs, vec!["b"]);
    }

    #[test]
    fn manifest_without_locks_contributes_nothing() {
        let config = config(vec![package_file("package.json", false, false)], &["package.json"]);
        assert!(determine_lock_file_dirs(&config).expect("dirs").is_empty());
    }

    #[test]
    fn unknown_updated_manifest_fails_loudly() {
        let config = config(vec![package_file("a/package.json", true, false)], &["b/package.json"]);
        let err = determine_lock_file_dirs(&config).expect_err("unknown");
        assert!(matches!(err, SyncError::UnknownPackageFile { ref path } if path == "b/package.json"));
        assert!(has_yarn_lock(&config, "b/package.json").is_err());
    }

    #[test]
    fn has_lock_helpers_read_flags() {
        let config = config(vec![package_file("a/package.json", true, false)], &[]);
        assert!(has_package_lock(&config, "a/package.json").unwrap());
        assert!(!has_yarn_lock(&config, "a/package.json").unwrap());
    }

    #[test]
    fn maintenance_ignores_updates_and_wins_over_other_types() {
        let mut config = config(
            vec![
                package_file("package.json", false, true),
                package_file("a/package.json", true, false),
                package_file("b/package.json", false, false),
            ],
            &["not/known/package.json"],
        );
        config
            .upgrades
            .push(Upgrade::new(UpgradeType::LockFileMaintenance));

        let dirs = determine_lock_file_dirs(&config).expect("dirs");
        assert_eq!(dirs.package_lock_dirs, vec!["a"]);
        assert_eq!(dirs.yarn_lock_dirs, vec!["."]);
    }

    #[test]
    fn workspace_root_is_added_without_duplicates() {
        let mut a = package_file("packages/a/package.json", false, false);
        a.workspace_dir = Some(".".into());
        let mut b = package_file("packages/b/package.json", false, true);
        b.workspace_dir = Some(".".into());
        let mut config = config(
            vec![package_file("package.json", false, true), a, b],
            &["packages/a/package.json", "packages/b/package.json", "package.json"],
        );
        config.workspace_dirs = vec![WorkspaceDir {
            dir: ".".into(),
            has_package_lock: false,
            has_yarn_lock: true,
        }];

        let dirs = determine_lock_file_dirs(&config).expect("dirs");
        assert_eq!(dirs.yarn_lock_dirs, vec![".", "packages/b"]);
        assert!(dirs.package_lock_dirs.is_empty());
    }

    #[test]
    fn undeclared_workspace_dir_is_an_error() {
        let mut a = package_file("packages/a/package.json", true, false);
        a.workspace_dir = Some("mono".into());
        let config = config(vec![a], &["packages/a/package.json"]);
        let err = determine_lock_file_dirs(&config).expect_err("unknown workspace");
        assert!(matches!(err, SyncError::UnknownWorkspaceDir { .. }));
    }

    #[test]
    fn by_directory_groups_dialects_in_first_seen_order() {
        let dirs = LockFileDirs {
            package_lock_dirs: vec!["b".into(), "a".into()],
            yarn_lock_dirs: vec!["a".into(), "c".into()],
        };
        assert_eq!(
            dirs.by_directory(),
            vec![
                ("b".to_string(), vec![Dialect::Npm]),
                ("a".to_string(), vec![Dialect::Npm, Dialect::Yarn]),
                ("c".to_string(), vec![Dialect::Yarn]),
            ]
        );
        assert_eq!(dirs.len(), 4);
    }
}
