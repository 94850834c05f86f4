//! Package-file detection for `locksmith-detector`.
//!
//! `detect_package_files(root)` walks a local checkout and returns the
//! [`PackageFile`] metadata a synchronization run consumes: every
//! `package.json`, which lock files sit next to it, directory-local
//! `.npmrc` / `.yarnrc` overrides, and monorepo workspace membership.
//!
//! Detection happens once, before a run. The engine itself never probes the
//! file system for lock presence; it trusts the flags recorded here.

use std::fs;
use std::path::{Component, Path, PathBuf};

use glob::{MatchOptions, Pattern};
use locksmith_core::types::{parent_dir, PackageFile, WorkspaceDir};
use serde::Serialize;
use thiserror::Error;
use walkdir::WalkDir;

const MANIFEST: &str = "package.json";
const PACKAGE_LOCK: &str = "package-lock.json";
const YARN_LOCK: &str = "yarn.lock";
const NPMRC: &str = ".npmrc";
const YARNRC: &str = ".yarnrc";

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Everything detected in a checkout, ready to drop into a run config.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedRepo {
    pub package_files: Vec<PackageFile>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub workspace_dirs: Vec<WorkspaceDir>,
    /// Repository-root `.npmrc`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub npmrc: Option<String>,
    /// Repository-root `.yarnrc`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yarnrc: Option<String>,
}

/// Errors from package-file detection.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("'{path}' is not a directory")]
    NotADirectory { path: PathBuf },
}

fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DetectError {
    DetectError::Io {
        path: path.into(),
        source,
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Detect every `package.json` under `root`, skipping `.git` and `node_modules`.
///
/// Results are sorted by repository path.
pub fn detect_package_files(root: &Path) -> Result<DetectedRepo, DetectError> {
    if !root.is_dir() {
        return Err(DetectError::NotADirectory {
            path: root.to_path_buf(),
        });
    }

    let mut package_files = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            let name = e.file_name().to_str().unwrap_or("");
            !(e.file_type().is_dir() && (name == "node_modules" || name == ".git"))
        });

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
            let source = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("directory walk failed"));
            io_err(path, source)
        })?;
        if !entry.file_type().is_file() || entry.file_name() != MANIFEST {
            continue;
        }
        let Some(repo_path) = repo_relative(root, entry.path()) else {
            continue;
        };
        package_files.push(read_package_file(entry.path(), repo_path)?);
    }

    package_files.sort_by(|a, b| a.package_file.cmp(&b.package_file));
    let workspace_dirs = assign_workspaces(&mut package_files)?;

    let detected = DetectedRepo {
        package_files,
        workspace_dirs,
        npmrc: read_optional(&root.join(NPMRC))?,
        yarnrc: read_optional(&root.join(YARNRC))?,
    };
    tracing::debug!(
        package_files = detected.package_files.len(),
        workspace_dirs = detected.workspace_dirs.len(),
        "detected package files"
    );
    Ok(detected)
}

// ---------------------------------------------------------------------------
// Manifests
// ---------------------------------------------------------------------------

fn read_package_file(path: &Path, repo_path: String) -> Result<PackageFile, DetectError> {
    let raw = fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    let content: serde_json::Value =
        serde_json::from_str(&raw).map_err(|e| DetectError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    if !content.is_object() {
        return Err(DetectError::ParseError {
            path: path.to_path_buf(),
            message: "manifest is not a JSON object".to_string(),
        });
    }

    let dir = path.parent().unwrap_or(Path::new("."));
    let at_root = parent_dir(&repo_path) == ".";

    let mut package_file = PackageFile::new(repo_path, content);
    package_file.has_package_lock = dir.join(PACKAGE_LOCK).is_file();
    package_file.has_yarn_lock = dir.join(YARN_LOCK).is_file();
    // Root-level config files are repository overrides, reported on DetectedRepo.
    if !at_root {
        package_file.npmrc = read_optional(&dir.join(NPMRC))?;
        package_file.yarnrc = read_optional(&dir.join(YARNRC))?;
    }
    Ok(package_file)
}

fn read_optional(path: &Path) -> Result<Option<String>, DetectError> {
    if !path.is_file() {
        return Ok(None);
    }
    fs::read_to_string(path)
        .map(Some)
        .map_err(|e| io_err(path, e))
}

/// `root`-relative path with `/` separators, or `None` if `path` escapes `root`.
fn repo_relative(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?.to_string()),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(parts.join("/"))
}

// ---------------------------------------------------------------------------
// Workspaces
// ---------------------------------------------------------------------------

/// `workspaces` patterns declared by a manifest: `["a/*"]` or `{"packages": ["a/*"]}`.
fn workspace_patterns(content: &serde_json::Value) -> Vec<String> {
    let field = match content.get("workspaces") {
        Some(serde_json::Value::Object(obj)) => obj.get("packages"),
        other => other,
    };
    field
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str())
                .map(|p| p.trim_start_matches("./").trim_end_matches('/').to_string())
                .filter(|p| !p.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Link member manifests to the deepest workspace root whose patterns match them.
fn assign_workspaces(package_files: &mut [PackageFile]) -> Result<Vec<WorkspaceDir>, DetectError> {
    let options = MatchOptions {
        require_literal_separator: true,
        ..MatchOptions::default()
    };

    let mut roots: Vec<(String, Vec<Pattern>, WorkspaceDir)> = Vec::new();
    for pf in package_files.iter() {
        let patterns = workspace_patterns(&pf.content);
        if patterns.is_empty() {
            continue;
        }
        let compiled = patterns
            .iter()
            .map(|p| {
                Pattern::new(p).map_err(|e| DetectError::ParseError {
                    path: PathBuf::from(&pf.package_file),
                    message: format!("invalid workspace pattern '{p}': {e}"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let dir = pf.dir();
        roots.push((
            dir.clone(),
            compiled,
            WorkspaceDir {
                dir,
                has_package_lock: pf.has_package_lock,
                has_yarn_lock: pf.has_yarn_lock,
            },
        ));
    }
    // Deepest root first so nested workspaces win.
    roots.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));

    let mut used = Vec::new();
    for pf in package_files.iter_mut() {
        let member_dir = pf.dir();
        let owner = roots.iter().find(|(root_dir, patterns, _)| {
            if *root_dir == member_dir {
                return false;
            }
            let Some(rel) = relative_to(root_dir, &member_dir) else {
                return false;
            };
            patterns.iter().any(|p| p.matches_with(rel, options))
        });
        if let Some((root_dir, _, ws)) = owner {
            pf.workspace_dir = Some(root_dir.clone());
            if !used.contains(ws) {
                used.push(ws.clone());
            }
        }
    }
    used.sort_by(|a: &WorkspaceDir, b| a.dir.cmp(&b.dir));
    Ok(used)
}

fn relative_to<'a>(root_dir: &str, dir: &'a str) -> Option<&'a str> {
    if root_dir == "." {
        return (dir != ".").then_some(dir);
    }
    dir.strip_prefix(root_dir)?.strip_prefix('/')
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
