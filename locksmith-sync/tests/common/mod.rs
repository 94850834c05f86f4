#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use locksmith_core::{Dialect, PackageFile, RunConfig, UpdatedPackageFile, Upgrade, UpgradeType};
use locksmith_sync::{GenerationFailure, LockFileGenerator, Platform, PlatformError, SyncContext};
use serde_json::json;

// ---------------------------------------------------------------------------
// Fake platform
// ---------------------------------------------------------------------------

/// In-memory repository host: `(branch, path) -> content`.
#[derive(Default)]
pub struct FakePlatform {
    files: Mutex<HashMap<(String, String), String>>,
    branches: Mutex<HashSet<String>>,
    broken_paths: Mutex<HashSet<String>>,
    pub content_lookups: Mutex<Vec<String>>,
}

impl FakePlatform {
    pub fn with_file(self, branch: &str, path: &str, content: &str) -> Self {
        self.put(branch, path, content);
        self
    }

    pub fn with_branch(self, branch: &str) -> Self {
        self.branches.lock().unwrap().insert(branch.to_string());
        self
    }

    /// Lookups of `path` fail with a transport error.
    pub fn with_broken_path(self, path: &str) -> Self {
        self.broken_paths.lock().unwrap().insert(path.to_string());
        self
    }

    pub fn put(&self, branch: &str, path: &str, content: &str) {
        self.files
            .lock()
            .unwrap()
            .insert((branch.to_string(), path.to_string()), content.to_string());
    }

    pub fn lookups(&self) -> Vec<String> {
        self.content_lookups.lock().unwrap().clone()
    }
}

#[async_trait]
impl Platform for FakePlatform {
    async fn get_file_content(
        &self,
        path: &str,
        branch: &str,
    ) -> Result<Option<String>, PlatformError> {
        self.content_lookups.lock().unwrap().push(path.to_string());
        if self.broken_paths.lock().unwrap().contains(path) {
            return Err(PlatformError::Git {
                command: format!("get {path}"),
                stderr: "connection reset".to_string(),
            });
        }
        Ok(self
            .files
            .lock()
            .unwrap()
            .get(&(branch.to_string(), path.to_string()))
            .cloned())
    }

    async fn branch_exists(&self, branch: &str) -> Result<bool, PlatformError> {
        Ok(self.branches.lock().unwrap().contains(branch))
    }
}

// ---------------------------------------------------------------------------
// Fake generator
// ---------------------------------------------------------------------------

/// Deterministic generator: the lock file is derived from the staged manifest.
///
/// Output is `"<dialect>\n<staged package.json>"`, so any change to the
/// staged manifest shows up as a lock change and identical inputs always
/// produce identical locks.
#[derive(Default)]
pub struct FakeGenerator {
    failing_dirs: HashSet<PathBuf>,
    pub calls: Mutex<Vec<(Dialect, PathBuf)>>,
}

impl FakeGenerator {
    pub fn failing_in(mut self, dir: impl Into<PathBuf>) -> Self {
        self.failing_dirs.insert(dir.into());
        self
    }

    pub fn calls(&self) -> Vec<(Dialect, PathBuf)> {
        self.calls.lock().unwrap().clone()
    }
}

pub fn expected_lock(dialect: Dialect, staged_manifest: &str) -> String {
    format!("{dialect}\n{staged_manifest}")
}

#[async_trait]
impl LockFileGenerator for FakeGenerator {
    async fn generate(&self, dialect: Dialect, dir: &Path) -> Result<String, GenerationFailure> {
        self.calls
            .lock()
            .unwrap()
            .push((dialect, dir.to_path_buf()));
        if self.failing_dirs.contains(dir) {
            return Err(GenerationFailure::new("npm ERR! code ERESOLVE"));
        }
        let manifest = tokio::fs::read_to_string(dir.join("package.json"))
            .await
            .map_err(|e| GenerationFailure::new(e.to_string()))?;
        Ok(expected_lock(dialect, &manifest))
    }
}

/// Generator that sleeps while recording how many calls overlap.
#[derive(Default)]
pub struct TrackingGenerator {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    busy_dirs: Mutex<HashSet<PathBuf>>,
    shared_dir: AtomicBool,
}

impl TrackingGenerator {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Whether two calls ever ran in the same directory at once.
    pub fn shared_dir(&self) -> bool {
        self.shared_dir.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LockFileGenerator for TrackingGenerator {
    async fn generate(&self, dialect: Dialect, dir: &Path) -> Result<String, GenerationFailure> {
        if !self.busy_dirs.lock().unwrap().insert(dir.to_path_buf()) {
            self.shared_dir.store(true, Ordering::SeqCst);
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(20)).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.busy_dirs.lock().unwrap().remove(dir);
        Ok(format!("{dialect} {}\n", dir.display()))
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn context(platform: Arc<FakePlatform>, generator: Arc<FakeGenerator>) -> SyncContext {
    SyncContext::new(platform, generator)
}

pub fn package_file(path: &str, npm: bool, yarn: bool) -> PackageFile {
    let name = path.trim_end_matches("package.json").trim_end_matches('/');
    let mut pf = PackageFile::new(
        path,
        json!({
            "name": if name.is_empty() { "root" } else { name },
            "version": "1.0.0",
            "dependencies": {"lodash": "^4.17.0"},
        }),
    );
    pf.has_package_lock = npm;
    pf.has_yarn_lock = yarn;
    pf
}

pub fn bump(path: &str, lodash: &str) -> UpdatedPackageFile {
    let name = path.trim_end_matches("package.json").trim_end_matches('/');
    UpdatedPackageFile {
        name: path.to_string(),
        contents: json!({
            "name": if name.is_empty() { "root" } else { name },
            "version": "1.0.0",
            "dependencies": {"lodash": lodash},
        })
        .to_string(),
    }
}

pub fn run_config(
    staging: &Path,
    package_files: Vec<PackageFile>,
    updates: Vec<UpdatedPackageFile>,
) -> RunConfig {
    let mut config = RunConfig::new("main");
    config.staging_dir = Some(staging.to_path_buf());
    config.package_files = package_files;
    config.updated_package_files = updates;
    config.upgrades = vec![Upgrade::new(UpgradeType::Minor)];
    config
}

// ---------------------------------------------------------------------------
// Git fixtures
// ---------------------------------------------------------------------------

/// Run a git command inside `repo_path`, panicking on failure.
pub fn git(repo_path: &Path, args: &[&str]) -> Output {
    let output = Command::new("git")
        .current_dir(repo_path)
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to run git {}: {e}", args.join(" ")));
    assert!(
        output.status.success(),
        "git command failed: git {}\nstderr: {}",
        args.join(" "),
        String::from_utf8_lossy(&output.stderr)
    );
    output
}

/// Initialise a repository on branch `main` with one commit.
pub fn init_repository(repo_path: &Path) {
    std::fs::create_dir_all(repo_path).expect("mkdir repo");
    git(repo_path, &["init", "--quiet"]);
    git(repo_path, &["checkout", "--quiet", "-b", "main"]);
    git(repo_path, &["config", "user.email", "test@example.com"]);
    git(repo_path, &["config", "user.name", "Test User"]);
    git(repo_path, &["config", "commit.gpgsign", "false"]);
    std::fs::write(repo_path.join("README.md"), "# fixture\n").expect("write readme");
    git(repo_path, &["add", "README.md"]);
    git(repo_path, &["commit", "--quiet", "-m", "Initial commit"]);
}
