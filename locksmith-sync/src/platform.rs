//! Repository host capability.
//!
//! The engine reads exactly two things from the host: file content on a
//! branch, and whether a branch exists. [`GitPlatform`] answers both from a
//! local clone; tests substitute an in-memory fake.

use std::path::PathBuf;
use std::process::{Output, Stdio};

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

/// Errors from a repository host lookup.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("branch '{branch}' not found")]
    UnknownBranch { branch: String },

    #[error("git command failed: {command}: {stderr}")]
    Git { command: String, stderr: String },

    #[error("failed to run {command}: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} on {branch} is not valid UTF-8")]
    NotUtf8 { path: String, branch: String },
}

/// Read access to the repository host.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Content of `path` on `branch`; `Ok(None)` when the file does not exist there.
    async fn get_file_content(
        &self,
        path: &str,
        branch: &str,
    ) -> Result<Option<String>, PlatformError>;

    async fn branch_exists(&self, branch: &str) -> Result<bool, PlatformError>;
}

// ---------------------------------------------------------------------------
// GitPlatform
// ---------------------------------------------------------------------------

/// [`Platform`] over a local clone, via the `git` binary.
///
/// Branches resolve to `refs/heads/<name>` first, then `refs/remotes/origin/<name>`.
#[derive(Debug, Clone)]
pub struct GitPlatform {
    repo: PathBuf,
}

impl GitPlatform {
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self { repo: repo.into() }
    }

    /// Run git in the repository; a non-zero exit is returned, not raised.
    async fn run_git(&self, args: &[&str]) -> Result<Output, PlatformError> {
        Command::new("git")
            .current_dir(&self.repo)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| PlatformError::Io {
                command: format!("git {}", args.join(" ")),
                source,
            })
    }

    async fn resolve_branch(&self, branch: &str) -> Result<Option<String>, PlatformError> {
        for candidate in [
            format!("refs/heads/{branch}"),
            format!("refs/remotes/origin/{branch}"),
        ] {
            let spec = format!("{candidate}^{{commit}}");
            let output = self
                .run_git(&["rev-parse", "--verify", "--quiet", &spec])
                .await?;
            if output.status.success() {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl Platform for GitPlatform {
    async fn get_file_content(
        &self,
        path: &str,
        branch: &str,
    ) -> Result<Option<String>, PlatformError> {
        let Some(reference) = self.resolve_branch(branch).await? else {
            return Err(PlatformError::UnknownBranch {
                branch: branch.to_string(),
            });
        };
        let object = format!("{reference}:{path}");

        let exists = self.run_git(&["cat-file", "-e", &object]).await?;
        if !exists.status.success() {
            tracing::trace!(path, branch, "file not present on branch");
            return Ok(None);
        }

        let output = self.run_git(&["cat-file", "-p", &object]).await?;
        if !output.status.success() {
            return Err(PlatformError::Git {
                command: format!("git cat-file -p {object}"),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        String::from_utf8(output.stdout)
            .map(Some)
            .map_err(|_| PlatformError::NotUtf8 {
                path: path.to_string(),
                branch: branch.to_string(),
            })
    }

    async fn branch_exists(&self, branch: &str) -> Result<bool, PlatformError> {
        Ok(self.resolve_branch(branch).await?.is_some())
    }
}
