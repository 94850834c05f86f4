//! Lock-file generator adapter.
//!
//! [`LockFileGenerator`] is the capability the engine calls once per
//! (directory, dialect) pair. [`CommandGenerator`] runs the real package
//! manager as a subprocess inside the staged directory and reads back the
//! lock file it wrote.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use locksmith_core::{Dialect, GeneratorCommand, GeneratorOverrides, RunConfig};
use thiserror::Error;
use tokio::process::Command;

/// A generator run that produced no usable lock file.
///
/// Carries the generator's diagnostic output; recorded per directory, never
/// raised past the adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct GenerationFailure {
    pub message: String,
}

impl GenerationFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Produces a dialect's lock file for one staged directory.
///
/// Implementations must not share a working directory or mutable state
/// between concurrent calls for different directories.
#[async_trait]
pub trait LockFileGenerator: Send + Sync {
    async fn generate(&self, dialect: Dialect, dir: &Path) -> Result<String, GenerationFailure>;
}

// ---------------------------------------------------------------------------
// CommandGenerator
// ---------------------------------------------------------------------------

/// Runs the configured package-manager command in the staged directory.
#[derive(Debug, Clone, Default)]
pub struct CommandGenerator {
    commands: GeneratorOverrides,
}

impl CommandGenerator {
    pub fn new(commands: GeneratorOverrides) -> Self {
        Self { commands }
    }

    pub fn from_config(config: &RunConfig) -> Self {
        Self::new(config.generators.clone())
    }

    pub fn command_for(&self, dialect: Dialect) -> GeneratorCommand {
        self.commands.command_for(dialect)
    }
}

fn describe(command: &GeneratorCommand) -> String {
    if command.args.is_empty() {
        command.program.clone()
    } else {
        format!("{} {}", command.program, command.args.join(" "))
    }
}

#[async_trait]
impl LockFileGenerator for CommandGenerator {
    async fn generate(&self, dialect: Dialect, dir: &Path) -> Result<String, GenerationFailure> {
        let command = self.command_for(dialect);
        let label = describe(&command);
        tracing::debug!(%dialect, dir = %dir.display(), command = %label, "running lock file generator");

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env("CI", "true")
            .env("NO_UPDATE_NOTIFIER", "1")
            .kill_on_drop(true);
        let child = cmd.output();

        let timeout = Duration::from_secs(command.timeout_secs);
        let output = match tokio::time::timeout(timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(GenerationFailure::new(format!("failed to run `{label}`: {e}")));
            }
            Err(_) => {
                return Err(GenerationFailure::new(format!(
                    "`{label}` timed out after {}s",
                    command.timeout_secs
                )));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let diagnostic = if stderr.trim().is_empty() {
                stdout.trim().to_string()
            } else {
                stderr.trim().to_string()
            };
            tracing::warn!(%dialect, dir = %dir.display(), status = %output.status, "generator failed");
            return Err(GenerationFailure::new(format!(
                "`{label}` exited with {}: {diagnostic}",
                output.status
            )));
        }

        read_lock_file(dialect, dir).await
    }
}

/// Read the lock file a generator left in `dir`; missing or empty is a failure.
pub async fn read_lock_file(dialect: Dialect, dir: &Path) -> Result<String, GenerationFailure> {
    let path = dir.join(dialect.lock_file_name());
    match tokio::fs::read_to_string(&path).await {
        Ok(content) if content.trim().is_empty() => Err(GenerationFailure::new(format!(
            "{} generator wrote an empty {}",
            dialect,
            dialect.lock_file_name()
        ))),
        Ok(content) => Ok(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(GenerationFailure::new(
            format!("{dialect} generator did not write {}", dialect.lock_file_name()),
        )),
        Err(e) => Err(GenerationFailure::new(format!(
            "failed to read {}: {e}",
            path.display()
        ))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
