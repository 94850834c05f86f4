pub mod detect;
pub mod diff;
pub mod sync;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use locksmith_core::{config, RunConfig};
use locksmith_sync::{CommandGenerator, GitPlatform, SyncContext};
use tokio::runtime::Runtime;

/// Load and validate the run config at `path`.
pub(crate) fn load_config(path: &Path) -> Result<RunConfig> {
    config::load_at(path).with_context(|| format!("failed to load run config {}", path.display()))
}

/// Engine context over the checkout at `repo`, with the config's generators.
pub(crate) fn sync_context(repo: &Path, config: &RunConfig) -> SyncContext {
    SyncContext::new(
        Arc::new(GitPlatform::new(repo)),
        Arc::new(CommandGenerator::from_config(config)),
    )
    .with_span(tracing::info_span!("locksmith", repo = %repo.display()))
}

pub(crate) fn runtime() -> Result<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")
}
