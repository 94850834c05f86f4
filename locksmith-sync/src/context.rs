//! Explicit run context handed to every stage.

use std::sync::Arc;

use tracing::Span;

use crate::generator::LockFileGenerator;
use crate::platform::Platform;

/// Collaborators of a sync run: the repository host, the lock-file
/// generator, and the tracing span run events are recorded under.
///
/// Cloning is cheap; each spawned directory task holds its own clone.
#[derive(Clone)]
pub struct SyncContext {
    platform: Arc<dyn Platform>,
    generator: Arc<dyn LockFileGenerator>,
    span: Span,
}

impl SyncContext {
    pub fn new(platform: Arc<dyn Platform>, generator: Arc<dyn LockFileGenerator>) -> Self {
        Self {
            platform,
            generator,
            span: Span::current(),
        }
    }

    /// Record run events under `span` instead of the caller's current span.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn platform(&self) -> &dyn Platform {
        self.platform.as_ref()
    }

    pub fn generator(&self) -> &dyn LockFileGenerator {
        self.generator.as_ref()
    }

    pub fn span(&self) -> &Span {
        &self.span
    }
}

impl std::fmt::Debug for SyncContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncContext")
            .field("span", &self.span)
            .finish_non_exhaustive()
    }
}
