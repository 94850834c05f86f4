//! # locksmith-sync
//!
//! Lock-file synchronization engine.
//!
//! Call [`get_updated_lock_files`] with a [`SyncContext`] and a run
//! configuration to find out which lock files a set of manifest edits
//! changes. The run is split into four stages, each its own module:
//!
//! - [`resolver`]: which directories need which lock files regenerated
//! - [`materializer`]: stage manifests, rc files and old lock files
//! - [`generator`]: run the external lock-file generator per directory
//! - [`diff`]: compare against the baseline branch and aggregate failures

pub mod context;
pub mod diff;
pub mod error;
pub mod generator;
pub mod materializer;
pub mod pipeline;
pub mod platform;
pub mod resolver;
pub mod writer;

pub use context::SyncContext;
pub use diff::{diff_lock_files, FileDiff};
pub use error::SyncError;
pub use generator::{CommandGenerator, GenerationFailure, LockFileGenerator};
pub use pipeline::get_updated_lock_files;
pub use platform::{GitPlatform, Platform, PlatformError};
pub use resolver::{determine_lock_file_dirs, LockFileDirs};
pub use writer::{write_lock_files, WriteResult};
