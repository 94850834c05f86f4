//! Atomic write-back of updated lock files into a checkout.
//!
//! ## `atomic_write` protocol
//!
//! 1. Read the current file, skip if the content is already identical.
//! 2. Write to `<path>.locksmith.tmp`.
//! 3. Rename to the final path (atomic on POSIX).
//!
//! Lock files are opaque: content is written byte-for-byte, with no
//! line-ending normalisation.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use locksmith_core::UpdatedLockFile;

use crate::error::{io_err, SyncError};

/// Outcome of an individual lock-file write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    /// File was written (content changed or did not previously exist).
    Written { path: PathBuf },
    /// File was skipped: on-disk content already matches.
    Unchanged { path: PathBuf },
}

/// Write every updated lock file under `repo_root`.
pub fn write_lock_files(
    repo_root: &Path,
    files: &[UpdatedLockFile],
) -> Result<Vec<WriteResult>, SyncError> {
    files
        .iter()
        .map(|file| atomic_write(&repo_root.join(&file.name), &file.contents))
        .collect()
}

pub(crate) fn atomic_write(path: &Path, content: &str) -> Result<WriteResult, SyncError> {
    let tmp = PathBuf::from(format!("{}.locksmith.tmp", path.display()));
    atomic_write_with_tmp(path, content, &tmp)
}

fn atomic_write_with_tmp(path: &Path, content: &str, tmp: &Path) -> Result<WriteResult, SyncError> {
    match std::fs::read(path) {
        Ok(existing) if existing == content.as_bytes() => {
            tracing::debug!("unchanged: {}", path.display());
            return Ok(WriteResult::Unchanged {
                path: path.to_path_buf(),
            });
        }
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(io_err(path, e)),
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    if let Some(tmp_parent) = tmp.parent() {
        std::fs::create_dir_all(tmp_parent).map_err(|e| io_err(tmp_parent, e))?;
    }
    std::fs::write(tmp, content).map_err(|e| io_err(tmp, e))?;

    if let Err(e) = std::fs::rename(tmp, path) {
        let _ = std::fs::remove_file(tmp);
        return Err(io_err(path, e));
    }

    tracing::info!("wrote: {}", path.display());
    Ok(WriteResult::Written {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn lock(name: &str, contents: &str) -> UpdatedLockFile {
        UpdatedLockFile {
            name: name.to_string(),
            contents: contents.to_string(),
        }
    }

    #[test]
    fn first_write_returns_written_and_creates_parents() {
        let tmp = TempDir::new().unwrap();
        let results =
            write_lock_files(tmp.path(), &[lock("packages/a/yarn.lock", "# v1\n")]).unwrap();
        assert!(matches!(results[0], WriteResult::Written { .. }));
        assert_eq!(
            fs::read_to_string(tmp.path().join("packages/a/yarn.lock")).unwrap(),
            "# v1\n"
        );
    }

    #[test]
    fn identical_content_returns_unchanged() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("package-lock.json"), "{}\n").unwrap();
        let results = write_lock_files(tmp.path(), &[lock("package-lock.json", "{}\n")]).unwrap();
        assert!(matches!(results[0], WriteResult::Unchanged { .. }));
    }

    #[test]
    fn crlf_content_is_written_verbatim() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("yarn.lock");
        fs::write(&path, "a\nb\n").unwrap();
        let result = atomic_write(&path, "a\r\nb\r\n").unwrap();
        assert!(matches!(result, WriteResult::Written { .. }));
        assert_eq!(fs::read(&path).unwrap(), b"a\r\nb\r\n");
    }

    #[test]
    fn tmp_file_removed_after_write() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("yarn.lock");
        atomic_write(&path, "data").unwrap();
        let tmp_path = PathBuf::from(format!("{}.locksmith.tmp", path.display()));
        assert!(!tmp_path.exists(), ".locksmith.tmp must be cleaned up");
    }

    #[test]
    #[cfg(unix)]
    fn rename_failure_leaves_original_and_cleans_tmp() {
        use std::os::unix::fs::PermissionsExt;

        let root = TempDir::new().unwrap();
        let readonly_dir = root.path().join("readonly");
        fs::create_dir_all(&readonly_dir).unwrap();

        let path = readonly_dir.join("yarn.lock");
        fs::write(&path, "original").unwrap();

        let mut perms = fs::metadata(&readonly_dir).unwrap().permissions();
        perms.set_mode(0o555);
        fs::set_permissions(&readonly_dir, perms).unwrap();

        let tmp_dir = TempDir::new().unwrap();
        let tmp_path = tmp_dir.path().join("yarn.lock.locksmith.tmp");

        let result = atomic_write_with_tmp(&path, "new content", &tmp_path);

        let mut perms = fs::metadata(&readonly_dir).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&readonly_dir, perms).unwrap();

        // Running as root bypasses directory permissions; only check cleanup then.
        if result.is_err() {
            assert_eq!(fs::read_to_string(&path).unwrap(), "original");
        }
        assert!(!tmp_path.exists(), ".locksmith.tmp should be cleaned up");
    }
}
