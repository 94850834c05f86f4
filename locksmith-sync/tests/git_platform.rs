mod common;

use std::fs;

use common::{git, init_repository};
use locksmith_sync::{GitPlatform, Platform, PlatformError};
use tempfile::TempDir;

fn repo_with_lock() -> TempDir {
    let tmp = TempDir::new().unwrap();
    init_repository(tmp.path());
    fs::create_dir_all(tmp.path().join("web")).unwrap();
    fs::write(tmp.path().join("web/yarn.lock"), "# yarn lockfile v1\n").unwrap();
    git(tmp.path(), &["add", "web/yarn.lock"]);
    git(tmp.path(), &["commit", "--quiet", "-m", "Add lock"]);
    tmp
}

#[tokio::test]
async fn reads_committed_file_from_branch() {
    let repo = repo_with_lock();
    let platform = GitPlatform::new(repo.path());
    let content = platform
        .get_file_content("web/yarn.lock", "main")
        .await
        .expect("lookup");
    assert_eq!(content.as_deref(), Some("# yarn lockfile v1\n"));
}

#[tokio::test]
async fn missing_file_is_none() {
    let repo = repo_with_lock();
    let platform = GitPlatform::new(repo.path());
    let content = platform
        .get_file_content("package-lock.json", "main")
        .await
        .expect("lookup");
    assert_eq!(content, None);
}

#[tokio::test]
async fn uncommitted_changes_are_invisible() {
    let repo = repo_with_lock();
    fs::write(repo.path().join("web/yarn.lock"), "dirty\n").unwrap();
    let platform = GitPlatform::new(repo.path());
    let content = platform
        .get_file_content("web/yarn.lock", "main")
        .await
        .expect("lookup");
    assert_eq!(content.as_deref(), Some("# yarn lockfile v1\n"));
}

#[tokio::test]
async fn branch_existence() {
    let repo = repo_with_lock();
    git(repo.path(), &["branch", "renovate/lock-file-maintenance"]);
    let platform = GitPlatform::new(repo.path());
    assert!(platform.branch_exists("main").await.unwrap());
    assert!(platform
        .branch_exists("renovate/lock-file-maintenance")
        .await
        .unwrap());
    assert!(!platform.branch_exists("nope").await.unwrap());
}

#[tokio::test]
async fn unknown_branch_content_lookup_is_an_error() {
    let repo = repo_with_lock();
    let platform = GitPlatform::new(repo.path());
    let err = platform
        .get_file_content("web/yarn.lock", "nope")
        .await
        .expect_err("unknown branch");
    assert!(matches!(err, PlatformError::UnknownBranch { ref branch } if branch == "nope"));
}
