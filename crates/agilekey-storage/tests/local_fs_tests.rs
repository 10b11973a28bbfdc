// SPDX-FileCopyrightText: 2026 Agilekey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Disk-backed tests for `LocalFs`.

use agilekey_core::{KeychainError, VaultFs, WriteOptions};
use agilekey_storage::LocalFs;
use agilekey_storage::local::revision_of;
use tempfile::tempdir;

#[tokio::test]
async fn write_creates_parent_directories() {
    let dir = tempdir().unwrap();
    let fs = LocalFs::new(dir.path());

    fs.write("v.agilekeychain/data/default/contents.js", "[]", WriteOptions::default())
        .await
        .unwrap();

    let on_disk =
        std::fs::read_to_string(dir.path().join("v.agilekeychain/data/default/contents.js"))
            .unwrap();
    assert_eq!(on_disk, "[]");
    assert_eq!(
        fs.read("v.agilekeychain/data/default/contents.js")
            .await
            .unwrap(),
        "[]"
    );
}

#[tokio::test]
async fn missing_files_are_not_found() {
    let dir = tempdir().unwrap();
    let fs = LocalFs::new(dir.path());

    assert!(fs.read("missing.js").await.unwrap_err().is_not_found());
    assert!(fs.stat("missing.js").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn stat_reports_content_revision_and_size() {
    let dir = tempdir().unwrap();
    let fs = LocalFs::new(dir.path());
    fs.write("f.txt", "hello", WriteOptions::default())
        .await
        .unwrap();

    let info = fs.stat("f.txt").await.unwrap();
    assert_eq!(info.path, "f.txt");
    assert_eq!(info.size, 5);
    assert_eq!(info.revision, revision_of(b"hello"));
}

#[tokio::test]
async fn conditional_write_detects_external_change() {
    let dir = tempdir().unwrap();
    let fs = LocalFs::new(dir.path());
    fs.write("index.js", "[]", WriteOptions::default())
        .await
        .unwrap();
    let revision = fs.stat("index.js").await.unwrap().revision;

    // Another program rewrites the file.
    std::fs::write(dir.path().join("index.js"), "[[\"X\"]]").unwrap();

    let err = fs
        .write("index.js", "[[\"Y\"]]", WriteOptions::with_parent(revision))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        KeychainError::Conflict {
            path: "index.js".into()
        }
    );
    assert_eq!(fs.read("index.js").await.unwrap(), "[[\"X\"]]");
}

#[tokio::test]
async fn conditional_write_succeeds_on_matching_revision() {
    let dir = tempdir().unwrap();
    let fs = LocalFs::new(dir.path());
    fs.write("index.js", "[]", WriteOptions::default())
        .await
        .unwrap();
    let revision = fs.stat("index.js").await.unwrap().revision;

    fs.write("index.js", "[1]", WriteOptions::with_parent(revision))
        .await
        .unwrap();
    assert_eq!(fs.read("index.js").await.unwrap(), "[1]");
    assert!(!dir.path().join(".index.js.tmp").exists());
}

#[tokio::test]
async fn mkpath_creates_nested_directories() {
    let dir = tempdir().unwrap();
    let fs = LocalFs::new(dir.path());
    fs.mkpath("a/b/c").await.unwrap();
    fs.mkpath("a/b/c").await.unwrap();
    assert!(dir.path().join("a/b/c").is_dir());
}

#[tokio::test]
async fn paths_outside_root_are_rejected() {
    let dir = tempdir().unwrap();
    let fs = LocalFs::new(dir.path().join("root"));
    let err = fs
        .write("../escape.txt", "x", WriteOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, KeychainError::Io(_)));
    assert!(!dir.path().join("escape.txt").exists());
}
