// SPDX-FileCopyrightText: 2026 Agilekey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory filesystem for deterministic vault tests.
//!
//! Every operation can be delayed by a fixed number of scheduler yields so
//! that concurrent callers interleave, which is what the index coalescer
//! tests rely on.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use agilekey_core::{FileInfo, KeychainError, Result, VaultFs, WriteOptions};
use async_trait::async_trait;
use tracing::trace;

#[derive(Debug, Clone)]
struct StoredFile {
    content: String,
    revision: u64,
}

#[derive(Debug, Default)]
struct FsState {
    files: BTreeMap<String, StoredFile>,
    dirs: BTreeSet<String>,
    next_revision: u64,
    writes: HashMap<String, usize>,
    forced_conflicts: HashMap<String, usize>,
    forced_failures: HashMap<String, usize>,
}

/// A `VaultFs` held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryFs {
    state: Mutex<FsState>,
    latency: usize,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Yield to the scheduler `yields` times before each operation.
    pub fn with_latency(mut self, yields: usize) -> Self {
        self.latency = yields;
        self
    }

    /// Create a filesystem holding the given files.
    pub fn with_files<'a>(files: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let fs = Self::new();
        for (path, content) in files {
            fs.insert(path, content);
        }
        fs
    }

    /// Store `content` at `path` directly, bypassing latency and counters.
    pub fn insert(&self, path: &str, content: &str) {
        let mut state = self.state();
        store(&mut state, path, content);
    }

    pub fn remove(&self, path: &str) -> bool {
        self.state().files.remove(path).is_some()
    }

    /// Current content of `path`.
    pub fn contents(&self, path: &str) -> Option<String> {
        self.state().files.get(path).map(|f| f.content.clone())
    }

    pub fn exists(&self, path: &str) -> bool {
        self.state().files.contains_key(path)
    }

    /// All file paths in sorted order.
    pub fn paths(&self) -> Vec<String> {
        self.state().files.keys().cloned().collect()
    }

    /// Number of successful `write` calls made to `path`.
    pub fn write_count(&self, path: &str) -> usize {
        self.state().writes.get(path).copied().unwrap_or_default()
    }

    /// Make the next `count` conditional writes to `path` fail with
    /// [`KeychainError::Conflict`].
    pub fn inject_conflicts(&self, path: &str, count: usize) {
        self.state().forced_conflicts.insert(path.to_string(), count);
    }

    /// Make the next `count` writes to `path` fail with [`KeychainError::Io`].
    pub fn inject_write_failures(&self, path: &str, count: usize) {
        self.state().forced_failures.insert(path.to_string(), count);
    }

    fn state(&self) -> MutexGuard<'_, FsState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn delay(&self) {
        for _ in 0..self.latency {
            tokio::task::yield_now().await;
        }
    }
}

fn store(state: &mut FsState, path: &str, content: &str) {
    state.next_revision += 1;
    let revision = state.next_revision;
    state.files.insert(
        path.to_string(),
        StoredFile {
            content: content.to_string(),
            revision,
        },
    );
}

/// Decrement an injected fault counter, returning true if it fired.
fn take_fault(faults: &mut HashMap<String, usize>, path: &str) -> bool {
    match faults.get_mut(path) {
        Some(remaining) if *remaining > 0 => {
            *remaining -= 1;
            true
        }
        _ => false,
    }
}

#[async_trait]
impl VaultFs for MemoryFs {
    async fn read(&self, path: &str) -> Result<String> {
        self.delay().await;
        self.contents(path).ok_or_else(|| KeychainError::NotFound {
            path: path.to_string(),
        })
    }

    async fn write(&self, path: &str, content: &str, options: WriteOptions) -> Result<()> {
        self.delay().await;
        let mut state = self.state();

        if take_fault(&mut state.forced_failures, path) {
            return Err(KeychainError::Io(format!("injected write failure for {path}")));
        }

        if let Some(parent) = &options.parent_revision {
            let current = state.files.get(path).map(|f| f.revision.to_string());
            let forced = take_fault(&mut state.forced_conflicts, path);
            if forced || current.as_ref() != Some(parent) {
                trace!(path, expected = %parent, "conditional write rejected");
                return Err(KeychainError::Conflict {
                    path: path.to_string(),
                });
            }
        }

        store(&mut state, path, content);
        *state.writes.entry(path.to_string()).or_default() += 1;
        Ok(())
    }

    async fn stat(&self, path: &str) -> Result<FileInfo> {
        self.delay().await;
        let state = self.state();
        let file = state.files.get(path).ok_or_else(|| KeychainError::NotFound {
            path: path.to_string(),
        })?;
        Ok(FileInfo {
            path: path.to_string(),
            revision: file.revision.to_string(),
            size: file.content.len() as u64,
        })
    }

    async fn mkpath(&self, path: &str) -> Result<()> {
        self.delay().await;
        let mut state = self.state();
        let mut prefix = String::new();
        for part in path.split('/').filter(|p| !p.is_empty()) {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(part);
            state.dirs.insert(prefix.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_missing_file_is_not_found() {
        let fs = MemoryFs::new();
        let err = fs.read("nope").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(fs.stat("nope").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn write_then_read_and_stat() {
        let fs = MemoryFs::new();
        fs.write("a/b.txt", "hello", WriteOptions::default())
            .await
            .unwrap();
        assert_eq!(fs.read("a/b.txt").await.unwrap(), "hello");

        let info = fs.stat("a/b.txt").await.unwrap();
        assert_eq!(info.size, 5);
        assert_eq!(fs.write_count("a/b.txt"), 1);
    }

    #[tokio::test]
    async fn revision_changes_on_every_write() {
        let fs = MemoryFs::with_files([("f", "one")]);
        let first = fs.stat("f").await.unwrap().revision;
        fs.write("f", "one", WriteOptions::default()).await.unwrap();
        let second = fs.stat("f").await.unwrap().revision;
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn conditional_write_checks_revision() {
        let fs = MemoryFs::with_files([("f", "one")]);
        let rev = fs.stat("f").await.unwrap().revision;

        fs.write("f", "two", WriteOptions::with_parent(rev.clone()))
            .await
            .unwrap();
        let err = fs
            .write("f", "three", WriteOptions::with_parent(rev))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(fs.contents("f").as_deref(), Some("two"));
    }

    #[tokio::test]
    async fn conditional_write_to_missing_file_conflicts() {
        let fs = MemoryFs::new();
        let err = fs
            .write("f", "x", WriteOptions::with_parent("1"))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn injected_faults_fire_the_requested_number_of_times() {
        let fs = MemoryFs::with_files([("f", "one")]);
        fs.inject_conflicts("f", 1);
        fs.inject_write_failures("g", 1);

        let rev = fs.stat("f").await.unwrap().revision;
        assert!(
            fs.write("f", "two", WriteOptions::with_parent(rev.clone()))
                .await
                .unwrap_err()
                .is_conflict()
        );
        fs.write("f", "two", WriteOptions::with_parent(rev))
            .await
            .unwrap();

        assert!(matches!(
            fs.write("g", "x", WriteOptions::default()).await,
            Err(KeychainError::Io(_))
        ));
        fs.write("g", "x", WriteOptions::default()).await.unwrap();
        assert_eq!(fs.write_count("g"), 1);
    }

    #[tokio::test]
    async fn mkpath_is_idempotent() {
        let fs = MemoryFs::new().with_latency(2);
        fs.mkpath("a/b/c").await.unwrap();
        fs.mkpath("a/b/c").await.unwrap();
        assert!(fs.paths().is_empty());
    }
}
