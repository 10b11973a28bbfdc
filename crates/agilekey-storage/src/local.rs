// SPDX-FileCopyrightText: 2026 Agilekey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `VaultFs` over a directory on the local disk.
//!
//! A file's revision is the SHA-256 of its content, so any change to the
//! file, including one made by another program, changes its revision.
//!
//! Writes are serialized per `LocalFs` instance: the revision check and the
//! write happen under one async mutex. Content is written to a temporary
//! file in the target directory and renamed into place, so readers never
//! see a partial file.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use agilekey_core::{FileInfo, KeychainError, Result, VaultFs, WriteOptions};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::debug;

/// A `VaultFs` rooted at a local directory.
#[derive(Debug)]
pub struct LocalFs {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl LocalFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a vault path under the root, refusing anything that would
    /// escape it.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(KeychainError::Io(format!(
                "path `{path}` is outside the storage root"
            )));
        }
        Ok(self.root.join(relative))
    }

    async fn read_bytes(&self, path: &str, full: &Path) -> Result<Vec<u8>> {
        tokio::fs::read(full).await.map_err(|e| map_io(path, e))
    }
}

/// Revision marker for file content.
pub fn revision_of(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

fn map_io(path: &str, err: std::io::Error) -> KeychainError {
    match err.kind() {
        ErrorKind::NotFound => KeychainError::NotFound {
            path: path.to_string(),
        },
        _ => KeychainError::Io(format!("{path}: {err}")),
    }
}

#[async_trait]
impl VaultFs for LocalFs {
    async fn read(&self, path: &str) -> Result<String> {
        let full = self.resolve(path)?;
        let bytes = self.read_bytes(path, &full).await?;
        String::from_utf8(bytes)
            .map_err(|e| KeychainError::Format(format!("{path} is not valid UTF-8: {e}")))
    }

    async fn write(&self, path: &str, content: &str, options: WriteOptions) -> Result<()> {
        let full = self.resolve(path)?;
        let _guard = self.write_lock.lock().await;

        if let Some(expected) = &options.parent_revision {
            let current = match self.read_bytes(path, &full).await {
                Ok(bytes) => Some(revision_of(&bytes)),
                Err(e) if e.is_not_found() => None,
                Err(e) => return Err(e),
            };
            if current.as_ref() != Some(expected) {
                debug!(path, "revision mismatch on conditional write");
                return Err(KeychainError::Conflict {
                    path: path.to_string(),
                });
            }
        }

        let parent = full.parent().unwrap_or(self.root.as_path());
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| map_io(path, e))?;

        let file_name = full
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| KeychainError::Io(format!("`{path}` does not name a file")))?;
        let temp = parent.join(format!(".{file_name}.tmp"));
        tokio::fs::write(&temp, content)
            .await
            .map_err(|e| map_io(path, e))?;
        if let Err(e) = tokio::fs::rename(&temp, &full).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(map_io(path, e));
        }
        Ok(())
    }

    async fn stat(&self, path: &str) -> Result<FileInfo> {
        let full = self.resolve(path)?;
        let bytes = self.read_bytes(path, &full).await?;
        Ok(FileInfo {
            path: path.to_string(),
            revision: revision_of(&bytes),
            size: bytes.len() as u64,
        })
    }

    async fn mkpath(&self, path: &str) -> Result<()> {
        let full = self.resolve(path)?;
        tokio::fs::create_dir_all(&full)
            .await
            .map_err(|e| map_io(path, e))
    }
}
