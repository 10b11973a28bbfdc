// SPDX-FileCopyrightText: 2026 Agilekey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Filesystem trait through which all vault files are read and written.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{FileInfo, WriteOptions};

/// Storage backend holding the files that make up a vault.
///
/// Paths are `/`-separated and relative to the backend's root. Backends may
/// be a local directory, an in-memory map, or a remote sync service.
#[async_trait]
pub trait VaultFs: Send + Sync + 'static {
    /// Reads the full content of `path`.
    ///
    /// Fails with [`crate::KeychainError::NotFound`] if the file is absent.
    async fn read(&self, path: &str) -> Result<String>;

    /// Replaces the content of `path`, creating the file if needed.
    ///
    /// If `opts.parent_revision` is set and does not match the stored
    /// revision, fails with [`crate::KeychainError::Conflict`] and leaves the
    /// file untouched.
    async fn write(&self, path: &str, content: &str, opts: WriteOptions) -> Result<()>;

    /// Returns metadata for `path`, including its current revision.
    async fn stat(&self, path: &str) -> Result<FileInfo>;

    /// Creates `path` and any missing parent directories.
    async fn mkpath(&self, path: &str) -> Result<()>;
}
