// SPDX-FileCopyrightText: 2026 Agilekey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Batched updates to `contents.js`.
//!
//! Every item save also needs its overview row updated in the shared index
//! file. Rewriting the index once per save would race with itself, so
//! updates are queued and written by at most one flush at a time:
//!
//! - [`IndexUpdateQueue::enqueue`] records an entry synchronously. A later
//!   entry for the same uuid replaces an earlier one that has not been
//!   written yet.
//! - [`IndexUpdateQueue::flush`] waits for any flush already in progress,
//!   then starts a new one if entries are still queued. Every caller waiting
//!   on a flush sees its result, including its error.
//! - A flush reads the index, applies all queued entries, and writes it back
//!   conditioned on the revision it read. A conflicting write is reported,
//!   not retried.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use agilekey_core::{Result, VaultFs, WriteOptions};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tracing::{debug, warn};

use crate::format::{ContentsIndex, IndexEntry};

type FlushFuture = Shared<BoxFuture<'static, Result<()>>>;

#[derive(Default)]
struct QueueState {
    /// Queued entries keyed by uuid, with the order they were first queued in.
    pending: HashMap<String, (u64, IndexEntry)>,
    next_seq: u64,
    in_flight: Option<(u64, FlushFuture)>,
    next_flush_id: u64,
    completed_flushes: u64,
}

struct QueueInner {
    fs: Arc<dyn VaultFs>,
    contents_path: String,
    state: Mutex<QueueState>,
}

impl QueueInner {
    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn write_pending(&self) -> Result<()> {
        let info = self.fs.stat(&self.contents_path).await?;
        let json = self.fs.read(&self.contents_path).await?;
        let mut index = ContentsIndex::parse(&json)?;

        // Entries queued while the index was being read still make this flush.
        let mut batch: Vec<(u64, IndexEntry)> =
            self.state().pending.drain().map(|(_, v)| v).collect();
        if batch.is_empty() {
            return Ok(());
        }
        batch.sort_by_key(|(seq, _)| *seq);

        for (_, entry) in &batch {
            index.upsert(entry);
        }
        debug!(
            entries = batch.len(),
            rows = index.len(),
            path = %self.contents_path,
            "writing index update"
        );

        let result = self
            .fs
            .write(
                &self.contents_path,
                &index.to_json()?,
                WriteOptions::with_parent(info.revision),
            )
            .await;
        if let Err(e) = &result {
            warn!(
                error = %e,
                path = %self.contents_path,
                entries = batch.len(),
                "index update failed"
            );
        }
        result
    }

    async fn run_flush(self: Arc<Self>, id: u64) -> Result<()> {
        let result = self.write_pending().await;
        let mut state = self.state();
        if result.is_ok() {
            state.completed_flushes += 1;
        }
        if state.in_flight.as_ref().is_some_and(|(current, _)| *current == id) {
            state.in_flight = None;
        }
        result
    }
}

/// Coalescing writer for a vault's `contents.js`.
#[derive(Clone)]
pub struct IndexUpdateQueue {
    inner: Arc<QueueInner>,
}

impl IndexUpdateQueue {
    pub fn new(fs: Arc<dyn VaultFs>, contents_path: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                fs,
                contents_path: contents_path.into(),
                state: Mutex::new(QueueState::default()),
            }),
        }
    }

    /// Queue `entry` for the next flush without waiting.
    pub fn enqueue(&self, entry: IndexEntry) {
        let mut state = self.inner.state();
        let seq = state.next_seq;
        state.next_seq += 1;
        state
            .pending
            .entry(entry.uuid.clone())
            .and_modify(|(_, queued)| *queued = entry.clone())
            .or_insert((seq, entry));
    }

    /// Queue `entry` and wait until it has been written.
    pub async fn push(&self, entry: IndexEntry) -> Result<()> {
        self.enqueue(entry);
        self.flush().await
    }

    /// Wait until every queued entry has been written.
    pub async fn flush(&self) -> Result<()> {
        loop {
            let flush = {
                let mut state = self.inner.state();
                match &state.in_flight {
                    Some((_, running)) => running.clone(),
                    None if state.pending.is_empty() => return Ok(()),
                    None => {
                        let id = state.next_flush_id;
                        state.next_flush_id += 1;
                        let running = self.inner.clone().run_flush(id).boxed().shared();
                        state.in_flight = Some((id, running.clone()));
                        running
                    }
                }
            };
            flush.await?;
        }
    }

    /// Number of flushes that wrote the index successfully.
    pub fn flush_count(&self) -> u64 {
        self.inner.state().completed_flushes
    }

    /// Number of distinct items waiting to be written.
    pub fn pending_len(&self) -> usize {
        self.inner.state().pending.len()
    }

    /// True when nothing is queued and no flush is running.
    pub fn is_idle(&self) -> bool {
        let state = self.inner.state();
        state.pending.is_empty() && state.in_flight.is_none()
    }
}

impl std::fmt::Debug for IndexUpdateQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state();
        f.debug_struct("IndexUpdateQueue")
            .field("contents_path", &self.inner.contents_path)
            .field("pending", &state.pending.len())
            .field("flushing", &state.in_flight.is_some())
            .finish()
    }
}
