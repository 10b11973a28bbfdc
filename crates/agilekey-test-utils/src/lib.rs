// SPDX-FileCopyrightText: 2026 Agilekey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for agilekey integration tests.
//!
//! # Components
//!
//! - [`MemoryFs`] - In-memory `VaultFs` with latency, conflict and failure
//!   injection, plus per-path write counters

pub mod memory_fs;

pub use memory_fs::MemoryFs;
