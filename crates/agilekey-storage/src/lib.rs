// SPDX-FileCopyrightText: 2026 Agilekey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Local-disk storage for agilekey vaults.
//!
//! [`LocalFs`] maps the `/`-separated paths used by the vault engine onto a
//! root directory and implements revision-checked writes.

pub mod local;

pub use local::LocalFs;
