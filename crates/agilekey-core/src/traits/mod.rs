// SPDX-FileCopyrightText: 2026 Agilekey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait definitions for the vault's external collaborators.
//!
//! Both traits use `#[async_trait]` so they can be held as trait objects
//! (`Arc<dyn VaultFs>`, `Arc<dyn KeyAgent>`).

pub mod fs;
pub mod key_agent;

pub use fs::VaultFs;
pub use key_agent::KeyAgent;
