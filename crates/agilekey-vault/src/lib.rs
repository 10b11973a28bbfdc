// SPDX-FileCopyrightText: 2026 Agilekey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agile Keychain vault engine.
//!
//! Reads and writes 1Password `.agilekeychain` vaults: password-wrapped
//! master keys, per-item AES-128 encryption in OpenSSL `Salted__` framing,
//! and a `contents.js` index kept consistent under concurrent saves.

pub mod agent;
pub mod crypto;
pub mod format;
pub mod index;
pub mod item;
pub mod kdf;
pub mod keys;
pub mod prompt;
pub mod vault;

pub use agent::SimpleKeyAgent;
pub use agent::rpc::{KeyAgentServer, RpcKeyAgent};
pub use index::IndexUpdateQueue;
pub use item::{Item, ItemContent};
pub use kdf::DEFAULT_VAULT_PASS_ITERATIONS;
pub use prompt::{get_master_password, get_new_master_password};
pub use vault::{ListItemsOptions, Vault, VaultEvent};
