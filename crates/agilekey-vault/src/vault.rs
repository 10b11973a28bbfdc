// SPDX-FileCopyrightText: 2026 Agilekey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vault lifecycle: create, unlock, lock, load, save and list items.
//!
//! A vault is an `.agilekeychain` directory read and written through a
//! [`VaultFs`]. The master key is wrapped by the master password in
//! `encryptionKeys.js`; once unwrapped it lives only in the [`KeyAgent`],
//! which encrypts and decrypts item content on the vault's behalf.
//! Changing the password only re-wraps the master key.

use std::sync::Arc;

use agilekey_core::{
    ChangeSource, CryptoParams, KeyAgent, KeychainError, Result, VaultFs, WriteOptions,
};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info};

use crate::agent::SimpleKeyAgent;
use crate::format::{
    ContentsIndex, DEFAULT_SECURITY_LEVEL, EncryptionKeyEntry, EncryptionKeyList, IndexEntry,
    KeychainItem, LEGACY_SECURITY_LEVEL, VAULT_EXTENSION, VaultPaths,
};
use crate::index::IndexUpdateQueue;
use crate::item::{Item, ItemContent};
use crate::keys;

/// Buffered events per subscriber before the slowest one starts lagging.
const EVENT_CAPACITY: usize = 64;

/// Notifications published by a [`Vault`].
#[derive(Debug, Clone, PartialEq)]
pub enum VaultEvent {
    /// The vault's keys were registered with its key agent.
    Unlocked,
    /// An item and its index row were saved. Content is not included.
    ItemUpdated(Item),
}

/// Options for [`Vault::list_items`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListItemsOptions {
    /// Also return deletion markers.
    pub include_tombstones: bool,
}

/// An Agile Keychain vault.
pub struct Vault {
    fs: Arc<dyn VaultFs>,
    paths: VaultPaths,
    agent: Arc<dyn KeyAgent>,
    /// Every entry from `encryptionKeys.js`, legacy levels included.
    key_cache: Mutex<Option<Vec<EncryptionKeyEntry>>>,
    index: IndexUpdateQueue,
    events: broadcast::Sender<VaultEvent>,
    read_only: bool,
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("path", &self.paths.root())
            .field("read_only", &self.read_only)
            .field("index", &self.index)
            .finish()
    }
}

impl Vault {
    pub fn new(fs: Arc<dyn VaultFs>, path: impl Into<String>, agent: Arc<dyn KeyAgent>) -> Self {
        let paths = VaultPaths::new(path);
        let index = IndexUpdateQueue::new(fs.clone(), paths.contents_file());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            fs,
            paths,
            agent,
            key_cache: Mutex::new(None),
            index,
            events,
            read_only: false,
        }
    }

    /// Open a vault with its own in-memory key agent.
    pub fn with_default_agent(fs: Arc<dyn VaultFs>, path: impl Into<String>) -> Self {
        Self::new(fs, path, Arc::new(SimpleKeyAgent::new()))
    }

    /// Mark the store read-only. Writes fail with [`KeychainError::State`].
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Initialize an empty vault at `path` protected by `password`.
    ///
    /// The `.agilekeychain` suffix is appended when missing. The returned
    /// vault is locked.
    ///
    /// Files are written in order: key file and hint, then the empty index.
    /// A failure part-way is not rolled back.
    pub async fn create_vault(
        fs: Arc<dyn VaultFs>,
        path: &str,
        password: &SecretString,
        hint: &str,
        iterations: u32,
    ) -> Result<Self> {
        let path = if path.ends_with(VAULT_EXTENSION) {
            path.to_string()
        } else {
            format!("{path}{VAULT_EXTENSION}")
        };
        let vault = Self::with_default_agent(fs, path);
        let keys_file = vault.paths.keys_file();

        match vault.fs.stat(&keys_file).await {
            Ok(_) => {
                return Err(KeychainError::State(format!(
                    "a vault already exists at {}",
                    vault.paths.root()
                )));
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        let (entry, _raw_key) = keys::new_key_entry(
            password.expose_secret().as_bytes(),
            DEFAULT_SECURITY_LEVEL,
            iterations,
        )?;

        vault.fs.mkpath(&vault.paths.data_folder()).await?;
        vault.write_keys(vec![entry], hint).await?;
        vault
            .fs
            .write(&vault.paths.contents_file(), "[]", WriteOptions::default())
            .await?;

        info!(path = %vault.paths.root(), iterations, "vault created");
        Ok(vault)
    }

    /// Unwrap the vault's keys with `password` and hand them to the key agent.
    ///
    /// Legacy `SL3` keys are skipped.
    pub async fn unlock(&self, password: &SecretString) -> Result<()> {
        let entries = self.load_key_entries().await?;
        let unlocked = keys::decrypt_keys(
            password.expose_secret().as_bytes(),
            &entries,
            &[LEGACY_SECURITY_LEVEL],
        )?;

        let count = unlocked.len();
        for mut key in unlocked {
            let bytes = std::mem::take(&mut *key.key);
            self.agent.add_key(&key.identifier, bytes).await?;
        }

        info!(path = %self.paths.root(), keys = count, "vault unlocked");
        let _ = self.events.send(VaultEvent::Unlocked);
        Ok(())
    }

    /// Discard the unlocked keys held by the key agent.
    pub async fn lock(&self) -> Result<()> {
        self.agent.forget_keys().await?;
        info!(path = %self.paths.root(), "vault locked");
        Ok(())
    }

    /// True unless every (non-legacy) key of this vault is resident in the
    /// key agent.
    pub async fn is_locked(&self) -> Result<bool> {
        let entries = self.list_keys().await?;
        let resident = self.agent.list_keys().await?;
        Ok(entries.iter().any(|e| !resident.contains(&e.identifier)))
    }

    /// Key entries used for items. Legacy levels are left out.
    pub async fn list_keys(&self) -> Result<Vec<EncryptionKeyEntry>> {
        let mut entries = self.load_key_entries().await?;
        entries.retain(|e| e.level != LEGACY_SECURITY_LEVEL);
        Ok(entries)
    }

    /// Replace the key file and password hint.
    pub async fn save_keys(&self, entries: Vec<EncryptionKeyEntry>, hint: &str) -> Result<()> {
        self.ensure_writable("save keys")?;
        self.write_keys(entries, hint).await
    }

    /// Load an item's overview. Content stays encrypted on disk unless the
    /// file stores it in the clear.
    pub async fn load_item(&self, uuid: &str) -> Result<Item> {
        Ok(self.read_item_file(uuid).await?.into_item())
    }

    /// Decrypt the stored content JSON of `item`.
    pub async fn get_raw_decrypted_data(&self, item: &Item) -> Result<String> {
        let stored = self.read_item_file(&item.uuid).await?;
        self.decrypt_item_data(&stored).await
    }

    /// Fetch and decrypt the content of `item`.
    pub async fn get_content(&self, item: &Item) -> Result<ItemContent> {
        let stored = self.read_item_file(&item.uuid).await?;
        if let Some(content) = stored.secure_contents {
            return Ok(content);
        }
        let json = self.decrypt_item_data(&stored).await?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Encrypt and write `item`, then update its row in the index.
    ///
    /// Local changes refresh the item's timestamps; synced changes keep them.
    /// If `item` has no content attached, the stored content is reused.
    pub async fn save_item(&self, item: &mut Item, source: ChangeSource) -> Result<()> {
        self.ensure_writable("save item")?;
        if source != ChangeSource::Sync {
            item.update_timestamps();
        }

        let content = match item.content() {
            Some(content) => content.clone(),
            None => self.get_content(item).await?,
        };
        item.update_overview_from_content(&content);

        let key_id = self.key_id_for_level(DEFAULT_SECURITY_LEVEL).await?;
        let plaintext = serde_json::to_vec(&content)?;
        let encrypted = self
            .agent
            .encrypt(&key_id, &plaintext, CryptoParams::default())
            .await?;
        let item_json = serde_json::to_string(&KeychainItem::from_item(item, &encrypted))?;

        let item_path = self.paths.item_file(&item.uuid);
        self.index.enqueue(IndexEntry::from_item(item));
        tokio::try_join!(
            self.fs.write(&item_path, &item_json, WriteOptions::default()),
            self.index.flush(),
        )?;

        debug!(uuid = %item.uuid, source = %source, "item saved");
        let mut published = item.clone();
        published.clear_content();
        let _ = self.events.send(VaultEvent::ItemUpdated(published));
        Ok(())
    }

    /// Overview of every item from the index.
    ///
    /// Items are lightweight: only uuid, type, title, primary location,
    /// update time, folder and trashed state are set.
    pub async fn list_items(&self, opts: ListItemsOptions) -> Result<Vec<Item>> {
        let json = self.fs.read(&self.paths.contents_file()).await?;
        let items = ContentsIndex::parse(&json)?
            .entries()?
            .into_iter()
            .map(IndexEntry::into_item)
            .filter(|item| opts.include_tombstones || !item.is_tombstone())
            .collect();
        Ok(items)
    }

    /// Re-wrap every key with `new_password`.
    ///
    /// Uses each key's current iteration count unless `iterations` is given.
    /// Item content is not re-encrypted.
    pub async fn change_password(
        &self,
        old_password: &SecretString,
        new_password: &SecretString,
        hint: &str,
        iterations: Option<u32>,
    ) -> Result<()> {
        self.ensure_writable("change password")?;
        if self.is_locked().await? {
            return Err(KeychainError::State(
                "vault must be unlocked before changing the password".to_string(),
            ));
        }

        let old = old_password.expose_secret().as_bytes();
        let new = new_password.expose_secret().as_bytes();
        let rewrapped = self
            .load_key_entries()
            .await?
            .iter()
            .map(|entry| keys::rewrap_key(old, new, entry, iterations))
            .collect::<Result<Vec<_>>>()?;

        self.write_keys(rewrapped, hint).await?;
        info!(path = %self.paths.root(), "vault password changed");
        Ok(())
    }

    pub async fn password_hint(&self) -> Result<String> {
        self.fs.read(&self.paths.hint_file()).await
    }

    pub fn vault_path(&self) -> &str {
        self.paths.root()
    }

    /// The queue batching this vault's index updates.
    pub fn index_queue(&self) -> &IndexUpdateQueue {
        &self.index
    }

    /// Receive [`VaultEvent`]s. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<VaultEvent> {
        self.events.subscribe()
    }

    fn ensure_writable(&self, operation: &str) -> Result<()> {
        if self.read_only {
            return Err(KeychainError::State(format!(
                "cannot {operation}: vault is read-only"
            )));
        }
        Ok(())
    }

    async fn load_key_entries(&self) -> Result<Vec<EncryptionKeyEntry>> {
        let mut cache = self.key_cache.lock().await;
        if let Some(entries) = cache.as_ref() {
            return Ok(entries.clone());
        }
        let json = self.fs.read(&self.paths.keys_file()).await?;
        let entries = EncryptionKeyList::parse(&json)?.entries().to_vec();
        *cache = Some(entries.clone());
        Ok(entries)
    }

    async fn write_keys(&self, entries: Vec<EncryptionKeyEntry>, hint: &str) -> Result<()> {
        let json = EncryptionKeyList::from_entries(entries).to_json()?;
        let keys_path = self.paths.keys_file();
        let hint_path = self.paths.hint_file();
        tokio::try_join!(
            self.fs.write(&keys_path, &json, WriteOptions::default()),
            self.fs.write(&hint_path, hint, WriteOptions::default()),
        )?;
        *self.key_cache.lock().await = None;
        Ok(())
    }

    async fn read_item_file(&self, uuid: &str) -> Result<KeychainItem> {
        let json = self.fs.read(&self.paths.item_file(uuid)).await?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Identifier of the resident key for `level`.
    async fn key_id_for_level(&self, level: &str) -> Result<String> {
        let missing = || KeychainError::MissingKey {
            level: level.to_string(),
        };
        let entries = self.load_key_entries().await?;
        let entry = entries.iter().find(|e| e.level == level).ok_or_else(missing)?;
        if !self.agent.list_keys().await?.contains(&entry.identifier) {
            return Err(missing());
        }
        Ok(entry.identifier.clone())
    }

    async fn decrypt_item_data(&self, stored: &KeychainItem) -> Result<String> {
        let key_id = self.key_id_for_level(stored.security_level()).await?;
        let encrypted = stored.encrypted_bytes()?;
        let plaintext = self
            .agent
            .decrypt(&key_id, &encrypted, CryptoParams::default())
            .await?;
        String::from_utf8(plaintext)
            .map_err(|e| KeychainError::Format(format!("item content is not valid UTF-8: {e}")))
    }
}
