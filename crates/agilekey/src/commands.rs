// SPDX-FileCopyrightText: 2026 Agilekey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subcommand implementations.
//!
//! Each command receives an opened vault and any passwords already read, so
//! the prompting stays in `main`.

use std::path::Path;
use std::sync::Arc;

use agilekey_core::{ChangeSource, KeychainError, Result};
use agilekey_storage::LocalFs;
use agilekey_vault::item::{FormFieldType, ItemUrl, WebFormField, types};
use agilekey_vault::{Item, ListItemsOptions, Vault};
use secrecy::SecretString;
use tracing::info;

/// Where a vault lives on disk.
///
/// Storage is rooted at the vault's parent directory and the vault is
/// addressed by its directory name.
#[derive(Debug, Clone)]
pub struct VaultLocation {
    root: std::path::PathBuf,
    name: String,
}

impl VaultLocation {
    pub fn new(path: &Path) -> Self {
        let root = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => std::path::PathBuf::from("."),
        };
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { root, name }
    }

    fn fs(&self) -> Arc<LocalFs> {
        Arc::new(LocalFs::new(&self.root))
    }

    pub fn open(&self, read_only: bool) -> Vault {
        Vault::with_default_agent(self.fs(), self.name.clone()).with_read_only(read_only)
    }
}

/// Fields for a new login item.
#[derive(Debug, Clone, Default)]
pub struct NewLogin {
    pub title: String,
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

pub async fn create(
    location: &VaultLocation,
    password: &SecretString,
    hint: &str,
    iterations: u32,
) -> Result<()> {
    let vault =
        Vault::create_vault(location.fs(), &location.name, password, hint, iterations).await?;
    println!("created {}", location.root.join(vault.vault_path()).display());
    Ok(())
}

pub async fn list(vault: &Vault, tombstones: bool) -> Result<()> {
    let opts = ListItemsOptions {
        include_tombstones: tombstones,
    };
    for item in vault.list_items(opts).await? {
        let trashed = if item.trashed { " [trashed]" } else { "" };
        println!(
            "{}  {}  {}{}",
            item.uuid,
            item.title,
            item.primary_location(),
            trashed
        );
    }
    Ok(())
}

pub async fn show(vault: &Vault, password: &SecretString, uuid: &str, reveal: bool) -> Result<()> {
    vault.unlock(password).await?;
    let item = vault.load_item(uuid).await?;
    let content = vault.get_content(&item).await?;

    println!("title:    {}", item.title);
    println!("type:     {}", item.type_name);
    println!("updated:  {}", item.updated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    for location in &item.locations {
        println!("url:      {location}");
    }
    if let Some(username) = content.username() {
        println!("username: {username}");
    }
    if let Some(password) = content.password() {
        let shown = if reveal { password } else { "********" };
        println!("password: {shown}");
    }
    if !content.notes.is_empty() {
        println!("notes:    {}", content.notes);
    }
    Ok(())
}

/// Build a login item from command-line fields.
pub fn login_item(login: NewLogin) -> Item {
    let mut item = Item::new(types::LOGIN, login.title);
    if let Some(content) = item.content_mut() {
        content.urls.push(ItemUrl {
            label: "website".to_string(),
            url: login.url,
        });
        if let Some(username) = login.username {
            content.form_fields.push(form_field("username", FormFieldType::Text, username));
        }
        if let Some(password) = login.password {
            content.form_fields.push(form_field("password", FormFieldType::Password, password));
        }
    }
    item
}

fn form_field(designation: &str, field_type: FormFieldType, value: String) -> WebFormField {
    WebFormField {
        id: String::new(),
        name: designation.to_string(),
        field_type,
        designation: designation.to_string(),
        value,
    }
}

pub async fn add(vault: &Vault, password: &SecretString, login: NewLogin) -> Result<()> {
    vault.unlock(password).await?;
    let mut item = login_item(login);
    vault.save_item(&mut item, ChangeSource::Local).await?;
    info!(uuid = %item.uuid, "login added");
    println!("{}", item.uuid);
    Ok(())
}

pub async fn trash(vault: &Vault, password: &SecretString, uuid: &str) -> Result<()> {
    vault.unlock(password).await?;
    let mut item = vault.load_item(uuid).await?;
    if item.trashed {
        return Err(KeychainError::State(format!("{uuid} is already in the trash")));
    }
    item.trashed = true;
    vault.save_item(&mut item, ChangeSource::Local).await?;
    println!("trashed {uuid}");
    Ok(())
}

pub async fn passwd(
    vault: &Vault,
    old_password: &SecretString,
    new_password: &SecretString,
    hint: Option<&str>,
    iterations: Option<u32>,
) -> Result<()> {
    vault.unlock(old_password).await?;
    let hint = match hint {
        Some(hint) => hint.to_string(),
        None => vault.password_hint().await?,
    };
    vault
        .change_password(old_password, new_password, &hint, iterations)
        .await?;
    println!("master password changed");
    Ok(())
}

pub async fn hint(vault: &Vault) -> Result<()> {
    println!("{}", vault.password_hint().await?);
    Ok(())
}
