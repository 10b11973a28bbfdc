// SPDX-FileCopyrightText: 2026 Agilekey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! On-disk Agile Keychain structures: key list, item files, and the
//! `contents.js` index.
//!
//! Layout under `<name>.agilekeychain/data/default/`:
//! - `encryptionKeys.js`: wrapped master keys, pretty-printed JSON
//! - `.password.hint`: plain-text hint
//! - `contents.js`: array of 8-element overview rows
//! - `<uuid>.1password`: one file per item, content encrypted

use std::collections::BTreeMap;

use agilekey_core::{KeychainError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::item::{Item, ItemContent, from_unix_seconds};

/// Security level used for all items written by this crate.
pub const DEFAULT_SECURITY_LEVEL: &str = "SL5";

/// Legacy security level present in some vaults but never used for items.
pub const LEGACY_SECURITY_LEVEL: &str = "SL3";

/// Suffix of a vault directory.
pub const VAULT_EXTENSION: &str = ".agilekeychain";

pub const KEYS_FILE: &str = "encryptionKeys.js";
pub const HINT_FILE: &str = ".password.hint";
pub const CONTENTS_FILE: &str = "contents.js";
pub const ITEM_EXTENSION: &str = ".1password";

/// Join two `/`-separated path fragments.
pub fn join_path(base: &str, rest: &str) -> String {
    let base = base.trim_end_matches('/');
    let rest = rest.trim_start_matches('/');
    if base.is_empty() {
        rest.to_string()
    } else {
        format!("{base}/{rest}")
    }
}

/// File paths within a single vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultPaths {
    root: String,
}

impl VaultPaths {
    pub fn new(root: impl Into<String>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn data_folder(&self) -> String {
        join_path(&self.root, "data/default")
    }

    pub fn keys_file(&self) -> String {
        join_path(&self.data_folder(), KEYS_FILE)
    }

    pub fn hint_file(&self) -> String {
        join_path(&self.data_folder(), HINT_FILE)
    }

    pub fn contents_file(&self) -> String {
        join_path(&self.data_folder(), CONTENTS_FILE)
    }

    pub fn item_file(&self, uuid: &str) -> String {
        join_path(&self.data_folder(), &format!("{uuid}{ITEM_EXTENSION}"))
    }
}

/// Encode bytes as standard padded base64.
pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode a base64 field, tolerating the trailing NUL characters found in
/// key files written by some 1Password versions.
pub fn decode_base64(field: &str, value: &str) -> Result<Vec<u8>> {
    let trimmed = value.trim_end_matches(|c: char| c == '\0' || c.is_whitespace());
    STANDARD
        .decode(trimmed)
        .map_err(|e| KeychainError::Format(format!("invalid base64 in `{field}`: {e}")))
}

/// One wrapped master key from `encryptionKeys.js`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionKeyEntry {
    /// Base64 of `Salted__ || salt || AES-128-CBC(wrapped key)`.
    pub data: String,
    pub identifier: String,
    pub iterations: u32,
    pub level: String,
    /// Base64 of a `Salted__` blob used to check the unwrapped key.
    pub validation: String,
}

/// Parsed `encryptionKeys.js`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EncryptionKeyList {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list: Option<Vec<EncryptionKeyEntry>>,
    /// Maps each security level to the identifier of its key.
    #[serde(flatten)]
    pub levels: BTreeMap<String, Value>,
}

impl EncryptionKeyList {
    /// Build a key list with a level entry for each key.
    pub fn from_entries(entries: Vec<EncryptionKeyEntry>) -> Self {
        let levels = entries
            .iter()
            .map(|e| (e.level.clone(), Value::String(e.identifier.clone())))
            .collect();
        Self {
            list: Some(entries),
            levels,
        }
    }

    pub fn parse(json: &str) -> Result<Self> {
        let keys: Self = serde_json::from_str(json)?;
        if keys.list.is_none() {
            return Err(KeychainError::Format(format!(
                "missing `list` entry in {KEYS_FILE}"
            )));
        }
        Ok(keys)
    }

    /// All entries, including legacy levels.
    pub fn entries(&self) -> &[EncryptionKeyEntry] {
        self.list.as_deref().unwrap_or(&[])
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Contents of a `<uuid>.1password` file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeychainItem {
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_level: Option<String>,
    /// Base64 of the encrypted content blob.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted: Option<String>,
    /// Unencrypted content, present in some exported or folder items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure_contents: Option<ItemContent>,
    #[serde(default)]
    pub type_name: String,
    pub uuid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fave_index: Option<i64>,
    #[serde(default)]
    pub trashed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_contents: Option<Value>,
}

impl KeychainItem {
    /// Build the on-disk form of `item` with already-encrypted content.
    pub fn from_item(item: &Item, encrypted: &[u8]) -> Self {
        Self {
            created_at: item.created_at.unwrap_or(item.updated_at).timestamp(),
            updated_at: item.updated_at.timestamp(),
            title: item.title.clone(),
            security_level: Some(DEFAULT_SECURITY_LEVEL.to_string()),
            encrypted: Some(encode_base64(encrypted)),
            secure_contents: None,
            type_name: item.type_name.clone(),
            uuid: item.uuid.clone(),
            location: Some(item.primary_location().to_string()),
            folder_uuid: item.folder_uuid.clone(),
            fave_index: item.fave_index,
            trashed: item.trashed,
            open_contents: item.open_contents.clone(),
        }
    }

    /// Rebuild an item. Content is attached only if stored unencrypted.
    pub fn into_item(self) -> Item {
        let mut item = Item::with_uuid(self.uuid);
        item.type_name = self.type_name;
        item.title = self.title;
        item.created_at = Some(from_unix_seconds(self.created_at));
        item.updated_at = from_unix_seconds(self.updated_at);
        if let Some(location) = self.location.filter(|l| !l.is_empty()) {
            item.locations.push(location);
        }
        item.folder_uuid = self.folder_uuid.filter(|f| !f.is_empty());
        item.fave_index = self.fave_index;
        item.trashed = self.trashed;
        item.open_contents = self.open_contents;
        if let Some(content) = self.secure_contents {
            item.set_content(content);
        }
        item
    }

    /// The level whose key encrypts this item.
    ///
    /// Older files keep the level in `openContents.securityLevel` instead of
    /// at the top level.
    pub fn security_level(&self) -> &str {
        self.security_level
            .as_deref()
            .or_else(|| {
                self.open_contents
                    .as_ref()
                    .and_then(|o| o.get("securityLevel"))
                    .and_then(Value::as_str)
            })
            .unwrap_or(DEFAULT_SECURITY_LEVEL)
    }

    /// The decoded encrypted blob.
    pub fn encrypted_bytes(&self) -> Result<Vec<u8>> {
        let encrypted = self.encrypted.as_deref().ok_or_else(|| {
            KeychainError::Format(format!("item {} has no encrypted content", self.uuid))
        })?;
        decode_base64("encrypted", encrypted)
    }
}

/// Overview fields written to one `contents.js` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub uuid: String,
    pub type_name: String,
    pub title: String,
    pub location: String,
    pub updated_at: i64,
    pub folder_uuid: Option<String>,
    pub trashed: bool,
}

impl IndexEntry {
    pub fn from_item(item: &Item) -> Self {
        Self {
            uuid: item.uuid.clone(),
            type_name: item.type_name.clone(),
            title: item.title.clone(),
            location: item.primary_location().to_string(),
            updated_at: item.updated_at.timestamp(),
            folder_uuid: item.folder_uuid.clone(),
            trashed: item.trashed,
        }
    }

    /// Rebuild a lightweight item. Creation time, favourites, open contents
    /// and secondary locations are not part of the index.
    pub fn into_item(self) -> Item {
        let mut item = Item::with_uuid(self.uuid);
        item.type_name = self.type_name;
        item.title = self.title;
        if !self.location.is_empty() {
            item.locations.push(self.location);
        }
        item.updated_at = from_unix_seconds(self.updated_at);
        item.folder_uuid = self.folder_uuid;
        item.trashed = self.trashed;
        item
    }

    fn from_row(row: &[Value]) -> Result<Self> {
        let text = |i: usize| {
            row.get(i)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let uuid = row
            .first()
            .and_then(Value::as_str)
            .ok_or_else(|| KeychainError::Format(format!("{CONTENTS_FILE} row without a uuid")))?;
        let updated_at = row
            .get(4)
            .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
            .unwrap_or_default();
        let folder = text(5);

        Ok(Self {
            uuid: uuid.to_string(),
            type_name: text(1),
            title: text(2),
            location: text(3),
            updated_at,
            folder_uuid: (!folder.is_empty()).then_some(folder),
            trashed: row.get(7).and_then(Value::as_str) == Some("Y"),
        })
    }
}

/// Width of a `contents.js` row.
const ROW_LEN: usize = 8;
/// Column of unknown meaning. Existing values are left untouched.
const RESERVED_COLUMN: usize = 6;

/// Parsed `contents.js`, kept as raw rows so unknown columns survive a rewrite.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentsIndex {
    rows: Vec<Vec<Value>>,
}

impl ContentsIndex {
    pub fn parse(json: &str) -> Result<Self> {
        let rows: Vec<Vec<Value>> = serde_json::from_str(json)?;
        Ok(Self { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn entries(&self) -> Result<Vec<IndexEntry>> {
        self.rows.iter().map(|row| IndexEntry::from_row(row)).collect()
    }

    /// Overwrite the row for `entry.uuid`, appending one if absent.
    pub fn upsert(&mut self, entry: &IndexEntry) {
        let position = self
            .rows
            .iter()
            .position(|row| row.first().and_then(Value::as_str) == Some(entry.uuid.as_str()));
        let row = match position {
            Some(i) => &mut self.rows[i],
            None => {
                self.rows.push(vec![Value::Null; ROW_LEN]);
                let last = self.rows.len() - 1;
                &mut self.rows[last]
            }
        };
        if row.len() < ROW_LEN {
            row.resize(ROW_LEN, Value::Null);
        }

        row[0] = Value::from(entry.uuid.clone());
        row[1] = Value::from(entry.type_name.clone());
        row[2] = Value::from(entry.title.clone());
        row[3] = Value::from(entry.location.clone());
        row[4] = Value::from(entry.updated_at);
        row[5] = entry
            .folder_uuid
            .clone()
            .map(Value::from)
            .unwrap_or(Value::Null);
        if row[RESERVED_COLUMN].is_null() {
            row[RESERVED_COLUMN] = Value::from(0);
        }
        row[7] = Value::from(if entry.trashed { "Y" } else { "N" });
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.rows)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::types;

    fn sample_entry(uuid: &str, title: &str) -> IndexEntry {
        IndexEntry {
            uuid: uuid.into(),
            type_name: types::LOGIN.into(),
            title: title.into(),
            location: "https://example.com".into(),
            updated_at: 1_400_000_000,
            folder_uuid: None,
            trashed: false,
        }
    }

    #[test]
    fn vault_paths_follow_keychain_layout() {
        let paths = VaultPaths::new("vaults/test.agilekeychain");
        assert_eq!(
            paths.keys_file(),
            "vaults/test.agilekeychain/data/default/encryptionKeys.js"
        );
        assert_eq!(
            paths.item_file("ABC"),
            "vaults/test.agilekeychain/data/default/ABC.1password"
        );
        assert_eq!(join_path("", "data"), "data");
        assert_eq!(join_path("a/", "/b"), "a/b");
    }

    #[test]
    fn decode_base64_tolerates_trailing_nul() {
        assert_eq!(decode_base64("data", "aGVsbG8=\0").unwrap(), b"hello");
        assert_eq!(decode_base64("data", "aGVsbG8=\n").unwrap(), b"hello");
        assert!(matches!(
            decode_base64("data", "not base64!"),
            Err(KeychainError::Format(_))
        ));
    }

    #[test]
    fn key_list_parses_levels_and_entries() {
        let json = r#"{
            "list": [
                {"data": "AAAA", "identifier": "ID5", "iterations": 1000, "level": "SL5", "validation": "BBBB"},
                {"data": "CCCC", "identifier": "ID3", "iterations": 1000, "level": "SL3", "validation": "DDDD"}
            ],
            "SL5": "ID5",
            "SL3": "ID3"
        }"#;
        let keys = EncryptionKeyList::parse(json).unwrap();
        assert_eq!(keys.entries().len(), 2);
        assert_eq!(keys.levels["SL5"], "ID5");
        assert_eq!(keys.levels["SL3"], "ID3");
    }

    #[test]
    fn key_list_without_list_is_rejected() {
        let result = EncryptionKeyList::parse(r#"{"SL5": "ID5"}"#);
        assert!(matches!(result, Err(KeychainError::Format(_))));
    }

    #[test]
    fn key_list_serializes_list_then_levels() {
        let keys = EncryptionKeyList::from_entries(vec![EncryptionKeyEntry {
            data: "AAAA".into(),
            identifier: "ID5".into(),
            iterations: 80000,
            level: "SL5".into(),
            validation: "BBBB".into(),
        }]);
        let json = keys.to_json().unwrap();
        assert!(json.starts_with("{\n  \"list\": ["));
        assert!(json.contains("\"SL5\": \"ID5\""));
        assert_eq!(EncryptionKeyList::parse(&json).unwrap(), keys);
    }

    #[test]
    fn keychain_item_uses_camel_case_fields() {
        let mut item = Item::new(types::LOGIN, "Example");
        item.locations.push("https://example.com".into());
        item.folder_uuid = Some("FOLDER".into());

        let json: Value =
            serde_json::to_value(KeychainItem::from_item(&item, b"Salted__12345678")).unwrap();
        assert_eq!(json["typeName"], types::LOGIN);
        assert_eq!(json["securityLevel"], "SL5");
        assert_eq!(json["location"], "https://example.com");
        assert_eq!(json["folderUuid"], "FOLDER");
        assert_eq!(json["encrypted"], "U2FsdGVkX18xMjM0NTY3OA==");
        assert_eq!(json["updatedAt"], item.updated_at.timestamp());
        assert!(json.get("faveIndex").is_none());
    }

    #[test]
    fn keychain_item_security_level_falls_back_to_open_contents() {
        let parsed: KeychainItem = serde_json::from_str(
            r#"{"uuid":"U1","title":"t","typeName":"x","openContents":{"securityLevel":"SL3"}}"#,
        )
        .unwrap();
        assert_eq!(parsed.security_level(), "SL3");

        let parsed: KeychainItem = serde_json::from_str(r#"{"uuid":"U1"}"#).unwrap();
        assert_eq!(parsed.security_level(), "SL5");
        assert!(matches!(parsed.encrypted_bytes(), Err(KeychainError::Format(_))));
    }

    #[test]
    fn keychain_item_into_item_attaches_plain_contents() {
        let parsed: KeychainItem = serde_json::from_str(
            r#"{"uuid":"U1","title":"Folder","typeName":"system.folder.Regular",
                "createdAt":1400000000,"updatedAt":1400000100,"location":"",
                "secureContents":{"notesPlain":"hi"}}"#,
        )
        .unwrap();
        let item = parsed.into_item();
        assert_eq!(item.uuid, "U1");
        assert!(item.locations.is_empty());
        assert_eq!(item.updated_at.timestamp(), 1_400_000_100);
        assert_eq!(item.content().map(|c| c.notes.as_str()), Some("hi"));
    }

    #[test]
    fn upsert_appends_new_rows_with_reserved_placeholder() {
        let mut index = ContentsIndex::parse("[]").unwrap();
        index.upsert(&sample_entry("U1", "First"));
        let json = index.to_json().unwrap();
        assert_eq!(
            json,
            r#"[["U1","webforms.WebForm","First","https://example.com",1400000000,null,0,"N"]]"#
        );
    }

    #[test]
    fn upsert_replaces_existing_row_and_keeps_reserved_value() {
        let mut index = ContentsIndex::parse(
            r#"[["U1","webforms.WebForm","Old","",1,null,"keep-me","N"],["U2","x","Other","",2,null,0,"N"]]"#,
        )
        .unwrap();
        let mut entry = sample_entry("U1", "New");
        entry.trashed = true;
        index.upsert(&entry);

        assert_eq!(index.len(), 2);
        let entries = index.entries().unwrap();
        assert_eq!(entries[0].title, "New");
        assert!(entries[0].trashed);
        assert_eq!(entries[1].title, "Other");
        assert!(index.to_json().unwrap().contains("\"keep-me\""));
    }

    #[test]
    fn index_rows_without_uuid_are_format_errors() {
        let index = ContentsIndex::parse(r#"[[null,"x"]]"#).unwrap();
        assert!(matches!(index.entries(), Err(KeychainError::Format(_))));
        assert!(matches!(
            ContentsIndex::parse("{}"),
            Err(KeychainError::Format(_))
        ));
    }

    #[test]
    fn index_entry_into_item_is_lightweight() {
        let mut entry = sample_entry("U1", "First");
        entry.folder_uuid = Some("F".into());
        let item = entry.into_item();
        assert_eq!(item.created_at, None);
        assert_eq!(item.fave_index, None);
        assert_eq!(item.primary_location(), "https://example.com");
        assert_eq!(item.folder_uuid.as_deref(), Some("F"));
        assert!(item.content().is_none());
    }
}
