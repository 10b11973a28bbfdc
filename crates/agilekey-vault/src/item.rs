// SPDX-FileCopyrightText: 2026 Agilekey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Item and item content model.
//!
//! An [`Item`] carries the overview fields that are readable without the
//! master key. Its [`ItemContent`] (form fields, sections, notes) is stored
//! encrypted and only attached once it has been decrypted.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::crypto;

/// Well-known item type names.
pub mod types {
    pub const LOGIN: &str = "webforms.WebForm";
    pub const SECURE_NOTE: &str = "securenotes.SecureNote";
    pub const CREDIT_CARD: &str = "wallet.financial.CreditCard";
    pub const PASSWORD: &str = "passwords.Password";
    pub const FOLDER: &str = "system.folder.Regular";
    pub const TOMBSTONE: &str = "system.Tombstone";
}

/// A password-manager entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub uuid: String,
    pub type_name: String,
    pub title: String,
    /// Not populated for items returned by `Vault::list_items`.
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub folder_uuid: Option<String>,
    pub fave_index: Option<i64>,
    pub trashed: bool,
    /// Associated URLs. The first one is the primary location.
    pub locations: Vec<String>,
    pub open_contents: Option<Value>,
    content: Option<ItemContent>,
}

impl Item {
    /// Create a new item with a fresh uuid and empty content.
    pub fn new(type_name: impl Into<String>, title: impl Into<String>) -> Self {
        let now = now_seconds();
        Self {
            uuid: crypto::new_uuid(),
            type_name: type_name.into(),
            title: title.into(),
            created_at: Some(now),
            updated_at: now,
            folder_uuid: None,
            fave_index: None,
            trashed: false,
            locations: Vec::new(),
            open_contents: None,
            content: Some(ItemContent::default()),
        }
    }

    /// An item with only a uuid set, used when rebuilding items from storage.
    pub(crate) fn with_uuid(uuid: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            type_name: String::new(),
            title: String::new(),
            created_at: None,
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
            folder_uuid: None,
            fave_index: None,
            trashed: false,
            locations: Vec::new(),
            open_contents: None,
            content: None,
        }
    }

    /// The first location, or an empty string.
    pub fn primary_location(&self) -> &str {
        self.locations.first().map(String::as_str).unwrap_or("")
    }

    /// True for deletion markers kept so that sync can converge.
    pub fn is_tombstone(&self) -> bool {
        self.type_name == types::TOMBSTONE
            || (self.trashed && self.title.is_empty() && self.locations.is_empty())
    }

    /// Strip the item down to a deletion marker.
    pub fn make_tombstone(&mut self) {
        self.type_name = types::TOMBSTONE.to_string();
        self.title.clear();
        self.trashed = true;
        self.locations.clear();
        self.folder_uuid = None;
        self.fave_index = None;
        self.open_contents = None;
        self.content = Some(ItemContent::default());
    }

    /// Set `updated_at` to now, and `created_at` too if it was never set.
    pub fn update_timestamps(&mut self) {
        let now = now_seconds();
        self.created_at.get_or_insert(now);
        self.updated_at = now;
    }

    /// Refresh overview fields derived from the decrypted content.
    pub fn update_overview_from_content(&mut self, content: &ItemContent) {
        self.locations = content.urls.iter().map(|u| u.url.clone()).collect();
    }

    /// Decrypted content, if it has been attached.
    pub fn content(&self) -> Option<&ItemContent> {
        self.content.as_ref()
    }

    /// Mutable access to the attached content.
    pub fn content_mut(&mut self) -> Option<&mut ItemContent> {
        self.content.as_mut()
    }

    pub fn set_content(&mut self, content: ItemContent) {
        self.content = Some(content);
    }

    /// Detach the decrypted content, e.g. before handing the item to a
    /// component that should only see the overview.
    pub fn clear_content(&mut self) {
        self.content = None;
    }
}

/// Current time truncated to whole seconds, the precision stored on disk.
pub fn now_seconds() -> DateTime<Utc> {
    from_unix_seconds(Utc::now().timestamp())
}

/// Convert unix seconds to a UTC timestamp. Out-of-range values map to the epoch.
pub fn from_unix_seconds(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// The encrypted part of an item.
///
/// Serialized field names follow the `.1password` content schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemContent {
    #[serde(default)]
    pub sections: Vec<ItemSection>,
    #[serde(rename = "URLs", default)]
    pub urls: Vec<ItemUrl>,
    #[serde(rename = "notesPlain", default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
    #[serde(rename = "fields", default)]
    pub form_fields: Vec<WebFormField>,
    #[serde(rename = "htmlAction", default, skip_serializing_if = "Option::is_none")]
    pub html_action: Option<String>,
    #[serde(rename = "htmlMethod", default, skip_serializing_if = "Option::is_none")]
    pub html_method: Option<String>,
    #[serde(rename = "htmlID", default, skip_serializing_if = "Option::is_none")]
    pub html_id: Option<String>,
}

impl ItemContent {
    /// Value of the first form field designated as the username.
    pub fn username(&self) -> Option<&str> {
        self.designated_value("username")
    }

    /// Value of the first form field designated as the password.
    pub fn password(&self) -> Option<&str> {
        self.designated_value("password")
    }

    fn designated_value(&self, designation: &str) -> Option<&str> {
        self.form_fields
            .iter()
            .find(|f| f.designation == designation)
            .map(|f| f.value.as_str())
    }
}

/// A named group of fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemSection {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub fields: Vec<ItemField>,
}

/// A typed field within a section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemField {
    #[serde(rename = "k")]
    pub kind: FieldKind,
    #[serde(rename = "n", default)]
    pub name: String,
    #[serde(rename = "t", default)]
    pub title: String,
    /// Strings for most kinds; objects for addresses, numbers for dates.
    #[serde(rename = "v", default)]
    pub value: Value,
}

/// Kind of a section field.
///
/// Kinds this crate does not model read as `Text` and are written back as
/// `"string"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    #[serde(rename = "concealed")]
    Password,
    #[serde(rename = "address")]
    Address,
    #[serde(rename = "date")]
    Date,
    #[serde(rename = "monthYear")]
    MonthYear,
    #[serde(rename = "URL")]
    Url,
    #[serde(rename = "cctype")]
    CreditCardType,
    #[serde(rename = "phone")]
    PhoneNumber,
    #[serde(rename = "gender")]
    Gender,
    #[serde(rename = "email")]
    Email,
    #[serde(rename = "menu")]
    Menu,
    #[serde(rename = "string", other)]
    Text,
}

/// A URL associated with an item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemUrl {
    #[serde(default)]
    pub label: String,
    pub url: String,
}

/// A saved field from a web login form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebFormField {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FormFieldType,
    /// `username`, `password`, or empty.
    #[serde(default)]
    pub designation: String,
    #[serde(default)]
    pub value: String,
}

/// HTML input type, stored as a single-character code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormFieldType {
    #[serde(rename = "T")]
    Text,
    #[serde(rename = "P")]
    Password,
    #[serde(rename = "E")]
    Email,
    #[serde(rename = "C")]
    Checkbox,
    #[serde(rename = "I", other)]
    Input,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn login_content() -> ItemContent {
        ItemContent {
            urls: vec![
                ItemUrl {
                    label: "website".into(),
                    url: "https://example.com/login".into(),
                },
                ItemUrl {
                    label: "alt".into(),
                    url: "https://m.example.com".into(),
                },
            ],
            form_fields: vec![
                WebFormField {
                    id: "email".into(),
                    name: "email".into(),
                    field_type: FormFieldType::Email,
                    designation: "username".into(),
                    value: "alice@example.com".into(),
                },
                WebFormField {
                    id: "pass".into(),
                    name: "pass".into(),
                    field_type: FormFieldType::Password,
                    designation: "password".into(),
                    value: "hunter2".into(),
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn new_item_has_uuid_and_content() {
        let item = Item::new(types::LOGIN, "Example");
        assert_eq!(item.uuid.len(), 32);
        assert!(item.content().is_some());
        assert_eq!(item.created_at, Some(item.updated_at));
        assert!(!item.is_tombstone());
    }

    #[test]
    fn primary_location_is_first_or_empty() {
        let mut item = Item::new(types::LOGIN, "Example");
        assert_eq!(item.primary_location(), "");
        item.update_overview_from_content(&login_content());
        assert_eq!(item.primary_location(), "https://example.com/login");
        assert_eq!(item.locations.len(), 2);
    }

    #[test]
    fn make_tombstone_strips_fields() {
        let mut item = Item::new(types::LOGIN, "Example");
        item.locations.push("https://example.com".into());
        item.folder_uuid = Some("F1".into());
        item.make_tombstone();

        assert!(item.is_tombstone());
        assert!(item.trashed);
        assert!(item.title.is_empty());
        assert!(item.locations.is_empty());
        assert_eq!(item.folder_uuid, None);
    }

    #[test]
    fn trashed_item_with_title_is_not_a_tombstone() {
        let mut item = Item::new(types::LOGIN, "Still here");
        item.trashed = true;
        assert!(!item.is_tombstone());

        item.title.clear();
        assert!(item.is_tombstone());
    }

    #[test]
    fn update_timestamps_keeps_created_at() {
        let mut item = Item::new(types::LOGIN, "Example");
        let created = from_unix_seconds(1_400_000_000);
        item.created_at = Some(created);
        item.update_timestamps();
        assert_eq!(item.created_at, Some(created));
        assert!(item.updated_at > created);
        assert_eq!(item.updated_at.timestamp_subsec_nanos(), 0);
    }

    #[test]
    fn username_and_password_follow_designation() {
        let content = login_content();
        assert_eq!(content.username(), Some("alice@example.com"));
        assert_eq!(content.password(), Some("hunter2"));
        assert_eq!(ItemContent::default().password(), None);
    }

    #[test]
    fn content_uses_keychain_field_names() {
        let mut content = login_content();
        content.notes = "remember me".into();
        content.html_id = Some("login-form".into());
        content.sections.push(ItemSection {
            name: "details".into(),
            title: "Details".into(),
            fields: vec![ItemField {
                kind: FieldKind::Password,
                name: "pin".into(),
                title: "PIN".into(),
                value: Value::String("1234".into()),
            }],
        });

        let json: Value = serde_json::to_value(&content).unwrap();
        assert_eq!(json["URLs"][0]["url"], "https://example.com/login");
        assert_eq!(json["notesPlain"], "remember me");
        assert_eq!(json["fields"][1]["type"], "P");
        assert_eq!(json["fields"][1]["designation"], "password");
        assert_eq!(json["htmlID"], "login-form");
        assert_eq!(json["sections"][0]["fields"][0]["k"], "concealed");
        assert!(json.get("htmlAction").is_none());

        let parsed: ItemContent = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, content);
    }

    #[test]
    fn unknown_codes_fall_back_to_generic_kinds() {
        let field: WebFormField =
            serde_json::from_str(r#"{"id":"x","name":"x","type":"R","value":"1"}"#).unwrap();
        assert_eq!(field.field_type, FormFieldType::Input);

        let field: ItemField =
            serde_json::from_str(r#"{"k":"reference","n":"r","v":"x"}"#).unwrap();
        assert_eq!(field.kind, FieldKind::Text);
        let json = serde_json::to_value(&field).unwrap();
        assert_eq!(json["k"], "string");
        assert_eq!(json["v"], "x");

        let field: ItemField = serde_json::from_str(r#"{"k":"menu","v":"a"}"#).unwrap();
        assert_eq!(field.kind, FieldKind::Menu);
    }
}
