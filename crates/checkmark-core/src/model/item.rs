use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::backend::{Document, Fields};
use crate::error::SyncError;

/// Wire names of the stored item fields.
pub mod field {
    pub const TITLE: &str = "title";
    pub const DESCRIPTION: &str = "description";
    pub const IS_CHECKED: &str = "isChecked";
    pub const CREATED_AT: &str = "createdAt";
    pub const UPDATED_AT: &str = "updatedAt";
}

/// Store-assigned identifier of an item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// A to-do record as cached from the remote collection.
///
/// The store is the system of record; values of this type are read-only
/// copies taken from the latest snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Item {
    pub id: ItemId,
    pub title: String,
    pub description: String,
    pub is_checked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stored document schema. Missing `description`/`isChecked` decode to their
/// defaults and a missing `updatedAt` falls back to `createdAt`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemDocument {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    is_checked: bool,
    created_at: DateTime<Utc>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

impl Item {
    /// Decode a snapshot document.
    pub fn from_document(doc: &Document) -> Result<Self, SyncError> {
        let raw: ItemDocument = serde_json::from_value(Value::Object(doc.fields.clone()))
            .map_err(|err| SyncError::Decode {
                id: doc.id.clone(),
                reason: err.to_string(),
            })?;

        Ok(Self {
            id: ItemId::new(doc.id.clone()),
            title: raw.title,
            description: raw.description,
            is_checked: raw.is_checked,
            created_at: raw.created_at,
            updated_at: raw.updated_at.unwrap_or(raw.created_at),
        })
    }

    /// Fields written when a new item is created.
    ///
    /// `updatedAt` starts equal to `createdAt` so the item takes part in the
    /// `updatedAt` ordering from its first snapshot.
    #[must_use]
    pub fn creation_fields(title: &str, description: &str, now: DateTime<Utc>) -> Fields {
        let mut fields = Fields::new();
        fields.insert(field::TITLE.into(), Value::String(title.to_string()));
        fields.insert(
            field::DESCRIPTION.into(),
            Value::String(description.to_string()),
        );
        fields.insert(field::IS_CHECKED.into(), Value::Bool(false));
        fields.insert(field::CREATED_AT.into(), timestamp(now));
        fields.insert(field::UPDATED_AT.into(), timestamp(now));
        fields
    }
}

/// A single-field edit of an existing item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemChange {
    Checked(bool),
    Title(String),
    Description(String),
}

impl ItemChange {
    /// Short name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Checked(_) => field::IS_CHECKED,
            Self::Title(_) => field::TITLE,
            Self::Description(_) => field::DESCRIPTION,
        }
    }

    /// Partial field map for the update, including the `updatedAt` bump.
    #[must_use]
    pub fn into_fields(self, now: DateTime<Utc>) -> Fields {
        let mut fields = Fields::new();
        let (key, value) = match self {
            Self::Checked(checked) => (field::IS_CHECKED, Value::Bool(checked)),
            Self::Title(title) => (field::TITLE, Value::String(title)),
            Self::Description(text) => (field::DESCRIPTION, Value::String(text)),
        };
        fields.insert(key.into(), value);
        fields.insert(field::UPDATED_AT.into(), timestamp(now));
        fields
    }
}

/// Fixed-width RFC 3339 so that stored timestamps also sort as strings.
fn timestamp(at: DateTime<Utc>) -> Value {
    Value::String(at.to_rfc3339_opts(SecondsFormat::Micros, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).single().unwrap()
    }

    fn doc(id: &str, fields: Fields) -> Document {
        Document {
            id: id.to_string(),
            fields,
        }
    }

    #[test]
    fn creation_fields_decode_back_into_an_unchecked_item() {
        let fields = Item::creation_fields("Buy milk", "", at(0));
        let item = Item::from_document(&doc("a1", fields)).unwrap();

        assert_eq!(item.id.as_str(), "a1");
        assert_eq!(item.title, "Buy milk");
        assert_eq!(item.description, "");
        assert!(!item.is_checked);
        assert_eq!(item.created_at, at(0));
        assert_eq!(item.updated_at, item.created_at);
    }

    #[test]
    fn missing_optional_fields_take_defaults() {
        let mut fields = Fields::new();
        fields.insert(field::TITLE.into(), Value::String("Walk dog".into()));
        fields.insert(field::CREATED_AT.into(), timestamp(at(5)));

        let item = Item::from_document(&doc("b2", fields)).unwrap();
        assert_eq!(item.description, "");
        assert!(!item.is_checked);
        assert_eq!(item.updated_at, at(5));
    }

    #[test]
    fn missing_title_is_a_decode_error() {
        let mut fields = Fields::new();
        fields.insert(field::CREATED_AT.into(), timestamp(at(5)));

        let err = Item::from_document(&doc("c3", fields)).unwrap_err();
        assert!(matches!(err, SyncError::Decode { ref id, .. } if id == "c3"));
    }

    #[test]
    fn change_fields_always_bump_updated_at() {
        let fields = ItemChange::Checked(true).into_fields(at(9));
        assert_eq!(fields.get(field::IS_CHECKED), Some(&Value::Bool(true)));
        assert_eq!(fields.get(field::UPDATED_AT), Some(&timestamp(at(9))));
        assert_eq!(fields.len(), 2);

        let fields = ItemChange::Title("Renamed".into()).into_fields(at(10));
        assert_eq!(fields.get(field::TITLE), Some(&Value::String("Renamed".into())));
        assert!(fields.contains_key(field::UPDATED_AT));
    }

    #[test]
    fn timestamps_sort_lexicographically() {
        let early = timestamp(at(1));
        let late = timestamp(at(1) + chrono::Duration::microseconds(500));
        assert!(early.as_str().unwrap() < late.as_str().unwrap());
    }
}
