//! Content schema and entry types, as stored and as accepted from clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Publication status shared by content types and entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
    #[default]
    Draft,
    Published,
}

/// Value type of a custom field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Number,
    Boolean,
    Date,
    Select,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Select => "select",
        }
    }
}

/// A tenant-defined content type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentType {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub status: ContentStatus,
    pub icon: Option<String>,
    /// Attached custom field ids, in display order.
    pub fields: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A tenant-defined field that can be attached to content types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomField {
    pub id: String,
    pub label: String,
    pub key: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Allowed values. Present only for select fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    pub required: bool,
    pub help_text: Option<String>,
    /// Ids of content types this field is attached to.
    pub attached_to: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One piece of content belonging to a content type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentEntry {
    pub id: String,
    pub content_type_id: String,
    pub slug: String,
    pub status: ContentStatus,
    /// Coerced values keyed by custom field key.
    pub fields: BTreeMap<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything a tenant has defined, read and written as one unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentSnapshot {
    /// Version the snapshot was read at; stores reject writes whose version moved.
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub content_types: Vec<ContentType>,
    #[serde(default)]
    pub custom_fields: Vec<CustomField>,
    /// Entry buckets keyed by content type id.
    #[serde(default)]
    pub entries: BTreeMap<String, Vec<ContentEntry>>,
}

impl ContentSnapshot {
    pub fn content_type(&self, id: &str) -> Option<&ContentType> {
        self.content_types.iter().find(|t| t.id == id)
    }

    pub fn custom_field(&self, id: &str) -> Option<&CustomField> {
        self.custom_fields.iter().find(|f| f.id == id)
    }

    pub fn entries_for(&self, content_type_id: &str) -> &[ContentEntry] {
        self.entries
            .get(content_type_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Full payload for creating or updating a content type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentTypeInput {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<ContentStatus>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub fields: Vec<String>,
}

/// Full payload for creating or updating a custom field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomFieldInput {
    pub label: String,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub help_text: Option<String>,
    #[serde(default)]
    pub attached_to: Vec<String>,
}

impl CustomFieldInput {
    pub fn new(label: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            label: label.into(),
            key: None,
            field_type,
            options: None,
            required: false,
            help_text: None,
            attached_to: Vec::new(),
        }
    }
}

/// Full payload for creating or updating a content entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentEntryInput {
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub status: Option<ContentStatus>,
    /// Raw values keyed by custom field key.
    #[serde(default)]
    pub fields: Map<String, Value>,
}
