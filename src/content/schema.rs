//! Schema operations applied to a snapshot in memory.
//!
//! Every operation validates before it mutates, so a failed operation leaves
//! the snapshot untouched. Content type `fields` and custom field
//! `attached_to` are kept as mirror images of each other.

use super::coercion::coerce_entry_fields;
use super::error::{ContentError, Result};
use super::slug::{is_kebab_case, slugify};
use super::types::{
    ContentEntry, ContentEntryInput, ContentSnapshot, ContentStatus, ContentType,
    ContentTypeInput, CustomField, CustomFieldInput, FieldType,
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;

const CONTENT_TYPE: &str = "Content type";
const CUSTOM_FIELD: &str = "Custom field";
const ENTRY: &str = "Entry";

/// Trim, drop blanks and dedupe, keeping first occurrences in order.
fn normalize_list(values: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && seen.insert(v.clone()))
        .collect()
}

fn required_text(value: &str, label: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ContentError::validation(format!("{} is required.", label)));
    }
    Ok(value.to_string())
}

fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// An explicit identifier is validated as-is; a missing one is derived from
/// `source`.
fn resolve_identifier(explicit: Option<&str>, source: &str, label: &str) -> Result<String> {
    match explicit.map(str::trim).filter(|v| !v.is_empty()) {
        Some(value) => {
            if !is_kebab_case(value) {
                return Err(ContentError::validation(format!(
                    "{} '{}' must be lowercase kebab-case.",
                    label, value
                )));
            }
            Ok(value.to_string())
        }
        None => {
            let derived = slugify(source);
            if derived.is_empty() {
                return Err(ContentError::validation(format!("{} is required.", label)));
            }
            Ok(derived)
        }
    }
}

fn new_id(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().simple())
}

impl ContentSnapshot {
    fn content_type_index(&self, id: &str) -> Result<usize> {
        self.content_types
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| ContentError::not_found(CONTENT_TYPE, id))
    }

    fn custom_field_index(&self, id: &str) -> Result<usize> {
        self.custom_fields
            .iter()
            .position(|f| f.id == id)
            .ok_or_else(|| ContentError::not_found(CUSTOM_FIELD, id))
    }

    // -- content types --------------------------------------------------

    fn validate_content_type(
        &self,
        input: &ContentTypeInput,
        existing_id: Option<&str>,
    ) -> Result<(String, String, Vec<String>)> {
        let name = required_text(&input.name, "Name")?;
        let slug = resolve_identifier(input.slug.as_deref(), &name, "Slug")?;
        if self
            .content_types
            .iter()
            .any(|t| t.slug == slug && Some(t.id.as_str()) != existing_id)
        {
            return Err(ContentError::validation(format!(
                "A content type with slug '{}' already exists.",
                slug
            )));
        }

        let fields = normalize_list(&input.fields);
        if let Some(unknown) = fields.iter().find(|id| self.custom_field(id).is_none()) {
            return Err(ContentError::validation(format!(
                "Unknown custom field: {}",
                unknown
            )));
        }
        Ok((name, slug, fields))
    }

    /// Add `type_id` to each listed field's `attached_to`.
    fn attach_type(&mut self, type_id: &str, field_ids: &[String], now: DateTime<Utc>) {
        for field in self
            .custom_fields
            .iter_mut()
            .filter(|f| field_ids.contains(&f.id))
        {
            if !field.attached_to.iter().any(|id| id == type_id) {
                field.attached_to.push(type_id.to_string());
                field.updated_at = now;
            }
        }
    }

    /// Remove `type_id` from each listed field's `attached_to`.
    fn detach_type(&mut self, type_id: &str, field_ids: &[String], now: DateTime<Utc>) {
        for field in self
            .custom_fields
            .iter_mut()
            .filter(|f| field_ids.contains(&f.id))
        {
            let before = field.attached_to.len();
            field.attached_to.retain(|id| id != type_id);
            if field.attached_to.len() != before {
                field.updated_at = now;
            }
        }
    }

    pub fn create_content_type(
        &mut self,
        input: ContentTypeInput,
        now: DateTime<Utc>,
    ) -> Result<ContentType> {
        let (name, slug, fields) = self.validate_content_type(&input, None)?;

        let content_type = ContentType {
            id: new_id("ct"),
            name,
            slug,
            description: optional_text(input.description.as_deref()),
            status: input.status.unwrap_or_default(),
            icon: optional_text(input.icon.as_deref()),
            fields,
            created_at: now,
            updated_at: now,
        };

        self.attach_type(&content_type.id, &content_type.fields, now);
        self.content_types.push(content_type.clone());
        Ok(content_type)
    }

    pub fn update_content_type(
        &mut self,
        id: &str,
        input: ContentTypeInput,
        now: DateTime<Utc>,
    ) -> Result<ContentType> {
        let index = self.content_type_index(id)?;
        let (name, slug, fields) = self.validate_content_type(&input, Some(id))?;

        let previous = &self.content_types[index].fields;
        let added: Vec<String> = fields
            .iter()
            .filter(|f| !previous.contains(f))
            .cloned()
            .collect();
        let removed: Vec<String> = previous
            .iter()
            .filter(|f| !fields.contains(f))
            .cloned()
            .collect();

        let content_type = &mut self.content_types[index];
        content_type.name = name;
        content_type.slug = slug;
        content_type.description = optional_text(input.description.as_deref());
        content_type.icon = optional_text(input.icon.as_deref());
        if let Some(status) = input.status {
            content_type.status = status;
        }
        content_type.fields = fields;
        content_type.updated_at = now;
        let updated = content_type.clone();

        self.attach_type(id, &added, now);
        self.detach_type(id, &removed, now);
        Ok(updated)
    }

    /// Delete a content type, its entries, and every field's reference to it.
    pub fn delete_content_type(&mut self, id: &str, now: DateTime<Utc>) -> Result<ContentType> {
        let index = self.content_type_index(id)?;
        let removed = self.content_types.remove(index);
        self.entries.remove(id);
        for field in &mut self.custom_fields {
            let before = field.attached_to.len();
            field.attached_to.retain(|type_id| type_id != id);
            if field.attached_to.len() != before {
                field.updated_at = now;
            }
        }
        Ok(removed)
    }

    // -- custom fields --------------------------------------------------

    fn validate_custom_field(
        &self,
        input: &CustomFieldInput,
        existing_id: Option<&str>,
    ) -> Result<(String, String, Option<Vec<String>>, Vec<String>)> {
        let label = required_text(&input.label, "Label")?;
        let key = resolve_identifier(input.key.as_deref(), &label, "Key")?;
        if self
            .custom_fields
            .iter()
            .any(|f| f.key == key && Some(f.id.as_str()) != existing_id)
        {
            return Err(ContentError::validation(format!(
                "A custom field with key '{}' already exists.",
                key
            )));
        }

        let options = match input.field_type {
            FieldType::Select => {
                let options = normalize_list(input.options.as_deref().unwrap_or_default());
                if options.is_empty() {
                    return Err(ContentError::validation(
                        "Select fields require at least one option.",
                    ));
                }
                Some(options)
            }
            _ => None,
        };

        let attached_to = normalize_list(&input.attached_to);
        if let Some(unknown) = attached_to
            .iter()
            .find(|id| self.content_type(id).is_none())
        {
            return Err(ContentError::validation(format!(
                "Unknown content type: {}",
                unknown
            )));
        }
        Ok((label, key, options, attached_to))
    }

    /// Add `field_id` to each listed content type's `fields`.
    fn attach_field(&mut self, field_id: &str, type_ids: &[String], now: DateTime<Utc>) {
        for content_type in self
            .content_types
            .iter_mut()
            .filter(|t| type_ids.contains(&t.id))
        {
            if !content_type.fields.iter().any(|id| id == field_id) {
                content_type.fields.push(field_id.to_string());
                content_type.updated_at = now;
            }
        }
    }

    /// Remove `field_id` from each listed content type's `fields`.
    fn detach_field(&mut self, field_id: &str, type_ids: &[String], now: DateTime<Utc>) {
        for content_type in self
            .content_types
            .iter_mut()
            .filter(|t| type_ids.contains(&t.id))
        {
            let before = content_type.fields.len();
            content_type.fields.retain(|id| id != field_id);
            if content_type.fields.len() != before {
                content_type.updated_at = now;
            }
        }
    }

    pub fn create_custom_field(
        &mut self,
        input: CustomFieldInput,
        now: DateTime<Utc>,
    ) -> Result<CustomField> {
        let (label, key, options, attached_to) = self.validate_custom_field(&input, None)?;

        let field = CustomField {
            id: new_id("cf"),
            label,
            key,
            field_type: input.field_type,
            options,
            required: input.required,
            help_text: optional_text(input.help_text.as_deref()),
            attached_to,
            created_at: now,
            updated_at: now,
        };

        self.attach_field(&field.id, &field.attached_to, now);
        self.custom_fields.push(field.clone());
        Ok(field)
    }

    /// Update a custom field. A key change is carried over to stored entry values.
    pub fn update_custom_field(
        &mut self,
        id: &str,
        input: CustomFieldInput,
        now: DateTime<Utc>,
    ) -> Result<CustomField> {
        let index = self.custom_field_index(id)?;
        let (label, key, options, attached_to) = self.validate_custom_field(&input, Some(id))?;

        let previous = &self.custom_fields[index];
        let previous_key = previous.key.clone();
        let added: Vec<String> = attached_to
            .iter()
            .filter(|t| !previous.attached_to.contains(t))
            .cloned()
            .collect();
        let removed: Vec<String> = previous
            .attached_to
            .iter()
            .filter(|t| !attached_to.contains(t))
            .cloned()
            .collect();

        let field = &mut self.custom_fields[index];
        field.label = label;
        field.key = key.clone();
        field.field_type = input.field_type;
        field.options = options;
        field.required = input.required;
        field.help_text = optional_text(input.help_text.as_deref());
        field.attached_to = attached_to;
        field.updated_at = now;
        let updated = field.clone();

        self.attach_field(id, &added, now);
        self.detach_field(id, &removed, now);
        if previous_key != key {
            self.rename_entry_key(&previous_key, &key, now);
        }
        Ok(updated)
    }

    fn rename_entry_key(&mut self, from: &str, to: &str, now: DateTime<Utc>) {
        for entry in self.entries.values_mut().flatten() {
            if let Some(value) = entry.fields.remove(from) {
                entry.fields.insert(to.to_string(), value);
                entry.updated_at = now;
            }
        }
    }

    /// Delete a custom field, detach it everywhere, and drop its stored values.
    pub fn delete_custom_field(&mut self, id: &str, now: DateTime<Utc>) -> Result<CustomField> {
        let index = self.custom_field_index(id)?;
        let removed = self.custom_fields.remove(index);

        for content_type in &mut self.content_types {
            let before = content_type.fields.len();
            content_type.fields.retain(|field_id| field_id != id);
            if content_type.fields.len() != before {
                content_type.updated_at = now;
            }
        }
        for entry in self.entries.values_mut().flatten() {
            if entry.fields.remove(&removed.key).is_some() {
                entry.updated_at = now;
            }
        }
        Ok(removed)
    }

    // -- entries ----------------------------------------------------------

    fn attached_fields(&self, content_type: &ContentType) -> Vec<&CustomField> {
        content_type
            .fields
            .iter()
            .filter_map(|id| self.custom_field(id))
            .collect()
    }

    /// The first non-empty slug from the explicit slug, then the `title` and
    /// `name` values, each normalized.
    fn resolve_entry_slug(input: &ContentEntryInput) -> Result<String> {
        let slug = input
            .slug
            .as_deref()
            .into_iter()
            .chain(
                ["title", "name"]
                    .iter()
                    .filter_map(|key| input.fields.get(*key).and_then(Value::as_str)),
            )
            .map(slugify)
            .find(|candidate| !candidate.is_empty())
            .unwrap_or_default();

        if slug.is_empty() {
            return Err(ContentError::validation(
                "Slug is required. Provide a slug, title or name.",
            ));
        }
        Ok(slug)
    }

    fn validate_entry(
        &self,
        content_type_id: &str,
        input: &ContentEntryInput,
        existing_id: Option<&str>,
    ) -> Result<(String, BTreeMap<String, Value>)> {
        let content_type = self
            .content_type(content_type_id)
            .ok_or_else(|| ContentError::not_found(CONTENT_TYPE, content_type_id))?;

        let fields = coerce_entry_fields(&self.attached_fields(content_type), &input.fields)?;
        let slug = Self::resolve_entry_slug(input)?;
        if self
            .entries_for(content_type_id)
            .iter()
            .any(|e| e.slug == slug && Some(e.id.as_str()) != existing_id)
        {
            return Err(ContentError::validation(format!(
                "An entry with slug '{}' already exists.",
                slug
            )));
        }
        Ok((slug, fields))
    }

    pub fn list_entries(&self, content_type_id: &str) -> Result<Vec<ContentEntry>> {
        self.content_type_index(content_type_id)?;
        Ok(self.entries_for(content_type_id).to_vec())
    }

    pub fn entry(&self, content_type_id: &str, entry_id: &str) -> Result<ContentEntry> {
        self.content_type_index(content_type_id)?;
        self.entries_for(content_type_id)
            .iter()
            .find(|e| e.id == entry_id)
            .cloned()
            .ok_or_else(|| ContentError::not_found(ENTRY, entry_id))
    }

    pub fn create_entry(
        &mut self,
        content_type_id: &str,
        input: ContentEntryInput,
        now: DateTime<Utc>,
    ) -> Result<ContentEntry> {
        let (slug, fields) = self.validate_entry(content_type_id, &input, None)?;

        let entry = ContentEntry {
            id: new_id("entry"),
            content_type_id: content_type_id.to_string(),
            slug,
            status: input.status.unwrap_or(ContentStatus::Draft),
            fields,
            created_at: now,
            updated_at: now,
        };

        self.entries
            .entry(content_type_id.to_string())
            .or_default()
            .push(entry.clone());
        Ok(entry)
    }

    pub fn update_entry(
        &mut self,
        content_type_id: &str,
        entry_id: &str,
        input: ContentEntryInput,
        now: DateTime<Utc>,
    ) -> Result<ContentEntry> {
        self.entry(content_type_id, entry_id)?;
        let (slug, fields) = self.validate_entry(content_type_id, &input, Some(entry_id))?;

        let entry = self
            .entries
            .get_mut(content_type_id)
            .and_then(|bucket| bucket.iter_mut().find(|e| e.id == entry_id))
            .ok_or_else(|| ContentError::not_found(ENTRY, entry_id))?;
        entry.slug = slug;
        entry.fields = fields;
        if let Some(status) = input.status {
            entry.status = status;
        }
        entry.updated_at = now;
        Ok(entry.clone())
    }

    pub fn delete_entry(&mut self, content_type_id: &str, entry_id: &str) -> Result<ContentEntry> {
        self.content_type_index(content_type_id)?;
        let bucket = self
            .entries
            .get_mut(content_type_id)
            .ok_or_else(|| ContentError::not_found(ENTRY, entry_id))?;
        let index = bucket
            .iter()
            .position(|e| e.id == entry_id)
            .ok_or_else(|| ContentError::not_found(ENTRY, entry_id))?;
        Ok(bucket.remove(index))
    }
}
