//! Tenant-defined content schemas.
//!
//! Content types group custom fields; entries hold values for the fields
//! attached to their type. A tenant's whole schema lives in one
//! [`ContentSnapshot`] that is read and written as a unit through a
//! [`ContentStore`].
//!
//! ```rust,ignore
//! use keelson::content::{ContentManager, CustomFieldInput, FieldType};
//!
//! let manager = ContentManager::new(store);
//! let mut field = CustomFieldInput::new("Title", FieldType::Text);
//! field.required = true;
//! field.attached_to = vec![blog.id.clone()];
//! manager.create_custom_field(tenant_id, field).await?;
//! ```

mod coercion;
mod error;
mod manager;
mod schema;
mod slug;
mod storage;
mod types;

pub use coercion::{coerce_entry_fields, coerce_field_value, is_empty_value};
pub use error::{ContentError, Result};
pub use manager::ContentManager;
pub use slug::{is_kebab_case, slugify};
pub use storage::ContentStore;
pub use types::{
    ContentEntry, ContentEntryInput, ContentSnapshot, ContentStatus, ContentType,
    ContentTypeInput, CustomField, CustomFieldInput, FieldType,
};

#[cfg(any(test, feature = "test-helpers"))]
pub use storage::test::InMemoryContentStore;
