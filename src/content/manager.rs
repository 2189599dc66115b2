//! Content manager.
//!
//! Tenant-scoped CRUD over content types, custom fields and entries. Each
//! write reads the tenant snapshot, applies the change in memory and writes
//! the snapshot back once. Nothing is written when validation fails.

use super::error::{ContentError, Result};
use super::storage::ContentStore;
use super::types::{
    ContentEntry, ContentEntryInput, ContentSnapshot, ContentType, ContentTypeInput,
    CustomField, CustomFieldInput,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Content schema manager, generic over the snapshot store.
///
/// # Example
///
/// ```rust,ignore
/// use keelson::content::{ContentManager, ContentTypeInput};
///
/// let manager = ContentManager::new(Arc::new(store));
/// let blog = manager
///     .create_content_type("tenant_1", ContentTypeInput { name: "Blog".into(), ..Default::default() })
///     .await?;
/// ```
pub struct ContentManager<C: ContentStore> {
    store: Arc<C>,
}

impl<C: ContentStore> Clone for ContentManager<C> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<C: ContentStore> ContentManager<C> {
    pub fn new(store: Arc<C>) -> Self {
        Self { store }
    }

    async fn read(&self, tenant_id: &str) -> Result<ContentSnapshot> {
        if tenant_id.trim().is_empty() {
            return Err(ContentError::validation("Tenant id is required."));
        }
        Ok(self.store.get(tenant_id).await?)
    }

    /// Read, apply `change`, write back. The write is skipped if `change` fails.
    async fn write<T, F>(&self, tenant_id: &str, operation: &'static str, change: F) -> Result<T>
    where
        F: FnOnce(&mut ContentSnapshot) -> Result<T>,
    {
        let mut snapshot = self.read(tenant_id).await?;
        let value = change(&mut snapshot).inspect_err(|e| {
            debug!(
                target: "keelson::content",
                tenant_id = %tenant_id,
                operation,
                error = %e,
                "Content change rejected"
            );
        })?;

        let version = self.store.put(tenant_id, snapshot).await.inspect_err(|e| {
            tracing::error!(
                target: "keelson::content",
                tenant_id = %tenant_id,
                operation,
                error = %e,
                "Failed to persist content snapshot"
            );
        })?;

        info!(
            target: "keelson::content",
            tenant_id = %tenant_id,
            operation,
            version,
            "Content snapshot updated"
        );
        Ok(value)
    }

    // -- content types --------------------------------------------------

    pub async fn list_content_types(&self, tenant_id: &str) -> Result<Vec<ContentType>> {
        Ok(self.read(tenant_id).await?.content_types)
    }

    pub async fn get_content_type(&self, tenant_id: &str, id: &str) -> Result<ContentType> {
        self.read(tenant_id)
            .await?
            .content_type(id)
            .cloned()
            .ok_or_else(|| ContentError::not_found("Content type", id))
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_content_type(
        &self,
        tenant_id: &str,
        input: ContentTypeInput,
    ) -> Result<ContentType> {
        self.write(tenant_id, "create_content_type", |snapshot| {
            snapshot.create_content_type(input, Utc::now())
        })
        .await
    }

    #[instrument(skip(self, input))]
    pub async fn update_content_type(
        &self,
        tenant_id: &str,
        id: &str,
        input: ContentTypeInput,
    ) -> Result<ContentType> {
        self.write(tenant_id, "update_content_type", |snapshot| {
            snapshot.update_content_type(id, input, Utc::now())
        })
        .await
    }

    /// Delete a content type together with its entries.
    #[instrument(skip(self))]
    pub async fn delete_content_type(&self, tenant_id: &str, id: &str) -> Result<()> {
        self.write(tenant_id, "delete_content_type", |snapshot| {
            snapshot.delete_content_type(id, Utc::now()).map(|_| ())
        })
        .await
    }

    // -- custom fields --------------------------------------------------

    pub async fn list_custom_fields(&self, tenant_id: &str) -> Result<Vec<CustomField>> {
        Ok(self.read(tenant_id).await?.custom_fields)
    }

    pub async fn get_custom_field(&self, tenant_id: &str, id: &str) -> Result<CustomField> {
        self.read(tenant_id)
            .await?
            .custom_field(id)
            .cloned()
            .ok_or_else(|| ContentError::not_found("Custom field", id))
    }

    #[instrument(skip(self, input), fields(label = %input.label))]
    pub async fn create_custom_field(
        &self,
        tenant_id: &str,
        input: CustomFieldInput,
    ) -> Result<CustomField> {
        self.write(tenant_id, "create_custom_field", |snapshot| {
            snapshot.create_custom_field(input, Utc::now())
        })
        .await
    }

    #[instrument(skip(self, input))]
    pub async fn update_custom_field(
        &self,
        tenant_id: &str,
        id: &str,
        input: CustomFieldInput,
    ) -> Result<CustomField> {
        self.write(tenant_id, "update_custom_field", |snapshot| {
            snapshot.update_custom_field(id, input, Utc::now())
        })
        .await
    }

    /// Delete a custom field, detaching it from content types and dropping
    /// its values from entries.
    #[instrument(skip(self))]
    pub async fn delete_custom_field(&self, tenant_id: &str, id: &str) -> Result<()> {
        self.write(tenant_id, "delete_custom_field", |snapshot| {
            snapshot.delete_custom_field(id, Utc::now()).map(|_| ())
        })
        .await
    }

    // -- entries ----------------------------------------------------------

    pub async fn list_entries(
        &self,
        tenant_id: &str,
        content_type_id: &str,
    ) -> Result<Vec<ContentEntry>> {
        self.read(tenant_id).await?.list_entries(content_type_id)
    }

    pub async fn get_entry(
        &self,
        tenant_id: &str,
        content_type_id: &str,
        entry_id: &str,
    ) -> Result<ContentEntry> {
        self.read(tenant_id).await?.entry(content_type_id, entry_id)
    }

    #[instrument(skip(self, input))]
    pub async fn create_entry(
        &self,
        tenant_id: &str,
        content_type_id: &str,
        input: ContentEntryInput,
    ) -> Result<ContentEntry> {
        self.write(tenant_id, "create_entry", |snapshot| {
            snapshot.create_entry(content_type_id, input, Utc::now())
        })
        .await
    }

    #[instrument(skip(self, input))]
    pub async fn update_entry(
        &self,
        tenant_id: &str,
        content_type_id: &str,
        entry_id: &str,
        input: ContentEntryInput,
    ) -> Result<ContentEntry> {
        self.write(tenant_id, "update_entry", |snapshot| {
            snapshot.update_entry(content_type_id, entry_id, input, Utc::now())
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn delete_entry(
        &self,
        tenant_id: &str,
        content_type_id: &str,
        entry_id: &str,
    ) -> Result<()> {
        self.write(tenant_id, "delete_entry", |snapshot| {
            snapshot.delete_entry(content_type_id, entry_id).map(|_| ())
        })
        .await
    }
}
