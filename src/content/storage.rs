//! Tenant-scoped snapshot storage for content schemas.

use super::types::ContentSnapshot;
use crate::error::Result;
use async_trait::async_trait;

/// Persists one [`ContentSnapshot`] per tenant.
///
/// Writes are compare-and-swap on [`ContentSnapshot::version`]: a write
/// succeeds only when the stored version still equals the version the
/// snapshot was read at, and bumps it.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Read a tenant's snapshot. Unknown tenants get an empty snapshot at version 0.
    async fn get(&self, tenant_id: &str) -> Result<ContentSnapshot>;

    /// Replace a tenant's snapshot. Returns the new version.
    ///
    /// Fails with a persistence error if another write landed since the
    /// snapshot was read.
    async fn put(&self, tenant_id: &str, snapshot: ContentSnapshot) -> Result<u64>;
}

/// In-memory content store for testing.
#[cfg(any(test, feature = "test-helpers"))]
pub mod test {
    use super::*;
    use crate::error::KeelsonError;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, RwLock};

    #[derive(Default)]
    struct InMemoryContentStoreInner {
        snapshots: RwLock<HashMap<String, ContentSnapshot>>,
        writes: AtomicUsize,
        fail_writes: AtomicBool,
    }

    /// In-memory content store. Cloning shares the same underlying data.
    #[derive(Default, Clone)]
    pub struct InMemoryContentStore {
        inner: Arc<InMemoryContentStoreInner>,
    }

    impl InMemoryContentStore {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Number of successful writes.
        pub fn writes(&self) -> usize {
            self.inner.writes.load(Ordering::SeqCst)
        }

        pub fn set_fail_writes(&self, fail: bool) {
            self.inner.fail_writes.store(fail, Ordering::SeqCst);
        }

        pub fn snapshot(&self, tenant_id: &str) -> Option<ContentSnapshot> {
            self.inner.snapshots.read().unwrap().get(tenant_id).cloned()
        }
    }

    #[async_trait]
    impl ContentStore for InMemoryContentStore {
        async fn get(&self, tenant_id: &str) -> Result<ContentSnapshot> {
            Ok(self
                .inner
                .snapshots
                .read()
                .unwrap()
                .get(tenant_id)
                .cloned()
                .unwrap_or_default())
        }

        async fn put(&self, tenant_id: &str, mut snapshot: ContentSnapshot) -> Result<u64> {
            if self.inner.fail_writes.load(Ordering::SeqCst) {
                return Err(KeelsonError::persistence("content store unavailable"));
            }

            let mut snapshots = self.inner.snapshots.write().unwrap();
            let current = snapshots.get(tenant_id).map(|s| s.version).unwrap_or(0);
            if current != snapshot.version {
                return Err(KeelsonError::persistence(format!(
                    "concurrent modification of content for tenant {}",
                    tenant_id
                )));
            }

            snapshot.version = current + 1;
            snapshots.insert(tenant_id.to_string(), snapshot);
            self.inner.writes.fetch_add(1, Ordering::SeqCst);
            Ok(current + 1)
        }
    }
}
