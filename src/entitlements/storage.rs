//! Entitlement record persistence.

use super::record::EntitlementRecord;
use crate::error::Result;
use async_trait::async_trait;

/// One current entitlement record per user, keyed by user id.
///
/// Implementations report storage unavailability as
/// [`KeelsonError::Persistence`](crate::KeelsonError::Persistence).
#[async_trait]
pub trait EntitlementStore: Send + Sync {
    /// Replace the user's record entirely and return what was stored.
    async fn upsert(&self, record: EntitlementRecord) -> Result<EntitlementRecord>;

    /// The user's record, or `None` if one was never written.
    async fn get(&self, user_id: &str) -> Result<Option<EntitlementRecord>>;
}

/// In-memory entitlement store for testing.
#[cfg(any(test, feature = "test-helpers"))]
pub mod test {
    use super::*;
    use crate::error::KeelsonError;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, RwLock};

    #[derive(Default)]
    struct InMemoryEntitlementStoreInner {
        records: RwLock<HashMap<String, EntitlementRecord>>,
        upserts: RwLock<Vec<EntitlementRecord>>,
        fail_writes: AtomicBool,
        fail_reads: AtomicBool,
    }

    /// Cloning shares the same underlying data.
    #[derive(Default, Clone)]
    pub struct InMemoryEntitlementStore {
        inner: Arc<InMemoryEntitlementStoreInner>,
    }

    impl InMemoryEntitlementStore {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Seed a record without recording an upsert.
        pub fn insert(&self, record: EntitlementRecord) {
            self.inner
                .records
                .write()
                .unwrap()
                .insert(record.user_id.clone(), record);
        }

        /// Every record passed to `upsert`, in call order.
        pub fn upserts(&self) -> Vec<EntitlementRecord> {
            self.inner.upserts.read().unwrap().clone()
        }

        pub fn set_fail_writes(&self, fail: bool) {
            self.inner.fail_writes.store(fail, Ordering::SeqCst);
        }

        pub fn set_fail_reads(&self, fail: bool) {
            self.inner.fail_reads.store(fail, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl EntitlementStore for InMemoryEntitlementStore {
        async fn upsert(&self, record: EntitlementRecord) -> Result<EntitlementRecord> {
            if self.inner.fail_writes.load(Ordering::SeqCst) {
                return Err(KeelsonError::persistence(format!(
                    "entitlement store unavailable while writing {}",
                    record.user_id
                )));
            }
            self.inner.upserts.write().unwrap().push(record.clone());
            self.inner
                .records
                .write()
                .unwrap()
                .insert(record.user_id.clone(), record.clone());
            Ok(record)
        }

        async fn get(&self, user_id: &str) -> Result<Option<EntitlementRecord>> {
            if self.inner.fail_reads.load(Ordering::SeqCst) {
                return Err(KeelsonError::persistence(format!(
                    "entitlement store unavailable while reading {}",
                    user_id
                )));
            }
            Ok(self.inner.records.read().unwrap().get(user_id).cloned())
        }
    }
}
