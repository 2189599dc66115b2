use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Trait for storing processed webhook delivery ids to prevent duplicate processing
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Check if a delivery has already been processed
    async fn is_processed(&self, event_id: &str) -> Result<bool>;

    /// Mark a delivery as processed
    async fn mark_processed(&self, event_id: String) -> Result<()>;

    /// Clean up old entries (optional)
    async fn cleanup_old_entries(&self) -> Result<()> {
        Ok(())
    }
}

/// In-memory idempotency store with a retention window.
///
/// Ids older than the retention window are treated as unseen and dropped on
/// cleanup. Suitable for a single instance; multi-instance deployments need a
/// shared store.
#[derive(Clone)]
pub struct MemoryIdempotencyStore {
    processed: Arc<RwLock<HashMap<String, Instant>>>,
    retention: Duration,
}

impl MemoryIdempotencyStore {
    pub fn new(retention: Duration) -> Self {
        Self {
            processed: Arc::new(RwLock::new(HashMap::new())),
            retention,
        }
    }

    pub async fn len(&self) -> usize {
        self.processed.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.processed.read().await.is_empty()
    }
}

impl Default for MemoryIdempotencyStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(24 * 60 * 60))
    }
}

#[async_trait]
impl IdempotencyStore for MemoryIdempotencyStore {
    async fn is_processed(&self, event_id: &str) -> Result<bool> {
        let processed = self.processed.read().await;
        Ok(processed
            .get(event_id)
            .is_some_and(|at| at.elapsed() < self.retention))
    }

    async fn mark_processed(&self, event_id: String) -> Result<()> {
        let mut processed = self.processed.write().await;
        processed.insert(event_id, Instant::now());
        Ok(())
    }

    async fn cleanup_old_entries(&self) -> Result<()> {
        let mut processed = self.processed.write().await;
        let before = processed.len();
        processed.retain(|_, at| at.elapsed() < self.retention);
        tracing::debug!(
            target: "keelson::webhooks",
            removed = before - processed.len(),
            "Cleaned up processed webhook ids"
        );
        Ok(())
    }
}
