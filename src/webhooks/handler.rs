//! Billing webhook processing.
//!
//! A delivery is verified, checked against the idempotency store, and then
//! reconciled under an overall deadline. The delivery id is recorded only
//! after reconciliation succeeds, so failed deliveries are retried by the
//! sender and re-run here.

use super::config::WebhookConfig;
use super::idempotency::{IdempotencyStore, MemoryIdempotencyStore};
use super::verification::{SVIX_ID_HEADER, SvixVerifier, WebhookVerifier};
use crate::billing::{BillingError, BillingEvent, BillingProvider};
use crate::entitlements::{BillingReconciler, EntitlementStore, ReconcileOutcome};
use crate::error::{KeelsonError, Result};
use axum::http::HeaderMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// What the handler did with one delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    /// The event was reconciled (or ignored as irrelevant).
    Processed(ReconcileOutcome),
    /// The delivery id was seen before; nothing was re-run.
    AlreadyProcessed,
}

/// Verifies and reconciles billing webhook deliveries.
pub struct BillingWebhookHandler<S: EntitlementStore, B: BillingProvider> {
    reconciler: Arc<BillingReconciler<S, B>>,
    verifier: Option<Arc<dyn WebhookVerifier>>,
    idempotency: Arc<dyn IdempotencyStore>,
    deadline: Duration,
}

impl<S: EntitlementStore, B: BillingProvider> BillingWebhookHandler<S, B> {
    /// Create a handler. Without a verifier every delivery is refused.
    pub fn new(
        reconciler: Arc<BillingReconciler<S, B>>,
        verifier: Option<Arc<dyn WebhookVerifier>>,
    ) -> Self {
        let defaults = WebhookConfig::default();
        Self {
            reconciler,
            verifier,
            idempotency: Arc::new(MemoryIdempotencyStore::new(defaults.idempotency_retention())),
            deadline: defaults.deadline(),
        }
    }

    /// Build a handler with a [`SvixVerifier`] from the configured secret.
    ///
    /// A missing secret is allowed here and reported per request; a secret
    /// that cannot be decoded is a startup error.
    pub fn from_config(
        reconciler: Arc<BillingReconciler<S, B>>,
        config: &WebhookConfig,
    ) -> Result<Self> {
        let verifier = match &config.signing_secret {
            Some(secret) => {
                let verifier = SvixVerifier::from_secret(secret)?.with_tolerance(config.tolerance());
                Some(Arc::new(verifier) as Arc<dyn WebhookVerifier>)
            }
            None => None,
        };

        Ok(Self {
            reconciler,
            verifier,
            idempotency: Arc::new(MemoryIdempotencyStore::new(config.idempotency_retention())),
            deadline: config.deadline(),
        })
    }

    #[must_use]
    pub fn with_idempotency_store(mut self, store: Arc<dyn IdempotencyStore>) -> Self {
        self.idempotency = store;
        self
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Process one raw delivery.
    ///
    /// Fails with `Internal` when no signing secret is configured,
    /// `Validation` for an empty body, `WebhookVerification` for a bad
    /// signature or payload, and `ServiceUnavailable` when reconciliation
    /// cannot finish within the deadline.
    #[instrument(skip_all, fields(delivery_id = tracing::field::Empty))]
    pub async fn handle(&self, headers: &HeaderMap, body: &[u8]) -> Result<WebhookOutcome> {
        let Some(verifier) = &self.verifier else {
            error!(target: "keelson::webhooks", "Webhook signing secret is not configured");
            return Err(KeelsonError::internal("Webhook signing secret is not configured"));
        };

        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(KeelsonError::validation("Webhook payload is empty"));
        }

        verifier.verify(headers, body).inspect_err(|e| {
            warn!(target: "keelson::webhooks", error = %e, "Rejected webhook delivery");
        })?;

        let event: BillingEvent = serde_json::from_slice(body).map_err(|e| {
            BillingError::InvalidWebhookPayload {
                message: e.to_string(),
            }
        })?;

        let delivery_id = headers
            .get(SVIX_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        if let Some(id) = &delivery_id {
            tracing::Span::current().record("delivery_id", id.as_str());
            if self.idempotency.is_processed(id).await? {
                debug!(target: "keelson::webhooks", "Skipping already processed delivery");
                return Ok(WebhookOutcome::AlreadyProcessed);
            }
        }

        let outcome = tokio::time::timeout(self.deadline, self.reconciler.handle_event(&event))
            .await
            .map_err(|_| {
                error!(
                    target: "keelson::webhooks",
                    event_type = %event.event_type,
                    deadline_ms = self.deadline.as_millis() as u64,
                    "Webhook processing exceeded its deadline"
                );
                KeelsonError::service_unavailable("Webhook processing exceeded its deadline")
            })?
            .inspect_err(|e| {
                error!(
                    target: "keelson::webhooks",
                    event_type = %event.event_type,
                    error = %e,
                    "Webhook processing failed"
                );
            })?;

        if let Some(id) = delivery_id {
            // The record is already persisted; a redelivery would only redo the same work.
            if let Err(e) = self.idempotency.mark_processed(id).await {
                warn!(target: "keelson::webhooks", error = %e, "Failed to record processed delivery");
            }
        }

        info!(
            target: "keelson::webhooks",
            event_type = %event.event_type,
            "Webhook processed successfully"
        );
        Ok(WebhookOutcome::Processed(outcome))
    }
}
