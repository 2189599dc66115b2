//! Billing reconciliation.
//!
//! Turns a subscription item event into a durable entitlement record. The
//! provider's read API lags behind its webhooks, so an empty active list is
//! re-queried exactly once after a fixed delay before falling back to what
//! the event itself says.

use super::record::{EntitlementRecord, EntitlementStatus};
use super::revocation::{MembershipRevoker, RevocationReport};
use super::storage::EntitlementStore;
use crate::billing::{BillingError, BillingEvent, BillingProvider, Plan, Subscription};
use crate::error::{KeelsonError, Result};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Default wait before the single re-query of the subscription list.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Fields the reconciler reads from a subscription item event payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionItemEvent {
    pub user_id: String,
    pub plan_id_hint: Option<String>,
    pub status: String,
}

impl SubscriptionItemEvent {
    /// Extract the payer, plan hint and status. Returns `None` when the
    /// payload names no payer user id.
    pub fn from_payload(data: &Value) -> Option<Self> {
        let non_blank = |v: Option<&Value>| {
            v.and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let payer = data.get("payer");
        let user_id = non_blank(payer.and_then(|p| p.get("user_id")))
            .or_else(|| non_blank(payer.and_then(|p| p.get("userId"))))?;

        let plan_id_hint = non_blank(data.get("plan_id"))
            .or_else(|| non_blank(data.get("planId")))
            .or_else(|| non_blank(data.get("plan").and_then(|p| p.get("id"))));

        let status = non_blank(data.get("status")).unwrap_or_else(|| "inactive".to_string());

        Some(Self {
            user_id,
            plan_id_hint,
            status,
        })
    }
}

/// What happened to one event.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// Not a subscription item event; acknowledged without work.
    Ignored,
    /// The payload named no payer; acknowledged without work.
    Discarded,
    /// The record was written. Terminal statuses also carry the revocation report.
    Persisted {
        record: EntitlementRecord,
        revocation: Option<RevocationReport>,
    },
}

/// The subscription chosen to drive the record, with its resolved plan.
struct Candidate {
    subscription: Option<Subscription>,
    plan: Option<Plan>,
    features: Vec<String>,
}

impl Candidate {
    fn new(subscription: Option<Subscription>, plan: Option<Plan>) -> Self {
        let features = plan.as_ref().map(Plan::feature_slugs).unwrap_or_default();
        Self {
            subscription,
            plan,
            features,
        }
    }

    fn into_record(self, user_id: &str, status: EntitlementStatus, plan_id_hint: Option<&str>) -> EntitlementRecord {
        let sub = self.subscription.as_ref();
        let plan = self.plan.as_ref();
        EntitlementRecord {
            user_id: user_id.to_string(),
            status,
            plan_id: plan
                .map(|p| p.id.clone())
                .or_else(|| sub.and_then(|s| s.plan_id.clone()))
                .or_else(|| plan_id_hint.map(str::to_string)),
            plan_slug: plan
                .and_then(|p| p.slug.clone())
                .or_else(|| sub.and_then(|s| s.plan_slug.clone())),
            plan_name: plan
                .and_then(|p| p.name.clone())
                .or_else(|| sub.and_then(|s| s.plan_name.clone())),
            features: self.features,
            updated_at: Utc::now(),
        }
    }
}

/// Reconciles billing events and backfills into entitlement records.
pub struct BillingReconciler<S: EntitlementStore, B: BillingProvider> {
    store: Arc<S>,
    provider: Arc<B>,
    revoker: MembershipRevoker<B>,
    retry_delay: Duration,
}

impl<S: EntitlementStore, B: BillingProvider> BillingReconciler<S, B> {
    pub fn new(store: Arc<S>, provider: Arc<B>) -> Self {
        let revoker = MembershipRevoker::new(provider.clone());
        Self {
            store,
            provider,
            revoker,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Override the propagation-lag delay.
    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    /// Route a verified event. Only `subscriptionItem.*` events are reconciled.
    #[instrument(skip(self, event), fields(event_type = %event.event_type))]
    pub async fn handle_event(&self, event: &BillingEvent) -> Result<ReconcileOutcome> {
        if !event.is_subscription_item() {
            debug!(target: "keelson::entitlements::reconciler", "Ignoring non subscription item event");
            return Ok(ReconcileOutcome::Ignored);
        }
        self.reconcile(&event.data).await
    }

    /// Reconcile one subscription item payload into the user's record.
    ///
    /// Steps run strictly in order: fetch subscriptions, at most one delayed
    /// re-fetch, plan resolution, persistence, then revocation for terminal
    /// statuses. Nothing is written when a hinted plan cannot be resolved.
    pub async fn reconcile(&self, data: &Value) -> Result<ReconcileOutcome> {
        let Some(event) = SubscriptionItemEvent::from_payload(data) else {
            info!(
                target: "keelson::entitlements::reconciler",
                "Discarding subscription item event without payer user id"
            );
            return Ok(ReconcileOutcome::Discarded);
        };
        let user_id = event.user_id.as_str();
        let hint = event.plan_id_hint.as_deref();

        let mut active = self.fetch_active(user_id).await?;
        if active.is_empty() {
            debug!(
                target: "keelson::entitlements::reconciler",
                user_id = %user_id,
                delay_ms = self.retry_delay.as_millis() as u64,
                "No active subscription yet, re-querying after delay"
            );
            tokio::time::sleep(self.retry_delay).await;
            active = self.fetch_active(user_id).await?;
        }

        let (status, mut candidate, hint_tried) = if active.is_empty() {
            let plan = match hint {
                Some(plan_id) => self.resolve_plan(plan_id).await?,
                None => None,
            };
            (
                EntitlementStatus::from_provider(&event.status),
                Candidate::new(None, plan),
                true,
            )
        } else {
            (EntitlementStatus::Active, self.select_candidate(active).await?, false)
        };

        if candidate.plan.is_none() {
            if let Some(plan_id) = hint {
                let plan = if hint_tried {
                    None
                } else {
                    self.resolve_plan(plan_id).await?
                };
                let plan = plan.ok_or_else(|| BillingError::PlanNotFound {
                    plan_id: plan_id.to_string(),
                })?;
                candidate = Candidate::new(candidate.subscription, Some(plan));
            }
        }

        let record = candidate.into_record(user_id, status, hint);
        let record = self.store.upsert(record).await.inspect_err(|e| {
            warn!(
                target: "keelson::entitlements::reconciler",
                user_id = %user_id,
                error = %e,
                "Failed to persist entitlement record"
            );
        })?;

        info!(
            target: "keelson::entitlements::reconciler",
            user_id = %user_id,
            status = %record.status,
            plan_id = record.plan_id.as_deref().unwrap_or(""),
            feature_count = record.features.len(),
            "Entitlement record reconciled"
        );

        let revocation = if record.status.is_terminal() {
            Some(self.revoker.revoke(user_id, &record.features).await)
        } else {
            None
        };

        Ok(ReconcileOutcome::Persisted { record, revocation })
    }

    /// Rebuild a user's record from the provider's current state.
    ///
    /// Unlike webhook reconciliation there is no delayed re-query and no
    /// revocation: a user without an active subscription gets an inactive
    /// record with no plan and no features.
    #[instrument(skip(self))]
    pub async fn backfill(&self, user_id: &str) -> Result<EntitlementRecord> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(KeelsonError::validation("User id is required."));
        }

        let active = self.fetch_active(user_id).await?;
        let record = if active.is_empty() {
            EntitlementRecord::inactive(user_id)
        } else {
            self.select_candidate(active)
                .await?
                .into_record(user_id, EntitlementStatus::Active, None)
        };

        let record = self.store.upsert(record).await?;
        info!(
            target: "keelson::entitlements::reconciler",
            user_id = %user_id,
            status = %record.status,
            feature_count = record.features.len(),
            "Entitlement record backfilled"
        );
        Ok(record)
    }

    /// Resolve a plan by id through the provider.
    pub async fn resolve_plan(&self, plan_id: &str) -> Result<Option<Plan>> {
        self.provider.find_plan(plan_id).await
    }

    async fn fetch_active(&self, user_id: &str) -> Result<Vec<Subscription>> {
        let subscriptions = self.provider.get_subscription_list(user_id).await?;
        Ok(subscriptions.into_iter().filter(Subscription::is_active).collect())
    }

    /// First active subscription whose plan grants at least one feature,
    /// otherwise the first active subscription. List order is the provider's.
    async fn select_candidate(&self, active: Vec<Subscription>) -> Result<Candidate> {
        let mut first: Option<Candidate> = None;
        for subscription in active {
            let plan = match subscription.plan_id.as_deref() {
                Some(plan_id) => self.resolve_plan(plan_id).await?,
                None => None,
            };
            let candidate = Candidate::new(Some(subscription), plan);
            if !candidate.features.is_empty() {
                return Ok(candidate);
            }
            if first.is_none() {
                first = Some(candidate);
            }
        }
        first.ok_or_else(|| KeelsonError::internal("no active subscription to select"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::{MockBillingProvider, Organization};
    use crate::entitlements::storage::test::InMemoryEntitlementStore;
    use serde_json::json;

    fn create_test_reconciler() -> (
        BillingReconciler<InMemoryEntitlementStore, MockBillingProvider>,
        InMemoryEntitlementStore,
        MockBillingProvider,
    ) {
        let store = InMemoryEntitlementStore::new();
        let provider = MockBillingProvider::new();
        let reconciler = BillingReconciler::new(Arc::new(store.clone()), Arc::new(provider.clone()));
        (reconciler, store, provider)
    }

    fn created_event(status: &str) -> Value {
        json!({
            "status": status,
            "plan_id": "plan_1",
            "payer": {"user_id": "user_1"}
        })
    }

    fn persisted(outcome: ReconcileOutcome) -> (EntitlementRecord, Option<RevocationReport>) {
        match outcome {
            ReconcileOutcome::Persisted { record, revocation } => (record, revocation),
            other => panic!("expected Persisted, got {other:?}"),
        }
    }

    #[test]
    fn test_payload_extraction() {
        let event = SubscriptionItemEvent::from_payload(&json!({
            "status": "active",
            "plan": {"id": "plan_9"},
            "payer": {"user_id": " user_1 "}
        }))
        .unwrap();
        assert_eq!(event.user_id, "user_1");
        assert_eq!(event.plan_id_hint.as_deref(), Some("plan_9"));
        assert_eq!(event.status, "active");

        assert!(SubscriptionItemEvent::from_payload(&json!({"status": "active"})).is_none());
        assert!(SubscriptionItemEvent::from_payload(&json!({"payer": {"user_id": ""}})).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_active_subscription_persists_plan_features() {
        let (reconciler, store, provider) = create_test_reconciler();
        provider.add_plan(Plan::new("plan_1").with_features(["app-1", "app-2"]));
        provider.set_subscriptions("user_1", vec![Subscription::new("active", "plan_1")]);

        let (record, revocation) = persisted(reconciler.reconcile(&created_event("active")).await.unwrap());

        assert_eq!(record.user_id, "user_1");
        assert_eq!(record.status, EntitlementStatus::Active);
        assert_eq!(record.plan_id.as_deref(), Some("plan_1"));
        assert_eq!(record.features, vec!["app-1", "app-2"]);
        assert!(revocation.is_none());
        assert_eq!(store.upserts().len(), 1);
        assert_eq!(provider.subscription_list_calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_requeries_once_after_delay() {
        let (reconciler, store, provider) = create_test_reconciler();
        provider.add_plan(Plan::new("plan_1").with_features(["app-1", "app-2"]));
        provider.script_subscriptions(
            "user_1",
            vec![vec![], vec![Subscription::new("active", "plan_1")]],
        );

        let (record, _) = persisted(reconciler.reconcile(&created_event("active")).await.unwrap());

        let calls = provider.subscription_list_calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[1].duration_since(calls[0]) >= Duration::from_secs(2));
        assert_eq!(record.status, EntitlementStatus::Active);
        assert_eq!(store.upserts().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_falls_back_to_event_plan_and_status() {
        let (reconciler, store, provider) = create_test_reconciler();
        provider.add_plan(Plan::new("plan_1").with_features(["app_1", "app-2"]));
        provider.add_organization(Organization::new("org_1", "app-1"));
        provider.add_organization(Organization::new("org_2", "app-2"));
        provider.add_membership("org_1", "user_1", "org:member");
        provider.add_membership("org_2", "user_1", "org:member");

        let (record, revocation) = persisted(reconciler.reconcile(&created_event("ended")).await.unwrap());

        assert_eq!(provider.subscription_list_calls().len(), 2);
        assert_eq!(record.status, EntitlementStatus::Ended);
        assert_eq!(record.plan_id.as_deref(), Some("plan_1"));
        assert_eq!(record.features, vec!["app_1", "app-2"]);
        assert_eq!(store.upserts().len(), 1);

        let revocation = revocation.unwrap();
        assert_eq!(revocation.removed, vec!["app-1", "app-2"]);
        assert!(!provider.has_membership("org_1", "user_1"));
        assert!(!provider.has_membership("org_2", "user_1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_prefers_first_candidate_with_features() {
        let (reconciler, _store, provider) = create_test_reconciler();
        provider.add_plan(Plan::new("free"));
        provider.add_plan(Plan::new("pro").with_name("Pro").with_features(["app-1"]));
        provider.set_subscriptions(
            "user_1",
            vec![
                Subscription::new("active", "free"),
                Subscription::new("active", "pro"),
            ],
        );

        let (record, _) = persisted(reconciler.reconcile(&created_event("active")).await.unwrap());

        assert_eq!(record.plan_id.as_deref(), Some("pro"));
        assert_eq!(record.plan_name.as_deref(), Some("Pro"));
        assert_eq!(record.features, vec!["app-1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_falls_back_to_first_candidate_without_features() {
        let (reconciler, _store, provider) = create_test_reconciler();
        provider.add_plan(Plan::new("free_a"));
        provider.add_plan(Plan::new("free_b"));
        provider.set_subscriptions(
            "user_1",
            vec![
                Subscription::new("canceled", "pro"),
                Subscription::new("active", "free_a"),
                Subscription::new("active", "free_b"),
            ],
        );

        let (record, _) = persisted(reconciler.reconcile(&created_event("active")).await.unwrap());

        assert_eq!(record.plan_id.as_deref(), Some("free_a"));
        assert!(record.features.is_empty());
        assert_eq!(record.status, EntitlementStatus::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unresolvable_hinted_plan_is_not_persisted() {
        let (reconciler, store, provider) = create_test_reconciler();

        let err = reconciler.reconcile(&created_event("ended")).await.unwrap_err();

        assert!(matches!(err, KeelsonError::ServiceUnavailable(_)));
        assert!(err.is_retryable());
        assert!(store.upserts().is_empty());
        assert_eq!(provider.subscription_list_calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolves_plan_from_list_without_lookup_support() {
        let (reconciler, _store, provider) = create_test_reconciler();
        provider.disable_plan_lookup();
        provider.add_plan(Plan::new("plan_1").with_features(["app-1"]));
        provider.set_subscriptions("user_1", vec![Subscription::new("active", "plan_1")]);

        let (record, _) = persisted(reconciler.reconcile(&created_event("active")).await.unwrap());

        assert_eq!(record.features, vec!["app-1"]);
        assert_eq!(provider.plan_calls(), 0);
        assert!(provider.plan_list_calls() >= 1);
    }

    #[tokio::test]
    async fn test_missing_payer_is_discarded() {
        let (reconciler, store, provider) = create_test_reconciler();

        let outcome = reconciler
            .reconcile(&json!({"status": "active", "plan_id": "plan_1"}))
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::Discarded);
        assert!(provider.subscription_list_calls().is_empty());
        assert!(store.upserts().is_empty());
    }

    #[tokio::test]
    async fn test_non_subscription_events_are_ignored() {
        let (reconciler, _store, provider) = create_test_reconciler();

        let outcome = reconciler
            .handle_event(&BillingEvent::new("user.created", created_event("active")))
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::Ignored);
        assert!(provider.subscription_list_calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_failure_propagates() {
        let (reconciler, store, provider) = create_test_reconciler();
        provider.add_plan(Plan::new("plan_1").with_features(["app-1"]));
        provider.set_subscriptions("user_1", vec![Subscription::new("active", "plan_1")]);
        store.set_fail_writes(true);

        let err = reconciler.reconcile(&created_event("active")).await.unwrap_err();
        assert!(matches!(err, KeelsonError::Persistence(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_billing_outage_propagates() {
        let (reconciler, store, provider) = create_test_reconciler();
        provider.set_fail_subscription_list(true);

        let err = reconciler.reconcile(&created_event("active")).await.unwrap_err();
        assert!(matches!(err, KeelsonError::ServiceUnavailable(_)));
        assert!(store.upserts().is_empty());
    }

    #[tokio::test]
    async fn test_backfill_without_active_subscription() {
        let (reconciler, store, provider) = create_test_reconciler();
        provider.set_subscriptions("user_2", vec![Subscription::new("ended", "plan_1")]);

        let record = reconciler.backfill("user_2").await.unwrap();

        assert_eq!(record.user_id, "user_2");
        assert_eq!(record.status, EntitlementStatus::Inactive);
        assert!(record.features.is_empty());
        assert!(record.plan_id.is_none());
        assert_eq!(provider.subscription_list_calls().len(), 1);
        assert_eq!(store.upserts().len(), 1);
    }

    #[tokio::test]
    async fn test_backfill_with_active_subscription() {
        let (reconciler, _store, provider) = create_test_reconciler();
        provider.add_plan(Plan::new("plan_1").with_slug("pro").with_features(["app-1"]));
        provider.set_subscriptions("user_2", vec![Subscription::new("active", "plan_1")]);

        let record = reconciler.backfill("user_2").await.unwrap();

        assert_eq!(record.status, EntitlementStatus::Active);
        assert_eq!(record.plan_slug.as_deref(), Some("pro"));
        assert_eq!(record.features, vec!["app-1"]);
    }

    #[tokio::test]
    async fn test_backfill_requires_user_id() {
        let (reconciler, _store, _provider) = create_test_reconciler();
        assert!(matches!(
            reconciler.backfill("  ").await,
            Err(KeelsonError::Validation(_))
        ));
    }
}
