//! Organization join decisions.
//!
//! Three interchangeable policies answer "may this user join this
//! organization". The deployment picks one at startup through
//! [`EntitlementsProvider`]; callers never branch on the policy per request.

use super::config::EntitlementsConfig;
use super::record::EntitlementStatus;
use super::storage::EntitlementStore;
use crate::billing::BillingProvider;
use crate::error::{KeelsonError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

pub const REASON_NO_SUBSCRIPTION: &str = "No active subscription found.";
pub const REASON_NOT_ACTIVE: &str = "Subscription is not active.";
pub const REASON_PLAN_EXCLUDES_ORG: &str = "Your plan does not include access to this organization.";

/// Outcome of a join check. Being denied is a normal result, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinDecision {
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl JoinDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

/// Decides whether a user may join or remain in an organization.
///
/// Errors mean the decision could not be made (store or billing outage) and
/// must not be read as "not entitled".
#[async_trait]
pub trait EntitlementsPolicy: Send + Sync {
    async fn can_join_org(&self, user_id: &str, org_slug: &str) -> Result<JoinDecision>;
}

fn validate_request(user_id: &str, org_slug: &str) -> Result<()> {
    if user_id.trim().is_empty() {
        return Err(KeelsonError::validation("User id is required."));
    }
    if org_slug.trim().is_empty() {
        return Err(KeelsonError::validation("Organization slug is required."));
    }
    Ok(())
}

/// Queries the billing provider at decision time.
pub struct LiveBillingPolicy<B: BillingProvider> {
    provider: Arc<B>,
}

impl<B: BillingProvider> LiveBillingPolicy<B> {
    pub fn new(provider: Arc<B>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<B: BillingProvider + 'static> EntitlementsPolicy for LiveBillingPolicy<B> {
    async fn can_join_org(&self, user_id: &str, org_slug: &str) -> Result<JoinDecision> {
        validate_request(user_id, org_slug)?;
        let org_slug = org_slug.trim();

        let subscriptions = self.provider.get_subscription_list(user_id.trim()).await?;
        let active: Vec<_> = subscriptions.iter().filter(|s| s.is_active()).collect();
        if active.is_empty() {
            return Ok(JoinDecision::deny(REASON_NO_SUBSCRIPTION));
        }

        for subscription in active {
            let Some(plan_id) = subscription.plan_id.as_deref() else {
                continue;
            };
            let Some(plan) = self.provider.find_plan(plan_id).await? else {
                debug!(
                    target: "keelson::entitlements::policy",
                    plan_id = %plan_id,
                    "Active subscription references unknown plan"
                );
                continue;
            };
            if plan.feature_slugs().iter().any(|f| f == org_slug) {
                return Ok(JoinDecision::allow());
            }
        }

        Ok(JoinDecision::deny(REASON_PLAN_EXCLUDES_ORG))
    }
}

/// Reads the webhook-maintained entitlement record.
pub struct CachedRecordPolicy<S: EntitlementStore> {
    store: Arc<S>,
}

impl<S: EntitlementStore> CachedRecordPolicy<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: EntitlementStore + 'static> EntitlementsPolicy for CachedRecordPolicy<S> {
    async fn can_join_org(&self, user_id: &str, org_slug: &str) -> Result<JoinDecision> {
        validate_request(user_id, org_slug)?;

        let Some(record) = self.store.get(user_id.trim()).await? else {
            return Ok(JoinDecision::deny(REASON_NO_SUBSCRIPTION));
        };
        if record.status != EntitlementStatus::Active {
            return Ok(JoinDecision::deny(REASON_NOT_ACTIVE));
        }
        if !record.features.iter().any(|f| f == org_slug.trim()) {
            return Ok(JoinDecision::deny(REASON_PLAN_EXCLUDES_ORG));
        }
        Ok(JoinDecision::allow())
    }
}

/// Allows everyone. For open deployments.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllPolicy;

#[async_trait]
impl EntitlementsPolicy for AllowAllPolicy {
    async fn can_join_org(&self, _user_id: &str, _org_slug: &str) -> Result<JoinDecision> {
        Ok(JoinDecision::allow())
    }
}

/// Which policy a deployment uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    Live,
    Cached,
    AllowAll,
}

impl PolicyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Cached => "cached",
            Self::AllowAll => "allow_all",
        }
    }
}

impl FromStr for PolicyKind {
    type Err = KeelsonError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "live" | "billing" => Ok(Self::Live),
            "cached" | "webhook" | "record" => Ok(Self::Cached),
            "allow_all" | "allow-all" | "none" => Ok(Self::AllowAll),
            other => Err(KeelsonError::validation(format!(
                "Unknown entitlements policy '{}'. Must be one of: live, cached, allow_all",
                other
            ))),
        }
    }
}

/// The configured policy, chosen once at startup.
pub enum EntitlementsProvider<S: EntitlementStore, B: BillingProvider> {
    Live(LiveBillingPolicy<B>),
    Cached(CachedRecordPolicy<S>),
    AllowAll(AllowAllPolicy),
}

impl<S: EntitlementStore, B: BillingProvider> EntitlementsProvider<S, B> {
    pub fn from_kind(kind: PolicyKind, store: Arc<S>, provider: Arc<B>) -> Self {
        match kind {
            PolicyKind::Live => Self::Live(LiveBillingPolicy::new(provider)),
            PolicyKind::Cached => Self::Cached(CachedRecordPolicy::new(store)),
            PolicyKind::AllowAll => Self::AllowAll(AllowAllPolicy),
        }
    }

    /// Select the policy named by `config`. Unknown names are rejected.
    pub fn from_config(config: &EntitlementsConfig, store: Arc<S>, provider: Arc<B>) -> Result<Self> {
        Ok(Self::from_kind(config.policy_kind()?, store, provider))
    }

    pub fn kind(&self) -> PolicyKind {
        match self {
            Self::Live(_) => PolicyKind::Live,
            Self::Cached(_) => PolicyKind::Cached,
            Self::AllowAll(_) => PolicyKind::AllowAll,
        }
    }
}

#[async_trait]
impl<S, B> EntitlementsPolicy for EntitlementsProvider<S, B>
where
    S: EntitlementStore + 'static,
    B: BillingProvider + 'static,
{
    async fn can_join_org(&self, user_id: &str, org_slug: &str) -> Result<JoinDecision> {
        match self {
            Self::Live(policy) => policy.can_join_org(user_id, org_slug).await,
            Self::Cached(policy) => policy.can_join_org(user_id, org_slug).await,
            Self::AllowAll(policy) => policy.can_join_org(user_id, org_slug).await,
        }
    }
}
