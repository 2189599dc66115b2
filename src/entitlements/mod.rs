//! Entitlements: who may join which organization.
//!
//! Billing webhooks and admin backfills are reconciled into one
//! [`EntitlementRecord`] per user. Join decisions read that record, or the
//! billing provider directly, depending on the configured policy. When a
//! subscription ends, memberships for the lost features are revoked.
//!
//! # Example
//!
//! ```rust,ignore
//! use keelson::entitlements::{BillingReconciler, EntitlementsPolicy, EntitlementsProvider, PolicyKind};
//! use std::sync::Arc;
//!
//! let reconciler = BillingReconciler::new(store.clone(), billing.clone());
//! reconciler.backfill("user_123").await?;
//!
//! let policy = EntitlementsProvider::from_kind(PolicyKind::Cached, store, billing);
//! let decision = policy.can_join_org("user_123", "app-1").await?;
//! ```

mod config;
mod join;
mod policy;
mod reconciler;
mod record;
mod revocation;
mod storage;

pub use config::EntitlementsConfig;
pub use join::{JoinFlow, JoinResult};
pub use policy::{
    AllowAllPolicy, CachedRecordPolicy, EntitlementsPolicy, EntitlementsProvider, JoinDecision,
    LiveBillingPolicy, PolicyKind, REASON_NO_SUBSCRIPTION, REASON_NOT_ACTIVE,
    REASON_PLAN_EXCLUDES_ORG,
};
pub use reconciler::{BillingReconciler, DEFAULT_RETRY_DELAY, ReconcileOutcome, SubscriptionItemEvent};
pub use record::{EntitlementRecord, EntitlementStatus};
pub use revocation::{MembershipRevoker, RevocationReport, feature_to_org_slug};
pub use storage::EntitlementStore;

#[cfg(any(test, feature = "test-helpers"))]
pub use storage::test::InMemoryEntitlementStore;
