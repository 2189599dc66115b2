//! Shared application state for the HTTP layer.

use crate::auth::IdentityVerifier;
use crate::billing::BillingProvider;
use crate::config::Config;
use crate::content::{ContentManager, ContentStore};
use crate::entitlements::{BillingReconciler, EntitlementStore, EntitlementsProvider, JoinFlow};
use crate::error::Result;
use crate::ratelimit::FixedWindowRateLimiter;
use crate::webhooks::BillingWebhookHandler;
use axum::extract::FromRef;
use std::sync::Arc;

/// Everything the handlers need, wired once at startup.
///
/// `S` stores entitlement records, `C` stores content snapshots and `B` is
/// the billing provider.
pub struct AppState<S, C, B>
where
    S: EntitlementStore,
    C: ContentStore,
    B: BillingProvider,
{
    pub entitlements: Arc<S>,
    pub reconciler: Arc<BillingReconciler<S, B>>,
    pub policy: Arc<EntitlementsProvider<S, B>>,
    pub join: Arc<JoinFlow<S, B>>,
    pub webhook: Arc<BillingWebhookHandler<S, B>>,
    pub content: ContentManager<C>,
    pub identity: Arc<dyn IdentityVerifier>,
    pub limiter: Arc<FixedWindowRateLimiter>,
}

impl<S, C, B> Clone for AppState<S, C, B>
where
    S: EntitlementStore,
    C: ContentStore,
    B: BillingProvider,
{
    fn clone(&self) -> Self {
        Self {
            entitlements: self.entitlements.clone(),
            reconciler: self.reconciler.clone(),
            policy: self.policy.clone(),
            join: self.join.clone(),
            webhook: self.webhook.clone(),
            content: self.content.clone(),
            identity: self.identity.clone(),
            limiter: self.limiter.clone(),
        }
    }
}

impl<S, C, B> AppState<S, C, B>
where
    S: EntitlementStore + 'static,
    C: ContentStore + 'static,
    B: BillingProvider + 'static,
{
    /// Wire the core services from configuration.
    ///
    /// Fails on an unknown entitlements policy or an undecodable webhook
    /// signing secret.
    pub fn new(
        config: &Config,
        entitlements: Arc<S>,
        content: Arc<C>,
        billing: Arc<B>,
        identity: Arc<dyn IdentityVerifier>,
    ) -> Result<Self> {
        let reconciler = Arc::new(
            BillingReconciler::new(entitlements.clone(), billing.clone())
                .with_retry_delay(config.entitlements.reconcile_retry_delay()),
        );
        let policy = Arc::new(EntitlementsProvider::from_config(
            &config.entitlements,
            entitlements.clone(),
            billing.clone(),
        )?);
        let join = Arc::new(JoinFlow::new(policy.clone(), billing));
        let webhook = Arc::new(BillingWebhookHandler::from_config(
            reconciler.clone(),
            &config.webhook,
        )?);

        Ok(Self {
            entitlements,
            reconciler,
            policy,
            join,
            webhook,
            content: ContentManager::new(content),
            identity,
            limiter: Arc::new(FixedWindowRateLimiter::new(config.rate_limit.clone())),
        })
    }
}

impl<S, C, B> FromRef<AppState<S, C, B>> for Arc<FixedWindowRateLimiter>
where
    S: EntitlementStore,
    C: ContentStore,
    B: BillingProvider,
{
    fn from_ref(state: &AppState<S, C, B>) -> Self {
        state.limiter.clone()
    }
}

impl<S, C, B> FromRef<AppState<S, C, B>> for Arc<dyn IdentityVerifier>
where
    S: EntitlementStore,
    C: ContentStore,
    B: BillingProvider,
{
    fn from_ref(state: &AppState<S, C, B>) -> Self {
        state.identity.clone()
    }
}
