//! Organization join flow gated by the configured entitlements policy.

use super::policy::{EntitlementsPolicy, EntitlementsProvider};
use super::storage::EntitlementStore;
use crate::auth::{CallerContext, MEMBER_ROLE};
use crate::billing::{BillingProvider, Organization};
use crate::error::{KeelsonError, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};

/// A membership created by the join flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinResult {
    pub organization: Organization,
    pub role: String,
}

/// Lets an entitled user add themselves to an organization.
pub struct JoinFlow<S: EntitlementStore, B: BillingProvider> {
    policy: Arc<EntitlementsProvider<S, B>>,
    provider: Arc<B>,
}

impl<S, B> JoinFlow<S, B>
where
    S: EntitlementStore + 'static,
    B: BillingProvider + 'static,
{
    pub fn new(policy: Arc<EntitlementsProvider<S, B>>, provider: Arc<B>) -> Self {
        Self { policy, provider }
    }

    /// Join `org_slug` as a member.
    ///
    /// A policy denial becomes `Forbidden` with the policy's reason.
    #[instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn join(&self, caller: &CallerContext, org_slug: &str) -> Result<JoinResult> {
        let org_slug = org_slug.trim();
        let decision = self.policy.can_join_org(&caller.user_id, org_slug).await?;
        if !decision.allowed {
            let reason = decision
                .reason
                .unwrap_or_else(|| "You are not entitled to join this organization.".to_string());
            return Err(KeelsonError::forbidden(reason));
        }

        let organization = self
            .provider
            .get_organization(org_slug)
            .await?
            .ok_or_else(|| KeelsonError::not_found("Organization not found."))?;

        self.provider
            .create_organization_membership(&organization.id, &caller.user_id, MEMBER_ROLE)
            .await?;

        info!(
            target: "keelson::entitlements::join",
            org_id = %organization.id,
            org_slug = %organization.slug,
            "User joined organization"
        );

        Ok(JoinResult {
            organization,
            role: MEMBER_ROLE.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::MockBillingProvider;
    use crate::entitlements::storage::test::InMemoryEntitlementStore;
    use crate::entitlements::{EntitlementRecord, EntitlementStatus, PolicyKind};

    fn create_test_flow(
        kind: PolicyKind,
    ) -> (
        JoinFlow<InMemoryEntitlementStore, MockBillingProvider>,
        InMemoryEntitlementStore,
        MockBillingProvider,
    ) {
        let store = InMemoryEntitlementStore::new();
        let provider = MockBillingProvider::new();
        provider.add_organization(Organization::new("org_1", "app-1"));
        let billing = Arc::new(provider.clone());
        let policy = Arc::new(EntitlementsProvider::from_kind(
            kind,
            Arc::new(store.clone()),
            billing.clone(),
        ));
        (JoinFlow::new(policy, billing), store, provider)
    }

    #[tokio::test]
    async fn test_entitled_user_joins_as_member() {
        let (flow, store, provider) = create_test_flow(PolicyKind::Cached);
        let mut record = EntitlementRecord::inactive("user_1");
        record.status = EntitlementStatus::Active;
        record.features = vec!["app-1".to_string()];
        store.insert(record);

        let result = flow.join(&CallerContext::new("user_1"), "app-1").await.unwrap();

        assert_eq!(result.organization.id, "org_1");
        assert_eq!(result.role, "org:member");
        assert_eq!(
            provider.membership_role("org_1", "user_1").as_deref(),
            Some("org:member")
        );
    }

    #[tokio::test]
    async fn test_denied_user_gets_forbidden_with_reason() {
        let (flow, _store, provider) = create_test_flow(PolicyKind::Cached);

        let err = flow.join(&CallerContext::new("user_1"), "app-1").await.unwrap_err();

        match err {
            KeelsonError::Forbidden(reason) => assert_eq!(reason, "No active subscription found."),
            other => panic!("expected Forbidden, got {other:?}"),
        }
        assert!(!provider.has_membership("org_1", "user_1"));
    }

    #[tokio::test]
    async fn test_unknown_organization_is_not_found() {
        let (flow, _store, _provider) = create_test_flow(PolicyKind::AllowAll);

        let err = flow.join(&CallerContext::new("user_1"), "nope").await.unwrap_err();
        assert!(matches!(err, KeelsonError::NotFound(_)));
    }
}
