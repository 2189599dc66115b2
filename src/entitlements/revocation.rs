//! Membership revocation on subscription termination.
//!
//! Each lost feature maps to an organization slug. Lookups and removals fan
//! out concurrently and every organization is attempted regardless of how
//! the others fare.

use crate::billing::BillingProvider;
use crate::error::KeelsonError;
use futures::future::join_all;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Organization slug for a feature slug: underscores become hyphens.
pub fn feature_to_org_slug(feature: &str) -> String {
    feature.trim().replace('_', "-")
}

/// Per-organization results of a revocation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RevocationReport {
    /// Slugs whose membership was removed.
    pub removed: Vec<String>,
    /// Slugs with no matching organization or no membership to remove.
    pub skipped: Vec<String>,
    /// Slugs where the lookup or removal failed.
    pub failed: Vec<String>,
}

impl RevocationReport {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.skipped.is_empty() && self.failed.is_empty()
    }
}

enum SlugOutcome {
    Removed,
    Skipped,
    Failed,
}

/// Removes a user's organization memberships for features they lost.
pub struct MembershipRevoker<B: BillingProvider> {
    provider: Arc<B>,
}

impl<B: BillingProvider> Clone for MembershipRevoker<B> {
    fn clone(&self) -> Self {
        Self {
            provider: self.provider.clone(),
        }
    }
}

impl<B: BillingProvider> MembershipRevoker<B> {
    pub fn new(provider: Arc<B>) -> Self {
        Self { provider }
    }

    /// Revoke memberships for each organization mapped from `features`.
    ///
    /// No-op when the user id is blank or there are no features. Failures are
    /// logged per organization and reported, never raised.
    #[instrument(skip(self, features), fields(feature_count = features.len()))]
    pub async fn revoke(&self, user_id: &str, features: &[String]) -> RevocationReport {
        let user_id = user_id.trim();
        if user_id.is_empty() || features.is_empty() {
            return RevocationReport::default();
        }

        let mut seen = HashSet::new();
        let slugs: Vec<String> = features
            .iter()
            .map(|feature| feature_to_org_slug(feature))
            .filter(|slug| !slug.is_empty() && seen.insert(slug.clone()))
            .collect();

        let tasks = slugs.into_iter().map(|slug| async move {
            let outcome = self.revoke_one(user_id, &slug).await;
            (slug, outcome)
        });

        let mut report = RevocationReport::default();
        for (slug, outcome) in join_all(tasks).await {
            match outcome {
                SlugOutcome::Removed => report.removed.push(slug),
                SlugOutcome::Skipped => report.skipped.push(slug),
                SlugOutcome::Failed => report.failed.push(slug),
            }
        }

        info!(
            target: "keelson::entitlements::revocation",
            user_id = %user_id,
            removed = report.removed.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Membership revocation finished"
        );
        report
    }

    async fn revoke_one(&self, user_id: &str, slug: &str) -> SlugOutcome {
        let organization = match self.provider.get_organization(slug).await {
            Ok(Some(organization)) => organization,
            Ok(None) => return SlugOutcome::Skipped,
            Err(e) => {
                warn!(
                    target: "keelson::entitlements::revocation",
                    user_id = %user_id,
                    org_slug = %slug,
                    error = %e,
                    "Failed to look up organization for revocation"
                );
                return SlugOutcome::Failed;
            }
        };

        match self
            .provider
            .delete_organization_membership(&organization.id, user_id)
            .await
        {
            Ok(()) => SlugOutcome::Removed,
            Err(KeelsonError::NotFound(_)) => SlugOutcome::Skipped,
            Err(e) => {
                warn!(
                    target: "keelson::entitlements::revocation",
                    user_id = %user_id,
                    org_slug = %slug,
                    org_id = %organization.id,
                    error = %e,
                    "Failed to remove organization membership"
                );
                SlugOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::{MockBillingProvider, Organization};

    fn features(slugs: &[&str]) -> Vec<String> {
        slugs.iter().map(|s| s.to_string()).collect()
    }

    fn create_test_revoker() -> (MembershipRevoker<MockBillingProvider>, MockBillingProvider) {
        let provider = MockBillingProvider::new();
        provider.add_organization(Organization::new("org_1", "app-1"));
        provider.add_organization(Organization::new("org_2", "app-2"));
        provider.add_organization(Organization::new("org_3", "app-3"));
        (MembershipRevoker::new(Arc::new(provider.clone())), provider)
    }

    #[test]
    fn test_feature_to_org_slug() {
        assert_eq!(feature_to_org_slug("app_1"), "app-1");
        assert_eq!(feature_to_org_slug("my_big_app"), "my-big-app");
        assert_eq!(feature_to_org_slug("already-hyphenated"), "already-hyphenated");
    }

    #[tokio::test]
    async fn test_revokes_each_mapped_organization() {
        let (revoker, provider) = create_test_revoker();
        provider.add_membership("org_1", "user_1", "org:member");
        provider.add_membership("org_2", "user_1", "org:member");

        let report = revoker.revoke("user_1", &features(&["app_1", "app-2"])).await;

        assert_eq!(report.removed, vec!["app-1", "app-2"]);
        assert!(report.failed.is_empty());
        assert!(!provider.has_membership("org_1", "user_1"));
        assert!(!provider.has_membership("org_2", "user_1"));
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_other_organizations() {
        let (revoker, provider) = create_test_revoker();
        provider.add_membership("org_1", "user_1", "org:member");
        provider.add_membership("org_2", "user_1", "org:member");
        provider.add_membership("org_3", "user_1", "org:member");
        provider.fail_membership_deletes_for("org_2");

        let report = revoker
            .revoke("user_1", &features(&["app-1", "app-2", "app-3"]))
            .await;

        assert_eq!(report.removed, vec!["app-1", "app-3"]);
        assert_eq!(report.failed, vec!["app-2"]);
        assert!(!provider.has_membership("org_1", "user_1"));
        assert!(provider.has_membership("org_2", "user_1"));
        assert!(!provider.has_membership("org_3", "user_1"));
    }

    #[tokio::test]
    async fn test_unknown_organizations_and_missing_memberships_are_skipped() {
        let (revoker, provider) = create_test_revoker();

        let report = revoker
            .revoke("user_1", &features(&["does-not-exist", "app-1"]))
            .await;

        assert!(report.removed.is_empty());
        assert_eq!(report.skipped, vec!["does-not-exist", "app-1"]);
        assert_eq!(provider.delete_membership_calls(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_slugs_attempted_once() {
        let (revoker, provider) = create_test_revoker();
        provider.add_membership("org_1", "user_1", "org:member");

        let report = revoker
            .revoke("user_1", &features(&["app_1", "app-1", "app_1"]))
            .await;

        assert_eq!(report.removed, vec!["app-1"]);
        assert_eq!(provider.delete_membership_calls(), 1);
    }

    #[tokio::test]
    async fn test_noop_for_blank_user_or_empty_features() {
        let (revoker, provider) = create_test_revoker();
        provider.add_membership("org_1", "user_1", "org:member");

        assert!(revoker.revoke("  ", &features(&["app-1"])).await.is_empty());
        assert!(revoker.revoke("user_1", &[]).await.is_empty());
        assert_eq!(provider.delete_membership_calls(), 0);
        assert!(provider.has_membership("org_1", "user_1"));
    }
}
