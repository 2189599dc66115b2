//! Billing provider abstraction.
//!
//! The provider is consumed as an external capability: list a user's
//! subscriptions, look up plans, and manage organization memberships.

use super::types::{Organization, Plan, Subscription};
use crate::error::Result;
use async_trait::async_trait;

/// Operations the entitlements core needs from the billing/identity provider.
///
/// # Example
///
/// ```rust,ignore
/// use keelson::billing::{BillingProvider, Organization, Plan, Subscription};
/// use keelson::Result;
/// use async_trait::async_trait;
///
/// struct MyProvider { /* ... */ }
///
/// #[async_trait]
/// impl BillingProvider for MyProvider {
///     async fn get_subscription_list(&self, user_id: &str) -> Result<Vec<Subscription>> {
///         // Query your provider
///         todo!()
///     }
///     // ... remaining methods
/// }
/// ```
#[async_trait]
pub trait BillingProvider: Send + Sync {
    /// All subscriptions (any status) for a user.
    async fn get_subscription_list(&self, user_id: &str) -> Result<Vec<Subscription>>;

    /// Direct single-plan lookup. Only called when
    /// [`supports_plan_lookup`](Self::supports_plan_lookup) is true.
    async fn get_plan(&self, plan_id: &str) -> Result<Option<Plan>>;

    /// Every plan the provider knows about.
    async fn get_plan_list(&self) -> Result<Vec<Plan>>;

    /// Look up an organization by slug.
    async fn get_organization(&self, slug: &str) -> Result<Option<Organization>>;

    /// Add a user to an organization with the given role.
    async fn create_organization_membership(
        &self,
        organization_id: &str,
        user_id: &str,
        role: &str,
    ) -> Result<()>;

    /// Remove a user from an organization.
    async fn delete_organization_membership(&self, organization_id: &str, user_id: &str)
    -> Result<()>;

    /// Whether [`get_plan`](Self::get_plan) is available. Providers without a
    /// single-plan endpoint return false and callers scan the plan list.
    fn supports_plan_lookup(&self) -> bool {
        true
    }

    /// Resolve a plan by id, preferring the direct lookup and falling back to
    /// scanning the full plan list.
    async fn find_plan(&self, plan_id: &str) -> Result<Option<Plan>> {
        if self.supports_plan_lookup() {
            return self.get_plan(plan_id).await;
        }
        let plans = self.get_plan_list().await?;
        Ok(plans.into_iter().find(|plan| plan.id == plan_id))
    }
}

/// In-memory billing provider for testing.
#[cfg(any(test, feature = "test-helpers"))]
pub mod test {
    use super::*;
    use crate::error::KeelsonError;
    use std::collections::{HashMap, HashSet, VecDeque};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex, RwLock};
    use tokio::time::Instant;

    #[derive(Default)]
    struct MockBillingProviderInner {
        /// Scripted subscription list responses per user. The last response
        /// is repeated once the queue is down to one entry.
        subscriptions: RwLock<HashMap<String, VecDeque<Vec<Subscription>>>>,
        plans: RwLock<Vec<Plan>>,
        plan_lookup_disabled: AtomicBool,
        organizations: RwLock<HashMap<String, Organization>>,
        memberships: RwLock<HashMap<(String, String), String>>,
        failing_organizations: RwLock<HashSet<String>>,
        fail_subscription_list: AtomicBool,
        subscription_list_calls: Mutex<Vec<Instant>>,
        plan_calls: AtomicUsize,
        plan_list_calls: AtomicUsize,
        delete_membership_calls: AtomicUsize,
    }

    /// Mock billing provider with scripted responses and call tracking.
    ///
    /// Cloning shares the same underlying data.
    #[derive(Default, Clone)]
    pub struct MockBillingProvider {
        inner: Arc<MockBillingProviderInner>,
    }

    impl MockBillingProvider {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Always return `subscriptions` for this user.
        pub fn set_subscriptions(&self, user_id: &str, subscriptions: Vec<Subscription>) {
            let mut map = self.inner.subscriptions.write().unwrap();
            map.insert(user_id.to_string(), VecDeque::from([subscriptions]));
        }

        /// Return each response in order on successive calls, repeating the last.
        pub fn script_subscriptions(&self, user_id: &str, responses: Vec<Vec<Subscription>>) {
            let mut map = self.inner.subscriptions.write().unwrap();
            map.insert(user_id.to_string(), responses.into_iter().collect());
        }

        pub fn add_plan(&self, plan: Plan) {
            self.inner.plans.write().unwrap().push(plan);
        }

        /// Simulate a provider without a single-plan endpoint.
        pub fn disable_plan_lookup(&self) {
            self.inner.plan_lookup_disabled.store(true, Ordering::SeqCst);
        }

        pub fn add_organization(&self, organization: Organization) {
            self.inner
                .organizations
                .write()
                .unwrap()
                .insert(organization.slug.clone(), organization);
        }

        pub fn add_membership(&self, organization_id: &str, user_id: &str, role: &str) {
            self.inner.memberships.write().unwrap().insert(
                (organization_id.to_string(), user_id.to_string()),
                role.to_string(),
            );
        }

        /// Make membership deletion fail for this organization id.
        pub fn fail_membership_deletes_for(&self, organization_id: &str) {
            self.inner
                .failing_organizations
                .write()
                .unwrap()
                .insert(organization_id.to_string());
        }

        pub fn set_fail_subscription_list(&self, fail: bool) {
            self.inner.fail_subscription_list.store(fail, Ordering::SeqCst);
        }

        pub fn has_membership(&self, organization_id: &str, user_id: &str) -> bool {
            self.membership_role(organization_id, user_id).is_some()
        }

        pub fn membership_role(&self, organization_id: &str, user_id: &str) -> Option<String> {
            self.inner
                .memberships
                .read()
                .unwrap()
                .get(&(organization_id.to_string(), user_id.to_string()))
                .cloned()
        }

        /// Instants at which the subscription list was requested.
        pub fn subscription_list_calls(&self) -> Vec<Instant> {
            self.inner.subscription_list_calls.lock().unwrap().clone()
        }

        pub fn plan_calls(&self) -> usize {
            self.inner.plan_calls.load(Ordering::SeqCst)
        }

        pub fn plan_list_calls(&self) -> usize {
            self.inner.plan_list_calls.load(Ordering::SeqCst)
        }

        pub fn delete_membership_calls(&self) -> usize {
            self.inner.delete_membership_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BillingProvider for MockBillingProvider {
        async fn get_subscription_list(&self, user_id: &str) -> Result<Vec<Subscription>> {
            self.inner
                .subscription_list_calls
                .lock()
                .unwrap()
                .push(Instant::now());

            if self.inner.fail_subscription_list.load(Ordering::SeqCst) {
                return Err(KeelsonError::service_unavailable("billing API unreachable"));
            }

            let mut map = self.inner.subscriptions.write().unwrap();
            let Some(queue) = map.get_mut(user_id) else {
                return Ok(Vec::new());
            };
            let response = if queue.len() > 1 {
                queue.pop_front().unwrap_or_default()
            } else {
                queue.front().cloned().unwrap_or_default()
            };
            Ok(response)
        }

        async fn get_plan(&self, plan_id: &str) -> Result<Option<Plan>> {
            self.inner.plan_calls.fetch_add(1, Ordering::SeqCst);
            let plans = self.inner.plans.read().unwrap();
            Ok(plans.iter().find(|plan| plan.id == plan_id).cloned())
        }

        async fn get_plan_list(&self) -> Result<Vec<Plan>> {
            self.inner.plan_list_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.inner.plans.read().unwrap().clone())
        }

        async fn get_organization(&self, slug: &str) -> Result<Option<Organization>> {
            Ok(self.inner.organizations.read().unwrap().get(slug).cloned())
        }

        async fn create_organization_membership(
            &self,
            organization_id: &str,
            user_id: &str,
            role: &str,
        ) -> Result<()> {
            self.add_membership(organization_id, user_id, role);
            Ok(())
        }

        async fn delete_organization_membership(
            &self,
            organization_id: &str,
            user_id: &str,
        ) -> Result<()> {
            self.inner
                .delete_membership_calls
                .fetch_add(1, Ordering::SeqCst);

            if self
                .inner
                .failing_organizations
                .read()
                .unwrap()
                .contains(organization_id)
            {
                return Err(KeelsonError::service_unavailable(format!(
                    "membership service failed for {}",
                    organization_id
                )));
            }

            let removed = self
                .inner
                .memberships
                .write()
                .unwrap()
                .remove(&(organization_id.to_string(), user_id.to_string()));
            if removed.is_none() {
                return Err(KeelsonError::not_found("Membership not found"));
            }
            Ok(())
        }

        fn supports_plan_lookup(&self) -> bool {
            !self.inner.plan_lookup_disabled.load(Ordering::SeqCst)
        }
    }
}
