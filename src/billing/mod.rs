//! Billing provider integration.
//!
//! Read-only views of subscriptions and plans, feature normalization, and
//! the provider abstraction used by the entitlements core.
//!
//! # Example
//!
//! ```rust,ignore
//! use keelson::billing::{BillingConfig, BillingProvider, LiveBillingClient};
//!
//! let client = LiveBillingClient::new(BillingConfig::from_env())?;
//!
//! let subscriptions = client.get_subscription_list("user_123").await?;
//! for sub in subscriptions.iter().filter(|s| s.is_active()) {
//!     if let Some(plan_id) = &sub.plan_id {
//!         let plan = client.find_plan(plan_id).await?;
//!         println!("{:?}", plan.map(|p| p.feature_slugs()));
//!     }
//! }
//! ```

pub mod config;
pub mod error;
pub mod features;
pub mod live_client;
pub mod provider;
pub mod types;

pub use config::BillingConfig;
pub use error::BillingError;
pub use features::{FeatureRef, normalize_features};
pub use live_client::LiveBillingClient;
pub use provider::BillingProvider;
pub use types::{BillingEvent, Organization, Plan, STATUS_ACTIVE, Subscription};

#[cfg(any(test, feature = "test-helpers"))]
pub use provider::test::MockBillingProvider;
