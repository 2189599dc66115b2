//! Read-only views of billing provider objects.

use super::features::{FeatureRef, normalize_features};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Subscription status value that counts as granting access.
pub const STATUS_ACTIVE: &str = "active";

/// A user's subscription (or subscription item) as reported by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    #[serde(default)]
    pub id: Option<String>,
    pub status: String,
    #[serde(default, alias = "planId")]
    pub plan_id: Option<String>,
    #[serde(default, alias = "planSlug")]
    pub plan_slug: Option<String>,
    #[serde(default, alias = "planName")]
    pub plan_name: Option<String>,
}

impl Subscription {
    pub fn new(status: impl Into<String>, plan_id: impl Into<String>) -> Self {
        Self {
            id: None,
            status: status.into(),
            plan_id: Some(plan_id.into()),
            plan_slug: None,
            plan_name: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == STATUS_ACTIVE
    }
}

/// A billing plan. Plans are the authoritative source of features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Raw feature list as returned by the provider.
    #[serde(default)]
    pub features: Value,
}

impl Plan {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            slug: None,
            name: None,
            features: Value::Array(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_features<I, F>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<FeatureRef>,
    {
        let refs: Vec<FeatureRef> = features.into_iter().map(Into::into).collect();
        self.features = serde_json::to_value(refs).unwrap_or(Value::Array(Vec::new()));
        self
    }

    /// Normalized feature slugs for this plan.
    pub fn feature_slugs(&self) -> Vec<String> {
        normalize_features(&self.features)
    }
}

/// An organization (tenant) known to the identity/billing provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub slug: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl Organization {
    pub fn new(id: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            slug: slug.into(),
            name: None,
        }
    }
}

/// A verified billing webhook event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: Value,
}

impl BillingEvent {
    pub fn new(event_type: impl Into<String>, data: Value) -> Self {
        Self {
            event_type: event_type.into(),
            data,
        }
    }

    /// Subscription item lifecycle events drive reconciliation.
    pub fn is_subscription_item(&self) -> bool {
        self.event_type.starts_with("subscriptionItem.")
    }
}
