//! Per-user entitlement records and their status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Entitlement status derived from the provider's subscription status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntitlementStatus {
    Active,
    Inactive,
    PastDue,
    Canceled,
    Ended,
    Incomplete,
    Upcoming,
    Abandoned,
}

impl EntitlementStatus {
    /// Map a provider status string. Unknown values become `Inactive`.
    pub fn from_provider(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "active" => Self::Active,
            "past_due" => Self::PastDue,
            "canceled" | "cancelled" => Self::Canceled,
            "ended" => Self::Ended,
            "incomplete" => Self::Incomplete,
            "upcoming" => Self::Upcoming,
            "abandoned" => Self::Abandoned,
            _ => Self::Inactive,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::PastDue => "past_due",
            Self::Canceled => "canceled",
            Self::Ended => "ended",
            Self::Incomplete => "incomplete",
            Self::Upcoming => "upcoming",
            Self::Abandoned => "abandoned",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Statuses after which access is gone for good and memberships are revoked.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ended)
    }
}

impl std::fmt::Display for EntitlementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for EntitlementStatus {
    fn from(value: String) -> Self {
        Self::from_provider(&value)
    }
}

impl From<EntitlementStatus> for String {
    fn from(value: EntitlementStatus) -> Self {
        value.as_str().to_string()
    }
}

/// The current entitlement of one user.
///
/// Overwritten wholesale on every upsert; there is no merge with a prior record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementRecord {
    pub user_id: String,
    pub status: EntitlementStatus,
    pub plan_id: Option<String>,
    pub plan_slug: Option<String>,
    pub plan_name: Option<String>,
    pub features: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl EntitlementRecord {
    /// Record for a user with no access.
    pub fn inactive(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            status: EntitlementStatus::Inactive,
            plan_id: None,
            plan_slug: None,
            plan_name: None,
            features: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn grants(&self, feature: &str) -> bool {
        self.status.is_active() && self.features.iter().any(|f| f == feature)
    }
}
