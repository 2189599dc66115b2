use super::policy::PolicyKind;
use crate::error::Result;
use crate::utils::{get_env_with_prefix, parse_env_with_prefix};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Entitlements configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EntitlementsConfig {
    /// Join policy: "live", "cached" or "allow_all"
    #[serde(default = "default_policy")]
    pub policy: String,

    /// Delay before re-querying subscriptions when none are active yet
    #[serde(default = "default_reconcile_retry_delay_ms")]
    pub reconcile_retry_delay_ms: u64,
}

impl Default for EntitlementsConfig {
    fn default() -> Self {
        Self {
            policy: default_policy(),
            reconcile_retry_delay_ms: default_reconcile_retry_delay_ms(),
        }
    }
}

impl EntitlementsConfig {
    /// Parsed policy kind.
    pub fn policy_kind(&self) -> Result<PolicyKind> {
        self.policy.parse()
    }

    pub fn reconcile_retry_delay(&self) -> Duration {
        Duration::from_millis(self.reconcile_retry_delay_ms)
    }

    /// Load entitlements configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(policy) = get_env_with_prefix("ENTITLEMENTS_POLICY") {
            config.policy = policy;
        }
        if let Some(delay) = parse_env_with_prefix("RECONCILE_RETRY_DELAY_MS") {
            config.reconcile_retry_delay_ms = delay;
        }

        config
    }
}

fn default_policy() -> String {
    "cached".to_string()
}

fn default_reconcile_retry_delay_ms() -> u64 {
    2_000
}
