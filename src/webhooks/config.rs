use crate::utils::{get_env_with_prefix, parse_env_with_prefix};
use secrecy::SecretString;
use std::time::Duration;

/// Configuration for the billing webhook endpoint.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Svix signing secret (`whsec_...`). Requests are refused while unset.
    pub signing_secret: Option<SecretString>,
    /// Maximum accepted distance between `svix-timestamp` and now, in seconds.
    pub tolerance_seconds: u64,
    /// Overall budget for reconciling one delivery, in seconds.
    pub deadline_seconds: u64,
    /// How long processed delivery ids are remembered, in seconds.
    pub idempotency_retention_seconds: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            signing_secret: None,
            tolerance_seconds: default_tolerance_seconds(),
            deadline_seconds: default_deadline_seconds(),
            idempotency_retention_seconds: 24 * 60 * 60,
        }
    }
}

impl WebhookConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn signing_secret(mut self, secret: impl Into<SecretString>) -> Self {
        self.signing_secret = Some(secret.into());
        self
    }

    #[must_use]
    pub fn tolerance_seconds(mut self, seconds: u64) -> Self {
        self.tolerance_seconds = seconds;
        self
    }

    #[must_use]
    pub fn deadline_seconds(mut self, seconds: u64) -> Self {
        self.deadline_seconds = seconds;
        self
    }

    pub fn tolerance(&self) -> Duration {
        Duration::from_secs(self.tolerance_seconds)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_seconds)
    }

    pub fn idempotency_retention(&self) -> Duration {
        Duration::from_secs(self.idempotency_retention_seconds)
    }

    /// Load webhook configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(secret) = get_env_with_prefix("WEBHOOK_SIGNING_SECRET").filter(|s| !s.is_empty()) {
            config.signing_secret = Some(SecretString::from(secret));
        }
        if let Some(seconds) = parse_env_with_prefix("WEBHOOK_TOLERANCE_SECONDS") {
            config.tolerance_seconds = seconds;
        }
        if let Some(seconds) = parse_env_with_prefix("WEBHOOK_DEADLINE_SECONDS") {
            config.deadline_seconds = seconds;
        }

        config
    }
}

fn default_tolerance_seconds() -> u64 {
    300
}

fn default_deadline_seconds() -> u64 {
    25
}
