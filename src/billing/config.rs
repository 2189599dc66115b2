use crate::utils::{get_env_with_prefix, parse_env_with_prefix};
use secrecy::SecretString;

/// Configuration for the billing provider client.
#[derive(Debug, Clone)]
pub struct BillingConfig {
    /// Base URL of the provider's REST API.
    pub api_url: String,
    /// Secret API key sent as a bearer token.
    pub secret_key: Option<SecretString>,
    /// Maximum number of retry attempts for transient failures.
    pub max_retries: u32,
    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,
    /// Maximum delay between retries in milliseconds.
    pub max_delay_ms: u64,
    /// Per-attempt request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            secret_key: None,
            max_retries: 3,
            base_delay_ms: 250,
            max_delay_ms: 5_000,
            timeout_seconds: 10,
        }
    }
}

impl BillingConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    #[must_use]
    pub fn secret_key(mut self, key: impl Into<SecretString>) -> Self {
        self.secret_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    #[must_use]
    pub fn base_delay_ms(mut self, ms: u64) -> Self {
        self.base_delay_ms = ms;
        self
    }

    #[must_use]
    pub fn max_delay_ms(mut self, ms: u64) -> Self {
        self.max_delay_ms = ms;
        self
    }

    #[must_use]
    pub fn timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Load billing client configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(url) = get_env_with_prefix("BILLING_API_URL") {
            config.api_url = url;
        }
        if let Some(key) = get_env_with_prefix("BILLING_SECRET_KEY").filter(|k| !k.is_empty()) {
            config.secret_key = Some(SecretString::from(key));
        }
        if let Some(retries) = parse_env_with_prefix("BILLING_MAX_RETRIES") {
            config.max_retries = retries;
        }
        if let Some(timeout) = parse_env_with_prefix("BILLING_TIMEOUT_SECONDS") {
            config.timeout_seconds = timeout;
        }

        config
    }
}

fn default_api_url() -> String {
    "https://api.clerk.com/v1".to_string()
}
