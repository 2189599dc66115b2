use serde::{Deserialize, Serialize};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::billing::BillingConfig;
use crate::entitlements::EntitlementsConfig;
use crate::error::{KeelsonError, Result};
use crate::ratelimit::RateLimitConfig;
use crate::utils::{flag_env_with_prefix, get_env_with_prefix};
use crate::webhooks::WebhookConfig;

/// Main configuration for a Keelson deployment
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub entitlements: EntitlementsConfig,
    pub webhook: WebhookConfig,
    pub billing: BillingConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_json")]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: default_json(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_json() -> bool {
    false
}

/// Builder for Config with environment variable support
#[must_use = "builder does nothing until you call build()"]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn with_json_logging(mut self, enabled: bool) -> Self {
        self.config.logging.json = enabled;
        self
    }

    pub fn with_entitlements(mut self, entitlements: EntitlementsConfig) -> Self {
        self.config.entitlements = entitlements;
        self
    }

    pub fn with_policy(mut self, policy: impl Into<String>) -> Self {
        self.config.entitlements.policy = policy.into();
        self
    }

    pub fn with_webhook(mut self, webhook: WebhookConfig) -> Self {
        self.config.webhook = webhook;
        self
    }

    pub fn with_billing(mut self, billing: BillingConfig) -> Self {
        self.config.billing = billing;
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.config.rate_limit = rate_limit;
        self
    }

    /// Load configuration from environment variables with KEELSON_ prefix.
    ///
    /// A `.env` file in the working directory is loaded first when present.
    pub fn from_env(mut self) -> Self {
        // A missing .env file is the common case.
        let _ = dotenvy::dotenv();

        if let Some(level) = get_env_with_prefix("LOG_LEVEL") {
            self.config.logging.level = level;
        }
        if let Some(json) = flag_env_with_prefix("LOG_JSON") {
            self.config.logging.json = json;
        }

        self.config.entitlements = EntitlementsConfig::from_env();
        self.config.webhook = WebhookConfig::from_env();
        self.config.billing = BillingConfig::from_env();
        self.config.rate_limit = RateLimitConfig::from_env();

        self
    }

    /// Build the configuration, validating all settings
    ///
    /// # Errors
    ///
    /// Returns a validation error for:
    /// - an invalid log level
    /// - an unknown entitlements policy
    /// - a zero webhook deadline
    /// - a zero rate limit window or request budget while rate limiting is enabled
    pub fn build(self) -> Result<Config> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.config.logging.level.to_lowercase().as_str()) {
            return Err(KeelsonError::validation(format!(
                "Invalid log level: {}. Must be one of: {}",
                self.config.logging.level,
                valid_log_levels.join(", ")
            )));
        }

        self.config.entitlements.policy_kind()?;

        if self.config.webhook.deadline_seconds == 0 {
            return Err(KeelsonError::validation(
                "Webhook deadline must be greater than 0",
            ));
        }

        if self.config.rate_limit.enabled {
            if self.config.rate_limit.max_requests == 0 {
                return Err(KeelsonError::validation(
                    "Rate limit max_requests must be greater than 0 when enabled",
                ));
            }
            if self.config.rate_limit.window_seconds == 0 {
                return Err(KeelsonError::validation(
                    "Rate limit window_seconds must be greater than 0 when enabled",
                ));
            }
        }

        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Initialize tracing from `RUST_LOG` (default `info`).
///
/// Set `KEELSON_LOG_JSON=true` for JSON output.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json_logs = flag_env_with_prefix("LOG_JSON").unwrap_or(false);
    install_subscriber(env_filter, json_logs);
}

/// Initialize tracing with a custom configuration
pub fn init_tracing_with_config(config: &Config) {
    let env_filter = EnvFilter::new(&config.logging.level);
    install_subscriber(env_filter, config.logging.json);
}

fn install_subscriber(env_filter: EnvFilter, json: bool) {
    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
