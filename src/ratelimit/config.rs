use crate::utils::{flag_env_with_prefix, parse_env_with_prefix};
use serde::{Deserialize, Serialize};

/// Fixed-window rate limiting configuration for write paths
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Whether rate limiting is enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Maximum number of requests allowed per key per window
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    /// Window length in seconds
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,

    /// Trust X-Forwarded-For / X-Real-IP for client IP detection
    ///
    /// **SECURITY WARNING**: Only enable this behind a reverse proxy that
    /// overwrites these headers. Otherwise clients can pick their own key
    /// and sidestep the limit.
    ///
    /// Default: `false`
    #[serde(default)]
    pub trust_proxy: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_requests: default_max_requests(),
            window_seconds: default_window_seconds(),
            trust_proxy: false,
        }
    }
}

impl RateLimitConfig {
    /// Create a new RateLimitConfig builder
    pub fn builder() -> RateLimitConfigBuilder {
        RateLimitConfigBuilder::new()
    }

    /// Load rate limit configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(enabled) = flag_env_with_prefix("RATE_LIMIT_ENABLED") {
            config.enabled = enabled;
        }
        if let Some(max_requests) = parse_env_with_prefix("RATE_LIMIT_MAX_REQUESTS") {
            config.max_requests = max_requests;
        }
        if let Some(window) = parse_env_with_prefix("RATE_LIMIT_WINDOW_SECONDS") {
            config.window_seconds = window;
        }
        if let Some(trust_proxy) = flag_env_with_prefix("RATE_LIMIT_TRUST_PROXY") {
            config.trust_proxy = trust_proxy;
        }

        config
    }
}

/// Builder for RateLimitConfig
#[must_use = "builder does nothing until you call build()"]
pub struct RateLimitConfigBuilder {
    config: RateLimitConfig,
}

impl RateLimitConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: RateLimitConfig::default(),
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    pub fn max_requests(mut self, max: u32) -> Self {
        self.config.max_requests = max;
        self
    }

    pub fn window_seconds(mut self, seconds: u64) -> Self {
        self.config.window_seconds = seconds;
        self
    }

    /// Trust proxy headers for client IP detection.
    ///
    /// See [`RateLimitConfig::trust_proxy`] for details.
    pub fn trust_proxy(mut self, trust: bool) -> Self {
        self.config.trust_proxy = trust;
        self
    }

    pub fn build(self) -> RateLimitConfig {
        self.config
    }
}

impl Default for RateLimitConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn default_enabled() -> bool {
    true
}

fn default_max_requests() -> u32 {
    30
}

fn default_window_seconds() -> u64 {
    60
}
