//! Fixed-window limiter keyed by tenant, client IP and action.
//!
//! Counters are process-local. Each key gets a window that starts on its
//! first request and resets once the window length has elapsed. Suitable
//! for single-instance or best-effort throttling only.

use super::config::RateLimitConfig;
use crate::error::{KeelsonError, Result};
use axum::extract::{ConnectInfo, FromRef, FromRequestParts};
use axum::http::{HeaderMap, request::Parts};
use dashmap::DashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Drop expired windows every N checks so the map stays bounded.
const SHRINK_INTERVAL: u64 = 1000;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Process-local fixed-window rate limiter.
#[derive(Debug)]
pub struct FixedWindowRateLimiter {
    config: RateLimitConfig,
    window: Duration,
    windows: DashMap<String, Window>,
    request_count: AtomicU64,
}

impl FixedWindowRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let window = Duration::from_secs(config.window_seconds.max(1));
        Self {
            config,
            window,
            windows: DashMap::new(),
            request_count: AtomicU64::new(0),
        }
    }

    /// Limiter with an explicit window length, bypassing the seconds granularity.
    pub fn with_window(max_requests: u32, window: Duration) -> Self {
        let config = RateLimitConfig::builder()
            .enabled(true)
            .max_requests(max_requests)
            .window_seconds(window.as_secs().max(1))
            .build();
        Self {
            config,
            window,
            windows: DashMap::new(),
            request_count: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Count one request against `key`.
    ///
    /// Fails with `TooManyRequests` carrying the seconds left in the current
    /// window once the key has used up its allowance.
    pub fn check(&self, key: &str) -> Result<()> {
        if !self.config.enabled {
            return Ok(());
        }

        let count = self.request_count.fetch_add(1, Ordering::Relaxed);
        if count % SHRINK_INTERVAL == 0 && count > 0 {
            self.retain_recent();
        }

        let now = Instant::now();
        let mut entry = self.windows.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.count = 0;
        }

        if entry.count >= self.config.max_requests {
            let remaining = self.window.saturating_sub(now.duration_since(entry.started));
            let retry_after = remaining.as_secs().max(1);
            debug!(
                target: "keelson::ratelimit",
                key = %key,
                retry_after,
                "Rate limit exceeded"
            );
            return Err(KeelsonError::too_many_requests_retry_after(
                "Too many requests. Please try again later.",
                retry_after,
            ));
        }

        entry.count += 1;
        Ok(())
    }

    /// Remove windows that have already expired.
    pub fn retain_recent(&self) {
        let now = Instant::now();
        let window = self.window;
        self.windows
            .retain(|_, w| now.duration_since(w.started) < window);
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}

/// Composite limiter key: `tenant:ip:action`.
pub fn rate_limit_key(tenant: &str, client_ip: &str, action: &str) -> String {
    format!("{}:{}:{}", tenant, client_ip, action)
}

/// Resolve the client IP for rate limiting.
///
/// Proxy headers are only consulted when `trust_proxy` is set; otherwise the
/// direct connection address is used when the server exposes it.
pub fn client_ip(
    headers: &HeaderMap,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
    trust_proxy: bool,
) -> Option<String> {
    let direct = connect_info.map(|addr| addr.ip().to_string());
    if !trust_proxy {
        return direct;
    }

    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        // leftmost entry is the original client
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
        .or(direct)
}

/// Extractor resolving the caller's IP with the limiter's proxy policy.
///
/// Falls back to `"unknown"` when no address is available, so every such
/// caller shares one bucket per tenant and action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl<S> FromRequestParts<S> for ClientIp
where
    Arc<FixedWindowRateLimiter>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> std::result::Result<Self, Self::Rejection> {
        let limiter = Arc::<FixedWindowRateLimiter>::from_ref(state);
        let ip = client_ip(
            &parts.headers,
            parts.extensions.get::<ConnectInfo<SocketAddr>>(),
            limiter.config().trust_proxy,
        );
        Ok(ClientIp(ip.unwrap_or_else(|| "unknown".to_string())))
    }
}
