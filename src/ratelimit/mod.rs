//! Rate limiting for write paths.
//!
//! A fixed-window limiter keyed by tenant, client IP and action. Counters
//! live in process memory and are not shared between instances.

mod config;
mod limiter;

pub use config::{RateLimitConfig, RateLimitConfigBuilder};
pub use limiter::{ClientIp, FixedWindowRateLimiter, client_ip, rate_limit_key};
