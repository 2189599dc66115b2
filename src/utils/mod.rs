//! Utility functions and helpers.
//!
//! Environment variable handling and the clock shared across modules.

pub mod env;

pub use env::{flag_env_with_prefix, get_env_with_prefix, parse_env_with_prefix};

/// Current time as whole seconds since the Unix epoch.
pub fn unix_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}
