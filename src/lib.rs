//! Keelson - multi-tenant content schemas and billing entitlements
//!
//! Keelson is an Axum service core with two halves:
//!
//! - **Content**: per-tenant content types, custom fields and entries, with
//!   field coercion, slug rules and referential integrity kept in one
//!   versioned snapshot per tenant.
//! - **Entitlements**: billing webhooks and admin backfills are reconciled
//!   into one record per user, which gates self-service organization joins.
//!   Ended subscriptions revoke the matching memberships.
//!
//! Storage, the billing provider and identity verification are traits, so
//! deployments plug in their own backends.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use keelson::{AppState, ConfigBuilder};
//! use std::net::SocketAddr;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigBuilder::new().from_env().build()?;
//!     keelson::init_tracing_with_config(&config);
//!
//!     let billing = Arc::new(keelson::billing::LiveBillingClient::new(config.billing.clone())?);
//!     let state = AppState::new(&config, records, snapshots, billing, identity)?;
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
//!     axum::serve(
//!         listener,
//!         keelson::router(state).into_make_service_with_connect_info::<SocketAddr>(),
//!     )
//!     .await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod billing;
mod config;
pub mod content;
pub mod entitlements;
mod error;
pub mod http;
pub mod ratelimit;
mod utils;
pub mod webhooks;

pub use config::{
    Config, ConfigBuilder, LoggingConfig, init_tracing, init_tracing_with_config,
};
pub use error::{ErrorResponse, KeelsonError, Result};
pub use http::{ApiResponse, AppState, router};
pub use ratelimit::{RateLimitConfig, RateLimitConfigBuilder};
