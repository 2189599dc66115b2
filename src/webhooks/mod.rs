//! Billing webhook intake.
//!
//! Provides Svix signature verification, idempotency tracking, and the
//! handler that turns verified deliveries into entitlement reconciliation.

mod config;
mod handler;
mod idempotency;
mod verification;

pub use config::WebhookConfig;
pub use handler::{BillingWebhookHandler, WebhookOutcome};
pub use idempotency::{IdempotencyStore, MemoryIdempotencyStore};
pub use verification::{
    SVIX_ID_HEADER, SVIX_SIGNATURE_HEADER, SVIX_TIMESTAMP_HEADER, SvixVerifier, WebhookVerifier,
};
