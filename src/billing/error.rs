//! Billing-specific error types.
//!
//! Granular errors for billing provider calls and webhook verification,
//! convertible to `KeelsonError` for HTTP responses.

use crate::error::KeelsonError;
use std::fmt;

/// Billing-specific errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingError {
    // Plan errors
    /// A plan referenced by a subscription or event could not be resolved.
    PlanNotFound { plan_id: String },

    // Organization errors
    /// No organization exists with this slug.
    OrganizationNotFound { slug: String },

    // Webhook errors
    /// Required signature headers are missing or malformed.
    MissingWebhookHeaders { header: String },
    /// No signature in the header matched the payload.
    InvalidWebhookSignature,
    /// Webhook timestamp is outside the tolerance window.
    WebhookTimestampExpired { age_seconds: i64 },
    /// Webhook event data is malformed.
    InvalidWebhookPayload { message: String },
    /// The configured signing secret cannot be decoded.
    InvalidSigningSecret { reason: String },

    // Provider API errors
    /// The billing provider returned an error or could not be reached.
    ProviderApi {
        operation: String,
        message: String,
        http_status: Option<u16>,
    },

    // General errors
    /// An unexpected internal error occurred.
    Internal { message: String },
}

impl fmt::Display for BillingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PlanNotFound { plan_id } => {
                write!(f, "Plan not found: {}", plan_id)
            }
            Self::OrganizationNotFound { slug } => {
                write!(f, "Organization not found: {}", slug)
            }
            Self::MissingWebhookHeaders { header } => {
                write!(f, "Missing or malformed webhook header: {}", header)
            }
            Self::InvalidWebhookSignature => {
                write!(f, "Invalid webhook signature")
            }
            Self::WebhookTimestampExpired { age_seconds } => {
                write!(f, "Webhook timestamp outside tolerance ({} seconds)", age_seconds)
            }
            Self::InvalidWebhookPayload { message } => {
                write!(f, "Invalid webhook payload: {}", message)
            }
            Self::InvalidSigningSecret { reason } => {
                write!(f, "Invalid webhook signing secret: {}", reason)
            }
            Self::ProviderApi {
                operation,
                message,
                http_status,
            } => {
                write!(f, "Billing API error during '{}': {}", operation, message)?;
                if let Some(status) = http_status {
                    write!(f, " [HTTP {}]", status)?;
                }
                Ok(())
            }
            Self::Internal { message } => {
                write!(f, "Internal billing error: {}", message)
            }
        }
    }
}

impl std::error::Error for BillingError {}

impl From<BillingError> for KeelsonError {
    fn from(err: BillingError) -> Self {
        match &err {
            BillingError::OrganizationNotFound { .. } => KeelsonError::NotFound(err.to_string()),

            BillingError::MissingWebhookHeaders { .. }
            | BillingError::InvalidWebhookSignature
            | BillingError::WebhookTimestampExpired { .. }
            | BillingError::InvalidWebhookPayload { .. } => {
                KeelsonError::WebhookVerification(err.to_string())
            }

            // Unresolvable plans are treated as provider unavailability so the
            // webhook sender redelivers later.
            BillingError::PlanNotFound { .. } => KeelsonError::ServiceUnavailable(err.to_string()),

            BillingError::ProviderApi { http_status, .. } => match http_status {
                Some(404) => KeelsonError::NotFound(err.to_string()),
                _ => KeelsonError::ServiceUnavailable(err.to_string()),
            },

            BillingError::InvalidSigningSecret { .. } | BillingError::Internal { .. } => {
                KeelsonError::Internal(err.to_string())
            }
        }
    }
}

impl BillingError {
    /// Check if this is a client error (4xx).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::OrganizationNotFound { .. }
            | Self::MissingWebhookHeaders { .. }
            | Self::InvalidWebhookSignature
            | Self::WebhookTimestampExpired { .. }
            | Self::InvalidWebhookPayload { .. } => true,
            Self::ProviderApi { http_status, .. } => matches!(http_status, Some(404)),
            _ => false,
        }
    }

    /// Check if this is a server error (5xx).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }

    /// Check if this error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::PlanNotFound { .. } => true,
            Self::ProviderApi { http_status, .. } => {
                matches!(http_status, None | Some(408) | Some(429) | Some(500..=599))
            }
            _ => false,
        }
    }
}
