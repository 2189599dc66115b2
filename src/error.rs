use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// The main error type for Keelson services
#[derive(Debug, thiserror::Error)]
pub enum KeelsonError {
    /// Caller-supplied data violates a schema, uniqueness, coercion or reference rule.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Webhook signature or payload framing was rejected.
    #[error("Webhook verification failed: {0}")]
    WebhookVerification(String),

    /// An upstream dependency (billing API, plan lookup) is unavailable.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// A store read or write failed.
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Too many requests: {message}")]
    TooManyRequests {
        message: String,
        retry_after_seconds: Option<u64>,
    },

    #[error("Request timeout")]
    RequestTimeout,

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Error body returned to API clients.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_id: Option<String>,
}

impl KeelsonError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn webhook_verification(msg: impl Into<String>) -> Self {
        Self::WebhookVerification(msg.into())
    }

    pub fn service_unavailable(msg: impl Into<String>) -> Self {
        Self::ServiceUnavailable(msg.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    pub fn too_many_requests(msg: impl Into<String>) -> Self {
        Self::TooManyRequests {
            message: msg.into(),
            retry_after_seconds: None,
        }
    }

    /// Rate limit error carrying a `Retry-After` hint.
    pub fn too_many_requests_retry_after(msg: impl Into<String>, retry_after_seconds: u64) -> Self {
        Self::TooManyRequests {
            message: msg.into(),
            retry_after_seconds: Some(retry_after_seconds),
        }
    }

    pub fn request_timeout() -> Self {
        Self::RequestTimeout
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::WebhookVerification(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ServiceUnavailable(_) | Self::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            Self::Internal(_) | Self::Anyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the caller (or the upstream webhook sender) should retry later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ServiceUnavailable(_)
                | Self::Persistence(_)
                | Self::RequestTimeout
                | Self::TooManyRequests { .. }
        )
    }

    /// Message that is safe to return to clients.
    ///
    /// Client errors are surfaced verbatim. Server errors are replaced with a
    /// generic message; the full error is logged with the error id.
    pub fn safe_message(&self) -> String {
        match self {
            Self::Validation(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::NotFound(msg) => msg.clone(),
            Self::WebhookVerification(_) => "Invalid webhook signature".to_string(),
            Self::TooManyRequests { message, .. } => message.clone(),
            Self::RequestTimeout => "Request timeout".to_string(),
            Self::ServiceUnavailable(_) | Self::Persistence(_) => {
                "Service unavailable".to_string()
            }
            Self::Internal(_) | Self::Anyhow(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for KeelsonError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_id = uuid::Uuid::new_v4().to_string();

        if status.is_server_error() {
            tracing::error!(
                target: "keelson::http",
                status = status.as_u16(),
                error_id = %error_id,
                error = %self,
                "Request failed"
            );
        } else {
            tracing::debug!(
                target: "keelson::http",
                status = status.as_u16(),
                error_id = %error_id,
                error = %self,
                "Request rejected"
            );
        }

        let retry_after = match &self {
            Self::TooManyRequests {
                retry_after_seconds: Some(secs),
                ..
            } => HeaderValue::from_str(&secs.to_string()).ok(),
            _ => None,
        };

        let body = Json(ErrorResponse {
            error: self.safe_message(),
            error_id: Some(error_id),
        });

        let mut response = (status, body).into_response();
        if let Some(value) = retry_after {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        response
    }
}

/// Result type alias for Keelson operations
pub type Result<T> = std::result::Result<T, KeelsonError>;

impl From<serde_json::Error> for KeelsonError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_syntax() || err.is_eof() {
            KeelsonError::Validation(format!("Invalid JSON: {}", err))
        } else {
            KeelsonError::Internal(format!("JSON serialization error: {}", err))
        }
    }
}

impl From<reqwest::Error> for KeelsonError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            KeelsonError::RequestTimeout
        } else if err.is_connect() {
            KeelsonError::ServiceUnavailable(format!("Connection error: {}", err))
        } else if let Some(status) = err.status() {
            match status.as_u16() {
                404 => KeelsonError::NotFound("Upstream resource not found".to_string()),
                429 => KeelsonError::too_many_requests("Upstream rate limit exceeded"),
                500..=599 => {
                    KeelsonError::ServiceUnavailable(format!("Upstream error: {}", err))
                }
                _ => KeelsonError::Internal(format!("Upstream error: {}", err)),
            }
        } else {
            KeelsonError::Internal(format!("Request error: {}", err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error() {
        let err = KeelsonError::validation("Slug already exists.");
        assert!(matches!(err, KeelsonError::Validation(_)));
        assert_eq!(err.to_string(), "Validation error: Slug already exists.");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.safe_message(), "Slug already exists.");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_authorization_errors() {
        assert_eq!(
            KeelsonError::unauthorized("Authentication required.").status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            KeelsonError::forbidden("Admin access required.").status_code(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_persistence_error_is_retryable_and_hidden() {
        let err = KeelsonError::persistence("connection reset while writing user_1");
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(err.is_retryable());
        assert_eq!(err.safe_message(), "Service unavailable");
    }

    #[test]
    fn test_webhook_verification_is_bad_request() {
        let err = KeelsonError::webhook_verification("no matching signature");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.safe_message(), "Invalid webhook signature");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_internal_error_hides_details() {
        let err = KeelsonError::internal("signing secret missing");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.safe_message(), "Internal server error");
    }

    #[test]
    fn test_anyhow_error() {
        let err: KeelsonError = anyhow::anyhow!("Something unexpected").into();
        assert!(matches!(err, KeelsonError::Anyhow(_)));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_too_many_requests_sets_retry_after() {
        let response =
            KeelsonError::too_many_requests_retry_after("Too many requests.", 42).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).unwrap(),
            HeaderValue::from_static("42")
        );
    }

    #[test]
    fn test_from_serde_json_syntax_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{invalid").unwrap_err();
        let err: KeelsonError = json_err.into();
        assert!(matches!(err, KeelsonError::Validation(_)));
    }
}
