//! Live billing provider client.
//!
//! REST client over reqwest with bearer authentication, per-attempt
//! timeouts and exponential backoff on transient failures.

use super::config::BillingConfig;
use super::error::BillingError;
use super::provider::BillingProvider;
use super::types::{Organization, Plan, Subscription};
use crate::error::{KeelsonError, Result};
use async_trait::async_trait;
use reqwest::{Method, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;

/// Provider list endpoints return either `{ "data": [...] }` or a bare array.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListResponse<T> {
    Wrapped { data: Vec<T> },
    Bare(Vec<T>),
}

impl<T> ListResponse<T> {
    fn into_items(self) -> Vec<T> {
        match self {
            Self::Wrapped { data } => data,
            Self::Bare(items) => items,
        }
    }
}

/// Live billing provider client for production use.
#[derive(Clone)]
pub struct LiveBillingClient {
    http: reqwest::Client,
    base_url: Url,
    config: BillingConfig,
    secret_key: SecretString,
}

impl LiveBillingClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Fails if the secret key is missing or the API URL cannot be parsed.
    pub fn new(config: BillingConfig) -> std::result::Result<Self, BillingError> {
        let secret_key = config
            .secret_key
            .clone()
            .filter(|key| !key.expose_secret().is_empty())
            .ok_or_else(|| BillingError::Internal {
                message: "billing secret key is not configured".to_string(),
            })?;

        let base_url = Url::parse(&config.api_url).map_err(|e| BillingError::Internal {
            message: format!("invalid billing API URL '{}': {}", config.api_url, e),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(BillingError::Internal {
                message: format!("billing API URL '{}' cannot be a base", config.api_url),
            });
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("keelson/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BillingError::Internal {
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            http,
            base_url,
            config,
            secret_key,
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| KeelsonError::internal("billing API URL cannot be a base"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send one request with retries. Returns `None` when the provider answers 404.
    async fn execute(
        &self,
        operation: &str,
        method: Method,
        segments: &[&str],
        query: &[(&str, &str)],
        body: Option<serde_json::Value>,
    ) -> Result<Option<String>> {
        let url = self.url(segments)?;

        with_retry(&self.config, operation, || {
            let mut request = self
                .http
                .request(method.clone(), url.clone())
                .bearer_auth(self.secret_key.expose_secret())
                .query(query);
            if let Some(body) = &body {
                request = request.json(body);
            }

            async move {
                let response = request.send().await.map_err(|e| BillingError::ProviderApi {
                    operation: operation.to_string(),
                    message: e.to_string(),
                    http_status: e.status().map(|s| s.as_u16()),
                })?;

                let status = response.status();
                if status == StatusCode::NOT_FOUND {
                    return Ok(None);
                }

                let text = response.text().await.map_err(|e| BillingError::ProviderApi {
                    operation: operation.to_string(),
                    message: format!("failed to read response body: {}", e),
                    http_status: Some(status.as_u16()),
                })?;

                if !status.is_success() {
                    return Err(BillingError::ProviderApi {
                        operation: operation.to_string(),
                        message: if text.is_empty() {
                            status.canonical_reason().unwrap_or("request failed").to_string()
                        } else {
                            text
                        },
                        http_status: Some(status.as_u16()),
                    });
                }

                Ok(Some(text))
            }
        })
        .await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<Option<T>> {
        let Some(text) = self
            .execute(operation, Method::GET, segments, query, None)
            .await?
        else {
            return Ok(None);
        };

        serde_json::from_str(&text).map(Some).map_err(|e| {
            BillingError::Internal {
                message: format!("failed to decode '{}' response: {}", operation, e),
            }
            .into()
        })
    }
}

impl std::fmt::Debug for LiveBillingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveBillingClient")
            .field("base_url", &self.base_url.as_str())
            .field("max_retries", &self.config.max_retries)
            .field("timeout_seconds", &self.config.timeout_seconds)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Retry Logic
// ============================================================================

/// Execute an operation with retry logic and a per-attempt timeout.
async fn with_retry<T, F, Fut>(config: &BillingConfig, operation: &str, operation_fn: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = std::result::Result<T, BillingError>>,
{
    let timeout_duration = Duration::from_secs(config.timeout_seconds.max(1));
    let mut attempts = 0;

    loop {
        let error = match tokio::time::timeout(timeout_duration, operation_fn()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => e,
            Err(_elapsed) => BillingError::ProviderApi {
                operation: operation.to_string(),
                message: format!("request timed out after {} seconds", config.timeout_seconds),
                http_status: Some(408),
            },
        };

        if !error.is_retryable() || attempts >= config.max_retries {
            return Err(error.into());
        }

        let delay = calculate_backoff_delay(attempts, config.base_delay_ms, config.max_delay_ms);
        tracing::warn!(
            target: "keelson::billing::client",
            operation = operation,
            attempt = attempts + 1,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Retrying billing API call after transient error"
        );
        tokio::time::sleep(delay).await;
        attempts += 1;
    }
}

/// Exponential backoff with 0-25% jitter.
fn calculate_backoff_delay(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    let delay_ms = base_ms.saturating_mul(2_u64.saturating_pow(attempt));
    let delay_ms = delay_ms.min(max_ms);

    let jitter = if delay_ms > 0 {
        fastrand::u64(0..=delay_ms / 4)
    } else {
        0
    };
    Duration::from_millis(delay_ms.saturating_add(jitter))
}

// ============================================================================
// BillingProvider Implementation
// ============================================================================

#[async_trait]
impl BillingProvider for LiveBillingClient {
    async fn get_subscription_list(&self, user_id: &str) -> Result<Vec<Subscription>> {
        let list: Option<ListResponse<Subscription>> = self
            .get_json(
                "get_subscription_list",
                &["billing", "subscription_items"],
                &[("payer_id", user_id)],
            )
            .await?;
        Ok(list.map(ListResponse::into_items).unwrap_or_default())
    }

    async fn get_plan(&self, plan_id: &str) -> Result<Option<Plan>> {
        self.get_json("get_plan", &["billing", "plans", plan_id], &[])
            .await
    }

    async fn get_plan_list(&self) -> Result<Vec<Plan>> {
        let list: Option<ListResponse<Plan>> = self
            .get_json("get_plan_list", &["billing", "plans"], &[])
            .await?;
        Ok(list.map(ListResponse::into_items).unwrap_or_default())
    }

    async fn get_organization(&self, slug: &str) -> Result<Option<Organization>> {
        self.get_json("get_organization", &["organizations", slug], &[])
            .await
    }

    async fn create_organization_membership(
        &self,
        organization_id: &str,
        user_id: &str,
        role: &str,
    ) -> Result<()> {
        let created = self
            .execute(
                "create_organization_membership",
                Method::POST,
                &["organizations", organization_id, "memberships"],
                &[],
                Some(json!({ "user_id": user_id, "role": role })),
            )
            .await?;
        match created {
            Some(_) => Ok(()),
            None => Err(KeelsonError::not_found("Organization not found")),
        }
    }

    async fn delete_organization_membership(
        &self,
        organization_id: &str,
        user_id: &str,
    ) -> Result<()> {
        let deleted = self
            .execute(
                "delete_organization_membership",
                Method::DELETE,
                &["organizations", organization_id, "memberships", user_id],
                &[],
                None,
            )
            .await?;
        match deleted {
            Some(_) => Ok(()),
            None => Err(KeelsonError::not_found("Membership not found")),
        }
    }
}
