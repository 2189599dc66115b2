#![allow(dead_code)]

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use keelson::auth::{HeaderIdentityVerifier, ORG_HEADER, ROLE_HEADER, USER_HEADER};
use keelson::billing::MockBillingProvider;
use keelson::content::InMemoryContentStore;
use keelson::entitlements::{EntitlementsConfig, InMemoryEntitlementStore};
use keelson::webhooks::{
    SVIX_ID_HEADER, SVIX_SIGNATURE_HEADER, SVIX_TIMESTAMP_HEADER, SvixVerifier, WebhookConfig,
};
use keelson::{AppState, ConfigBuilder, RateLimitConfig};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub const SECRET: &str = "whsec_c2VjcmV0LWtleS1mb3ItdGVzdHM=";

pub struct TestApp {
    pub router: Router,
    pub records: InMemoryEntitlementStore,
    pub snapshots: InMemoryContentStore,
    pub billing: MockBillingProvider,
}

pub fn app() -> TestApp {
    app_with_rate_limit(RateLimitConfig::builder().max_requests(100).build())
}

pub fn app_with_rate_limit(rate_limit: RateLimitConfig) -> TestApp {
    let config = ConfigBuilder::new()
        .with_entitlements(EntitlementsConfig {
            policy: "cached".to_string(),
            reconcile_retry_delay_ms: 0,
        })
        .with_webhook(WebhookConfig::new().signing_secret(SECRET))
        .with_rate_limit(rate_limit)
        .build()
        .unwrap();

    let records = InMemoryEntitlementStore::new();
    let snapshots = InMemoryContentStore::new();
    let billing = MockBillingProvider::new();

    let state = AppState::new(
        &config,
        Arc::new(records.clone()),
        Arc::new(snapshots.clone()),
        Arc::new(billing.clone()),
        Arc::new(HeaderIdentityVerifier),
    )
    .unwrap();

    TestApp {
        router: keelson::router(state),
        records,
        snapshots,
        billing,
    }
}

/// Who is making a request.
#[derive(Clone, Copy)]
pub enum As {
    Anonymous,
    Member(&'static str, &'static str),
    Admin(&'static str, &'static str),
}

pub fn request(method: &str, uri: &str, who: As, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    match who {
        As::Anonymous => {}
        As::Member(user, org) => {
            builder = builder
                .header(USER_HEADER, user)
                .header(ORG_HEADER, org)
                .header(ROLE_HEADER, "org:member");
        }
        As::Admin(user, org) => {
            builder = builder
                .header(USER_HEADER, user)
                .header(ORG_HEADER, org)
                .header(ROLE_HEADER, "org:admin");
        }
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub fn signed_webhook(id: &str, payload: &Value) -> Request<Body> {
    let body = payload.to_string();
    let timestamp = chrono::Utc::now().timestamp();
    let signature = SvixVerifier::new(SECRET)
        .unwrap()
        .sign(id, timestamp, body.as_bytes())
        .unwrap();

    Request::builder()
        .method("POST")
        .uri("/webhooks/billing")
        .header(header::CONTENT_TYPE, "application/json")
        .header(SVIX_ID_HEADER, id)
        .header(SVIX_TIMESTAMP_HEADER, timestamp.to_string())
        .header(SVIX_SIGNATURE_HEADER, signature)
        .body(Body::from(body))
        .unwrap()
}

pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}
