mod common;

use axum::http::StatusCode;
use common::{As, app, app_with_rate_limit, request, send};
use keelson::RateLimitConfig;
use keelson::billing::{Organization, Plan, Subscription};
use keelson::entitlements::{
    EntitlementRecord, EntitlementStatus, REASON_NO_SUBSCRIPTION, REASON_PLAN_EXCLUDES_ORG,
};
use serde_json::json;

fn active_record(user_id: &str, features: &[&str]) -> EntitlementRecord {
    let mut record = EntitlementRecord::inactive(user_id);
    record.status = EntitlementStatus::Active;
    record.features = features.iter().map(|f| f.to_string()).collect();
    record
}

#[tokio::test]
async fn test_backfill_requires_admin() {
    let app = app();
    let body = Some(json!({"userId": "user_1"}));

    let (status, _) = send(
        &app.router,
        request("POST", "/admin/entitlements/backfill", As::Anonymous, body.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app.router,
        request("POST", "/admin/entitlements/backfill", As::Member("user_9", "org_1"), body),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(app.records.upserts().is_empty());
}

#[tokio::test]
async fn test_backfill_rebuilds_record() {
    let app = app();
    app.billing
        .add_plan(Plan::new("plan_pro").with_slug("pro").with_features(["app-1"]));
    app.billing
        .set_subscriptions("user_1", vec![Subscription::new("active", "plan_pro")]);

    let (status, body) = send(
        &app.router,
        request(
            "POST",
            "/admin/entitlements/backfill",
            As::Admin("admin_1", "org_1"),
            Some(json!({"userId": "user_1"})),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["status"], json!("active"));
    assert_eq!(body["data"]["planSlug"], json!("pro"));
    assert_eq!(body["data"]["features"], json!(["app-1"]));
}

#[tokio::test]
async fn test_backfill_rejects_blank_user() {
    let app = app();
    let (status, body) = send(
        &app.router,
        request(
            "POST",
            "/admin/entitlements/backfill",
            As::Admin("admin_1", "org_1"),
            Some(json!({"userId": "  "})),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("userId is required."));
}

#[tokio::test]
async fn test_backfill_is_rate_limited() {
    let app = app_with_rate_limit(
        RateLimitConfig::builder()
            .max_requests(2)
            .window_seconds(60)
            .build(),
    );
    let backfill = || {
        request(
            "POST",
            "/admin/entitlements/backfill",
            As::Admin("admin_1", "org_1"),
            Some(json!({"userId": "user_1"})),
        )
    };

    assert_eq!(send(&app.router, backfill()).await.0, StatusCode::OK);
    assert_eq!(send(&app.router, backfill()).await.0, StatusCode::OK);

    let response = tower::ServiceExt::oneshot(app.router.clone(), backfill())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key("retry-after"));
}

#[tokio::test]
async fn test_get_record_defaults_to_inactive() {
    let app = app();
    app.records.insert(active_record("user_1", &["app-1"]));

    let (status, body) = send(
        &app.router,
        request("GET", "/admin/entitlements/user_1", As::Admin("admin_1", "org_1"), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], json!("active"));

    let (status, body) = send(
        &app.router,
        request("GET", "/admin/entitlements/user_2", As::Admin("admin_1", "org_1"), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["userId"], json!("user_2"));
    assert_eq!(body["data"]["status"], json!("inactive"));
    assert_eq!(body["data"]["features"], json!([]));
}

#[tokio::test]
async fn test_check_reports_decision() {
    let app = app();
    app.records.insert(active_record("user_1", &["app-1"]));

    let check = |user: &'static str, slug: &str| {
        request(
            "POST",
            "/entitlements/check",
            As::Member(user, "org_home"),
            Some(json!({"orgSlug": slug})),
        )
    };

    let (status, body) = send(&app.router, check("user_1", "app-1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({"allowed": true}));

    let (_, body) = send(&app.router, check("user_1", "app-2")).await;
    assert_eq!(body["data"]["allowed"], json!(false));
    assert_eq!(body["data"]["reason"], json!(REASON_PLAN_EXCLUDES_ORG));

    let (_, body) = send(&app.router, check("user_2", "app-1")).await;
    assert_eq!(body["data"]["reason"], json!(REASON_NO_SUBSCRIPTION));
}

#[tokio::test]
async fn test_join_creates_membership() {
    let app = app();
    app.records.insert(active_record("user_1", &["app-1"]));
    app.billing.add_organization(Organization::new("org_1", "app-1"));

    let (status, body) = send(
        &app.router,
        request(
            "POST",
            "/entitlements/join",
            As::Member("user_1", "org_home"),
            Some(json!({"orgSlug": "app-1"})),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["organization"]["id"], json!("org_1"));
    assert_eq!(body["data"]["role"], json!("org:member"));
    assert_eq!(
        app.billing.membership_role("org_1", "user_1").as_deref(),
        Some("org:member")
    );
}

#[tokio::test]
async fn test_join_denied_without_entitlement() {
    let app = app();
    app.billing.add_organization(Organization::new("org_1", "app-1"));

    let (status, body) = send(
        &app.router,
        request(
            "POST",
            "/entitlements/join",
            As::Member("user_1", "org_home"),
            Some(json!({"orgSlug": "app-1"})),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], json!(REASON_NO_SUBSCRIPTION));
    assert!(!app.billing.has_membership("org_1", "user_1"));
}
