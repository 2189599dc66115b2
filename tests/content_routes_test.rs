mod common;

use axum::http::StatusCode;
use common::{As, TestApp, app, request, send};
use serde_json::{Value, json};

const ADMIN: As = As::Admin("admin_1", "org_1");
const MEMBER: As = As::Member("user_1", "org_1");

async fn create(app: &TestApp, uri: &str, body: Value) -> Value {
    let (status, body) = send(&app.router, request("POST", uri, ADMIN, Some(body))).await;
    assert_eq!(status, StatusCode::CREATED, "unexpected body: {body}");
    body["data"].clone()
}

/// A "Blog post" type with a required title and an optional publish date.
async fn blog(app: &TestApp) -> (String, String, String) {
    let post = create(app, "/content/types", json!({"name": "Blog post"})).await;
    let type_id = post["id"].as_str().unwrap().to_string();

    let title = create(
        app,
        "/content/fields",
        json!({"label": "Title", "type": "text", "required": true, "attachedTo": [type_id]}),
    )
    .await;
    let published_on = create(
        app,
        "/content/fields",
        json!({"label": "Published on", "type": "date", "attachedTo": [type_id]}),
    )
    .await;

    (
        type_id,
        title["id"].as_str().unwrap().to_string(),
        published_on["id"].as_str().unwrap().to_string(),
    )
}

#[tokio::test]
async fn test_content_type_lifecycle() {
    let app = app();

    let created = create(
        &app,
        "/content/types",
        json!({"name": "Case Study", "description": "Customer stories"}),
    )
    .await;
    assert_eq!(created["slug"], json!("case-study"));
    assert_eq!(created["status"], json!("draft"));
    let id = created["id"].as_str().unwrap();

    let (status, body) = send(&app.router, request("GET", "/content/types", MEMBER, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, body) = send(
        &app.router,
        request(
            "PUT",
            &format!("/content/types/{id}"),
            ADMIN,
            Some(json!({"name": "Case Study", "status": "published"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], json!("published"));
    assert!(body["data"].get("description").map_or(true, Value::is_null));

    let (status, body) = send(
        &app.router,
        request("DELETE", &format!("/content/types/{id}"), ADMIN, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], json!(id));

    let (status, _) = send(
        &app.router,
        request("GET", &format!("/content/types/{id}"), MEMBER, None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_writes_require_admin_and_organization() {
    let app = app();
    let body = Some(json!({"name": "Page"}));

    let (status, _) = send(&app.router, request("POST", "/content/types", MEMBER, body.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app.router, request("GET", "/content/types", As::Anonymous, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert_eq!(app.snapshots.writes(), 0);
}

#[tokio::test]
async fn test_duplicate_slug_is_rejected() {
    let app = app();
    create(&app, "/content/types", json!({"name": "Page"})).await;

    let (status, body) = send(
        &app.router,
        request("POST", "/content/types", ADMIN, Some(json!({"name": "Page"}))),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("A content type with slug 'page' already exists."));
    assert_eq!(app.snapshots.writes(), 1);
}

#[tokio::test]
async fn test_fields_are_mirrored_on_types() {
    let app = app();
    let (type_id, title_id, published_id) = blog(&app).await;

    let (_, body) = send(
        &app.router,
        request("GET", &format!("/content/types/{type_id}"), MEMBER, None),
    )
    .await;
    assert_eq!(body["data"]["fields"], json!([title_id, published_id]));

    send(
        &app.router,
        request("DELETE", &format!("/content/fields/{published_id}"), ADMIN, None),
    )
    .await;

    let (_, body) = send(
        &app.router,
        request("GET", &format!("/content/types/{type_id}"), MEMBER, None),
    )
    .await;
    assert_eq!(body["data"]["fields"], json!([title_id]));
}

#[tokio::test]
async fn test_entries_are_coerced_and_validated() {
    let app = app();
    let (type_id, _, _) = blog(&app).await;
    let entries = format!("/content/types/{type_id}/entries");

    let entry = create(
        &app,
        &entries,
        json!({"fields": {"title": "Hello World", "published-on": "2024-05-01"}}),
    )
    .await;
    assert_eq!(entry["slug"], json!("hello-world"));
    assert_eq!(entry["fields"]["published-on"], json!("2024-05-01"));

    let (status, body) = send(
        &app.router,
        request("POST", &entries, ADMIN, Some(json!({"fields": {"published-on": "2024-05-01"}}))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("Title is required."));

    let (status, body) = send(
        &app.router,
        request(
            "POST",
            &entries,
            ADMIN,
            Some(json!({"fields": {"title": "Other", "published-on": "someday"}})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("Published on must be a valid date."));

    let (_, body) = send(&app.router, request("GET", &entries, MEMBER, None)).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_entry_update_and_delete() {
    let app = app();
    let (type_id, _, _) = blog(&app).await;
    let entries = format!("/content/types/{type_id}/entries");
    let entry = create(&app, &entries, json!({"fields": {"title": "Draft"}})).await;
    let entry_uri = format!("{entries}/{}", entry["id"].as_str().unwrap());

    let (status, body) = send(
        &app.router,
        request(
            "PUT",
            &entry_uri,
            ADMIN,
            Some(json!({"slug": "Final Cut", "status": "published", "fields": {"title": "Final"}})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["slug"], json!("final-cut"));
    assert_eq!(body["data"]["status"], json!("published"));

    let (status, _) = send(&app.router, request("DELETE", &entry_uri, ADMIN, None)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app.router, request("GET", &entry_uri, MEMBER, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_tenants_are_isolated() {
    let app = app();
    create(&app, "/content/types", json!({"name": "Page"})).await;

    let (status, body) = send(
        &app.router,
        request("GET", "/content/types", As::Member("user_2", "org_2"), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn test_malformed_json_is_a_validation_error() {
    let app = app();
    let mut req = request("POST", "/content/types", ADMIN, None);
    *req.body_mut() = axum::body::Body::from("{not json");
    req.headers_mut().insert(
        axum::http::header::CONTENT_TYPE,
        "application/json".parse().unwrap(),
    );

    let (status, body) = send(&app.router, req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Invalid JSON"));
}

#[tokio::test]
async fn test_storage_outage_is_unavailable() {
    let app = app();
    app.snapshots.set_fail_writes(true);

    let (status, body) = send(
        &app.router,
        request("POST", "/content/types", ADMIN, Some(json!({"name": "Page"}))),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], json!("Service unavailable"));
}
