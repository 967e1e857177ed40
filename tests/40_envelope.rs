mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use serde_json::json;

use common::{assert_error_envelope, TestApp};

#[tokio::test]
async fn success_envelope_shape() {
    let app = TestApp::new();
    let (status, body) = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["message"].is_string());
    assert!(body["timestamp"].is_string());
    assert_eq!(body["data"]["status"], "ok");

    let (status, body) = app.request(Method::GET, "/api", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["environment"], "development");
}

#[tokio::test]
async fn unknown_route_uses_error_envelope() {
    let app = TestApp::new();
    let (status, body) = app.request(Method::GET, "/nope", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_error_envelope(&body, "NOT_FOUND");
}

#[tokio::test]
async fn wrong_method_uses_error_envelope() {
    let app = TestApp::new();
    let user = app.register("method@example.com").await;

    let (status, body) = app.request(Method::PATCH, "/api/events", Some(&user.token), None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_error_envelope(&body, "METHOD_NOT_ALLOWED");

    let (status, body) = app.request(Method::PATCH, "/api/auth/me", Some(&user.token), None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_error_envelope(&body, "METHOD_NOT_ALLOWED");
}

#[tokio::test]
async fn undecodable_path_segment_is_a_validation_error() {
    let app = TestApp::new();
    let user = app.register("path@example.com").await;

    let (status, body) = app.get("/api/events/%FF%FE", &user.token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error_envelope(&body, "VALIDATION_ERROR");

    let (status, body) = app.post("/api/events/%FF%FE/rsvp", &user.token, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error_envelope(&body, "VALIDATION_ERROR");
}

#[tokio::test]
async fn unknown_sort_field_is_a_validation_error() {
    let app = TestApp::new();
    let admin = app.admin("sorter@example.com").await;

    let (status, body) = app.get("/api/residents?sort=bogus", &admin.token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error_envelope(&body, "VALIDATION_ERROR");
    assert!(body["error"]["fields"]["sort"].is_string());

    let (status, body) = app.get("/api/directory?sort=password_hash", &admin.token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error_envelope(&body, "VALIDATION_ERROR");

    let (status, _) = app.get("/api/residents?sort=displayName&order=asc", &admin.token).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn malformed_json_is_a_validation_error() {
    let app = TestApp::new();
    let user = app.register("json@example.com").await;

    let request = Request::builder()
        .method(Method::PUT)
        .uri("/api/auth/me")
        .header(header::AUTHORIZATION, format!("Bearer {}", user.token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{ not json"))
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error_envelope(&body, "VALIDATION_ERROR");
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let mut config = estate_portal_api::AppConfig::for_environment(
        estate_portal_api::config::Environment::Development,
    );
    config.api.max_upload_bytes = 256;
    let app = TestApp::with_config(config);
    let user = app.register("big@example.com").await;

    let (status, body) = app
        .put("/api/auth/me", &user.token, json!({ "displayName": "x".repeat(1024) }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error_envelope(&body, "VALIDATION_ERROR");
}

#[tokio::test]
async fn every_failure_kind_shares_the_envelope() {
    let app = TestApp::new();
    let resident = app.register("kinds@example.com").await;

    let (status, body) = app.request(Method::GET, "/api/announcements", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_error_envelope(&body, "UNAUTHENTICATED");

    let (status, body) = app
        .post("/api/announcements", &resident.token, json!({ "title": "x", "content": "y" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_error_envelope(&body, "FORBIDDEN");

    let (status, body) = app.put("/api/auth/me", &resident.token, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error_envelope(&body, "VALIDATION_ERROR");

    let (status, body) = app.get("/api/gallery/00000000-0000-4000-8000-000000000000", &resident.token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_error_envelope(&body, "NOT_FOUND");
}

#[tokio::test]
async fn announcements_default_priority_and_filter() {
    let app = TestApp::new();
    let admin = app.admin("news@example.com").await;

    let (status, body) = app
        .post("/api/announcements", &admin.token, json!({ "title": "Gate code", "content": "New code is 1234" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["priority"], "normal");
    assert_eq!(body["data"]["pinned"], false);

    let (status, _) = app
        .post(
            "/api/announcements",
            &admin.token,
            json!({ "title": "Fire drill", "content": "Friday", "priority": "urgent" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = app.get("/api/announcements?priority=urgent", &admin.token).await;
    assert_eq!(body["data"]["pagination"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["title"], "Fire drill");
}
