mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{assert_error_envelope, TestApp};

#[tokio::test]
async fn register_creates_resident_and_ignores_role() {
    let app = TestApp::new();
    let (status, body) = app
        .request(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "email": "ann@example.com", "password": "secret123", "role": "admin" })),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["user"]["role"], "resident");
    assert_eq!(body["data"]["user"]["email"], "ann@example.com");
    assert!(body["data"]["token"].is_string());
    assert!(body["data"]["expiresIn"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn register_rejects_duplicates_and_weak_passwords() {
    let app = TestApp::new();
    app.register("dup@example.com").await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "email": "dup@example.com", "password": "secret123" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error_envelope(&body, "VALIDATION_ERROR");

    let (status, body) = app
        .request(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "email": "weak@example.com", "password": "123" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["fields"]["password"].is_string());
}

#[tokio::test]
async fn login_returns_current_role() {
    let app = TestApp::new();
    let user = app.admin("boss@example.com").await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": user.email, "password": "secret123" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["role"], "admin");

    let (status, body) = app
        .request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": user.email, "password": "wrong-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_error_envelope(&body, "UNAUTHENTICATED");
}

#[tokio::test]
async fn me_merges_identity_and_record() {
    let app = TestApp::new();
    let user = app.register("me@example.com").await;

    let (status, body) = app.get("/api/auth/me", &user.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], user.id);
    assert_eq!(body["data"]["email"], "me@example.com");
    assert_eq!(body["data"]["emailVerified"], false);
    assert_eq!(body["data"]["displayName"], "me@example.com");
    assert_eq!(body["data"]["privacy"]["showInDirectory"], true);
}

#[tokio::test]
async fn update_me_drops_privileged_fields() {
    let app = TestApp::new();
    let user = app.register("self@example.com").await;

    let (status, body) = app
        .put(
            "/api/auth/me",
            &user.token,
            json!({ "displayName": "Sam", "phone": "555-0100", "role": "admin", "unit": "A-1" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["displayName"], "Sam");
    assert_eq!(body["data"]["phone"], "555-0100");
    assert_eq!(body["data"]["role"], "resident");
    assert!(body["data"]["unit"].is_null());
}

#[tokio::test]
async fn change_password_revokes_old_tokens() {
    let app = TestApp::new();
    let user = app.register("rotate@example.com").await;

    let (status, body) = app
        .post(
            "/api/auth/change-password",
            &user.token,
            json!({ "currentPassword": "wrong-password", "newPassword": "newsecret" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Current password is incorrect");

    let (status, _) = app
        .post(
            "/api/auth/change-password",
            &user.token,
            json!({ "currentPassword": "secret123", "newPassword": "newsecret" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.get("/api/auth/me", &user.token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_error_envelope(&body, "UNAUTHENTICATED");

    let (status, body) = app
        .request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": user.email, "password": "newsecret" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["data"]["token"].as_str().unwrap();
    let (status, _) = app.get("/api/auth/me", token).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn protected_routes_fail_closed() {
    let app = TestApp::new();

    let (status, body) = app.request(Method::GET, "/api/events", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_error_envelope(&body, "UNAUTHENTICATED");

    for token in ["", "garbage", "eyJhbGciOiJIUzI1NiJ9.e30.invalid"] {
        let (status, body) = app.get("/api/events", token).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "token {:?} was accepted", token);
        assert_error_envelope(&body, "UNAUTHENTICATED");
    }

    // Bypass is off by default even in development
    let (status, _) = app.get("/api/events", "dev-token:someone").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn dev_bypass_works_only_when_enabled() {
    let mut config = estate_portal_api::AppConfig::for_environment(
        estate_portal_api::config::Environment::Development,
    );
    config.security.dev_token_bypass = true;
    let app = TestApp::with_config(config);

    let (status, body) = app.get("/api/auth/me", "dev-token:dev-1:dev1@example.com").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], "dev-1");
    assert_eq!(body["data"]["role"], "resident");
}
