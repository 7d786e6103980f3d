use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;

mod common;

// These tests exercise routing, guards and input validation of the
// generation endpoints against live MongoDB and Redis configured via
// .env.test; none of them reach the upstream API (.env.test carries no
// GEMINI_API_KEY). They are marked with #[ignore]; run them with
// `cargo test -- --ignored` once both stores are up.

/// Register a fresh user and return their access token
async fn register_and_token(app: &axum::Router, prefix: &str, role: Option<&str>) -> String {
    let email = format!("{}-{}@example.com", prefix, chrono::Utc::now().timestamp_micros());
    let mut request_body = json!({
        "email": email,
        "password": "SecurePassword123!",
        "name": "Generation Test User",
        "mobile": "0123456789",
    });
    if let Some(role) = role {
        request_body["role"] = json!(role);
    }

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/auth/register")
                .header("content-type", "application/json")
                .body(Body::from(request_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value =
        serde_json::from_str(std::str::from_utf8(&body).unwrap()).unwrap();
    json["access_token"].as_str().unwrap().to_string()
}

async fn post_json(
    app: &axum::Router,
    uri: &str,
    token: Option<&str>,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }

    let response = app
        .clone()
        .oneshot(builder.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value =
        serde_json::from_str(std::str::from_utf8(&body).unwrap()).unwrap();

    (status, json)
}

#[tokio::test]
#[ignore]
async fn test_chat_requires_auth() {
    let app = common::create_test_app().await;

    let (status, _) = post_json(
        &app,
        "/api/v1/ai/chat",
        None,
        json!({ "message": "How do sprinklers work?" }),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore]
async fn test_generate_module_content_requires_admin() {
    let app = common::create_test_app().await;
    let token = register_and_token(&app, "gen-trainee", None).await;

    let (status, json) = post_json(
        &app,
        "/api/v1/ai/generate-module-content",
        Some(&token),
        json!({ "moduleTitle": "Fire Doors" }),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["message"], "Admin access required");
}

#[tokio::test]
#[ignore]
async fn test_chat_rejects_empty_message() {
    let app = common::create_test_app().await;
    let token = register_and_token(&app, "gen-empty-chat", None).await;

    let (status, json) = post_json(
        &app,
        "/api/v1/ai/chat",
        Some(&token),
        json!({ "message": "" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["status"], "error");
}

#[tokio::test]
#[ignore]
async fn test_generate_module_content_rejects_blank_title() {
    let app = common::create_test_app().await;
    let token = register_and_token(&app, "gen-blank-title", Some("admin")).await;

    let (status, _) = post_json(
        &app,
        "/api/v1/ai/generate-module-content",
        Some(&token),
        json!({ "moduleTitle": "" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore]
async fn test_generate_module_content_unconfigured_backend() {
    let app = common::create_test_app().await;
    let token = register_and_token(&app, "gen-no-key", Some("admin")).await;

    // .env.test sets no GEMINI_API_KEY, so the upstream call is refused
    // before any network traffic happens
    let (status, json) = post_json(
        &app,
        "/api/v1/ai/generate-module-content",
        Some(&token),
        json!({ "moduleTitle": "Smoke Detector Placement" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["status"], "error");
}
