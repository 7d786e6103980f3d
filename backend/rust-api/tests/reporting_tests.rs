use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;

mod common;

// These tests exercise the full router against live MongoDB and Redis
// instances configured via .env.test. They are marked with #[ignore];
// run them with `cargo test -- --ignored` once both stores are up.

/// Register a fresh user and return (email, access token)
async fn register_user(
    app: &axum::Router,
    prefix: &str,
    name: &str,
    role: Option<&str>,
) -> (String, String) {
    let email = format!("{}-{}@example.com", prefix, chrono::Utc::now().timestamp_micros());
    let mut request_body = json!({
        "email": email,
        "password": "SecurePassword123!",
        "name": name,
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
    let token = json["access_token"].as_str().unwrap().to_string();

    (email, token)
}

async fn get_json(
    app: &axum::Router,
    uri: &str,
    token: &str,
) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value =
        serde_json::from_str(std::str::from_utf8(&body).unwrap()).unwrap();

    (status, json)
}

async fn submit_assignment(app: &axum::Router, token: &str, answers: serde_json::Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!(
                    "/api/v1/modules/{}/submit-assignment",
                    common::TEST_MODULE_ID
                ))
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .header("content-type", "application/json")
                .body(Body::from(json!({ "answers": answers }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore]
async fn test_trainee_cannot_access_reporting() {
    let app = common::create_test_app().await;
    let (_, token) = register_user(&app, "report-trainee", "No Access", None).await;

    for uri in ["/api/v1/admin/trainees", "/api/v1/admin/leaderboard"] {
        let (status, json) = get_json(&app, uri, &token).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{} should be admin only", uri);
        assert_eq!(json["message"], "Admin access required");
    }
}

#[tokio::test]
#[serial_test::serial]
#[ignore]
async fn test_roster_lists_trainee_with_defaults() {
    let app = common::create_test_app().await;
    let (trainee_email, _) = register_user(&app, "roster-fresh", "Fresh Trainee", None).await;
    let (admin_email, admin_token) =
        register_user(&app, "roster-admin", "Roster Admin", Some("admin")).await;

    let (status, json) = get_json(&app, "/api/v1/admin/trainees", &admin_token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "success");

    let trainees = json["trainees"].as_array().unwrap();

    // Admins never appear in the roster
    assert!(trainees.iter().all(|t| t["email"] != admin_email));

    let row = trainees
        .iter()
        .find(|t| t["email"] == trainee_email)
        .expect("registered trainee missing from roster");
    assert_eq!(row["name"], "Fresh Trainee");

    // Every module gets a row, zeroed when the trainee never touched it
    let module = row["modules"]
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["module_id"] == common::TEST_MODULE_ID)
        .expect("seeded module missing from roster row");
    assert_eq!(module["module_title"], "Fire Extinguisher Basics");
    assert_eq!(module["completed"], false);
    assert_eq!(module["last_score"], 0.0);
    assert_eq!(module["attempts"].as_array().unwrap().len(), 0);
}

#[tokio::test]
#[serial_test::serial]
#[ignore]
async fn test_roster_reflects_latest_attempt() {
    let app = common::create_test_app().await;
    let (trainee_email, trainee_token) =
        register_user(&app, "roster-submit", "Submitting Trainee", None).await;
    let (_, admin_token) =
        register_user(&app, "roster-submit-admin", "Roster Admin", Some("admin")).await;

    // A perfect run followed by a failing one; the roster shows the
    // latest attempt, not the best
    submit_assignment(
        &app,
        &trainee_token,
        json!(["Class B", "Pull", "Water", "Evacuate immediately"]),
    )
    .await;
    submit_assignment(&app, &trainee_token, json!(["Class B", "Pull", "", ""])).await;

    let (_, json) = get_json(&app, "/api/v1/admin/trainees", &admin_token).await;
    let row = json["trainees"]
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["email"] == trainee_email)
        .expect("trainee missing from roster")
        .clone();

    let module = row["modules"]
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["module_id"] == common::TEST_MODULE_ID)
        .expect("seeded module missing")
        .clone();

    assert_eq!(module["last_score"], 50.0);
    assert_eq!(module["completed"], true);
    assert_eq!(module["attempts"].as_array().unwrap().len(), 2);
}

#[tokio::test]
#[serial_test::serial]
#[ignore]
async fn test_leaderboard_ranks_passing_trainees() {
    let app = common::create_test_app().await;
    let (_, trainee_token) =
        register_user(&app, "leaderboard-trainee", "Ranked Trainee", None).await;
    let (_, admin_token) =
        register_user(&app, "leaderboard-admin", "Board Admin", Some("admin")).await;

    submit_assignment(
        &app,
        &trainee_token,
        json!(["Class B", "Pull", "Water", "Evacuate immediately"]),
    )
    .await;

    let (status, json) = get_json(&app, "/api/v1/admin/leaderboard?limit=100", &admin_token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "success");

    let entries = json["leaderboard"].as_array().unwrap();
    let entry = entries
        .iter()
        .find(|e| e["name"] == "Ranked Trainee")
        .expect("passing trainee missing from leaderboard");
    assert_eq!(entry["score"], 100.0);
    assert_eq!(entry["modules_completed"], 1);

    // Entries are ordered by score, best first
    let scores: Vec<f64> = entries
        .iter()
        .map(|e| e["score"].as_f64().unwrap())
        .collect();
    let mut sorted = scores.clone();
    sorted.sort_by(|a, b| b.partial_cmp(a).unwrap());
    assert_eq!(scores, sorted);
}

#[tokio::test]
#[serial_test::serial]
#[ignore]
async fn test_leaderboard_excludes_failing_trainees() {
    let app = common::create_test_app().await;
    let (_, trainee_token) =
        register_user(&app, "leaderboard-fail", "Failing Trainee", None).await;
    let (_, admin_token) =
        register_user(&app, "leaderboard-fail-admin", "Board Admin", Some("admin")).await;

    // One failing attempt only; no passed record means no entry
    submit_assignment(&app, &trainee_token, json!(["Class B", "", "", ""])).await;

    let (_, json) = get_json(&app, "/api/v1/admin/leaderboard?limit=100", &admin_token).await;
    let entries = json["leaderboard"].as_array().unwrap();
    assert!(entries.iter().all(|e| e["name"] != "Failing Trainee"));
}

#[tokio::test]
#[serial_test::serial]
#[ignore]
async fn test_leaderboard_respects_limit() {
    let app = common::create_test_app().await;
    let (_, admin_token) =
        register_user(&app, "leaderboard-limit-admin", "Board Admin", Some("admin")).await;

    let (status, json) = get_json(&app, "/api/v1/admin/leaderboard?limit=1", &admin_token).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["leaderboard"].as_array().unwrap().len() <= 1);
}
