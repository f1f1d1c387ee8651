//! Integration tests for TourGuide

use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use httpmock::prelude::*;
use serde_json::{Value, json};
use tower::ServiceExt;

use tourguide::api::AppState;
use tourguide::config::ServerConfig;
use tourguide::location::FixedLocation;
use tourguide::tour::TourSettings;
use tourguide::{ChatCompletionClient, Coordinate, Session, SessionLimits, SessionState, web};

fn client_for(server: &MockServer) -> ChatCompletionClient {
    ChatCompletionClient::new(
        &server.base_url(),
        "integration-key",
        TourSettings::default(),
        Duration::from_secs(5),
    )
    .unwrap()
}

fn limits() -> SessionLimits {
    SessionLimits {
        location_timeout: Duration::from_secs(5),
        fetch_timeout: Duration::from_secs(10),
    }
}

async fn post_tour(server: &MockServer, body: Value) -> (StatusCode, Value) {
    let state = AppState::new(Arc::new(client_for(server)), limits());
    let app = web::app(&ServerConfig::default(), state);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/tour")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

/// The Liberty Island walkthrough from location to ready tour
#[tokio::test]
async fn test_session_liberty_island_scenario() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/chat/completions")
                .header("authorization", "Bearer integration-key")
                .body_contains("latitude 40.689247, longitude -74.044502");
            then.status(200).json_body(json!({
                "choices": [{"message": {"content": "  A tour of Liberty Island...  "}}]
            }));
        })
        .await;

    let client = client_for(&server);
    let acquirer = FixedLocation::new(Coordinate::new(40.689247, -74.044502).unwrap());
    let mut session = Session::new();

    let state = session.run(&acquirer, &client, &limits()).await;

    assert_eq!(state.name(), "tour_ready");
    assert_eq!(state.tour().unwrap().text, "A tour of Liberty Island...");

    // Re-running a finished session must not call the endpoint again
    session.run(&acquirer, &client, &limits()).await;
    assert_eq!(mock.hits_async().await, 1);
}

#[tokio::test]
async fn test_session_upstream_failure() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(500).body("server exploded");
        })
        .await;

    let client = client_for(&server);
    let acquirer = FixedLocation::new(Coordinate::new(48.8584, 2.2945).unwrap());
    let mut session = Session::new();

    let state = session.run(&acquirer, &client, &limits()).await.clone();

    match state {
        SessionState::TourFailed { failure, .. } => {
            assert_eq!(failure.code(), "upstream_error");
            assert!(failure.to_string().contains("500"));
        }
        other => panic!("unexpected state: {other:?}"),
    }
}

#[tokio::test]
async fn test_api_tour_ready() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200).json_body(json!({
                "choices": [{"message": {"content": "\nThe Colosseum was completed in 80 AD.\n"}}]
            }));
        })
        .await;

    let (status, body) = post_tour(&server, json!({"latitude": 41.8902, "longitude": 12.4922})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "tour_ready");
    assert_eq!(body["text"], "The Colosseum was completed in 80 AD.");
    assert_eq!(body["latitude"], 41.8902);
    assert_eq!(body["longitude"], 12.4922);
}

#[tokio::test]
async fn test_api_permission_denied_skips_fetch() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200)
                .json_body(json!({"choices": [{"message": {"content": "unused"}}]}));
        })
        .await;

    let (status, body) = post_tour(&server, json!({"error_code": 1})).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["state"], "location_failed");
    assert_eq!(body["error"], "permission_denied");
    assert!(body.get("text").is_none());
    assert_eq!(mock.hits_async().await, 0);
}

#[tokio::test]
async fn test_api_auth_failure() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(401).json_body(json!({"error": {"message": "bad key"}}));
        })
        .await;

    let (status, body) = post_tour(&server, json!({"latitude": 1.0, "longitude": 2.0})).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["state"], "tour_failed");
    assert_eq!(body["error"], "auth_error");
    assert!(body["message"].as_str().unwrap().contains("API key"));
}

#[tokio::test]
async fn test_api_health() {
    let server = MockServer::start_async().await;
    let state = AppState::new(Arc::new(client_for(&server)), limits());
    let app = web::app(&ServerConfig::default(), state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], tourguide::VERSION);
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = Command::new(env!("CARGO_BIN_EXE_tourguide"))
        .arg("--help")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("tour"));
    assert!(stdout.contains("serve"));
}

/// A missing credential stops the command before any session starts
#[test]
fn test_cli_missing_api_key() {
    let dir = tempfile::tempdir().unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_tourguide"))
        .env_remove("OPENAI_API_KEY")
        .env_remove("TOURGUIDE_LLM__API_KEY")
        .args(["--config"])
        .arg(dir.path().join("missing.toml"))
        .args(["tour", "--at", "40.689247,-74.044502"])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("No API key configured"), "got: {stderr}");
}

/// Invalid coordinates are rejected by argument parsing
#[test]
fn test_cli_rejects_invalid_coordinates() {
    let output = Command::new(env!("CARGO_BIN_EXE_tourguide"))
        .args(["tour", "--at", "95,10"])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Latitude must be between -90 and 90"), "got: {stderr}");
}

/// An unanswered permission prompt must not keep the process alive once the
/// location wait has expired
#[test]
fn test_cli_exits_when_permission_prompt_times_out() {
    use std::io::Write;
    use std::process::Stdio;
    use std::time::Instant;

    let mut config = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        config,
        r#"
[location]
provider = "ip"
ip_lookup_url = "http://127.0.0.1:9/json"
timeout_seconds = 1
"#
    )
    .unwrap();

    let mut child = Command::new(env!("CARGO_BIN_EXE_tourguide"))
        .env("OPENAI_API_KEY", "sk-test")
        .env_remove("TOURGUIDE_LLM__API_KEY")
        .arg("--config")
        .arg(config.path())
        .arg("tour")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to execute command");

    // Held open so the prompt never sees an answer or end of input
    let stdin = child.stdin.take();

    let deadline = Instant::now() + Duration::from_secs(15);
    let status = loop {
        if let Some(status) = child.try_wait().unwrap() {
            break Some(status);
        }
        if Instant::now() >= deadline {
            break None;
        }
        std::thread::sleep(Duration::from_millis(50));
    };

    if status.is_none() {
        child.kill().unwrap();
    }
    let output = child.wait_with_output().unwrap();
    drop(stdin);

    let status = status.expect("tour command still running after the location timeout");
    assert!(!status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("took too long"), "got: {stderr}");
}
