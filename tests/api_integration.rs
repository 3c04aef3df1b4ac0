//! API Integration Tests for Sonar
//!
//! Drives a real server over TCP with the simulated probe.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::{Value, json};
use sonar::server::{AppState, create_router};
use sonar::{LogBuffer, ProbeSet, Session, SimulatedProbe};
use tokio::net::TcpListener;

// =============================================================================
// Test Helpers
// =============================================================================

/// Create test app state backed by a fast simulated probe.
fn create_test_state() -> AppState {
    let probe = SimulatedProbe::new(Duration::from_millis(5), Duration::from_millis(10), 0.0);
    let probes = ProbeSet::uniform(Arc::new(probe));
    AppState {
        session: Arc::new(Session::new(probes, Arc::new(LogBuffer::new(100)))),
    }
}

/// Start test server and return base URL.
async fn start_test_server() -> (String, AppState) {
    let state = create_test_state();
    let router = create_router(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let addr = listener.local_addr().expect("Failed to get local addr");

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    // Give server time to start
    tokio::time::sleep(Duration::from_millis(50)).await;

    (format!("http://{}", addr), state)
}

fn simulate_body(target: &str) -> Value {
    json!({
        "target": target,
        "mode": "simulate",
        "method": "HEAD",
        "intervalMs": 200,
        "timeoutMs": 300
    })
}

/// Poll `/api/logs` until a message containing `needle` shows up.
async fn wait_for_log(client: &reqwest::Client, base_url: &str, needle: &str) -> Vec<Value> {
    for _ in 0..100 {
        let logs: Vec<Value> = client
            .get(format!("{}/api/logs", base_url))
            .send()
            .await
            .expect("Failed to fetch logs")
            .json()
            .await
            .expect("Failed to parse logs");
        if logs
            .iter()
            .any(|e| e["message"].as_str().is_some_and(|m| m.contains(needle)))
        {
            return logs;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("log entry containing {needle:?} never appeared");
}

// =============================================================================
// Health Probe Tests
// =============================================================================

#[tokio::test]
async fn test_health_probes() {
    let (base_url, _state) = start_test_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/healthz", base_url))
        .send()
        .await
        .expect("Failed to send healthz request");
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.expect("Failed to parse healthz response");
    assert_eq!(body["status"], "ok");
}

// =============================================================================
// Session API Tests
// =============================================================================

#[tokio::test]
async fn test_session_start_stop() {
    let (base_url, state) = start_test_server().await;
    let client = reqwest::Client::new();

    // Idle before anything is started
    let body: Value = client
        .get(format!("{}/api/session", base_url))
        .send()
        .await
        .expect("Failed to fetch session")
        .json()
        .await
        .unwrap();
    assert_eq!(body["state"], "idle");
    assert!(body["config"].is_null());

    // Start
    let resp = client
        .post(format!("{}/api/session/start", base_url))
        .json(&simulate_body("edge-1"))
        .send()
        .await
        .expect("Failed to start session");
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["state"], "running");
    assert_eq!(body["config"]["target"], "edge-1");
    assert_eq!(body["config"]["intervalMs"], 200);

    let logs = wait_for_log(&client, &base_url, "SIMULATE OK").await;
    assert_eq!(
        logs[0]["message"],
        "Started simulate to edge-1 (interval=200ms, timeout=300ms)"
    );
    assert_eq!(logs[0]["level"], "info");

    // Stop
    let resp = client
        .post(format!("{}/api/session/stop", base_url))
        .send()
        .await
        .expect("Failed to stop session");
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["state"], "idle");

    wait_for_log(&client, &base_url, "Ping session stopped.").await;
    state.session.dispose().await;
}

#[tokio::test]
async fn test_session_start_validation() {
    let (base_url, state) = start_test_server().await;
    let client = reqwest::Client::new();

    let mut body = simulate_body("edge-1");
    body["intervalMs"] = json!(100);

    let resp = client
        .post(format!("{}/api/session/start", base_url))
        .json(&body)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let err: Value = resp.json().await.unwrap();
    assert!(err["error"].as_str().unwrap().contains("200"));

    // Unparseable URL in http mode
    let resp = client
        .post(format!("{}/api/session/start", base_url))
        .json(&json!({ "target": "not a url", "mode": "http" }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    assert!(state.session.logs().is_empty());
}

#[tokio::test]
async fn test_session_after_dispose() {
    let (base_url, state) = start_test_server().await;
    let client = reqwest::Client::new();
    state.session.dispose().await;

    let resp = client
        .post(format!("{}/api/session/start", base_url))
        .json(&simulate_body("edge-1"))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

// =============================================================================
// Logs API Tests
// =============================================================================

#[tokio::test]
async fn test_logs_export_and_clear() {
    let (base_url, state) = start_test_server().await;
    let client = reqwest::Client::new();

    client
        .post(format!("{}/api/session/start", base_url))
        .json(&simulate_body("edge-1"))
        .send()
        .await
        .expect("Failed to start session");
    wait_for_log(&client, &base_url, "SIMULATE OK").await;

    // Export
    let resp = client
        .get(format!("{}/api/logs/export", base_url))
        .send()
        .await
        .expect("Failed to export logs");
    assert_eq!(resp.status(), 200);
    let content_type = resp.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/plain"));
    let text = resp.text().await.unwrap();
    let first = text.lines().next().unwrap();
    assert!(first.starts_with('['));
    assert!(first.ends_with("[INFO] Started simulate to edge-1 (interval=200ms, timeout=300ms)"));

    // Limit
    let logs: Vec<Value> = client
        .get(format!("{}/api/logs?limit=1", base_url))
        .send()
        .await
        .expect("Failed to fetch logs")
        .json()
        .await
        .unwrap();
    assert_eq!(logs.len(), 1);

    // Clear leaves the session running
    let resp = client
        .delete(format!("{}/api/logs", base_url))
        .send()
        .await
        .expect("Failed to clear logs");
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let body: Value = client
        .get(format!("{}/api/session", base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["state"], "running");
    wait_for_log(&client, &base_url, "SIMULATE OK").await;

    state.session.dispose().await;
}
