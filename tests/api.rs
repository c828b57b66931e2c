/// HTTP-level tests driving the full router over an in-memory database.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use potaflow::config::Config;
use potaflow::runtime::{Poller, PollerConfig, StubExecutor};
use potaflow::server::{build_state, create_app};
use potaflow::store::{SqliteStore, WorkflowStore};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const PASSWORD: &str = "correct horse battery staple";

fn test_config() -> Config {
    Config::from_lookup(|key| {
        let value = match key {
            "POTAFLOW_JWT_SECRET" => Some("test-secret"),
            "ARGON_MEMORY" => Some("1024"),
            "ARGON_PARALLELISM" => Some("1"),
            _ => None,
        };
        value.map(str::to_string)
    })
    .expect("test config")
}

async fn test_app() -> (Router, SqliteStore) {
    let store = SqliteStore::in_memory().await.expect("in-memory store");
    let state = build_state(&test_config(), store.clone()).expect("state");
    (create_app(state), store)
}

async fn send(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, value)
}

/// POST a body verbatim and return the raw response text
async fn post_raw(app: &Router, uri: &str, token: &str, body: &str) -> (StatusCode, String) {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

async fn register_and_login(app: &Router, email: &str) -> String {
    let (status, _) = send(
        app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({"email": email, "password": PASSWORD})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({"email": email, "password": PASSWORD})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["token"].as_str().expect("token").to_string()
}

#[tokio::test]
async fn health_reports_database_ok() {
    let (app, _) = test_app().await;

    let (status, body) = send(&app, Method::GET, "/healthz", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok", "db": "ok"}));
}

#[tokio::test]
async fn register_validation_and_conflict() {
    let (app, _) = test_app().await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({"email": "a@example.com", "password": PASSWORD})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["email"], "a@example.com");
    assert!(body.get("password_hash").is_none());

    let (status, body) = send(
        &app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({"email": "a@example.com", "password": "other"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "email already exists");

    let (status, _) = send(&app, Method::POST, "/auth/register", None, Some(json!({"email": "b@example.com"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/auth/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_failures_are_uniform() {
    let (app, _) = test_app().await;
    register_and_login(&app, "a@example.com").await;

    let (wrong_status, wrong_body) = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({"email": "a@example.com", "password": "nope"})),
    )
    .await;
    let (unknown_status, unknown_body) = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({"email": "ghost@example.com", "password": PASSWORD})),
    )
    .await;

    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_body, unknown_body);
}

#[tokio::test]
async fn protected_routes_need_a_valid_token() {
    let (app, _) = test_app().await;

    let (status, _) = send(&app, Method::GET, "/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, Method::GET, "/api/workflows", Some("not-a-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let credentials = json!({"email": "me@example.com", "password": PASSWORD});
    let (status, registered) = send(&app, Method::POST, "/auth/register", None, Some(credentials.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, login) = send(&app, Method::POST, "/auth/login", None, Some(credentials)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(login["id"], registered["id"]);

    let token = login["token"].as_str().unwrap();
    let (status, body) = send(&app, Method::GET, "/me", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "me@example.com");
    assert_eq!(body["id"], registered["id"]);
}

#[tokio::test]
async fn workflows_are_isolated_between_users() {
    let (app, _) = test_app().await;
    let alice = register_and_login(&app, "alice@example.com").await;
    let bob = register_and_login(&app, "bob@example.com").await;

    let (status, wf) = send(&app, Method::POST, "/api/workflows", Some(&alice), Some(json!({"name": "mine"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(wf["is_enabled"], true);
    let uri = format!("/api/workflows/{}", wf["id"].as_str().unwrap());

    let (status, _) = send(&app, Method::GET, &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::DELETE, &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::POST, &format!("{uri}/runs"), Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, list) = send(&app, Method::GET, "/api/workflows", Some(&bob), None).await;
    assert_eq!(list, json!([]));

    let (status, updated) = send(
        &app,
        Method::PUT,
        &uri,
        Some(&alice),
        Some(json!({"name": "renamed", "is_enabled": false})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "renamed");
    assert_eq!(updated["is_enabled"], false);

    let (status, body) = send(&app, Method::DELETE, &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, _) = send(&app, Method::GET, &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn triggers_and_actions_round_trip_config() {
    let (app, _) = test_app().await;
    let token = register_and_login(&app, "builder@example.com").await;
    let (_, wf) = send(&app, Method::POST, "/api/workflows", Some(&token), Some(json!({"name": "wf"}))).await;
    let base = format!("/api/workflows/{}", wf["id"].as_str().unwrap());

    let (status, trigger) = send(
        &app,
        Method::POST,
        &format!("{base}/triggers"),
        Some(&token),
        Some(json!({"type": "schedule", "config": {"cron": "*/5 * * * *"}})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(trigger["type"], "schedule");
    assert_eq!(trigger["config"], json!({"cron": "*/5 * * * *"}));

    let (status, _) = send(&app, Method::POST, &format!("{base}/triggers"), Some(&token), Some(json!({"config": {}}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let trigger_uri = format!("{base}/triggers/{}", trigger["id"].as_str().unwrap());
    let (status, updated) = send(
        &app,
        Method::PUT,
        &trigger_uri,
        Some(&token),
        Some(json!({"type": "webhook", "config": {"path": "/hook"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["type"], "webhook");

    for (kind, position) in [("email", 2), ("http", 1)] {
        let (status, _) = send(
            &app,
            Method::POST,
            &format!("{base}/actions"),
            Some(&token),
            Some(json!({"type": kind, "position": position, "config": {"kind": kind}})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, actions) = send(&app, Method::GET, &format!("{base}/actions"), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let types: Vec<&str> = actions.as_array().unwrap().iter().map(|a| a["type"].as_str().unwrap()).collect();
    assert_eq!(types, vec!["http", "email"]);

    let (status, _) = send(&app, Method::DELETE, &trigger_uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, body) = send(&app, Method::DELETE, &trigger_uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "trigger not found");

    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("{base}/actions/does-not-exist"),
        Some(&token),
        Some(json!({"type": "http", "position": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn enqueued_run_is_completed_by_the_poller() {
    let (app, store) = test_app().await;
    let token = register_and_login(&app, "runner@example.com").await;
    let (_, wf) = send(&app, Method::POST, "/api/workflows", Some(&token), Some(json!({"name": "wf"}))).await;
    let base = format!("/api/workflows/{}", wf["id"].as_str().unwrap());

    send(
        &app,
        Method::POST,
        &format!("{base}/actions"),
        Some(&token),
        Some(json!({"type": "http", "position": 1, "config": {}})),
    )
    .await;

    let (status, run) = send(&app, Method::POST, &format!("{base}/runs"), Some(&token), None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(run["status"], "pending");
    assert_eq!(run["trigger_type"], "manual");
    assert_eq!(run["started_at"], Value::Null);

    let poller = Poller::new(Arc::new(store), Arc::new(StubExecutor), PollerConfig::default(), tracing::Span::none());
    let summary = poller.process_once().await;
    assert_eq!(summary.succeeded, 1);

    let (status, runs) = send(&app, Method::GET, &format!("{base}/runs"), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(runs.as_array().unwrap().len(), 1);
    assert_eq!(runs[0]["id"], run["id"]);
    assert_eq!(runs[0]["status"], "success");
    assert!(runs[0]["started_at"].is_string());
    assert!(runs[0]["finished_at"].is_string());

    let run_id = run["id"].as_str().unwrap();
    let (status, logs) = send(&app, Method::GET, &format!("{base}/runs/{run_id}/logs"), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(logs.as_array().unwrap().len(), 1);
    assert_eq!(logs[0]["success"], true);
    assert_eq!(logs[0]["message"], "action execution stubbed");

    let (status, _) = send(&app, Method::GET, &format!("{base}/runs/unknown/logs"), Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn enqueue_accepts_explicit_trigger_type() {
    let (app, _) = test_app().await;
    let token = register_and_login(&app, "hooks@example.com").await;
    let (_, wf) = send(&app, Method::POST, "/api/workflows", Some(&token), Some(json!({"name": "wf"}))).await;

    let (status, run) = send(
        &app,
        Method::POST,
        &format!("/api/workflows/{}/runs", wf["id"].as_str().unwrap()),
        Some(&token),
        Some(json!({"trigger_type": "webhook"})),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(run["trigger_type"], "webhook");
}

#[tokio::test]
async fn config_is_stored_and_returned_byte_for_byte() {
    let (app, store) = test_app().await;
    let token = register_and_login(&app, "raw@example.com").await;
    let (_, wf) = send(&app, Method::POST, "/api/workflows", Some(&token), Some(json!({"name": "wf"}))).await;
    let workflow_id = wf["id"].as_str().unwrap();
    let base = format!("/api/workflows/{workflow_id}");

    let config = r#"{"zeta":1,"alpha":12345678901234567890123}"#;
    let (status, body) = post_raw(
        &app,
        &format!("{base}/triggers"),
        &token,
        &format!(r#"{{"type":"http","config":{config}}}"#),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body.contains(&format!(r#""config":{config}"#)), "got {body}");

    let (status, body) = post_raw(
        &app,
        &format!("{base}/actions"),
        &token,
        &format!(r#"{{"type":"http","position":1,"config":{config}}}"#),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body.contains(&format!(r#""config":{config}"#)), "got {body}");

    let triggers = store.list_triggers_by_workflow(workflow_id).await.unwrap();
    assert_eq!(triggers[0].config, config.as_bytes());
    let actions = WorkflowStore::list_actions_by_workflow(&store, workflow_id).await.unwrap();
    assert_eq!(actions[0].config, config.as_bytes());

    let (status, _) = post_raw(&app, &format!("{base}/triggers"), &token, r#"{"type":"http","config":{"a":}}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
