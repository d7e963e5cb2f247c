use super::*;
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use storage::{KeyValueStore, Storage};
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Clone, Default)]
struct BackendState {
    auth_bodies: Arc<Mutex<Vec<Value>>>,
    run_bodies: Arc<Mutex<Vec<Value>>>,
}

async fn handle_auth_google(
    State(state): State<BackendState>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.auth_bodies.lock().await.push(body.clone());
    match body.get("code").and_then(Value::as_str) {
        Some("good-code") => (
            StatusCode::OK,
            Json(json!({
                "user": {
                    "email": "a@b.com",
                    "name": "A",
                    "picture": "https://example.com/a.png",
                    "verified_email": true
                }
            })),
        ),
        Some("malformed-code") => (StatusCode::OK, Json(json!({ "status": "ok" }))),
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "detail": "invalid_grant" })),
        ),
    }
}

async fn handle_run_agent(
    State(state): State<BackendState>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.run_bodies.lock().await.push(body.clone());
    match body.get("email").and_then(Value::as_str) {
        Some("a@b.com") => (
            StatusCode::OK,
            Json(json!({ "agent_response": "Archived 5 emails\nDrafted 2 replies" })),
        ),
        _ => (
            StatusCode::NOT_FOUND,
            Json(json!({ "detail": [{ "loc": ["body", "email"], "msg": "user not found" }] })),
        ),
    }
}

async fn spawn_backend_server() -> Result<(String, BackendState)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = BackendState::default();
    let app = Router::new()
        .route("/auth/google", post(handle_auth_google))
        .route("/run-agent", post(handle_run_agent))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}"), state))
}

#[test]
fn api_base_trailing_slash_is_trimmed() {
    let backend = HttpAgentBackend::new(" http://localhost:8000/ ").expect("backend");
    assert_eq!(backend.api_base(), "http://localhost:8000");
}

#[tokio::test]
async fn exchange_auth_code_posts_code_and_returns_user() {
    let (server_url, state) = spawn_backend_server().await.expect("spawn server");
    let backend = HttpAgentBackend::new(format!("{server_url}/")).expect("backend");

    let user = backend
        .exchange_auth_code("good-code")
        .await
        .expect("exchange");
    assert_eq!(user.email, "a@b.com");
    assert_eq!(user.name.as_deref(), Some("A"));
    assert_eq!(user.picture.as_deref(), Some("https://example.com/a.png"));

    let bodies = state.auth_bodies.lock().await;
    assert_eq!(bodies.as_slice(), &[json!({ "code": "good-code" })]);
}

#[tokio::test]
async fn exchange_auth_code_surfaces_backend_detail_on_error_status() {
    let (server_url, _) = spawn_backend_server().await.expect("spawn server");
    let backend = HttpAgentBackend::new(server_url).expect("backend");

    let err = backend
        .exchange_auth_code("expired-code")
        .await
        .expect_err("rejected code");
    let message = format!("{err:#}");
    assert!(message.contains("400"), "unexpected error: {message}");
    assert!(message.contains("invalid_grant"), "unexpected error: {message}");
}

#[tokio::test]
async fn exchange_auth_code_rejects_malformed_body() {
    let (server_url, _) = spawn_backend_server().await.expect("spawn server");
    let backend = HttpAgentBackend::new(server_url).expect("backend");

    let err = backend
        .exchange_auth_code("malformed-code")
        .await
        .expect_err("malformed body");
    assert!(format!("{err:#}").contains("malformed response body from /auth/google"));
}

#[tokio::test]
async fn run_agent_posts_email_and_returns_report_text() {
    let (server_url, state) = spawn_backend_server().await.expect("spawn server");
    let backend = HttpAgentBackend::new(server_url).expect("backend");

    let report = backend.run_agent("a@b.com").await.expect("run");
    assert_eq!(report, "Archived 5 emails\nDrafted 2 replies");

    let bodies = state.run_bodies.lock().await;
    assert_eq!(bodies.as_slice(), &[json!({ "email": "a@b.com" })]);
}

#[tokio::test]
async fn run_agent_joins_validation_messages_from_detail_list() {
    let (server_url, _) = spawn_backend_server().await.expect("spawn server");
    let backend = HttpAgentBackend::new(server_url).expect("backend");

    let err = backend
        .run_agent("ghost@b.com")
        .await
        .expect_err("unknown user");
    let message = format!("{err:#}");
    assert!(message.contains("404"), "unexpected error: {message}");
    assert!(message.contains("user not found"), "unexpected error: {message}");
}

#[tokio::test]
async fn unreachable_backend_reports_connection_failure() {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let backend = HttpAgentBackend::with_timeout(format!("http://{addr}"), Duration::from_secs(2))
        .expect("backend");
    let err = backend.run_agent("a@b.com").await.expect_err("no server");
    assert!(format!("{err:#}").contains("failed to reach"));
}

#[tokio::test]
async fn controller_runs_full_session_against_http_backend_and_sqlite_store() {
    let (server_url, state) = spawn_backend_server().await.expect("spawn server");
    let backend = Arc::new(HttpAgentBackend::new(server_url).expect("backend"));
    let store = Arc::new(Storage::new("sqlite::memory:").await.expect("db"));

    let controller = SessionController::new(backend.clone(), store.clone());
    controller.complete_login("good-code").await.expect("login");
    let report = controller
        .run_agent()
        .await
        .expect("run")
        .expect("signed in");
    assert_eq!(report.lines, vec!["Archived 5 emails", "Drafted 2 replies"]);

    let view = controller.view();
    assert_eq!(
        view.log,
        vec![
            RUN_STARTED_LINE.to_string(),
            RUN_COMPLETED_LINE.to_string(),
            "Archived 5 emails".to_string(),
            "Drafted 2 replies".to_string(),
        ]
    );
    assert!(!view.loading);

    let restarted = SessionController::new(backend, store.clone());
    let restored = restarted
        .restore_session()
        .await
        .expect("restore")
        .expect("persisted user");
    assert_eq!(Some(restored), view.user);
    assert_eq!(state.auth_bodies.lock().await.len(), 1);

    restarted.logout().await.expect("logout");
    assert!(store
        .get(shared::domain::PERSISTED_USER_KEY)
        .await
        .expect("get")
        .is_none());
}
