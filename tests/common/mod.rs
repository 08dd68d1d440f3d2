//! Test utilities and fixtures for Aminid integration tests

#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{Request, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

pub use aminid::config::{FlutterwaveConfig, Pricing};
pub use aminid::db::{AppState, DbPool, init_db, queries};
pub use aminid::entitlements::ChangeHub;
pub use aminid::models::*;

pub const WEBHOOK_SECRET: &str = "flw_test_webhook_secret";
pub const SECRET_KEY: &str = "FLWSECK_TEST-secret";
pub const PUBLIC_KEY: &str = "FLWPUBK_TEST-public";

/// A base URL nothing listens on.
pub const UNREACHABLE_API: &str = "http://127.0.0.1:1";

/// Create an in-memory database shared by every connection in the pool.
/// Each call gets its own database.
pub fn setup_test_pool() -> DbPool {
    let uri = format!(
        "file:aminid_test_{}?mode=memory&cache=shared",
        uuid::Uuid::new_v4().simple()
    );
    let manager = SqliteConnectionManager::file(uri);
    let pool = Pool::builder().max_size(4).build(manager).unwrap();
    {
        let conn = pool.get().unwrap();
        init_db(&conn).unwrap();
    }
    pool
}

/// Standalone connection for query-level tests.
pub fn setup_test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
    init_db(&conn).expect("Failed to initialize schema");
    conn
}

pub fn test_storage_root() -> PathBuf {
    std::env::temp_dir().join(format!("aminid_storage_{}", uuid::Uuid::new_v4().simple()))
}

/// App state with all secrets configured against `api_base`.
pub fn create_test_app_state(api_base: &str) -> AppState {
    AppState {
        db: setup_test_pool(),
        http_client: reqwest::Client::new(),
        flutterwave: FlutterwaveConfig {
            secret_key: Some(SECRET_KEY.to_string()),
            webhook_secret: Some(WEBHOOK_SECRET.to_string()),
            public_key: Some(PUBLIC_KEY.to_string()),
            api_base: api_base.to_string(),
        },
        pricing: Pricing::default(),
        storage_root: test_storage_root(),
        ping_message: "ping".to_string(),
        changes: ChangeHub::default(),
    }
}

/// Full router without rate limits (oneshot requests carry no peer address).
pub fn app(state: AppState) -> Router {
    aminid::handlers::router(None).with_state(state)
}

pub fn create_test_profile(conn: &Connection, id: &str, role: Role) -> Profile {
    queries::create_profile(
        conn,
        &CreateProfile {
            id: id.to_string(),
            role,
            status: AccountStatus::Active,
        },
    )
    .expect("Failed to create test profile")
}

pub fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
        row.get(0)
    })
    .unwrap()
}

// ============ Requests ============

pub async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    read_json(response).await
}

pub async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    read_json(response).await
}

/// Post a raw webhook body, with the `verif-hash` header when given.
pub async fn post_webhook(
    app: Router,
    uri: &str,
    hash: Option<&str>,
    body: impl Into<Body>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(hash) = hash {
        builder = builder.header("verif-hash", hash);
    }
    let response = app.oneshot(builder.body(body.into()).unwrap()).await.unwrap();
    read_json(response).await
}

async fn read_json(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::Null)
    };
    (status, json)
}

// ============ Provider payloads ============

/// A successful verify reply from Flutterwave.
pub fn verify_success(transaction_id: i64, tx_ref: &str, amount: f64) -> Value {
    json!({
        "status": "success",
        "message": "Transaction fetched successfully",
        "data": {
            "id": transaction_id,
            "tx_ref": tx_ref,
            "amount": amount,
            "currency": "NGN",
            "status": "successful"
        }
    })
}

pub fn verify_failed(transaction_id: i64, tx_ref: &str) -> Value {
    json!({
        "status": "success",
        "message": "Transaction fetched successfully",
        "data": {
            "id": transaction_id,
            "tx_ref": tx_ref,
            "amount": 2500,
            "currency": "NGN",
            "status": "failed"
        }
    })
}

/// A `charge.completed` webhook body.
pub fn charge_event(transaction_id: i64, tx_ref: &str, status: &str, amount: f64) -> Value {
    json!({
        "event": "charge.completed",
        "data": {
            "id": transaction_id,
            "tx_ref": tx_ref,
            "amount": amount,
            "currency": "NGN",
            "status": status
        }
    })
}

// ============ Fake Flutterwave API ============

#[derive(Clone, Default)]
struct FakeState {
    replies: Arc<Mutex<HashMap<i64, (StatusCode, Value)>>>,
    calls: Arc<AtomicUsize>,
}

/// Verify endpoint served on an ephemeral local port.
/// Unknown transaction ids answer 404.
pub struct FakeFlutterwave {
    pub base_url: String,
    state: FakeState,
}

impl FakeFlutterwave {
    pub async fn start() -> Self {
        let state = FakeState::default();
        let router = Router::new()
            .route("/v3/transactions/{id}/verify", get(fake_verify))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    pub fn reply(&self, transaction_id: i64, status: StatusCode, body: Value) {
        self.state
            .replies
            .lock()
            .unwrap()
            .insert(transaction_id, (status, body));
    }

    pub fn calls(&self) -> usize {
        self.state.calls.load(Ordering::SeqCst)
    }
}

async fn fake_verify(
    State(state): State<FakeState>,
    Path(id): Path<i64>,
    headers: axum::http::HeaderMap,
) -> axum::response::Response {
    state.calls.fetch_add(1, Ordering::SeqCst);

    let expected = format!("Bearer {}", SECRET_KEY);
    if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some(expected.as_str()) {
        return (
            StatusCode::UNAUTHORIZED,
            axum::Json(json!({ "status": "error", "message": "Invalid authorization key" })),
        )
            .into_response();
    }

    let reply = state.replies.lock().unwrap().get(&id).cloned();
    match reply {
        Some((status, body)) => (status, axum::Json(body)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            axum::Json(json!({ "status": "error", "message": "No transaction was found for this id" })),
        )
            .into_response(),
    }
}
