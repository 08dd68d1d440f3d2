pub mod access;
pub mod payments;
pub mod storage;

use axum::{
    Router,
    extract::State,
    routing::{get, post},
};
use serde::Serialize;

use crate::config::RateLimitConfig;
use crate::db::AppState;
use crate::extractors::Json;
use crate::rate_limit;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct PingResponse {
    message: String,
}

async fn ping(State(state): State<AppState>) -> Json<PingResponse> {
    Json(PingResponse {
        message: state.ping_message.clone(),
    })
}

fn standard_routes() -> Router<AppState> {
    Router::new()
        .route("/api/ping", get(ping))
        .route("/api/access/evaluate", post(access::evaluate_access))
        .route("/api/entitlements/{user_id}", get(access::get_entitlement))
        .route(
            "/api/entitlements/{user_id}/events",
            get(access::entitlement_events),
        )
        .route("/api/storage/init", post(storage::init_storage))
}

/// The full HTTP surface.
///
/// Per-IP rate limits apply when `rate_limit` is set. They need the peer
/// address, so the server must be run with connect info. Webhooks and the
/// health check are never limited.
pub fn router(rate_limit: Option<RateLimitConfig>) -> Router<AppState> {
    let (client, standard) = match rate_limit {
        Some(limits) => (
            payments::client_router().layer(rate_limit::payments_layer(limits.payments_rpm)),
            standard_routes().layer(rate_limit::standard_layer(limits.standard_rpm)),
        ),
        None => (payments::client_router(), standard_routes()),
    };

    Router::new()
        .route("/health", get(health))
        .merge(client)
        .merge(standard)
        .merge(payments::webhook_router())
}
