pub mod checkout;
pub mod common;
pub mod verify;
pub mod webhook;

pub use checkout::create_checkout;
pub use verify::verify_payment;
pub use webhook::handle_flutterwave_webhook;

use axum::{Router, routing::post};

use crate::db::AppState;

/// Client-facing payment routes. These call out to Flutterwave or write
/// checkout rows, so they sit behind the payments rate limit.
pub fn client_router() -> Router<AppState> {
    Router::new()
        .route("/api/payments/verify", post(verify_payment))
        .route("/api/payments/checkout", post(create_checkout))
}

/// Provider webhook routes. `/flw/webhook` is the legacy path.
pub fn webhook_router() -> Router<AppState> {
    Router::new()
        .route("/api/payments/webhook", post(handle_flutterwave_webhook))
        .route("/flw/webhook", post(handle_flutterwave_webhook))
}
