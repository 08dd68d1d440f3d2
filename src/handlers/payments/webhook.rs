use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::db::AppState;
use crate::error::msg;
use crate::models::{NewPayment, to_minor_units};
use crate::payments::{PROVIDER_FLUTTERWAVE, WEBHOOK_HASH_HEADER, WebhookEnvelope, verify_webhook_hash};

use super::common::{STATUS_SUCCESSFUL, publish_changes, record_and_activate, resolve_intent};

/// Status plus a short reason, as returned to Flutterwave.
pub type WebhookResult = (StatusCode, &'static str);

const ACK: WebhookResult = (StatusCode::OK, "ok");

fn respond((status, reason): WebhookResult) -> Response {
    if status.is_success() {
        (status, Json(json!({ "ok": true }))).into_response()
    } else {
        (status, Json(json!({ "error": reason }))).into_response()
    }
}

/// Flutterwave webhook receiver.
///
/// Authenticates with the pre-shared `verif-hash` header before reading the
/// body. Once authenticated, bodies that cannot be acted on are acknowledged
/// so Flutterwave stops retrying; only storage failures ask for a retry.
pub async fn handle_flutterwave_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    respond(process_webhook(&state, &headers, &body))
}

fn process_webhook(state: &AppState, headers: &HeaderMap, body: &Bytes) -> WebhookResult {
    let secret = match state.flutterwave.require_webhook_secret() {
        Ok(s) => s,
        Err(_) => {
            tracing::error!("Webhook received but no webhook secret is configured");
            return (StatusCode::INTERNAL_SERVER_ERROR, msg::MISSING_WEBHOOK_SECRET);
        }
    };

    let provided = headers
        .get(WEBHOOK_HASH_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !verify_webhook_hash(secret, provided) {
        tracing::warn!("Webhook rejected: invalid {} header", WEBHOOK_HASH_HEADER);
        return (StatusCode::UNAUTHORIZED, "Unauthorized");
    }

    let raw: serde_json::Value = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("Webhook body is not JSON, acknowledging: {}", e);
            return ACK;
        }
    };
    let envelope: WebhookEnvelope = match serde_json::from_value(raw.clone()) {
        Ok(e) => e,
        Err(e) => {
            tracing::warn!("Unexpected webhook shape, acknowledging: {}", e);
            return ACK;
        }
    };

    let tx_ref = envelope.data.tx_ref.clone().unwrap_or_default();

    let mut conn = match state.db.get() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Webhook: failed to get DB connection: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database error");
        }
    };

    let intent = match resolve_intent(&conn, &tx_ref) {
        Ok(Some(intent)) => intent,
        Ok(None) => {
            tracing::info!("Webhook tx_ref {:?} not actionable, acknowledging", tx_ref);
            return ACK;
        }
        Err(e) => {
            tracing::error!("Webhook: failed to resolve intent: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database error");
        }
    };

    let status = envelope.transaction_status();
    let provider_ref = envelope.data.provider_ref(&tx_ref);
    let payment = NewPayment {
        user_id: &intent.user_id,
        provider: PROVIDER_FLUTTERWAVE,
        provider_ref: &provider_ref,
        amount_cents: to_minor_units(envelope.data.amount.unwrap_or(0.0)),
        currency: envelope.data.currency_or_default(),
        status,
        event: &raw,
    };

    let activate = status == STATUS_SUCCESSFUL;
    match record_and_activate(&mut conn, &intent, &payment, &tx_ref, activate) {
        Ok(outcome) => {
            publish_changes(&state.changes, &intent.user_id, &outcome);
            tracing::info!(
                "Webhook {:?} for {}: payment {} ({:?}), status {:?}, activated={}",
                envelope.event,
                intent.user_id,
                provider_ref,
                outcome.payment_write,
                status,
                outcome.activated
            );
            ACK
        }
        Err(e) => {
            tracing::error!("Webhook: failed to record payment {}: {}", provider_ref, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database error")
        }
    }
}
