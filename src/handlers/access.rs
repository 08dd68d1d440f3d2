use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::access::{self, Decision, Gate, Overlay, Price, SubscriptionState, Viewer};
use crate::db::{AppState, queries};
use crate::entitlements::{EntitlementStatus, EntitlementWatch, compute_active, load_status};
use crate::error::Result;
use crate::extractors::{Json, Path};

/// SSE event name for entitlement updates.
pub const ENTITLEMENT_EVENT: &str = "entitlement";

#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub premium: bool,
    /// Rich-content blocks, in reading order
    #[serde(default)]
    pub blocks: Option<Vec<serde_json::Value>>,
    /// Plain-text paragraphs, in reading order
    #[serde(default)]
    pub paragraphs: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct EvaluateResponse {
    pub gate: Gate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible_blocks: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible_paragraphs: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocks: Option<Vec<serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paragraphs: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overlay: Option<Overlay>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Build the viewer for `user_id`. Lookup failures gate rather than error.
fn load_viewer(conn: &Connection, user_id: Option<&str>) -> Viewer {
    let Some(user_id) = user_id.filter(|u| !u.is_empty()) else {
        return Viewer::anonymous();
    };

    let profile = match queries::get_profile(conn, user_id) {
        Ok(Some(p)) => p,
        Ok(None) => return Viewer::anonymous(),
        Err(e) => {
            tracing::warn!("Access: failed to load profile {}: {}", user_id, e);
            return Viewer::anonymous();
        }
    };

    let subscription = match compute_active(conn, user_id, queries::now()) {
        Ok(active) => SubscriptionState::from_active(active),
        Err(e) => {
            tracing::warn!("Access: failed to load subscription for {}: {}", user_id, e);
            SubscriptionState::Pending
        }
    };

    Viewer::from_profile(&profile, subscription)
}

fn revealed<T: Clone>(items: &Option<Vec<T>>, decision: Option<&Decision>) -> Option<Vec<T>> {
    items
        .as_deref()
        .zip(decision)
        .map(|(items, decision)| access::reveal(items, decision).0.to_vec())
}

/// Decide how much of a content item the viewer may see.
pub async fn evaluate_access(
    State(state): State<AppState>,
    Json(request): Json<EvaluateRequest>,
) -> Result<Json<EvaluateResponse>> {
    let viewer = {
        let conn = state.db.get()?;
        load_viewer(&conn, request.user_id.as_deref())
    };
    let price = Price::ngn(state.pricing.reader_monthly);

    let block_decision = request
        .blocks
        .as_ref()
        .map(|b| access::evaluate(&viewer, request.premium, b.len(), &price));
    let paragraph_decision = request
        .paragraphs
        .as_ref()
        .map(|p| access::evaluate(&viewer, request.premium, p.len(), &price));

    let overlay = block_decision
        .as_ref()
        .and_then(|d| d.overlay.clone())
        .or_else(|| paragraph_decision.as_ref().and_then(|d| d.overlay.clone()));

    Ok(Json(EvaluateResponse {
        gate: access::gate_for(&viewer, request.premium),
        visible_blocks: block_decision.as_ref().map(|d| d.visible),
        visible_paragraphs: paragraph_decision.as_ref().map(|d| d.visible),
        blocks: revealed(&request.blocks, block_decision.as_ref()),
        paragraphs: revealed(&request.paragraphs, paragraph_decision.as_ref()),
        message: overlay.as_ref().map(Overlay::message),
        overlay,
    }))
}

pub async fn get_entitlement(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<EntitlementStatus>> {
    let conn = state.db.get()?;
    let status = load_status(&conn, &user_id, queries::now())?;
    Ok(Json(status))
}

/// Stream entitlement updates for one viewer as server-sent events.
///
/// The current state is sent first, then every distinct change. The watch is
/// released when the client goes away and the stream is dropped.
pub async fn entitlement_events(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    tracing::debug!("Entitlement stream opened for {}", user_id);
    let watch = EntitlementWatch::spawn(state.db.clone(), &state.changes, user_id);

    let events = stream::unfold((watch, true), |(mut watch, first)| async move {
        let next = if first {
            watch.observe()
        } else {
            watch.changed().await.ok()?
        };

        let event = match Event::default().event(ENTITLEMENT_EVENT).json_data(&next) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("Entitlement stream: failed to encode state: {}", e);
                return None;
            }
        };
        Some((Ok(event), (watch, false)))
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}
