use axum::extract::State;
use serde::Serialize;

use crate::db::AppState;
use crate::error::Result;
use crate::extractors::Json;
use crate::storage;

#[derive(Debug, Serialize)]
pub struct StorageInitResponse {
    pub ok: bool,
    pub buckets: Vec<String>,
}

/// Idempotently create the default public buckets.
pub async fn init_storage(State(state): State<AppState>) -> Result<Json<StorageInitResponse>> {
    let conn = state.db.get()?;
    let buckets = storage::ensure_default_buckets(&conn, &state.storage_root)?;
    Ok(Json(StorageInitResponse { ok: true, buckets }))
}
