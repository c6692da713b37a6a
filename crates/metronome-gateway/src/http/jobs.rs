//! Scheduler admin endpoints under `/c/job/*`.
//!
//! All routes operate on entry ids as issued by the scheduler. A missing or
//! unparseable `id` query parameter is a 400; `id=0` (never issued) and
//! unknown ids on lookups are 404. Pause/start/run on an unknown nonzero id
//! succeed as no-ops, matching the underlying scheduler operations.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use metronome_scheduler::{EntryId, EntrySnapshot, RunLog};

use crate::app::AppState;

#[derive(Deserialize)]
pub struct IdQuery {
    id: Option<String>,
}

/// Parse the `id` parameter: 400 when missing/garbage, 404 when zero.
fn entry_id(query: &IdQuery) -> Result<EntryId, (StatusCode, Json<Value>)> {
    let raw = query.id.as_deref().ok_or((
        StatusCode::BAD_REQUEST,
        Json(json!({"error": "missing id parameter"})),
    ))?;
    let id: u64 = raw.parse().map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": format!("invalid id {raw:?}")})),
        )
    })?;
    if id == 0 {
        return Err((StatusCode::NOT_FOUND, Json(json!({"error": "no such entry"}))));
    }
    Ok(EntryId(id))
}

/// GET /c/job/list — all entries, sorted by next firing instant.
pub async fn list_handler(State(state): State<Arc<AppState>>) -> Json<Vec<EntrySnapshot>> {
    Json(state.scheduler.entries())
}

/// GET /c/job/log?id= — the entry's recent run records.
pub async fn log_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IdQuery>,
) -> Result<Json<Vec<RunLog>>, (StatusCode, Json<Value>)> {
    let id = entry_id(&query)?;
    let entry = state.scheduler.entry(id).ok_or((
        StatusCode::NOT_FOUND,
        Json(json!({"error": "no such entry"})),
    ))?;
    Ok(Json(entry.logs))
}

/// POST /c/job/pause?id= — stop dispatching the entry.
pub async fn pause_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IdQuery>,
) -> Result<StatusCode, (StatusCode, Json<Value>)> {
    let id = entry_id(&query)?;
    state.scheduler.pause_entry(id);
    Ok(StatusCode::OK)
}

/// POST /c/job/start?id= — resume a paused entry.
pub async fn start_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IdQuery>,
) -> Result<StatusCode, (StatusCode, Json<Value>)> {
    let id = entry_id(&query)?;
    state.scheduler.resume_entry(id);
    Ok(StatusCode::OK)
}

/// POST /c/job/run?id= — dispatch one immediate execution.
pub async fn run_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IdQuery>,
) -> Result<StatusCode, (StatusCode, Json<Value>)> {
    let id = entry_id(&query)?;
    state.scheduler.run_entry(id);
    Ok(StatusCode::OK)
}
