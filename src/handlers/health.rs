//! Health check handler

use axum::{extract::State, Json};
use serde::Serialize;

use crate::logic::source::SourceKind;
use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    timestamp: i64,
    source: SourceKind,
    store: &'static str,
    active_sessions: usize,
}

pub async fn check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().timestamp(),
        source: state.sources.kind(),
        store: state.store.name(),
        active_sessions: state.sessions.len(),
    })
}
