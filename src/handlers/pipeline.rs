//! Pipeline session status handlers

use axum::{extract::{Path, State}, Json};
use serde::Serialize;
use uuid::Uuid;

use crate::logic::session::SessionInfo;
use crate::{AppError, AppResult, AppState};

#[derive(Serialize)]
pub struct SessionList {
    count: usize,
    sessions: Vec<SessionInfo>,
}

/// List connected sessions
pub async fn list(State(state): State<AppState>) -> Json<SessionList> {
    let sessions = state.sessions.list();
    Json(SessionList { count: sessions.len(), sessions })
}

/// Get single session
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<SessionInfo>> {
    let session = state
        .sessions
        .get(&id)
        .ok_or_else(|| AppError::NotFound("Session not found".to_string()))?;

    Ok(Json(session))
}
