//! Error handling
//!
//! Two families live here:
//! - `AppError`: HTTP-facing errors, rendered as a JSON body.
//! - The pipeline taxonomy. Only `SessionFatalError` ends a session; everything
//!   else is logged, counted and the observation loop moves on.

use axum::{
    response::{IntoResponse, Response},
    http::StatusCode,
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub enum AppError {
    // Resource errors
    NotFound(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.as_str()),
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

// ============================================================================
// PIPELINE ERRORS
// ============================================================================

/// Failure reported by a persistence backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("record rejected: {0}")]
    Validation(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Failure delivering a message to live subscribers.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("subscriber channel closed")]
    Closed,

    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Which persisted record a persistence failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Traffic,
    Incident,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordKind::Traffic => write!(f, "traffic"),
            RecordKind::Incident => write!(f, "incident"),
        }
    }
}

/// A sink operation failed. Never retried, never fatal to the session.
#[derive(Debug, Error)]
pub enum SinkFailure {
    #[error("persistence of {kind} record failed: {source}")]
    Persistence {
        kind: RecordKind,
        #[source]
        source: StoreError,
    },

    #[error("notification failed: {0}")]
    Notification(#[from] NotifyError),
}

impl SinkFailure {
    pub fn sink_name(&self) -> &'static str {
        match self {
            SinkFailure::Persistence { .. } => "persistence",
            SinkFailure::Notification(_) => "notification",
        }
    }
}

/// Internal classifier error. Degrades to the safe default verdict.
#[derive(Debug, Clone, Error)]
#[error("classification fault: {0}")]
pub struct ClassificationFault(pub String);

/// Errors raised by a packet source while producing observations.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("capture device error: {0}")]
    Device(String),

    #[error("source closed")]
    Closed,
}

/// Ends the session; surfaced to the client as connection closure.
#[derive(Debug, Error)]
pub enum SessionFatalError {
    #[error("capture device unavailable: {0}")]
    CaptureUnavailable(String),

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("observation source ended")]
    SourceEnded,
}
