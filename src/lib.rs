//! Traffic Sentry
//!
//! Streaming network traffic classification.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         TRAFFIC SENTRY                           │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌──────────┐   bounded    ┌───────────┐   ┌────────────┐        │
//! │  │  Source  │ ───queue───► │ Extractor │ ► │ Classifier │        │
//! │  │ (worker) │ drop-oldest  └───────────┘   └─────┬──────┘        │
//! │  └──────────┘                                    ▼               │
//! │                                           ┌─────────────┐        │
//! │                                           │   Router    │        │
//! │                                           └──┬───────┬──┘        │
//! │                                 ┌────────────┘       └────────┐  │
//! │                                 ▼                             ▼  │
//! │                        ┌────────────────┐          ┌───────────┐ │
//! │                        │  Persistence   │          │ WebSocket │ │
//! │                        │  (PostgreSQL)  │          │  client   │ │
//! │                        └────────────────┘          └───────────┘ │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod logic;
pub mod models;

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use config::Config;
pub use error::{AppError, AppResult};

use logic::session::SessionRegistry;
use logic::sinks::{IncidentDeriver, PersistenceSink};
use logic::source::{CaptureRegistry, SourceProvider};
use logic::threat::{Classifier, ThresholdClassifier};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn PersistenceSink>,
    pub classifier: Arc<dyn Classifier>,
    pub sources: Arc<SourceProvider>,
    pub sessions: Arc<SessionRegistry>,
    pub incidents: IncidentDeriver,
}

impl AppState {
    /// Wire up the pipeline for `config` on top of an already-open store.
    pub fn new(config: Config, store: Arc<dyn PersistenceSink>) -> Self {
        let capture = Arc::new(CaptureRegistry::from_config(&config));
        let sources = SourceProvider::new(
            config.traffic_source,
            config.synthetic_interval(),
            config.queue_capacity,
            capture,
        );

        Self {
            incidents: IncidentDeriver::new(config.incident_confidence),
            classifier: Arc::new(ThresholdClassifier::new()),
            sources: Arc::new(sources),
            sessions: Arc::new(SessionRegistry::new()),
            store,
            config,
        }
    }
}

/// Create the main router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::check))

        // Live traffic
        .route("/ws/traffic", get(handlers::live::traffic))
        .route("/ws/traffic/", get(handlers::live::traffic))

        // Pipeline status
        .route("/api/v1/pipeline/sessions", get(handlers::pipeline::list))
        .route("/api/v1/pipeline/sessions/:id", get(handlers::pipeline::get))

        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use logic::sinks::MemoryStore;
    use logic::source::SourceKind;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let config = Config {
            traffic_source: SourceKind::Synthetic,
            ..Config::default()
        };
        AppState::new(config, Arc::new(MemoryStore::new()))
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get_json(create_router(test_state()), "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["source"], "synthetic");
        assert_eq!(body["store"], "memory");
        assert_eq!(body["active_sessions"], 0);
    }

    #[tokio::test]
    async fn test_sessions_empty_and_unknown() {
        let state = test_state();

        let (status, body) = get_json(create_router(state.clone()), "/api/v1/pipeline/sessions").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 0);

        let uri = format!("/api/v1/pipeline/sessions/{}", uuid::Uuid::new_v4());
        let (status, body) = get_json(create_router(state), &uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Session not found");
        assert_eq!(body["status"], 404);
    }

    #[tokio::test]
    async fn test_registered_session_is_visible() {
        let state = test_state();
        let session = logic::session::Session::connect(Arc::clone(&state.sessions), SourceKind::Synthetic);

        let uri = format!("/api/v1/pipeline/sessions/{}", session.id());
        let (status, body) = get_json(create_router(state), &uri).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "connecting");
        assert_eq!(body["stats"]["observations"], 0);
    }
}
