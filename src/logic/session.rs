//! Sessions
//!
//! A session is one client's live subscription, bound to one source:
//!
//! ```text
//! Connecting ──► Active ──► Closing ──► Closed
//!      └──────────────────────►┘
//! ```
//!
//! The observation loop (`Pipeline::run`) drains the session's source queue
//! in order: extract, classify, route. Only a `SessionFatalError` or
//! cancellation ends it.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::SessionFatalError;
use crate::logic::features::{try_extract, RawObservation};
use crate::logic::router::{RouteOutcome, VerdictRouter};
use crate::logic::source::{ObservationStream, SourceEvent, SourceKind};
use crate::logic::stats::{PipelineStats, StatsSnapshot};
use crate::logic::threat::{classify_safely, Classifier};

// ============================================================================
// STATE MACHINE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Connecting,
    Active,
    Closing,
    Closed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Connecting => "connecting",
            SessionState::Active => "active",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
        }
    }

    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Connecting, Active) | (Connecting, Closing) | (Active, Closing) | (Closing, Closed)
        )
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid session transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: SessionState,
    pub to: SessionState,
}

// ============================================================================
// CANCELLATION
// ============================================================================

/// Triggers cancellation of one session
#[derive(Debug)]
pub struct Canceller {
    tx: watch::Sender<bool>,
}

/// Observes cancellation; cheap to clone
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

pub fn cancel_pair() -> (Canceller, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (Canceller { tx }, CancelToken { rx })
}

impl Canceller {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancelled, or once the `Canceller` is dropped.
    pub async fn cancelled(&mut self) {
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

/// Per-session observation processing: Extractor → Classifier → Router
pub struct Pipeline {
    classifier: Arc<dyn Classifier>,
    router: VerdictRouter,
    stats: Arc<PipelineStats>,
}

impl Pipeline {
    pub fn new(classifier: Arc<dyn Classifier>, router: VerdictRouter, stats: Arc<PipelineStats>) -> Self {
        Self { classifier, router, stats }
    }

    pub fn stats(&self) -> &Arc<PipelineStats> {
        &self.stats
    }

    /// Process one observation end to end. Never fails.
    pub async fn process(&self, obs: &RawObservation) -> RouteOutcome {
        self.stats.record_observation();

        let features = match try_extract(obs) {
            Ok(record) => record,
            Err(degraded) => {
                self.stats.record_degraded();
                tracing::debug!(reasons = ?degraded.reasons, "Observation degraded, defaults applied");
                degraded.into_record()
            }
        };

        let (verdict, fault) = classify_safely(self.classifier.as_ref(), &features);
        if fault.is_some() {
            self.stats.record_classification_fault();
        }
        if !verdict.is_normal() {
            self.stats.record_flagged();
        }

        self.router.route(Uuid::new_v4(), &features, verdict).await
    }

    /// Drain `stream` until cancelled (`Ok`) or the source ends (`Err`).
    ///
    /// Cancellation is checked between observations; routing of the current
    /// observation always runs to completion.
    pub async fn run(
        &self,
        stream: &mut ObservationStream,
        mut cancel: CancelToken,
    ) -> Result<(), SessionFatalError> {
        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                event = stream.next() => event,
            };

            match event {
                SourceEvent::Observation(obs) => {
                    self.process(&obs).await;
                }
                SourceEvent::Dropped(count) => {
                    self.stats.record_dropped(count);
                    tracing::warn!(dropped = count, "Session fell behind its source, oldest observations dropped");
                }
                SourceEvent::Ended => return Err(SessionFatalError::SourceEnded),
            }
        }
    }
}

// ============================================================================
// SESSION REGISTRY
// ============================================================================

struct SessionEntry {
    source: SourceKind,
    state: SessionState,
    connected_at: DateTime<Utc>,
    stats: Arc<PipelineStats>,
}

/// Point-in-time view of a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub id: Uuid,
    pub source: SourceKind,
    pub state: SessionState,
    pub connected_at: DateTime<Utc>,
    pub stats: StatsSnapshot,
}

/// Sessions currently connected to this process
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, SessionEntry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    pub fn get(&self, id: &Uuid) -> Option<SessionInfo> {
        self.sessions.read().get(id).map(|entry| Self::info(*id, entry))
    }

    /// Oldest first
    pub fn list(&self) -> Vec<SessionInfo> {
        let mut sessions: Vec<SessionInfo> = self
            .sessions
            .read()
            .iter()
            .map(|(id, entry)| Self::info(*id, entry))
            .collect();
        sessions.sort_by_key(|s| s.connected_at);
        sessions
    }

    fn info(id: Uuid, entry: &SessionEntry) -> SessionInfo {
        SessionInfo {
            id,
            source: entry.source,
            state: entry.state,
            connected_at: entry.connected_at,
            stats: entry.stats.snapshot(),
        }
    }

    fn insert(&self, id: Uuid, entry: SessionEntry) {
        self.sessions.write().insert(id, entry);
    }

    fn set_state(&self, id: &Uuid, state: SessionState) {
        if let Some(entry) = self.sessions.write().get_mut(id) {
            entry.state = state;
        }
    }

    fn remove(&self, id: &Uuid) {
        self.sessions.write().remove(id);
    }
}

// ============================================================================
// SESSION
// ============================================================================

/// One client connection. Deregisters itself when dropped.
pub struct Session {
    id: Uuid,
    state: SessionState,
    stats: Arc<PipelineStats>,
    registry: Arc<SessionRegistry>,
}

impl Session {
    /// Register a new session in `Connecting`.
    pub fn connect(registry: Arc<SessionRegistry>, source: SourceKind) -> Self {
        let id = Uuid::new_v4();
        let stats = Arc::new(PipelineStats::new());

        registry.insert(
            id,
            SessionEntry {
                source,
                state: SessionState::Connecting,
                connected_at: Utc::now(),
                stats: Arc::clone(&stats),
            },
        );
        tracing::info!(session_id = %id, source = %source, "Session connecting");

        Self { id, state: SessionState::Connecting, stats, registry }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stats(&self) -> Arc<PipelineStats> {
        Arc::clone(&self.stats)
    }

    pub fn transition(&mut self, next: SessionState) -> Result<(), InvalidTransition> {
        if !self.state.can_transition_to(next) {
            return Err(InvalidTransition { from: self.state, to: next });
        }

        tracing::debug!(session_id = %self.id, from = %self.state, to = %next, "Session transition");
        self.state = next;
        self.registry.set_state(&self.id, next);
        Ok(())
    }

    /// Move to `Closing` from wherever the session is. No-op once closing.
    pub fn begin_close(&mut self) {
        if matches!(self.state, SessionState::Connecting | SessionState::Active) {
            let _ = self.transition(SessionState::Closing);
        }
    }

    /// Finish teardown. Call once the source has stopped.
    pub fn finish(mut self) {
        self.begin_close();
        let _ = self.transition(SessionState::Closed);

        let snapshot = self.stats.snapshot();
        tracing::info!(
            session_id = %self.id,
            observations = snapshot.observations,
            flagged = snapshot.flagged,
            dropped = snapshot.dropped,
            "Session closed"
        );
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.registry.remove(&self.id);
    }
}
