//! Verdict Router
//!
//! Fans a classified observation out to persistence and notification.
//! The two branches run concurrently on the caller's task and never see
//! each other's failures. Inside the persistence branch the traffic record
//! is always attempted before the incident.

use std::sync::Arc;

use uuid::Uuid;

use crate::error::{RecordKind, SinkFailure};
use crate::logic::features::FeatureRecord;
use crate::logic::sinks::{IncidentDeriver, NotificationSink, PersistenceSink};
use crate::logic::stats::PipelineStats;
use crate::logic::threat::Verdict;
use crate::models::{TrafficMessage, TrafficRecord};

/// What happened to one observation at each sink
#[derive(Debug)]
pub struct RouteOutcome {
    pub traffic: Result<(), SinkFailure>,
    /// `None` when the verdict was Normal
    pub incident: Option<Result<(), SinkFailure>>,
    pub notification: Result<(), SinkFailure>,
}

impl RouteOutcome {
    pub fn failures(&self) -> impl Iterator<Item = &SinkFailure> {
        [
            self.traffic.as_ref().err(),
            self.incident.as_ref().and_then(|r| r.as_ref().err()),
            self.notification.as_ref().err(),
        ]
        .into_iter()
        .flatten()
    }

    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none()
    }
}

#[derive(Clone)]
pub struct VerdictRouter {
    store: Arc<dyn PersistenceSink>,
    notifier: Arc<dyn NotificationSink>,
    incidents: IncidentDeriver,
    stats: Arc<PipelineStats>,
}

impl VerdictRouter {
    pub fn new(
        store: Arc<dyn PersistenceSink>,
        notifier: Arc<dyn NotificationSink>,
        incidents: IncidentDeriver,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self { store, notifier, incidents, stats }
    }

    /// Persist and notify one observation. Failures are logged and counted,
    /// never propagated.
    pub async fn route(&self, id: Uuid, features: &FeatureRecord, verdict: Verdict) -> RouteOutcome {
        let record = TrafficRecord::new(id, features, verdict);
        let message = TrafficMessage::from(&record);

        let ((traffic, incident), notification) =
            tokio::join!(self.persist(&record), self.notify(&message));

        let outcome = RouteOutcome { traffic, incident, notification };
        for failure in outcome.failures() {
            tracing::warn!(
                record_id = %id,
                sink = failure.sink_name(),
                "Sink failure (dropped, not retried): {}",
                failure
            );
        }
        outcome
    }

    async fn persist(
        &self,
        record: &TrafficRecord,
    ) -> (Result<(), SinkFailure>, Option<Result<(), SinkFailure>>) {
        let traffic = self
            .store
            .create_traffic_record(record)
            .await
            .map_err(|source| SinkFailure::Persistence { kind: RecordKind::Traffic, source });
        match &traffic {
            Ok(()) => self.stats.record_persisted(),
            Err(_) => self.stats.record_persistence_failure(),
        }

        // Attempted even when the traffic write failed
        let incident = match self.incidents.derive(record) {
            Some(incident) => {
                let result = self
                    .store
                    .create_incident_record(&incident)
                    .await
                    .map_err(|source| SinkFailure::Persistence { kind: RecordKind::Incident, source });
                match &result {
                    Ok(()) => self.stats.record_incident(),
                    Err(_) => self.stats.record_persistence_failure(),
                }
                Some(result)
            }
            None => None,
        };

        (traffic, incident)
    }

    async fn notify(&self, message: &TrafficMessage) -> Result<(), SinkFailure> {
        let result = self.notifier.notify(message).await.map_err(SinkFailure::from);
        match &result {
            Ok(()) => self.stats.record_notified(),
            Err(_) => self.stats.record_notification_failure(),
        }
        result
    }
}
