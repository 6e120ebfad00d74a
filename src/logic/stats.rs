//! Pipeline counters
//!
//! Lock-free per-session counters; the status endpoint reads snapshots.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct PipelineStats {
    observations: AtomicU64,
    degraded: AtomicU64,
    classification_faults: AtomicU64,
    flagged: AtomicU64,
    persisted: AtomicU64,
    incidents: AtomicU64,
    notified: AtomicU64,
    persistence_failures: AtomicU64,
    notification_failures: AtomicU64,
    dropped: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub observations: u64,
    pub degraded: u64,
    pub classification_faults: u64,
    pub flagged: u64,
    pub persisted: u64,
    pub incidents: u64,
    pub notified: u64,
    pub persistence_failures: u64,
    pub notification_failures: u64,
    pub dropped: u64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_observation(&self) {
        self.observations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_degraded(&self) {
        self.degraded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_classification_fault(&self) {
        self.classification_faults.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flagged(&self) {
        self.flagged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_persisted(&self) {
        self.persisted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_incident(&self) {
        self.incidents.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_notified(&self) {
        self.notified.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_persistence_failure(&self) {
        self.persistence_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_notification_failure(&self) {
        self.notification_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self, count: u64) {
        self.dropped.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            observations: self.observations.load(Ordering::Relaxed),
            degraded: self.degraded.load(Ordering::Relaxed),
            classification_faults: self.classification_faults.load(Ordering::Relaxed),
            flagged: self.flagged.load(Ordering::Relaxed),
            persisted: self.persisted.load(Ordering::Relaxed),
            incidents: self.incidents.load(Ordering::Relaxed),
            notified: self.notified.load(Ordering::Relaxed),
            persistence_failures: self.persistence_failures.load(Ordering::Relaxed),
            notification_failures: self.notification_failures.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}
