//! Live notification message

use serde::Serialize;
use uuid::Uuid;
use chrono::{DateTime, Utc};

use crate::logic::features::Protocol;
use crate::logic::threat::{Severity, TrafficStatus};

use super::TrafficRecord;

/// Message pushed to session subscribers, one per observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrafficMessage {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub source_ip: String,
    pub destination_ip: String,
    pub protocol: Protocol,
    pub bytes: u64,
    pub status: TrafficStatus,
    pub severity: Option<Severity>,
}

impl From<&TrafficRecord> for TrafficMessage {
    fn from(record: &TrafficRecord) -> Self {
        Self {
            id: record.id,
            timestamp: record.timestamp,
            source_ip: record.source_address.clone(),
            destination_ip: record.destination_address.clone(),
            protocol: record.protocol,
            bytes: record.size_bytes,
            status: record.status,
            severity: record.severity,
        }
    }
}
