//! Incident derivation
//!
//! Non-Normal traffic records become one incident each. Reads only fields
//! already present on the traffic record.

use chrono::Utc;
use uuid::Uuid;

use crate::logic::threat::Severity;
use crate::models::{IncidentRecord, IncidentStatus, TrafficRecord};

pub const DEFAULT_INCIDENT_CONFIDENCE: u8 = 80;

#[derive(Debug, Clone, Copy)]
pub struct IncidentDeriver {
    confidence: u8,
}

impl Default for IncidentDeriver {
    fn default() -> Self {
        Self::new(DEFAULT_INCIDENT_CONFIDENCE)
    }
}

impl IncidentDeriver {
    pub fn new(confidence: u8) -> Self {
        Self { confidence: confidence.min(100) }
    }

    pub fn confidence(&self) -> u8 {
        self.confidence
    }

    /// `None` for Normal traffic
    pub fn derive(&self, record: &TrafficRecord) -> Option<IncidentRecord> {
        if !record.is_flagged() {
            return None;
        }

        Some(IncidentRecord {
            id: Uuid::new_v4(),
            traffic_id: record.id,
            source_address: record.source_address.clone(),
            destination_address: record.destination_address.clone(),
            threat_type: record.protocol.as_str().to_string(),
            severity: record.severity.unwrap_or(Severity::Medium),
            status: IncidentStatus::Open,
            description: describe(record),
            confidence: self.confidence,
            created_at: Utc::now(),
        })
    }
}

pub fn describe(record: &TrafficRecord) -> String {
    format!(
        "Detected {} traffic from {} to {} via {}",
        record.status.as_str().to_lowercase(),
        record.source_address,
        record.destination_address,
        record.protocol
    )
}
