//! Threat incident model

use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::logic::threat::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IncidentStatus {
    Open,
}

impl IncidentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentStatus::Open => "Open",
        }
    }
}

/// Security event derived from a non-Normal traffic record.
///
/// Immutable once created; closing it is someone else's job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncidentRecord {
    pub id: Uuid,
    pub traffic_id: Uuid,
    pub source_address: String,
    pub destination_address: String,
    pub threat_type: String,
    pub severity: Severity,
    pub status: IncidentStatus,
    pub description: String,
    /// 0-100
    pub confidence: u8,
    pub created_at: DateTime<Utc>,
}

impl IncidentRecord {
    pub async fn insert(&self, pool: &PgPool) -> Result<(), StoreError> {
        if self.confidence > 100 {
            return Err(StoreError::Validation(format!(
                "confidence {} outside 0-100",
                self.confidence
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO threat_incidents (id, traffic_id, source_ip, destination_ip, threat_type, severity, status, description, confidence, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#
        )
        .bind(self.id)
        .bind(self.traffic_id)
        .bind(&self.source_address)
        .bind(&self.destination_address)
        .bind(&self.threat_type)
        .bind(self.severity.as_str())
        .bind(self.status.as_str())
        .bind(&self.description)
        .bind(i16::from(self.confidence))
        .bind(self.created_at)
        .execute(pool)
        .await?;

        Ok(())
    }
}
