//! Network traffic model

use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::logic::features::{FeatureRecord, Protocol};
use crate::logic::threat::{Severity, TrafficStatus, Verdict};

/// One classified observation. Created once, never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrafficRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub source_address: String,
    pub destination_address: String,
    pub protocol: Protocol,
    pub size_bytes: u64,
    pub status: TrafficStatus,
    pub severity: Option<Severity>,
}

impl TrafficRecord {
    pub fn new(id: Uuid, features: &FeatureRecord, verdict: Verdict) -> Self {
        Self {
            id,
            timestamp: features.observed_at,
            source_address: features.source_address.clone(),
            destination_address: features.destination_address.clone(),
            protocol: features.protocol,
            size_bytes: features.size_bytes,
            status: verdict.status(),
            severity: verdict.severity(),
        }
    }

    pub fn is_flagged(&self) -> bool {
        self.status.is_flagged()
    }

    pub async fn insert(&self, pool: &PgPool) -> Result<(), StoreError> {
        let bytes = i64::try_from(self.size_bytes).map_err(|_| {
            StoreError::Validation(format!("size {} does not fit in BIGINT", self.size_bytes))
        })?;

        sqlx::query(
            r#"
            INSERT INTO network_traffic (id, timestamp, source_ip, destination_ip, protocol, bytes, status, severity)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#
        )
        .bind(self.id)
        .bind(self.timestamp)
        .bind(&self.source_address)
        .bind(&self.destination_address)
        .bind(self.protocol.as_str())
        .bind(bytes)
        .bind(self.status.as_str())
        .bind(self.severity.map(|s| s.as_str()))
        .execute(pool)
        .await?;

        Ok(())
    }
}
