//! Persistence backends

use async_trait::async_trait;
use parking_lot::RwLock;
use sqlx::PgPool;

use crate::error::StoreError;
use crate::models::{IncidentRecord, TrafficRecord};

use super::PersistenceSink;

// ============================================================================
// POSTGRES
// ============================================================================

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PersistenceSink for PgStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn create_traffic_record(&self, record: &TrafficRecord) -> Result<(), StoreError> {
        record.insert(&self.pool).await
    }

    async fn create_incident_record(&self, incident: &IncidentRecord) -> Result<(), StoreError> {
        incident.insert(&self.pool).await
    }
}

// ============================================================================
// IN-MEMORY
// ============================================================================

/// Keeps everything in process memory. Development and tests.
#[derive(Default)]
pub struct MemoryStore {
    traffic: RwLock<Vec<TrafficRecord>>,
    incidents: RwLock<Vec<IncidentRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn traffic(&self) -> Vec<TrafficRecord> {
        self.traffic.read().clone()
    }

    pub fn incidents(&self) -> Vec<IncidentRecord> {
        self.incidents.read().clone()
    }
}

#[async_trait]
impl PersistenceSink for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn create_traffic_record(&self, record: &TrafficRecord) -> Result<(), StoreError> {
        let mut traffic = self.traffic.write();
        if traffic.iter().any(|r| r.id == record.id) {
            return Err(StoreError::Validation(format!("duplicate traffic id {}", record.id)));
        }
        traffic.push(record.clone());
        Ok(())
    }

    async fn create_incident_record(&self, incident: &IncidentRecord) -> Result<(), StoreError> {
        self.incidents.write().push(incident.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::features::{FeatureRecord, Protocol};
    use crate::logic::threat::Verdict;
    use chrono::Utc;
    use tokio_test::{assert_err, assert_ok};
    use uuid::Uuid;

    #[tokio::test]
    async fn test_memory_store_rejects_duplicate_ids() {
        let store = MemoryStore::new();
        let features = FeatureRecord {
            source_address: "192.168.1.1".to_string(),
            destination_address: "10.0.0.1".to_string(),
            protocol: Protocol::Tcp,
            size_bytes: 64,
            observed_at: Utc::now(),
        };
        let record = TrafficRecord::new(Uuid::new_v4(), &features, Verdict::normal());

        assert_ok!(store.create_traffic_record(&record).await);
        assert_err!(store.create_traffic_record(&record).await);
        assert_eq!(store.traffic().len(), 1);
        assert!(store.incidents().is_empty());
    }
}
