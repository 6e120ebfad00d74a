//! Sinks - downstream consumers of a classified observation
//!
//! - `PersistenceSink`: durable store for traffic and derived incident records
//! - `NotificationSink`: real-time delivery to the subscribers of a session
//!
//! Neither side retries. A failed write or send is reported to the caller and
//! the observation is not attempted again (at-most-once).

pub mod store;
pub mod incident;
pub mod notifier;

use async_trait::async_trait;

use crate::error::{NotifyError, StoreError};
use crate::models::{IncidentRecord, TrafficMessage, TrafficRecord};

pub use store::{MemoryStore, PgStore};
pub use incident::{describe, IncidentDeriver, DEFAULT_INCIDENT_CONFIDENCE};
pub use notifier::SocketNotifier;

#[async_trait]
pub trait PersistenceSink: Send + Sync {
    fn name(&self) -> &'static str;

    async fn create_traffic_record(&self, record: &TrafficRecord) -> Result<(), StoreError>;

    async fn create_incident_record(&self, incident: &IncidentRecord) -> Result<(), StoreError>;
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, message: &TrafficMessage) -> Result<(), NotifyError>;
}
