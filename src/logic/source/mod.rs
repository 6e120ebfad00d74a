//! Packet Sources
//!
//! Two interchangeable producers of `RawObservation`s:
//! - `synthetic`: randomized plausible traffic at a fixed interval, one
//!   generator per session
//! - `capture`: live capture from a device opened once per process and
//!   shared by every live session
//!
//! Production is blocking and always runs off the async scheduler. The
//! hand-off into a session is a bounded `broadcast` queue: a session that
//! falls behind loses the oldest observations (`SourceEvent::Dropped`), it
//! never stalls the producer.

pub mod synthetic;
pub mod capture;
#[cfg(feature = "live-capture")]
pub mod pcap_device;

use std::str::FromStr;
use std::sync::mpsc::{self as std_mpsc, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::error::{SessionFatalError, SourceError};
use crate::logic::features::RawObservation;

pub use synthetic::SyntheticSource;
pub use capture::{parse_frame, CaptureDevice, CaptureHub, CaptureRegistry, CapturedFrame, LinkType};

/// Which source a session binds to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Synthetic,
    Live,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Synthetic => "synthetic",
            SourceKind::Live => "live",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "synthetic" | "simulated" => Ok(SourceKind::Synthetic),
            "live" | "capture" => Ok(SourceKind::Live),
            other => Err(format!("unknown traffic source '{}'", other)),
        }
    }
}

// ============================================================================
// PER-SESSION SOURCES
// ============================================================================

/// A blocking, per-session producer of observations.
pub trait ObservationSource: Send + 'static {
    fn name(&self) -> &'static str;

    /// Wait between productions. The worker waits on its stop signal for this
    /// long, so cancellation is immediate rather than bounded by the interval.
    fn pace(&self) -> Option<Duration> {
        None
    }

    /// Blocks until an observation is available. `Ok(None)` means nothing
    /// this round (poll timeout); the worker checks for cancellation and
    /// calls again.
    fn next_observation(&mut self) -> Result<Option<RawObservation>, SourceError>;

    fn close(&mut self) {}
}

/// What a session sees when it waits on its source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    Observation(RawObservation),
    /// The session fell behind; this many oldest observations were discarded
    Dropped(u64),
    /// The producer is gone
    Ended,
}

struct SourceWorker {
    stop: std_mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

/// Session end of a source queue
pub struct ObservationStream {
    rx: broadcast::Receiver<RawObservation>,
    worker: Option<SourceWorker>,
}

impl ObservationStream {
    fn new(rx: broadcast::Receiver<RawObservation>) -> Self {
        Self { rx, worker: None }
    }

    pub async fn next(&mut self) -> SourceEvent {
        match self.rx.recv().await {
            Ok(obs) => SourceEvent::Observation(obs),
            Err(broadcast::error::RecvError::Lagged(n)) => SourceEvent::Dropped(n),
            Err(broadcast::error::RecvError::Closed) => SourceEvent::Ended,
        }
    }

    /// Does this stream own a dedicated worker (as opposed to a shared hub)?
    pub fn has_worker(&self) -> bool {
        self.worker.is_some()
    }

    /// Stop production for this session and wait for the worker to exit.
    pub async fn close(self) {
        let Self { rx, worker } = self;
        drop(rx);

        if let Some(worker) = worker {
            let _ = worker.stop.send(());
            if let Err(e) = worker.handle.await {
                tracing::error!("Source worker panicked: {}", e);
            }
        }
    }
}

/// Run `source` on a blocking worker, feeding a bounded queue.
pub fn spawn_worker(source: Box<dyn ObservationSource>, capacity: usize) -> ObservationStream {
    let (tx, rx) = broadcast::channel(capacity.max(1));
    let (stop_tx, stop_rx) = std_mpsc::channel();

    let handle = tokio::task::spawn_blocking(move || run_worker(source, tx, stop_rx));

    let mut stream = ObservationStream::new(rx);
    stream.worker = Some(SourceWorker { stop: stop_tx, handle });
    stream
}

fn run_worker(
    mut source: Box<dyn ObservationSource>,
    tx: broadcast::Sender<RawObservation>,
    stop: std_mpsc::Receiver<()>,
) {
    tracing::debug!(source = source.name(), "Source worker started");

    loop {
        let stopped = match source.pace() {
            Some(wait) => !matches!(stop.recv_timeout(wait), Err(RecvTimeoutError::Timeout)),
            None => !matches!(stop.try_recv(), Err(TryRecvError::Empty)),
        };
        if stopped {
            break;
        }

        match source.next_observation() {
            Ok(Some(obs)) => {
                if tx.send(obs).is_err() {
                    // Session end of the queue is gone
                    break;
                }
            }
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!(source = source.name(), "Source stopped: {}", e);
                break;
            }
        }
    }

    source.close();
    tracing::debug!(source = source.name(), "Source worker stopped");
}

// ============================================================================
// PROVIDER
// ============================================================================

/// Opens a fresh source for each new session.
pub struct SourceProvider {
    kind: SourceKind,
    synthetic_interval: Duration,
    capacity: usize,
    capture: Arc<CaptureRegistry>,
}

impl SourceProvider {
    pub fn new(
        kind: SourceKind,
        synthetic_interval: Duration,
        capacity: usize,
        capture: Arc<CaptureRegistry>,
    ) -> Self {
        Self { kind, synthetic_interval, capacity, capture }
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub async fn open(&self) -> Result<ObservationStream, SessionFatalError> {
        match self.kind {
            SourceKind::Synthetic => {
                let source = SyntheticSource::new(self.synthetic_interval);
                Ok(spawn_worker(Box::new(source), self.capacity))
            }
            SourceKind::Live => {
                let registry = Arc::clone(&self.capture);
                let hub = tokio::task::spawn_blocking(move || registry.acquire())
                    .await
                    .map_err(|e| SessionFatalError::CaptureUnavailable(e.to_string()))??;
                hub.subscribe()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::logic::features::ProtocolHint;

    /// Emits `limit` observations with no pacing, then fails.
    struct CountingSource {
        emitted: u64,
        limit: u64,
    }

    impl ObservationSource for CountingSource {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn next_observation(&mut self) -> Result<Option<RawObservation>, SourceError> {
            if self.emitted == self.limit {
                return Err(SourceError::Closed);
            }
            self.emitted += 1;
            Ok(Some(RawObservation {
                timestamp: Utc::now(),
                source_address: Some("192.168.0.1".to_string()),
                destination_address: Some("10.0.0.1".to_string()),
                protocol_hint: ProtocolHint::Tcp,
                declared_length: None,
                size_bytes: self.emitted,
            }))
        }
    }

    #[test]
    fn test_source_kind_parse() {
        assert_eq!("live".parse::<SourceKind>(), Ok(SourceKind::Live));
        assert_eq!("Synthetic".parse::<SourceKind>(), Ok(SourceKind::Synthetic));
        assert!("pcapng".parse::<SourceKind>().is_err());
    }

    #[tokio::test]
    async fn test_worker_preserves_order_and_ends() {
        let mut stream = spawn_worker(Box::new(CountingSource { emitted: 0, limit: 3 }), 16);

        let mut sizes = Vec::new();
        loop {
            match stream.next().await {
                SourceEvent::Observation(obs) => sizes.push(obs.size_bytes),
                SourceEvent::Dropped(_) => panic!("queue should not overflow"),
                SourceEvent::Ended => break,
            }
        }

        assert_eq!(sizes, vec![1, 2, 3]);
        stream.close().await;
    }

    #[tokio::test]
    async fn test_slow_consumer_drops_oldest() {
        let mut stream = spawn_worker(Box::new(CountingSource { emitted: 0, limit: 10 }), 2);

        // Let the worker run to completion before reading anything
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(matches!(stream.next().await, SourceEvent::Dropped(8)));
        assert!(matches!(stream.next().await, SourceEvent::Observation(o) if o.size_bytes == 9));
        assert!(matches!(stream.next().await, SourceEvent::Observation(o) if o.size_bytes == 10));
        assert_eq!(stream.next().await, SourceEvent::Ended);
        stream.close().await;
    }

    #[tokio::test]
    async fn test_close_stops_paced_worker_promptly() {
        let stream = spawn_worker(Box::new(SyntheticSource::new(Duration::from_secs(30))), 4);
        assert!(stream.has_worker());

        let closed = tokio::time::timeout(Duration::from_secs(2), stream.close()).await;
        assert!(closed.is_ok(), "worker should exit without waiting out the interval");
    }
}
