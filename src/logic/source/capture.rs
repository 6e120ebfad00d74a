//! Live capture
//!
//! The capture device is a process-wide resource: opened at most once,
//! filtered once, never reconfigured by a session. A single capture thread
//! reads frames and publishes parsed observations to every live session.
//! Frames read while no session is subscribed are discarded, so a session
//! only ever sees traffic captured after it joined.
//!
//! Frames that are not IP, or that don't parse, are skipped silently.

use std::net::IpAddr;
use std::sync::Arc;
use std::thread;

use chrono::{DateTime, Utc};
use etherparse::{NetSlice, SlicedPacket, TransportSlice};
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::config::Config;
use crate::error::{SessionFatalError, SourceError};
use crate::logic::features::{ProtocolHint, RawObservation};

use super::ObservationStream;

// ============================================================================
// DEVICE
// ============================================================================

/// Link-layer framing of captured bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    Ethernet,
    RawIp,
}

#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub timestamp: DateTime<Utc>,
    pub link: LinkType,
    pub data: Vec<u8>,
    /// Length on the wire (may exceed `data.len()` when truncated by snaplen)
    pub wire_len: u32,
}

/// Blocking capture primitive: `open` is the implementor's constructor.
pub trait CaptureDevice: Send {
    fn name(&self) -> &str;

    /// Next frame, or `Ok(None)` on read timeout.
    fn next_frame(&mut self) -> Result<Option<CapturedFrame>, SourceError>;

    fn close(&mut self) {}
}

// ============================================================================
// PARSING
// ============================================================================

/// Parse one captured frame. `None` for anything that isn't a parseable IP packet.
pub fn parse_frame(frame: &CapturedFrame) -> Option<RawObservation> {
    let sliced = match frame.link {
        LinkType::Ethernet => SlicedPacket::from_ethernet(&frame.data),
        LinkType::RawIp => SlicedPacket::from_ip(&frame.data),
    }
    .ok()?;

    let (src, dst, ip_number, declared) = match &sliced.net {
        Some(NetSlice::Ipv4(ipv4)) => {
            let header = ipv4.header();
            (
                IpAddr::from(header.source_addr()),
                IpAddr::from(header.destination_addr()),
                ipv4.payload().ip_number,
                u64::from(header.total_len()),
            )
        }
        Some(NetSlice::Ipv6(ipv6)) => {
            let header = ipv6.header();
            (
                IpAddr::from(header.source_addr()),
                IpAddr::from(header.destination_addr()),
                ipv6.payload().ip_number,
                u64::from(header.payload_length()) + 40,
            )
        }
        _ => return None,
    };

    let protocol_hint = match &sliced.transport {
        Some(TransportSlice::Tcp(_)) => ProtocolHint::Tcp,
        Some(TransportSlice::Udp(_)) => ProtocolHint::Udp,
        _ => ProtocolHint::IpNumber(ip_number.0),
    };

    Some(RawObservation {
        timestamp: frame.timestamp,
        source_address: Some(src.to_string()),
        destination_address: Some(dst.to_string()),
        protocol_hint,
        declared_length: Some(declared),
        size_bytes: u64::from(frame.wire_len),
    })
}

// ============================================================================
// HUB
// ============================================================================

/// Shared capture thread + fan-out queue
pub struct CaptureHub {
    device_name: String,
    /// `None` once the capture thread has died
    tx: Arc<Mutex<Option<broadcast::Sender<RawObservation>>>>,
}

impl CaptureHub {
    /// Take ownership of an opened device and start reading on a dedicated thread.
    pub fn start(mut device: Box<dyn CaptureDevice>, capacity: usize) -> Result<Self, SourceError> {
        let device_name = device.name().to_string();
        let (tx, _) = broadcast::channel(capacity.max(1));
        let shared = Arc::new(Mutex::new(Some(tx.clone())));
        let thread_shared = Arc::clone(&shared);

        thread::Builder::new()
            .name("capture".to_string())
            .spawn(move || {
                capture_loop(device.as_mut(), &tx);
                device.close();
                // Closing the queue ends every live session
                thread_shared.lock().take();
            })
            .map_err(|e| SourceError::Device(format!("failed to spawn capture thread: {}", e)))?;

        tracing::info!(device = %device_name, "Capture hub started");
        Ok(Self { device_name, tx: shared })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn is_running(&self) -> bool {
        self.tx.lock().is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.lock().as_ref().map_or(0, |tx| tx.receiver_count())
    }

    /// A new session's view of the shared capture
    pub fn subscribe(&self) -> Result<ObservationStream, SessionFatalError> {
        match self.tx.lock().as_ref() {
            Some(tx) => Ok(ObservationStream::new(tx.subscribe())),
            None => Err(SessionFatalError::CaptureUnavailable(format!(
                "capture on {} has stopped",
                self.device_name
            ))),
        }
    }
}

fn capture_loop(device: &mut dyn CaptureDevice, tx: &broadcast::Sender<RawObservation>) {
    let mut skipped: u64 = 0;
    let mut discarded: u64 = 0;

    loop {
        match device.next_frame() {
            Ok(Some(frame)) => {
                // Nobody listening: keep draining so the next subscriber starts fresh
                if tx.receiver_count() == 0 {
                    discarded += 1;
                    tracing::trace!(discarded, "Discarded frame with no subscribers");
                    continue;
                }

                match parse_frame(&frame) {
                    Some(obs) => {
                        let _ = tx.send(obs);
                    }
                    None => {
                        skipped += 1;
                        tracing::trace!(skipped, "Skipped non-IP or malformed frame");
                    }
                }
            }
            Ok(None) => continue,
            Err(e) => {
                tracing::error!(device = device.name(), "Capture stopped: {}", e);
                return;
            }
        }
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

type DeviceOpener = dyn Fn() -> Result<Box<dyn CaptureDevice>, SourceError> + Send + Sync;

/// Lazily opens the capture device on first use, at most once per process.
pub struct CaptureRegistry {
    opener: Box<DeviceOpener>,
    capacity: usize,
    hub: Mutex<Option<Arc<CaptureHub>>>,
    open_failed: Mutex<Option<String>>,
}

impl CaptureRegistry {
    pub fn new<F>(opener: F, capacity: usize) -> Self
    where
        F: Fn() -> Result<Box<dyn CaptureDevice>, SourceError> + Send + Sync + 'static,
    {
        Self {
            opener: Box::new(opener),
            capacity,
            hub: Mutex::new(None),
            open_failed: Mutex::new(None),
        }
    }

    /// Registry whose device can never be opened
    pub fn unavailable(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::new(move || Err(SourceError::Device(reason.clone())), 1)
    }

    /// Registry for the configured capture interface
    #[cfg(feature = "live-capture")]
    pub fn from_config(config: &Config) -> Self {
        let interface = config.capture_interface.clone();
        let filter = config.capture_filter.clone();
        let timeout_ms = config.capture_timeout_ms;

        Self::new(
            move || {
                let device = super::pcap_device::PcapDevice::open(interface.as_deref(), &filter, timeout_ms)?;
                Ok(Box::new(device) as Box<dyn CaptureDevice>)
            },
            config.queue_capacity,
        )
    }

    #[cfg(not(feature = "live-capture"))]
    pub fn from_config(_config: &Config) -> Self {
        Self::unavailable("built without the live-capture feature")
    }

    pub fn current(&self) -> Option<Arc<CaptureHub>> {
        self.hub.lock().clone()
    }

    /// Get the shared hub, opening the device on the first call. Blocking.
    pub fn acquire(&self) -> Result<Arc<CaptureHub>, SessionFatalError> {
        let mut hub = self.hub.lock();
        if let Some(existing) = hub.as_ref() {
            return Ok(Arc::clone(existing));
        }

        // One attempt per process; later sessions get the same answer
        if let Some(reason) = self.open_failed.lock().clone() {
            return Err(SessionFatalError::CaptureUnavailable(reason));
        }

        let started = (self.opener)().and_then(|device| CaptureHub::start(device, self.capacity));
        match started {
            Ok(started) => {
                let started = Arc::new(started);
                *hub = Some(Arc::clone(&started));
                Ok(started)
            }
            Err(e) => {
                tracing::error!("Capture device unavailable: {}", e);
                *self.open_failed.lock() = Some(e.to_string());
                Err(SessionFatalError::CaptureUnavailable(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use etherparse::PacketBuilder;
    use crate::logic::source::SourceEvent;

    fn ethernet_udp(payload_len: usize) -> Vec<u8> {
        let builder = PacketBuilder::ethernet2([1, 2, 3, 4, 5, 6], [7, 8, 9, 10, 11, 12])
            .ipv4([192, 168, 1, 20], [10, 0, 0, 53], 64)
            .udp(40000, 53);
        let payload = vec![0u8; payload_len];
        let mut data = Vec::with_capacity(builder.size(payload.len()));
        builder.write(&mut data, &payload).unwrap();
        data
    }

    fn ethernet_tcp(payload_len: usize) -> Vec<u8> {
        let builder = PacketBuilder::ethernet2([1, 2, 3, 4, 5, 6], [7, 8, 9, 10, 11, 12])
            .ipv4([192, 168, 1, 21], [10, 0, 0, 80], 64)
            .tcp(40001, 80, 1, 1024);
        let payload = vec![0u8; payload_len];
        let mut data = Vec::with_capacity(builder.size(payload.len()));
        builder.write(&mut data, &payload).unwrap();
        data
    }

    fn ethernet_icmp(payload_len: usize) -> Vec<u8> {
        let builder = PacketBuilder::ethernet2([1, 2, 3, 4, 5, 6], [7, 8, 9, 10, 11, 12])
            .ipv4([192, 168, 1, 22], [10, 0, 0, 1], 64)
            .icmpv4_echo_request(1, 1);
        let payload = vec![0u8; payload_len];
        let mut data = Vec::with_capacity(builder.size(payload.len()));
        builder.write(&mut data, &payload).unwrap();
        data
    }

    fn arp_frame() -> Vec<u8> {
        let mut data = vec![0xff; 6];
        data.extend_from_slice(&[1, 2, 3, 4, 5, 6]);
        data.extend_from_slice(&[0x08, 0x06]);
        // htype, ptype, hlen, plen, oper, sha, spa, tha, tpa
        data.extend_from_slice(&[0, 1, 8, 0, 6, 4, 0, 1]);
        data.extend_from_slice(&[1, 2, 3, 4, 5, 6, 192, 168, 1, 1]);
        data.extend_from_slice(&[0, 0, 0, 0, 0, 0, 192, 168, 1, 2]);
        data
    }

    fn frame(data: Vec<u8>) -> CapturedFrame {
        CapturedFrame {
            timestamp: Utc::now(),
            link: LinkType::Ethernet,
            wire_len: data.len() as u32,
            data,
        }
    }

    #[test]
    fn test_parse_udp_prefers_ip_total_length() {
        let obs = parse_frame(&frame(ethernet_udp(100))).expect("udp frame");

        assert_eq!(obs.protocol_hint, ProtocolHint::Udp);
        assert_eq!(obs.source_address.as_deref(), Some("192.168.1.20"));
        assert_eq!(obs.destination_address.as_deref(), Some("10.0.0.53"));
        // 20 (IPv4) + 8 (UDP) + 100, Ethernet header excluded
        assert_eq!(obs.declared_length, Some(128));
        assert_eq!(obs.size_bytes, 142);
    }

    #[test]
    fn test_parse_tcp_and_icmp() {
        let tcp = parse_frame(&frame(ethernet_tcp(10))).unwrap();
        assert_eq!(tcp.protocol_hint, ProtocolHint::Tcp);

        let icmp = parse_frame(&frame(ethernet_icmp(32))).unwrap();
        assert_eq!(icmp.protocol_hint, ProtocolHint::IpNumber(1));
    }

    #[test]
    fn test_non_ip_and_garbage_are_skipped() {
        assert!(parse_frame(&frame(arp_frame())).is_none());
        assert!(parse_frame(&frame(vec![0u8; 5])).is_none());
        assert!(parse_frame(&frame(Vec::new())).is_none());
    }

    type FrameQueue = Arc<Mutex<VecDeque<CapturedFrame>>>;

    /// Replays whatever the test pushes onto its queue; times out when empty.
    struct ReplayDevice {
        queue: FrameQueue,
    }

    fn replay_device() -> (ReplayDevice, FrameQueue) {
        let queue = FrameQueue::default();
        (ReplayDevice { queue: Arc::clone(&queue) }, queue)
    }

    impl CaptureDevice for ReplayDevice {
        fn name(&self) -> &str {
            "replay0"
        }

        fn next_frame(&mut self) -> Result<Option<CapturedFrame>, SourceError> {
            match self.queue.lock().pop_front() {
                Some(frame) => Ok(Some(frame)),
                None => {
                    thread::sleep(Duration::from_millis(5));
                    Ok(None)
                }
            }
        }
    }

    #[tokio::test]
    async fn test_hub_fans_out_and_skips_malformed() {
        let (device, queue) = replay_device();
        let hub = CaptureHub::start(Box::new(device), 16).unwrap();

        let mut first = hub.subscribe().unwrap();
        let mut second = hub.subscribe().unwrap();
        assert!(!first.has_worker());
        assert_eq!(hub.subscriber_count(), 2);

        queue.lock().extend([
            frame(ethernet_udp(50)),
            frame(arp_frame()),
            frame(ethernet_tcp(20)),
        ]);

        for stream in [&mut first, &mut second] {
            let a = stream.next().await;
            let b = stream.next().await;
            assert!(matches!(a, SourceEvent::Observation(ref o) if o.protocol_hint == ProtocolHint::Udp));
            assert!(matches!(b, SourceEvent::Observation(ref o) if o.protocol_hint == ProtocolHint::Tcp));
        }

        first.close().await;
        second.close().await;
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_backlog_before_first_subscriber_is_discarded() {
        let (device, queue) = replay_device();
        let mut stale = frame(ethernet_udp(10));
        stale.timestamp = Utc::now() - chrono::Duration::hours(1);
        queue.lock().push_back(stale);

        let hub = CaptureHub::start(Box::new(device), 16).unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(queue.lock().is_empty(), "idle hub keeps draining the device");

        let mut stream = hub.subscribe().unwrap();
        let nothing = tokio::time::timeout(Duration::from_millis(200), stream.next()).await;
        assert!(nothing.is_err(), "new session must not see pre-subscription traffic");

        let joined_at = Utc::now();
        queue.lock().push_back(frame(ethernet_tcp(10)));
        match stream.next().await {
            SourceEvent::Observation(obs) => {
                assert_eq!(obs.protocol_hint, ProtocolHint::Tcp);
                assert!(obs.timestamp >= joined_at);
            }
            other => panic!("expected a fresh observation, got {:?}", other),
        }
        stream.close().await;
    }

    #[test]
    fn test_registry_opens_device_once() {
        let opened = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&opened);
        let registry = CaptureRegistry::new(
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(replay_device().0) as Box<dyn CaptureDevice>)
            },
            8,
        );

        let a = registry.acquire().unwrap();
        let b = registry.acquire().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(opened.load(Ordering::SeqCst), 1);
        assert_eq!(a.device_name(), "replay0");
    }

    #[test]
    fn test_unavailable_registry_is_fatal() {
        let registry = CaptureRegistry::unavailable("no capture support");
        assert!(matches!(
            registry.acquire(),
            Err(SessionFatalError::CaptureUnavailable(reason)) if reason.contains("no capture support")
        ));
        assert!(registry.current().is_none());
    }
}
