//! Classification Rules - thresholds and constants
//!
//! Single place for the size/protocol cut-offs used by the reference classifier.

/// Any protocol above this size is anomalous (High)
pub const LARGE_PACKET_BYTES: u64 = 1200;

/// DNS/ICMP above this size is anomalous (Medium)
pub const OVERSIZED_CONTROL_BYTES: u64 = 600;

/// UDP above this size is anomalous (Medium)
pub const OVERSIZED_UDP_BYTES: u64 = 900;

/// Tunable thresholds for the rule-based classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassificationThresholds {
    pub large_packet_bytes: u64,
    pub oversized_control_bytes: u64,
    pub oversized_udp_bytes: u64,
}

impl Default for ClassificationThresholds {
    fn default() -> Self {
        Self {
            large_packet_bytes: LARGE_PACKET_BYTES,
            oversized_control_bytes: OVERSIZED_CONTROL_BYTES,
            oversized_udp_bytes: OVERSIZED_UDP_BYTES,
        }
    }
}
