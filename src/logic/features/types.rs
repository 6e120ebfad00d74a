//! Feature Types
//!
//! Raw observations coming out of a packet source and the normalized feature
//! record handed to the classifier. No logic beyond naming.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// RAW OBSERVATION (from Source)
// ============================================================================

/// What the source knows about the protocol of an observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolHint {
    /// Transport layer parsed as TCP
    Tcp,
    /// Transport layer parsed as UDP
    Udp,
    /// Only the IP protocol number is known
    IpNumber(u8),
    /// Protocol name supplied by a structured source (e.g. "HTTPS")
    Named(String),
    /// Nothing usable
    Unknown,
}

/// One packet (or synthetic record) as produced by a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawObservation {
    pub timestamp: DateTime<Utc>,
    pub source_address: Option<String>,
    pub destination_address: Option<String>,
    pub protocol_hint: ProtocolHint,
    /// Length declared by the protocol header (IP total length), if any
    pub declared_length: Option<u64>,
    /// Total bytes observed on the wire
    pub size_bytes: u64,
}

// ============================================================================
// FEATURE RECORD (from Extractor)
// ============================================================================

/// Resolved protocol. Always set; unrecognized traffic lands on `Ip` or `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    #[serde(rename = "TCP")]
    Tcp,
    #[serde(rename = "UDP")]
    Udp,
    #[serde(rename = "ICMP")]
    Icmp,
    #[serde(rename = "HTTP")]
    Http,
    #[serde(rename = "HTTPS")]
    Https,
    #[serde(rename = "DNS")]
    Dns,
    #[serde(rename = "IP")]
    Ip,
    #[serde(rename = "Other")]
    Other,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
            Protocol::Icmp => "ICMP",
            Protocol::Http => "HTTP",
            Protocol::Https => "HTTPS",
            Protocol::Dns => "DNS",
            Protocol::Ip => "IP",
            Protocol::Other => "Other",
        }
    }

    /// Case-insensitive name lookup
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "TCP" => Some(Protocol::Tcp),
            "UDP" => Some(Protocol::Udp),
            "ICMP" | "ICMPV6" => Some(Protocol::Icmp),
            "HTTP" => Some(Protocol::Http),
            "HTTPS" => Some(Protocol::Https),
            "DNS" => Some(Protocol::Dns),
            "IP" => Some(Protocol::Ip),
            "OTHER" => Some(Protocol::Other),
            _ => None,
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Normalized input to the classifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub source_address: String,
    pub destination_address: String,
    pub protocol: Protocol,
    pub size_bytes: u64,
    pub observed_at: DateTime<Utc>,
}
