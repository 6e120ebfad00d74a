//! Feature Extraction
//!
//! Turns a `RawObservation` into a `FeatureRecord`. Total: malformed input
//! never fails, it degrades to defaults and says which defaults were applied.

use thiserror::Error;

use super::types::{FeatureRecord, Protocol, ProtocolHint, RawObservation};

/// Address used when the source could not tell us one
pub const UNKNOWN_ADDRESS: &str = "unknown";

/// Defaults applied during extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Degradation {
    MissingSourceAddress,
    MissingDestinationAddress,
    UnrecognizedProtocol(String),
    UnknownProtocol,
    InvalidDeclaredLength(u64),
}

/// Extraction succeeded only by applying defaults.
///
/// Carries the defaulted record; callers use it as-is.
#[derive(Debug, Clone, Error)]
#[error("extraction degraded: {reasons:?}")]
pub struct ExtractionDegradation {
    pub record: FeatureRecord,
    pub reasons: Vec<Degradation>,
}

impl ExtractionDegradation {
    pub fn into_record(self) -> FeatureRecord {
        self.record
    }
}

/// Extract features, reporting any defaults that had to be applied.
pub fn try_extract(obs: &RawObservation) -> Result<FeatureRecord, ExtractionDegradation> {
    let mut reasons = Vec::new();

    let source_address = resolve_address(
        obs.source_address.as_deref(),
        Degradation::MissingSourceAddress,
        &mut reasons,
    );
    let destination_address = resolve_address(
        obs.destination_address.as_deref(),
        Degradation::MissingDestinationAddress,
        &mut reasons,
    );
    let protocol = resolve_protocol(&obs.protocol_hint, &mut reasons);
    let size_bytes = resolve_size(obs, &mut reasons);

    let record = FeatureRecord {
        source_address,
        destination_address,
        protocol,
        size_bytes,
        observed_at: obs.timestamp,
    };

    if reasons.is_empty() {
        Ok(record)
    } else {
        Err(ExtractionDegradation { record, reasons })
    }
}

/// Extract features, silently accepting defaults.
pub fn extract(obs: &RawObservation) -> FeatureRecord {
    try_extract(obs).unwrap_or_else(ExtractionDegradation::into_record)
}

fn resolve_address(
    address: Option<&str>,
    missing: Degradation,
    reasons: &mut Vec<Degradation>,
) -> String {
    match address.map(str::trim).filter(|a| !a.is_empty()) {
        Some(a) => a.to_string(),
        None => {
            reasons.push(missing);
            UNKNOWN_ADDRESS.to_string()
        }
    }
}

/// TCP > UDP > raw IP protocol number > Other
fn resolve_protocol(hint: &ProtocolHint, reasons: &mut Vec<Degradation>) -> Protocol {
    match hint {
        ProtocolHint::Tcp => Protocol::Tcp,
        ProtocolHint::Udp => Protocol::Udp,
        ProtocolHint::IpNumber(number) => match number {
            6 => Protocol::Tcp,
            17 => Protocol::Udp,
            1 | 58 => Protocol::Icmp,
            _ => Protocol::Ip,
        },
        ProtocolHint::Named(name) => Protocol::from_name(name).unwrap_or_else(|| {
            reasons.push(Degradation::UnrecognizedProtocol(name.clone()));
            Protocol::Other
        }),
        ProtocolHint::Unknown => {
            reasons.push(Degradation::UnknownProtocol);
            Protocol::Other
        }
    }
}

/// Declared length wins; a zero declared length is unusable and falls back.
fn resolve_size(obs: &RawObservation, reasons: &mut Vec<Degradation>) -> u64 {
    match obs.declared_length {
        Some(0) => {
            reasons.push(Degradation::InvalidDeclaredLength(0));
            obs.size_bytes
        }
        Some(declared) => declared,
        None => obs.size_bytes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;

    fn observation(hint: ProtocolHint, declared: Option<u64>, size: u64) -> RawObservation {
        RawObservation {
            timestamp: Utc::now(),
            source_address: Some("192.168.1.10".to_string()),
            destination_address: Some("10.0.0.5".to_string()),
            protocol_hint: hint,
            declared_length: declared,
            size_bytes: size,
        }
    }

    #[test]
    fn test_clean_observation_extracts_without_degradation() {
        let obs = observation(ProtocolHint::Tcp, Some(512), 526);
        let record = try_extract(&obs).expect("clean observation");

        assert_eq!(record.protocol, Protocol::Tcp);
        assert_eq!(record.size_bytes, 512);
        assert_eq!(record.source_address, "192.168.1.10");
        assert_eq!(record.observed_at, obs.timestamp);
    }

    #[test]
    fn test_protocol_resolution_order() {
        let mut reasons = Vec::new();
        assert_eq!(resolve_protocol(&ProtocolHint::Udp, &mut reasons), Protocol::Udp);
        assert_eq!(resolve_protocol(&ProtocolHint::IpNumber(1), &mut reasons), Protocol::Icmp);
        assert_eq!(resolve_protocol(&ProtocolHint::IpNumber(47), &mut reasons), Protocol::Ip);
        assert!(reasons.is_empty());

        assert_eq!(
            resolve_protocol(&ProtocolHint::Named("quic".to_string()), &mut reasons),
            Protocol::Other
        );
        assert_eq!(resolve_protocol(&ProtocolHint::Unknown, &mut reasons), Protocol::Other);
        assert_eq!(reasons.len(), 2);
    }

    #[test]
    fn test_size_falls_back_to_wire_length() {
        assert_eq!(extract(&observation(ProtocolHint::Udp, None, 950)).size_bytes, 950);

        let degraded = try_extract(&observation(ProtocolHint::Udp, Some(0), 950)).unwrap_err();
        assert_eq!(degraded.record.size_bytes, 950);
        assert_eq!(degraded.reasons, vec![Degradation::InvalidDeclaredLength(0)]);
    }

    #[test]
    fn test_missing_addresses_degrade_to_unknown() {
        let mut obs = observation(ProtocolHint::Unknown, None, 64);
        obs.source_address = None;
        obs.destination_address = Some("  ".to_string());

        let degraded = try_extract(&obs).unwrap_err();
        assert_eq!(degraded.record.source_address, UNKNOWN_ADDRESS);
        assert_eq!(degraded.record.destination_address, UNKNOWN_ADDRESS);
        assert_eq!(degraded.record.protocol, Protocol::Other);
        assert_eq!(degraded.reasons.len(), 3);

        // extract() never fails, it hands back the same defaulted record
        assert_eq!(extract(&obs), degraded.record);
    }

    fn any_hint() -> impl Strategy<Value = ProtocolHint> {
        prop_oneof![
            Just(ProtocolHint::Tcp),
            Just(ProtocolHint::Udp),
            any::<u8>().prop_map(ProtocolHint::IpNumber),
            "[a-zA-Z]{0,6}".prop_map(ProtocolHint::Named),
            Just(ProtocolHint::Unknown),
        ]
    }

    proptest! {
        #[test]
        fn prop_extract_is_idempotent(
            hint in any_hint(),
            declared in proptest::option::of(0u64..70_000),
            size in 0u64..70_000,
            src in proptest::option::of("[0-9.]{0,15}"),
        ) {
            let mut obs = observation(hint, declared, size);
            obs.source_address = src;

            prop_assert_eq!(extract(&obs), extract(&obs));
        }
    }
}
