//! Traffic Classifier
//!
//! Only classification logic lives here. Input: `FeatureRecord`. Output: `Verdict`.
//!
//! The `Classifier` trait is the seam downstream code depends on; the
//! rule-based `ThresholdClassifier` is the reference implementation and can be
//! swapped for a statistical model without touching the router or sinks.

use std::panic::{self, AssertUnwindSafe};

use crate::error::ClassificationFault;
use crate::logic::features::{FeatureRecord, Protocol};

use super::rules::ClassificationThresholds;
use super::types::{Severity, Verdict};

/// Pure decision function: feature record in, verdict out.
pub trait Classifier: Send + Sync {
    fn name(&self) -> &'static str;

    fn classify(&self, features: &FeatureRecord) -> Result<Verdict, ClassificationFault>;
}

// ============================================================================
// REFERENCE IMPLEMENTATION
// ============================================================================

/// Size/protocol heuristic. Ordered rules, first match wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThresholdClassifier {
    thresholds: ClassificationThresholds,
}

impl ThresholdClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thresholds(thresholds: ClassificationThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &ClassificationThresholds {
        &self.thresholds
    }
}

impl Classifier for ThresholdClassifier {
    fn name(&self) -> &'static str {
        "threshold"
    }

    fn classify(&self, features: &FeatureRecord) -> Result<Verdict, ClassificationFault> {
        Ok(classify_with_thresholds(features, &self.thresholds))
    }
}

/// Classify with default thresholds
pub fn classify(features: &FeatureRecord) -> Verdict {
    classify_with_thresholds(features, &ClassificationThresholds::default())
}

/// Classification with custom thresholds
pub fn classify_with_thresholds(
    features: &FeatureRecord,
    thresholds: &ClassificationThresholds,
) -> Verdict {
    let size = features.size_bytes;

    if size > thresholds.large_packet_bytes {
        return Verdict::anomalous(Severity::High);
    }

    if matches!(features.protocol, Protocol::Dns | Protocol::Icmp)
        && size > thresholds.oversized_control_bytes
    {
        return Verdict::anomalous(Severity::Medium);
    }

    if features.protocol == Protocol::Udp && size > thresholds.oversized_udp_bytes {
        return Verdict::anomalous(Severity::Medium);
    }

    Verdict::normal()
}

// ============================================================================
// FAULT CONTAINMENT
// ============================================================================

/// Run a classifier, degrading any fault (error or panic) to `Verdict::normal()`.
pub fn classify_safely(
    classifier: &dyn Classifier,
    features: &FeatureRecord,
) -> (Verdict, Option<ClassificationFault>) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| classifier.classify(features)));

    let fault = match outcome {
        Ok(Ok(verdict)) => return (verdict, None),
        Ok(Err(fault)) => fault,
        Err(payload) => ClassificationFault(panic_message(payload.as_ref())),
    };

    tracing::warn!(
        classifier = classifier.name(),
        "Classifier fault, using safe default verdict: {}",
        fault
    );
    (Verdict::normal(), Some(fault))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "classifier panicked".to_string()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::threat::TrafficStatus;
    use chrono::Utc;
    use proptest::prelude::*;

    fn features(protocol: Protocol, size_bytes: u64) -> FeatureRecord {
        FeatureRecord {
            source_address: "192.168.0.7".to_string(),
            destination_address: "10.0.0.9".to_string(),
            protocol,
            size_bytes,
            observed_at: Utc::now(),
        }
    }

    fn any_protocol() -> impl Strategy<Value = Protocol> {
        prop_oneof![
            Just(Protocol::Tcp),
            Just(Protocol::Udp),
            Just(Protocol::Icmp),
            Just(Protocol::Http),
            Just(Protocol::Https),
            Just(Protocol::Dns),
            Just(Protocol::Ip),
            Just(Protocol::Other),
        ]
    }

    #[test]
    fn test_udp_over_900_is_medium() {
        assert_eq!(classify(&features(Protocol::Udp, 950)), Verdict::anomalous(Severity::Medium));
    }

    #[test]
    fn test_icmp_over_600_is_medium() {
        assert_eq!(classify(&features(Protocol::Icmp, 700)), Verdict::anomalous(Severity::Medium));
        assert_eq!(classify(&features(Protocol::Dns, 601)), Verdict::anomalous(Severity::Medium));
    }

    #[test]
    fn test_small_tcp_is_normal() {
        let verdict = classify(&features(Protocol::Tcp, 500));
        assert_eq!(verdict.status(), TrafficStatus::Normal);
        assert_eq!(verdict.severity(), None);
    }

    #[test]
    fn test_boundaries_are_exclusive() {
        assert!(classify(&features(Protocol::Tcp, 1200)).is_normal());
        assert!(classify(&features(Protocol::Udp, 900)).is_normal());
        assert!(classify(&features(Protocol::Icmp, 600)).is_normal());
        // TCP is not covered by the control/UDP rules
        assert!(classify(&features(Protocol::Tcp, 1000)).is_normal());
    }

    #[test]
    fn test_custom_thresholds() {
        let classifier = ThresholdClassifier::with_thresholds(ClassificationThresholds {
            large_packet_bytes: 100,
            ..Default::default()
        });
        let verdict = classifier.classify(&features(Protocol::Tcp, 101)).unwrap();
        assert_eq!(verdict, Verdict::anomalous(Severity::High));
    }

    struct FailingClassifier;

    impl Classifier for FailingClassifier {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn classify(&self, _features: &FeatureRecord) -> Result<Verdict, ClassificationFault> {
            Err(ClassificationFault("model not loaded".to_string()))
        }
    }

    struct PanickingClassifier;

    impl Classifier for PanickingClassifier {
        fn name(&self) -> &'static str {
            "panicking"
        }

        fn classify(&self, _features: &FeatureRecord) -> Result<Verdict, ClassificationFault> {
            panic!("index out of range")
        }
    }

    #[test]
    fn test_fault_degrades_to_normal() {
        let (verdict, fault) = classify_safely(&FailingClassifier, &features(Protocol::Udp, 5000));
        assert_eq!(verdict, Verdict::normal());
        assert_eq!(fault.unwrap().0, "model not loaded");
    }

    #[test]
    fn test_panic_degrades_to_normal() {
        let (verdict, fault) = classify_safely(&PanickingClassifier, &features(Protocol::Udp, 5000));
        assert_eq!(verdict, Verdict::normal());
        assert!(fault.unwrap().0.contains("index out of range"));
    }

    proptest! {
        #[test]
        fn prop_large_packets_are_high_regardless_of_protocol(
            protocol in any_protocol(),
            size in 1201u64..1_000_000,
        ) {
            prop_assert_eq!(classify(&features(protocol, size)), Verdict::anomalous(Severity::High));
        }

        #[test]
        fn prop_classify_is_deterministic(protocol in any_protocol(), size in 0u64..5000) {
            let record = features(protocol, size);
            prop_assert_eq!(classify(&record), classify(&record));
        }
    }
}
