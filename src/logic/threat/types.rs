//! Threat Types
//!
//! Verdict data structures. The only logic here is what keeps the
//! status/severity pairing consistent.

use serde::{Deserialize, Serialize};

// ============================================================================
// TRAFFIC STATUS
// ============================================================================

/// Classification status of one observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrafficStatus {
    Normal,
    Anomalous,
    Blocked,
}

impl TrafficStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrafficStatus::Normal => "Normal",
            TrafficStatus::Anomalous => "Anomalous",
            TrafficStatus::Blocked => "Blocked",
        }
    }

    pub fn is_flagged(&self) -> bool {
        !matches!(self, TrafficStatus::Normal)
    }
}

impl std::fmt::Display for TrafficStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// SEVERITY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
            Severity::Critical => "Critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// VERDICT
// ============================================================================

/// Classifier output.
///
/// `severity` is `None` exactly when `status` is `Normal`; the constructors
/// are the only way to build one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Verdict {
    status: TrafficStatus,
    severity: Option<Severity>,
}

impl Verdict {
    /// Safe default verdict
    pub const fn normal() -> Self {
        Self { status: TrafficStatus::Normal, severity: None }
    }

    pub const fn anomalous(severity: Severity) -> Self {
        Self { status: TrafficStatus::Anomalous, severity: Some(severity) }
    }

    pub const fn blocked(severity: Severity) -> Self {
        Self { status: TrafficStatus::Blocked, severity: Some(severity) }
    }

    /// Rebuild from stored parts, rejecting pairs that break the invariant.
    pub fn from_parts(status: TrafficStatus, severity: Option<Severity>) -> Option<Self> {
        match (status, severity) {
            (TrafficStatus::Normal, None) => Some(Self::normal()),
            (TrafficStatus::Anomalous, Some(s)) => Some(Self::anomalous(s)),
            (TrafficStatus::Blocked, Some(s)) => Some(Self::blocked(s)),
            _ => None,
        }
    }

    pub fn status(&self) -> TrafficStatus {
        self.status
    }

    pub fn severity(&self) -> Option<Severity> {
        self.severity
    }

    pub fn is_normal(&self) -> bool {
        self.status == TrafficStatus::Normal
    }
}

impl Default for Verdict {
    fn default() -> Self {
        Self::normal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn any_severity() -> impl Strategy<Value = Severity> {
        prop_oneof![
            Just(Severity::Low),
            Just(Severity::Medium),
            Just(Severity::High),
            Just(Severity::Critical),
        ]
    }

    fn any_status() -> impl Strategy<Value = TrafficStatus> {
        prop_oneof![
            Just(TrafficStatus::Normal),
            Just(TrafficStatus::Anomalous),
            Just(TrafficStatus::Blocked),
        ]
    }

    proptest! {
        #[test]
        fn prop_severity_present_iff_flagged(
            status in any_status(),
            severity in proptest::option::of(any_severity()),
        ) {
            if let Some(verdict) = Verdict::from_parts(status, severity) {
                prop_assert_eq!(verdict.severity().is_none(), verdict.status() == TrafficStatus::Normal);
            } else {
                prop_assert_eq!(severity.is_some(), status == TrafficStatus::Normal);
            }
        }
    }

    #[test]
    fn test_constructors_keep_invariant() {
        assert_eq!(Verdict::normal().severity(), None);
        assert_eq!(Verdict::anomalous(Severity::High).severity(), Some(Severity::High));
        assert!(Verdict::blocked(Severity::Critical).status().is_flagged());
        assert_eq!(Verdict::default(), Verdict::normal());
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::Low < Severity::Medium);
    }
}
