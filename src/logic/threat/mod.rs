//! Threat Module
//!
//! Decides Normal/Anomalous/Blocked plus a severity for every feature record.
//!
//! ## Structure
//! - `types`: Verdict, TrafficStatus, Severity
//! - `rules`: Thresholds and constants
//! - `classifier`: Classifier trait, reference heuristic, fault containment
//!
//! ## Usage
//! ```ignore
//! use crate::logic::threat::{classify_safely, ThresholdClassifier};
//!
//! let (verdict, _fault) = classify_safely(&ThresholdClassifier::new(), &features);
//! if !verdict.is_normal() {
//!     println!("{} ({:?})", verdict.status(), verdict.severity());
//! }
//! ```

pub mod types;
pub mod rules;
pub mod classifier;

pub use types::{Severity, TrafficStatus, Verdict};

pub use rules::{
    ClassificationThresholds,
    LARGE_PACKET_BYTES,
    OVERSIZED_CONTROL_BYTES,
    OVERSIZED_UDP_BYTES,
};

pub use classifier::{classify, classify_safely, classify_with_thresholds, Classifier, ThresholdClassifier};
