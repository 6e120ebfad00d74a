//! Features Module - Feature Extraction
//!
//! Normalizes raw observations from any packet source into the fixed
//! `FeatureRecord` the classifier consumes.

pub mod types;
pub mod extractor;

// Re-export common types
pub use types::{FeatureRecord, Protocol, ProtocolHint, RawObservation};
pub use extractor::{extract, try_extract, Degradation, ExtractionDegradation, UNKNOWN_ADDRESS};
