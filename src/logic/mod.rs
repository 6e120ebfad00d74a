//! Pipeline logic
//!
//! Source → Extractor → Classifier → Router → {Persistence, Notification},
//! per observation, per session.

pub mod features;
pub mod threat;
pub mod source;
pub mod sinks;
pub mod router;
pub mod session;
pub mod stats;
