//! Synthetic traffic generator
//!
//! One observation per interval with random private-range addresses, a
//! random protocol from a fixed set and a random size in [64, 10000].

use std::time::Duration;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::error::SourceError;
use crate::logic::features::{ProtocolHint, RawObservation};

use super::ObservationSource;

pub const PROTOCOLS: [&str; 6] = ["TCP", "UDP", "ICMP", "HTTP", "HTTPS", "DNS"];
pub const MIN_SIZE: u64 = 64;
pub const MAX_SIZE: u64 = 10_000;

pub struct SyntheticSource {
    interval: Duration,
    rng: StdRng,
}

impl SyntheticSource {
    pub fn new(interval: Duration) -> Self {
        Self { interval, rng: StdRng::from_entropy() }
    }

    /// Deterministic sequence, for tests
    pub fn with_seed(interval: Duration, seed: u64) -> Self {
        Self { interval, rng: StdRng::seed_from_u64(seed) }
    }

    pub fn generate(&mut self) -> RawObservation {
        let rng = &mut self.rng;
        let source = format!("192.168.{}.{}", rng.gen::<u8>(), rng.gen::<u8>());
        let destination = format!("10.0.{}.{}", rng.gen::<u8>(), rng.gen::<u8>());
        let protocol = PROTOCOLS.choose(rng).copied().unwrap_or("TCP");
        let size = rng.gen_range(MIN_SIZE..=MAX_SIZE);

        RawObservation {
            timestamp: Utc::now(),
            source_address: Some(source),
            destination_address: Some(destination),
            protocol_hint: ProtocolHint::Named(protocol.to_string()),
            declared_length: None,
            size_bytes: size,
        }
    }
}

impl ObservationSource for SyntheticSource {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn pace(&self) -> Option<Duration> {
        Some(self.interval)
    }

    fn next_observation(&mut self) -> Result<Option<RawObservation>, SourceError> {
        Ok(Some(self.generate()))
    }
}
