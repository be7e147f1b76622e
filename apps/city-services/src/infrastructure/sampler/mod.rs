//! Random telemetry sampler.
//!
//! Stands in for real intersection sensors: every reading is drawn
//! uniformly, vehicle count in `[0, 30)` and congestion in `[0.0, 1.0]`.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::application::ports::{SamplerError, TelemetrySampler};
use crate::domain::traffic::{MAX_VEHICLE_COUNT, TelemetrySample};

/// Uniform random readings.
#[derive(Debug)]
pub struct RandomTelemetrySampler {
    rng: Mutex<StdRng>,
}

impl Default for RandomTelemetrySampler {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomTelemetrySampler {
    /// Sampler seeded from the operating system.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Deterministic sampler.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl TelemetrySampler for RandomTelemetrySampler {
    fn sample(&self, _intersection_id: &str) -> Result<TelemetrySample, SamplerError> {
        let mut rng = self.rng.lock();
        let vehicle_count = rng.random_range(0..MAX_VEHICLE_COUNT);
        let congestion_level = rng.random_range(0.0..=1.0);
        drop(rng);

        Ok(TelemetrySample::clamped(vehicle_count, congestion_level))
    }
}
