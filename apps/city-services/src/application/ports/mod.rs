//! Port Interfaces
//!
//! ## Driven Ports (Outbound)
//!
//! - `TelemetrySampler`: source of intersection readings for the flow monitor

use thiserror::Error;

use crate::domain::traffic::TelemetrySample;

/// Failure while producing a telemetry reading.
#[derive(Debug, Clone, Error)]
#[error("telemetry sampling failed for {intersection_id}: {reason}")]
pub struct SamplerError {
    /// Intersection being sampled.
    pub intersection_id: String,
    /// What went wrong.
    pub reason: String,
}

/// Produces telemetry readings for an intersection.
#[cfg_attr(test, mockall::automock)]
pub trait TelemetrySampler: Send + Sync {
    /// Take one reading for `intersection_id`.
    ///
    /// # Errors
    ///
    /// Returns [`SamplerError`] when no reading can be produced.
    fn sample(&self, intersection_id: &str) -> Result<TelemetrySample, SamplerError>;
}
