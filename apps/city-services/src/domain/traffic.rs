//! Traffic lights and intersection telemetry.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::store::{DatasetStore, Entity};
use crate::error::{CityError, ResourceKind};

/// Upper bound (exclusive) of a sampled vehicle count.
pub const MAX_VEHICLE_COUNT: u32 = 30;

/// Store of traffic lights.
pub type LightStore = DatasetStore<TrafficLight>;

/// Store of intersection telemetry.
pub type IntersectionStore = DatasetStore<IntersectionTelemetry>;

/// Signal color of a traffic light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LightColor {
    /// Stop.
    Red,
    /// Prepare to stop.
    Yellow,
    /// Go.
    Green,
}

impl LightColor {
    /// Wire name of the color.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Yellow => "yellow",
            Self::Green => "green",
        }
    }
}

impl std::fmt::Display for LightColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LightColor {
    type Err = CityError;

    /// Only the exact lowercase names are accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "red" => Ok(Self::Red),
            "yellow" => Ok(Self::Yellow),
            "green" => Ok(Self::Green),
            other => Err(CityError::invalid_color(other)),
        }
    }
}

/// A traffic light and its current phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficLight {
    /// Light id.
    pub id: String,
    /// Current color.
    pub color: LightColor,
    /// Seconds left in the current phase.
    pub seconds_remaining: u32,
}

impl TrafficLight {
    /// Create a light.
    #[must_use]
    pub fn new(id: impl Into<String>, color: LightColor, seconds_remaining: u32) -> Self {
        Self {
            id: id.into(),
            color,
            seconds_remaining,
        }
    }
}

impl Entity for TrafficLight {
    const KIND: ResourceKind = ResourceKind::TrafficLight;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Requested phase durations. Acknowledged but never applied to a light.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LightTiming {
    /// Red phase length in seconds.
    pub red_seconds: u32,
    /// Yellow phase length in seconds.
    pub yellow_seconds: u32,
    /// Green phase length in seconds.
    pub green_seconds: u32,
}

/// Latest telemetry for one intersection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntersectionTelemetry {
    /// Intersection id.
    pub intersection_id: String,
    /// Vehicles currently counted.
    pub vehicle_count: u32,
    /// Congestion in `[0.0, 1.0]`.
    pub congestion_level: f64,
}

impl IntersectionTelemetry {
    /// Create telemetry, clamping congestion into `[0.0, 1.0]`.
    #[must_use]
    pub fn new(intersection_id: impl Into<String>, vehicle_count: u32, congestion_level: f64) -> Self {
        Self {
            intersection_id: intersection_id.into(),
            vehicle_count,
            congestion_level: clamp_congestion(congestion_level),
        }
    }

    /// Overwrite the stored values with a fresh sample.
    pub fn apply(&mut self, sample: TelemetrySample) {
        self.vehicle_count = sample.vehicle_count;
        self.congestion_level = sample.congestion_level;
    }
}

impl Entity for IntersectionTelemetry {
    const KIND: ResourceKind = ResourceKind::Intersection;

    fn id(&self) -> &str {
        &self.intersection_id
    }
}

/// One generated telemetry reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetrySample {
    /// Vehicles counted, below [`MAX_VEHICLE_COUNT`].
    pub vehicle_count: u32,
    /// Congestion in `[0.0, 1.0]`.
    pub congestion_level: f64,
}

impl TelemetrySample {
    /// Build a sample, clamping both values into their ranges.
    #[must_use]
    pub fn clamped(vehicle_count: u32, congestion_level: f64) -> Self {
        Self {
            vehicle_count: vehicle_count.min(MAX_VEHICLE_COUNT - 1),
            congestion_level: clamp_congestion(congestion_level),
        }
    }
}

/// Update pushed to a traffic-flow subscriber on every tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TrafficUpdate {
    /// Intersection id.
    pub intersection_id: String,
    /// Vehicles counted.
    pub vehicle_count: u32,
    /// Congestion in `[0.0, 1.0]`.
    pub congestion_level: f64,
    /// Tick time, non-decreasing within a subscription.
    pub timestamp: DateTime<Utc>,
    /// 1-based tick number within the subscription.
    pub sequence: u64,
}

fn clamp_congestion(level: f64) -> f64 {
    if level.is_nan() {
        return 0.0;
    }
    level.clamp(0.0, 1.0)
}

/// Lights present when a service starts.
#[must_use]
pub fn sample_lights() -> Vec<TrafficLight> {
    vec![
        TrafficLight::new("light-001", LightColor::Red, 30),
        TrafficLight::new("light-002", LightColor::Green, 45),
        TrafficLight::new("light-003", LightColor::Yellow, 5),
    ]
}

/// Intersections present when a service starts.
#[must_use]
pub fn sample_intersections() -> Vec<IntersectionTelemetry> {
    vec![
        IntersectionTelemetry::new("int-001", 15, 0.3),
        IntersectionTelemetry::new("int-002", 25, 0.7),
    ]
}
