//! Public transport vehicles.

use serde::{Deserialize, Serialize};

use super::store::{DatasetStore, Entity};
use crate::error::ResourceKind;

/// Store of vehicles.
pub type VehicleStore = DatasetStore<Vehicle>;

/// Type assigned to vehicles first seen through a location report.
pub const UNKNOWN_VEHICLE_TYPE: &str = "unknown";

/// A tracked vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    /// Vehicle id.
    pub id: String,
    /// Vehicle type (bus, tram, ...).
    pub vehicle_type: String,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Name of the next stop.
    pub next_stop: String,
    /// Minutes until the next stop.
    pub eta_minutes: u32,
}

impl Vehicle {
    /// A vehicle with no known position yet.
    #[must_use]
    pub fn unregistered(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            vehicle_type: UNKNOWN_VEHICLE_TYPE.to_string(),
            latitude: 0.0,
            longitude: 0.0,
            next_stop: String::new(),
            eta_minutes: 0,
        }
    }

    /// Apply a location report.
    pub fn apply(&mut self, report: &LocationReport) {
        self.latitude = report.latitude;
        self.longitude = report.longitude;
        self.next_stop.clone_from(&report.next_stop);
        self.eta_minutes = report.eta_minutes;
    }
}

impl Entity for Vehicle {
    const KIND: ResourceKind = ResourceKind::Vehicle;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Location fields submitted by a vehicle.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationReport {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Name of the next stop.
    pub next_stop: String,
    /// Minutes until the next stop.
    pub eta_minutes: u32,
}

/// Vehicles present when a service starts.
#[must_use]
pub fn sample_vehicles() -> Vec<Vehicle> {
    vec![
        Vehicle {
            id: "bus-001".to_string(),
            vehicle_type: "bus".to_string(),
            latitude: 47.6062,
            longitude: -122.3321,
            next_stop: "Downtown Station".to_string(),
            eta_minutes: 5,
        },
        Vehicle {
            id: "bus-002".to_string(),
            vehicle_type: "bus".to_string(),
            latitude: 47.6152,
            longitude: -122.3447,
            next_stop: "University District".to_string(),
            eta_minutes: 8,
        },
    ]
}
