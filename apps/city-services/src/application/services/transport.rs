//! Vehicle tracking.

use std::sync::Arc;

use tracing::info;

use crate::domain::store::Upserted;
use crate::domain::transport::{LocationReport, Vehicle, VehicleStore};
use crate::error::{CityError, require_id};

/// Message returned for an accepted location report.
pub const LOCATION_UPDATED_MESSAGE: &str = "Vehicle location updated successfully";

/// Handles the unary transport calls.
#[derive(Debug, Clone)]
pub struct TransportTracker {
    vehicles: Arc<VehicleStore>,
}

impl TransportTracker {
    /// Create a tracker over `vehicles`.
    #[must_use]
    pub const fn new(vehicles: Arc<VehicleStore>) -> Self {
        Self { vehicles }
    }

    /// Last known location of a vehicle.
    ///
    /// # Errors
    ///
    /// `MissingField` or `VehicleNotFound`.
    pub fn location(&self, vehicle_id: &str) -> Result<Vehicle, CityError> {
        let vehicle_id = require_id("vehicle_id", vehicle_id)?;
        self.vehicles.get(vehicle_id)
    }

    /// Every vehicle, ordered by id.
    #[must_use]
    pub fn list_vehicles(&self) -> Vec<Vehicle> {
        self.vehicles.list()
    }

    /// Store a location report, registering the vehicle if it is new.
    ///
    /// # Errors
    ///
    /// `MissingField` for a blank id.
    pub fn update_location(
        &self,
        vehicle_id: &str,
        report: &LocationReport,
    ) -> Result<Upserted, CityError> {
        let vehicle_id = require_id("vehicle_id", vehicle_id)?;

        let outcome = self.vehicles.upsert(
            vehicle_id,
            || Vehicle::unregistered(vehicle_id),
            |vehicle| vehicle.apply(report),
        );

        info!(
            vehicle_id,
            latitude = report.latitude,
            longitude = report.longitude,
            created = outcome == Upserted::Created,
            "Vehicle location updated"
        );
        Ok(outcome)
    }
}
