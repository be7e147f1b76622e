//! Parking lot queries and reservations.

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::parking::{LotStore, ParkingLot, Reservation, ReservationLog};
use crate::error::{CityError, require_id};

/// Message returned for a granted reservation.
pub const RESERVED_MESSAGE: &str = "Space reserved successfully";

/// Message returned when the lot is full.
pub const NO_SPACES_MESSAGE: &str = "No available spaces in this lot";

/// Business outcome of a reservation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReservationOutcome {
    /// A space was taken.
    Reserved(Reservation),
    /// The lot had no free space; nothing changed.
    NoSpaces,
}

impl ReservationOutcome {
    /// Whether the reservation went through.
    #[must_use]
    pub const fn is_reserved(&self) -> bool {
        matches!(self, Self::Reserved(_))
    }

    /// Reservation id, empty when nothing was reserved.
    #[must_use]
    pub fn reservation_id(&self) -> &str {
        match self {
            Self::Reserved(reservation) => &reservation.id,
            Self::NoSpaces => "",
        }
    }

    /// Human readable message for the response.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::Reserved(_) => RESERVED_MESSAGE,
            Self::NoSpaces => NO_SPACES_MESSAGE,
        }
    }
}

/// Handles the unary parking calls.
#[derive(Debug)]
pub struct ParkingManager {
    lots: Arc<LotStore>,
    reservations: ReservationLog,
}

impl ParkingManager {
    /// Create a manager over `lots`.
    #[must_use]
    pub fn new(lots: Arc<LotStore>) -> Self {
        Self {
            lots,
            reservations: ReservationLog::new(),
        }
    }

    /// Capacity and free spaces of one lot.
    ///
    /// # Errors
    ///
    /// `MissingField` or `LotNotFound`.
    pub fn available_spaces(&self, lot_id: &str) -> Result<ParkingLot, CityError> {
        let lot_id = require_id("lot_id", lot_id)?;
        self.lots.get(lot_id)
    }

    /// Every lot, ordered by id.
    #[must_use]
    pub fn list_lots(&self) -> Vec<ParkingLot> {
        self.lots.list()
    }

    /// Reserve one space in `lot_id` for `vehicle_id`.
    ///
    /// The free-space check and the decrement happen under the lot's lock,
    /// so concurrent callers can never push the count below zero.
    ///
    /// # Errors
    ///
    /// `MissingField` for a blank lot or vehicle id, `LotNotFound` for an
    /// unknown lot. A full lot is not an error.
    pub fn reserve(&self, lot_id: &str, vehicle_id: &str) -> Result<ReservationOutcome, CityError> {
        let lot_id = require_id("lot_id", lot_id)?;
        let vehicle_id = require_id("vehicle_id", vehicle_id)?;

        let taken = self
            .lots
            .try_decrement(lot_id, |lot| &mut lot.available_spaces, 0)?;

        if !taken {
            warn!(lot_id, vehicle_id, "Reservation refused, lot full");
            return Ok(ReservationOutcome::NoSpaces);
        }

        let reservation = self.reservations.append(lot_id, vehicle_id);
        info!(
            lot_id,
            vehicle_id,
            reservation_id = %reservation.id,
            "Space reserved"
        );
        Ok(ReservationOutcome::Reserved(reservation))
    }

    /// Reservations recorded since start.
    #[must_use]
    pub const fn reservations(&self) -> &ReservationLog {
        &self.reservations
    }
}
