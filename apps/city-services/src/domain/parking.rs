//! Parking lots and reservations.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::store::{DatasetStore, Entity};
use crate::error::{CityError, ResourceKind};

/// Store of parking lots.
pub type LotStore = DatasetStore<ParkingLot>;

/// A parking lot. `available_spaces` never exceeds `total_spaces`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParkingLot {
    /// Lot id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Capacity, always positive.
    pub total_spaces: u32,
    /// Free spaces, within `[0, total_spaces]`.
    pub available_spaces: u32,
}

impl ParkingLot {
    /// Create a lot.
    ///
    /// # Errors
    ///
    /// Returns an internal [`CityError`] when the capacity is zero or the
    /// available count exceeds it.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        total_spaces: u32,
        available_spaces: u32,
    ) -> Result<Self, CityError> {
        let id = id.into();
        if total_spaces == 0 {
            return Err(CityError::internal(format!("lot {id} has no capacity")));
        }
        if available_spaces > total_spaces {
            return Err(CityError::internal(format!(
                "lot {id} reports {available_spaces} free of {total_spaces}"
            )));
        }
        Ok(Self {
            id,
            name: name.into(),
            total_spaces,
            available_spaces,
        })
    }
}

impl Entity for ParkingLot {
    const KIND: ResourceKind = ResourceKind::ParkingLot;

    fn id(&self) -> &str {
        &self.id
    }
}

/// A confirmed reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// Unique reservation id (`res-…`).
    pub id: String,
    /// Reserved lot.
    pub lot_id: String,
    /// Vehicle holding the space.
    pub vehicle_id: String,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
}

/// Append-only log of reservations with id generation.
#[derive(Debug, Default)]
pub struct ReservationLog {
    entries: Mutex<Vec<Reservation>>,
    sequence: AtomicU64,
}

impl ReservationLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a reservation and return it.
    pub fn append(&self, lot_id: &str, vehicle_id: &str) -> Reservation {
        let timestamp = Utc::now();
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let reservation = Reservation {
            id: format!("res-{}-{sequence}", timestamp.timestamp_millis()),
            lot_id: lot_id.to_string(),
            vehicle_id: vehicle_id.to_string(),
            timestamp,
        };
        self.entries.lock().push(reservation.clone());
        reservation
    }

    /// Number of reservations recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no reservation was recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Reservations held in `lot_id`, oldest first.
    #[must_use]
    pub fn for_lot(&self, lot_id: &str) -> Vec<Reservation> {
        self.entries
            .lock()
            .iter()
            .filter(|r| r.lot_id == lot_id)
            .cloned()
            .collect()
    }
}

/// Lots present when a service starts.
///
/// # Errors
///
/// Propagates [`ParkingLot::new`] validation failures.
pub fn sample_lots() -> Result<Vec<ParkingLot>, CityError> {
    Ok(vec![
        ParkingLot::new("lot-001", "Downtown Parking", 100, 45)?,
        ParkingLot::new("lot-002", "Mall Parking", 200, 120)?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lot_rejects_inconsistent_counts() {
        assert!(ParkingLot::new("lot", "Lot", 0, 0).is_err());
        assert!(ParkingLot::new("lot", "Lot", 10, 11).is_err());
        assert!(ParkingLot::new("lot", "Lot", 10, 10).is_ok());
    }

    #[test]
    fn reservation_ids_are_unique() {
        let log = ReservationLog::new();
        let first = log.append("lot-001", "car-1");
        let second = log.append("lot-001", "car-2");

        assert!(first.id.starts_with("res-"));
        assert_ne!(first.id, second.id);
        assert_eq!(log.len(), 2);
        assert_eq!(log.for_lot("lot-001").len(), 2);
        assert!(log.for_lot("lot-002").is_empty());
    }

    #[test]
    fn sample_lots_are_valid() {
        let lots = sample_lots().unwrap();
        assert_eq!(lots.len(), 2);
        assert!(lots.iter().all(|l| l.available_spaces <= l.total_spaces));
    }
}
