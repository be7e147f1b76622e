//! Application Services

/// Flow monitor for streaming subscriptions.
pub mod monitor;
/// Parking lot queries and reservations.
pub mod parking;
/// Traffic light queries and control.
pub mod traffic;
/// Vehicle tracking.
pub mod transport;

pub use monitor::{FlowMonitor, MonitorConfig, TrafficFlowStream};
pub use parking::{ParkingManager, ReservationOutcome};
pub use traffic::TrafficController;
pub use transport::TransportTracker;
