//! Domain Layer - City entities, storage and subscription state.
//!
//! Nothing here touches the network. Types are plain Rust with
//! serialization support.

/// Generic keyed store with per-entry locking.
pub mod store;

/// Traffic lights and intersection telemetry.
pub mod traffic;

/// Parking lots and reservations.
pub mod parking;

/// Transport vehicles.
pub mod transport;

/// Streaming subscription lifecycle.
pub mod monitor;

/// Subscriber registry.
pub mod subscription;
