//! Application Layer - Call handlers and port definitions.
//!
//! Handlers are transport agnostic: they take plain values, return
//! `Result<_, CityError>` and leave wire mapping to the infrastructure.

/// Port interfaces for pluggable collaborators (telemetry sampling).
pub mod ports;

/// Traffic, parking, transport and flow-monitoring services.
pub mod services;
