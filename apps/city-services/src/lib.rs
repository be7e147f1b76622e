#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Smart City Services - Traffic, Parking and Transport
//!
//! Three in-memory gRPC services sharing one process (or split across
//! several), one of which streams live intersection telemetry, plus an
//! HTTP/JSON gateway in front of them.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Entities, the dataset store and subscription bookkeeping
//!   - `store`: Keyed tables with per-key atomic mutation
//!   - `traffic`, `parking`, `transport`: Entities and sample data
//!   - `monitor`: Lifecycle of one traffic-flow subscription
//!   - `subscription`: Which subscriber watches which intersection
//!
//! - **Application**: Handlers and port definitions
//!   - `ports`: Telemetry sampler interface
//!   - `services`: Unary handlers and the flow monitor
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `grpc`: tonic service adapters
//!   - `gateway`: axum JSON gateway over tonic clients
//!   - `config`: Environment configuration and wiring
//!   - `health`, `metrics`, `telemetry`: Operational surfaces
//!
//! # Data Flow
//!
//! ```text
//!                       ┌──────────────┐     ┌─────────────────┐
//! Browser ──► Gateway ──┤ tonic client ├────►│ Traffic  :50051 │──► stream
//!   (HTTP/JSON)         │   channels   │────►│ Parking  :50052 │
//!                       └──────────────┘────►│ Transport:50053 │
//!                                            └─────────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Error type shared by every handler.
pub mod error;

/// Domain layer - Entities and bookkeeping with no network dependencies.
pub mod domain;

/// Application layer - Handlers and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Errors
pub use error::{CityError, ErrorCode};

// Domain types
pub use domain::store::{DatasetStore, Entity, Upserted};
pub use domain::subscription::{RegistryStats, SubscriberId, SubscriptionRegistry};

// Handlers
pub use application::services::{
    FlowMonitor, MonitorConfig, ParkingManager, ReservationOutcome, TrafficController,
    TrafficFlowStream, TransportTracker,
};

// Infrastructure config
pub use infrastructure::config::{
    CityConfig, ConfigError, Container, GatewaySettings, ServerSettings, ServiceKind,
};

// gRPC adapters and generated types (for integration tests)
pub use infrastructure::grpc::{
    ParkingGrpcService, TrafficGrpcService, TransportGrpcService, proto::smartcity::v1 as proto,
};

// Gateway
pub use infrastructure::gateway::{
    BackendError, CityBackend, GatewayError, GatewayServer, GrpcCityBackend,
};

// Health server
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};

// Sampler
pub use infrastructure::sampler::RandomTelemetrySampler;

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
