//! Configuration Module
//!
//! Environment-driven configuration for the service host and the gateway,
//! plus the container that wires datasets into handlers.

mod container;
mod settings;

pub use container::Container;
pub use settings::{CityConfig, ConfigError, GatewaySettings, ServerSettings, ServiceKind};
