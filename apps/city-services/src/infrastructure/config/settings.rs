//! City Services Configuration Settings
//!
//! Configuration types for the service host and the gateway, loaded from
//! environment variables.

use std::collections::BTreeSet;
use std::str::FromStr;
use std::time::Duration;

use crate::application::services::MonitorConfig;

/// One of the three city backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ServiceKind {
    /// Traffic lights and flow monitoring.
    Traffic,
    /// Parking lots.
    Parking,
    /// Public transport.
    Transport,
}

impl ServiceKind {
    /// Every service, in start order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Traffic, Self::Parking, Self::Transport]
    }

    /// Name used in `CITY_SERVICES` and in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Traffic => "traffic",
            Self::Parking => "parking",
            Self::Transport => "transport",
        }
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "traffic" => Ok(Self::Traffic),
            "parking" => Ok(Self::Parking),
            "transport" => Ok(Self::Transport),
            other => Err(ConfigError::UnknownService(other.to_string())),
        }
    }
}

/// Listening ports of the service host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerSettings {
    /// Traffic gRPC port.
    pub traffic_port: u16,
    /// Parking gRPC port.
    pub parking_port: u16,
    /// Transport gRPC port.
    pub transport_port: u16,
    /// Health and metrics HTTP port.
    pub health_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            traffic_port: 50051,
            parking_port: 50052,
            transport_port: 50053,
            health_port: 8083,
        }
    }
}

impl ServerSettings {
    /// gRPC port of `service`.
    #[must_use]
    pub const fn port_for(&self, service: ServiceKind) -> u16 {
        match service {
            ServiceKind::Traffic => self.traffic_port,
            ServiceKind::Parking => self.parking_port,
            ServiceKind::Transport => self.transport_port,
        }
    }
}

/// Gateway listener and upstream endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewaySettings {
    /// HTTP port of the gateway.
    pub http_port: u16,
    /// Traffic service endpoint.
    pub traffic_endpoint: String,
    /// Parking service endpoint.
    pub parking_endpoint: String,
    /// Transport service endpoint.
    pub transport_endpoint: String,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            http_port: 3000,
            traffic_endpoint: "http://localhost:50051".to_string(),
            parking_endpoint: "http://localhost:50052".to_string(),
            transport_endpoint: "http://localhost:50053".to_string(),
        }
    }
}

/// Complete configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CityConfig {
    /// Services hosted by this process.
    pub services: BTreeSet<ServiceKind>,
    /// Listening ports.
    pub server: ServerSettings,
    /// Flow monitor tuning.
    pub monitor: MonitorConfig,
    /// Gateway settings.
    pub gateway: GatewaySettings,
}

impl Default for CityConfig {
    fn default() -> Self {
        Self {
            services: ServiceKind::all().iter().copied().collect(),
            server: ServerSettings::default(),
            monitor: MonitorConfig::default(),
            gateway: GatewaySettings::default(),
        }
    }
}

impl CityConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error for unparsable numbers, zero tick interval or
    /// channel capacity, and unknown service names.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`CityConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let services = match lookup("CITY_SERVICES") {
            Some(raw) => parse_services(&raw)?,
            None => defaults.services,
        };

        let server = ServerSettings {
            traffic_port: parse_or(&lookup, "TRAFFIC_GRPC_PORT", defaults.server.traffic_port)?,
            parking_port: parse_or(&lookup, "PARKING_GRPC_PORT", defaults.server.parking_port)?,
            transport_port: parse_or(
                &lookup,
                "TRANSPORT_GRPC_PORT",
                defaults.server.transport_port,
            )?,
            health_port: parse_or(&lookup, "CITY_HEALTH_PORT", defaults.server.health_port)?,
        };

        let tick_ms: u64 = parse_or(
            &lookup,
            "MONITOR_TICK_INTERVAL_MS",
            u64::try_from(defaults.monitor.tick_interval.as_millis()).unwrap_or(u64::MAX),
        )?;
        if tick_ms == 0 {
            return Err(ConfigError::ZeroValue("MONITOR_TICK_INTERVAL_MS".to_string()));
        }

        let channel_capacity: usize = parse_or(
            &lookup,
            "MONITOR_CHANNEL_CAPACITY",
            defaults.monitor.channel_capacity,
        )?;
        if channel_capacity == 0 {
            return Err(ConfigError::ZeroValue("MONITOR_CHANNEL_CAPACITY".to_string()));
        }

        let gateway = GatewaySettings {
            http_port: parse_or(&lookup, "GATEWAY_HTTP_PORT", defaults.gateway.http_port)?,
            traffic_endpoint: lookup("TRAFFIC_ENDPOINT")
                .unwrap_or(defaults.gateway.traffic_endpoint),
            parking_endpoint: lookup("PARKING_ENDPOINT")
                .unwrap_or(defaults.gateway.parking_endpoint),
            transport_endpoint: lookup("TRANSPORT_ENDPOINT")
                .unwrap_or(defaults.gateway.transport_endpoint),
        };

        Ok(Self {
            services,
            server,
            monitor: MonitorConfig {
                tick_interval: Duration::from_millis(tick_ms),
                channel_capacity,
            },
            gateway,
        })
    }

    /// Whether this process hosts `service`.
    #[must_use]
    pub fn hosts(&self, service: ServiceKind) -> bool {
        self.services.contains(&service)
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Environment variable could not be parsed.
    #[error("environment variable {key} has invalid value {value:?}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Raw value.
        value: String,
    },
    /// Environment variable must be positive.
    #[error("environment variable {0} must be greater than zero")]
    ZeroValue(String),
    /// `CITY_SERVICES` names an unknown service.
    #[error("unknown service {0:?} (expected traffic, parking or transport)")]
    UnknownService(String),
    /// `CITY_SERVICES` selects nothing.
    #[error("CITY_SERVICES selects no service")]
    NoServices,
}

fn parse_services(raw: &str) -> Result<BTreeSet<ServiceKind>, ConfigError> {
    let services = raw
        .split(',')
        .filter(|part| !part.trim().is_empty())
        .map(str::parse)
        .collect::<Result<BTreeSet<_>, _>>()?;
    if services.is_empty() {
        return Err(ConfigError::NoServices);
    }
    Ok(services)
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    lookup(key).map_or(Ok(default), |value| {
        value.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value,
        })
    })
}
