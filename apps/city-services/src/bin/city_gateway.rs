//! City Gateway Binary
//!
//! Serves the JSON API on `GATEWAY_HTTP_PORT` and forwards every call to the
//! gRPC services.
//!
//! # Environment Variables
//!
//! - `GATEWAY_HTTP_PORT`: HTTP port (default: 3000)
//! - `TRAFFIC_ENDPOINT`: traffic service (default: <http://localhost:50051>)
//! - `PARKING_ENDPOINT`: parking service (default: <http://localhost:50052>)
//! - `TRANSPORT_ENDPOINT`: transport service (default: <http://localhost:50053>)
//! - `OTEL_ENABLED`: export spans over OTLP (default: false)
//! - `RUST_LOG`: log filter (default: info)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use city_services::infrastructure::process::{load_dotenv, wait_for_signal};
use city_services::infrastructure::telemetry;
use city_services::{CityConfig, GatewayServer, GrpcCityBackend};
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    let _telemetry_guard = telemetry::init("city-gateway")?;

    let config = CityConfig::from_env().context("invalid configuration")?;
    tracing::info!(
        http_port = config.gateway.http_port,
        traffic = %config.gateway.traffic_endpoint,
        parking = %config.gateway.parking_endpoint,
        transport = %config.gateway.transport_endpoint,
        "Starting city gateway"
    );

    let backend = GrpcCityBackend::connect_lazy(&config.gateway)?;
    let shutdown_token = CancellationToken::new();
    let server = GatewayServer::new(
        config.gateway.http_port,
        Arc::new(backend),
        shutdown_token.clone(),
    );

    let mut server_task = tokio::spawn(server.run());

    tokio::select! {
        result = &mut server_task => {
            // The server only returns early on a bind or serve failure.
            result.context("gateway task panicked")??;
            return Ok(());
        }
        signal = wait_for_signal() => {
            let signal = signal.context("failed to install signal handlers")?;
            tracing::info!(signal, "Shutdown requested");
        }
    }

    shutdown_token.cancel();
    match tokio::time::timeout(SHUTDOWN_TIMEOUT, server_task).await {
        Ok(result) => result.context("gateway task panicked")??,
        Err(_) => tracing::warn!("Shutdown timed out"),
    }

    tracing::info!("City gateway stopped");
    Ok(())
}
