//! City Services Binary
//!
//! Hosts the selected gRPC services, each on its own port, plus the health
//! and metrics endpoint.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin city-services
//! CITY_SERVICES=parking cargo run --bin city-services
//! ```
//!
//! # Environment Variables
//!
//! - `CITY_SERVICES`: comma-separated subset of traffic, parking, transport
//!   (default: all three)
//! - `TRAFFIC_GRPC_PORT` / `PARKING_GRPC_PORT` / `TRANSPORT_GRPC_PORT`:
//!   gRPC ports (default: 50051 / 50052 / 50053)
//! - `CITY_HEALTH_PORT`: health check HTTP port (default: 8083)
//! - `MONITOR_TICK_INTERVAL_MS`: traffic flow update period (default: 5000)
//! - `MONITOR_CHANNEL_CAPACITY`: per-subscriber buffer (default: 16)
//! - `OTEL_ENABLED`: export spans over OTLP (default: false)
//! - `RUST_LOG`: log filter (default: info)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use city_services::infrastructure::process::{load_dotenv, wait_for_signal};
use city_services::infrastructure::telemetry;
use city_services::{
    CityConfig, Container, HealthServer, RandomTelemetrySampler, ServiceKind, init_metrics,
};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    let _telemetry_guard = telemetry::init("city-services")?;

    tracing::info!("Starting city services");

    let _metrics_handle = init_metrics().context("failed to install Prometheus recorder")?;

    let config = CityConfig::from_env().context("invalid configuration")?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    let container = Container::seeded(
        config.monitor,
        Arc::new(RandomTelemetrySampler::new()),
        shutdown_token.child_token(),
    )?;

    let mut tasks = JoinSet::new();

    let health_state = Arc::new(container.health_state(
        env!("CARGO_PKG_VERSION"),
        &config,
        shutdown_token.clone(),
    ));
    let health_server = HealthServer::new(
        config.server.health_port,
        health_state,
        shutdown_token.clone(),
    );
    tasks.spawn(async move {
        if let Err(e) = health_server.run().await {
            tracing::error!(error = %e, "Health server error");
        }
    });

    for &service in &config.services {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port_for(service)));
        let router = match service {
            ServiceKind::Traffic => {
                Server::builder().add_service(container.traffic_service().into_server())
            }
            ServiceKind::Parking => {
                Server::builder().add_service(container.parking_service().into_server())
            }
            ServiceKind::Transport => {
                Server::builder().add_service(container.transport_service().into_server())
            }
        };
        let stop = shutdown_token.clone();

        tasks.spawn(async move {
            tracing::info!(service = %service, addr = %addr, "gRPC server listening");
            if let Err(e) = router.serve_with_shutdown(addr, stop.cancelled_owned()).await {
                tracing::error!(service = %service, error = %e, "gRPC server error");
            }
            tracing::info!(service = %service, "gRPC server stopped");
        });
    }

    tracing::info!("City services ready");

    let signal = wait_for_signal()
        .await
        .context("failed to install signal handlers")?;
    tracing::info!(signal, "Shutdown requested");

    container.monitor().shutdown();
    shutdown_token.cancel();

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, async {
        while tasks.join_next().await.is_some() {}
    })
    .await
    .is_err()
    {
        tracing::warn!("Shutdown timed out, aborting remaining tasks");
        tasks.abort_all();
    }

    tracing::info!("City services stopped");
    Ok(())
}

/// Log the parsed configuration.
fn log_config(config: &CityConfig) {
    let services: Vec<&str> = config.services.iter().map(|s| s.as_str()).collect();
    tracing::info!(
        services = ?services,
        health_port = config.server.health_port,
        "Configuration loaded"
    );
    for service in &config.services {
        tracing::debug!(
            service = %service,
            port = config.server.port_for(*service),
            "gRPC port"
        );
    }
    tracing::debug!(
        tick_interval = ?config.monitor.tick_interval,
        channel_capacity = config.monitor.channel_capacity,
        "Flow monitor settings"
    );
}
