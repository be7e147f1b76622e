//! Shared setup for the integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use city_services::proto::{
    parking_service_client::ParkingServiceClient,
    traffic_light_service_client::TrafficLightServiceClient,
    transport_service_client::TransportServiceClient,
};
use city_services::{Container, MonitorConfig, RandomTelemetrySampler};
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::transport::{Channel, Server};

/// Fast ticks so streaming tests finish quickly.
pub const TEST_TICK: Duration = Duration::from_millis(50);

/// Upper bound on any single wait.
pub const WAIT: Duration = Duration::from_secs(5);

/// All three services on one random local port.
pub struct TestHost {
    pub container: Container,
    pub addr: SocketAddr,
    pub shutdown: CancellationToken,
    server: tokio::task::JoinHandle<()>,
}

impl TestHost {
    pub async fn start() -> Self {
        Self::start_with(MonitorConfig {
            tick_interval: TEST_TICK,
            ..MonitorConfig::default()
        })
        .await
    }

    pub async fn start_with(monitor: MonitorConfig) -> Self {
        let shutdown = CancellationToken::new();
        let container = Container::seeded(
            monitor,
            Arc::new(RandomTelemetrySampler::seeded(42)),
            shutdown.child_token(),
        )
        .unwrap();

        // Find an available port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let router = Server::builder()
            .add_service(container.traffic_service().into_server())
            .add_service(container.parking_service().into_server())
            .add_service(container.transport_service().into_server());
        let stop = shutdown.clone();

        let server = tokio::spawn(async move {
            router
                .serve_with_incoming_shutdown(
                    TcpListenerStream::new(listener),
                    stop.cancelled_owned(),
                )
                .await
                .unwrap();
        });

        // Give server time to start
        tokio::time::sleep(Duration::from_millis(50)).await;

        Self {
            container,
            addr,
            shutdown,
            server,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub async fn traffic(&self) -> TrafficLightServiceClient<Channel> {
        TrafficLightServiceClient::connect(self.endpoint())
            .await
            .unwrap()
    }

    pub async fn parking(&self) -> ParkingServiceClient<Channel> {
        ParkingServiceClient::connect(self.endpoint()).await.unwrap()
    }

    pub async fn transport(&self) -> TransportServiceClient<Channel> {
        TransportServiceClient::connect(self.endpoint())
            .await
            .unwrap()
    }

    /// Poll until the flow monitor reports `expected` subscriptions.
    pub async fn wait_for_subscriptions(&self, expected: usize) {
        let monitor = self.container.monitor();
        tokio::time::timeout(WAIT, async {
            while monitor.active_subscriptions() != expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| {
            panic!(
                "expected {expected} subscriptions, found {}",
                monitor.active_subscriptions()
            )
        });
    }

    pub async fn stop(self) {
        self.container.monitor().shutdown();
        self.shutdown.cancel();
        let _ = tokio::time::timeout(WAIT, self.server).await;
    }
}
