//! Health Check and Metrics Endpoint
//!
//! # Endpoints
//!
//! - `GET /health` - JSON status with dataset sizes and live subscriptions
//! - `GET /healthz` - liveness probe (simple OK)
//! - `GET /readyz` - readiness probe, fails once shutdown has begun
//! - `GET /metrics` - Prometheus metrics in text format

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::services::FlowMonitor;
use crate::domain::parking::LotStore;
use crate::domain::traffic::{IntersectionStore, LightStore};
use crate::domain::transport::VehicleStore;
use crate::infrastructure::config::ServiceKind;
use crate::infrastructure::metrics::get_metrics_handle;

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status.
    pub status: HealthStatus,
    /// Service version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Services hosted by this process.
    pub services: Vec<&'static str>,
    /// Entity counts per dataset.
    pub datasets: DatasetSizes,
    /// Running traffic-flow subscriptions.
    pub active_subscriptions: usize,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Serving requests.
    Healthy,
    /// Shutdown has begun; new work should go elsewhere.
    ShuttingDown,
}

/// Entity counts. Absent datasets belong to services not hosted here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DatasetSizes {
    /// Traffic lights.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lights: Option<usize>,
    /// Monitored intersections.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intersections: Option<usize>,
    /// Parking lots.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lots: Option<usize>,
    /// Vehicles.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicles: Option<usize>,
}

/// Shared state for the health server.
#[derive(Debug, Default)]
pub struct HealthServerState {
    version: String,
    started_at: Option<Instant>,
    services: Vec<ServiceKind>,
    lights: Option<Arc<LightStore>>,
    intersections: Option<Arc<IntersectionStore>>,
    lots: Option<Arc<LotStore>>,
    vehicles: Option<Arc<VehicleStore>>,
    monitor: Option<FlowMonitor>,
    shutdown: CancellationToken,
}

impl HealthServerState {
    /// Create state for `version`; attach datasets with the `with_*` calls.
    #[must_use]
    pub fn new(version: impl Into<String>, shutdown: CancellationToken) -> Self {
        Self {
            version: version.into(),
            started_at: Some(Instant::now()),
            shutdown,
            ..Self::default()
        }
    }

    /// Report the traffic datasets and flow monitor.
    #[must_use]
    pub fn with_traffic(
        mut self,
        lights: Arc<LightStore>,
        intersections: Arc<IntersectionStore>,
        monitor: FlowMonitor,
    ) -> Self {
        self.services.push(ServiceKind::Traffic);
        self.lights = Some(lights);
        self.intersections = Some(intersections);
        self.monitor = Some(monitor);
        self
    }

    /// Report the parking dataset.
    #[must_use]
    pub fn with_parking(mut self, lots: Arc<LotStore>) -> Self {
        self.services.push(ServiceKind::Parking);
        self.lots = Some(lots);
        self
    }

    /// Report the transport dataset.
    #[must_use]
    pub fn with_transport(mut self, vehicles: Arc<VehicleStore>) -> Self {
        self.services.push(ServiceKind::Transport);
        self.vehicles = Some(vehicles);
        self
    }

    fn snapshot(&self) -> HealthResponse {
        let status = if self.shutdown.is_cancelled() {
            HealthStatus::ShuttingDown
        } else {
            HealthStatus::Healthy
        };

        HealthResponse {
            status,
            version: self.version.clone(),
            uptime_secs: self.started_at.map_or(0, |t| t.elapsed().as_secs()),
            current_time: Utc::now(),
            services: self.services.iter().map(|s| s.as_str()).collect(),
            datasets: DatasetSizes {
                lights: self.lights.as_ref().map(|s| s.len()),
                intersections: self.intersections.as_ref().map(|s| s.len()),
                lots: self.lots.as_ref().map(|s| s.len()),
                vehicles: self.vehicles.as_ref().map(|s| s.len()),
            },
            active_subscriptions: self
                .monitor
                .as_ref()
                .map_or(0, FlowMonitor::active_subscriptions),
        }
    }
}

/// Health check HTTP server.
pub struct HealthServer {
    port: u16,
    state: Arc<HealthServerState>,
    cancel: CancellationToken,
}

impl HealthServer {
    /// Create a new health server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<HealthServerState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Routes served by the health server.
    pub fn router(state: Arc<HealthServerState>) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/healthz", get(liveness_handler))
            .route("/readyz", get(readiness_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(state)
    }

    /// Run the health server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `HealthServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), HealthServerError> {
        let app = Self::router(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| HealthServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "Health server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| HealthServerError::ServerFailed(e.to_string()))?;

        tracing::info!("Health server stopped");
        Ok(())
    }
}

async fn health_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    let response = state.snapshot();
    let status_code = match response.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    if state.shutdown.is_cancelled() {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    } else {
        (StatusCode::OK, "READY")
    }
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            let body = handle.render();
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                body,
            )
        },
    )
}

/// Health server errors.
#[derive(Debug, thiserror::Error)]
pub enum HealthServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::parking::sample_lots;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    fn state(shutdown: &CancellationToken) -> Arc<HealthServerState> {
        let lots = Arc::new(LotStore::with_entities(sample_lots().unwrap()));
        Arc::new(HealthServerState::new("1.2.3", shutdown.clone()).with_parking(lots))
    }

    async fn fetch(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[test]
    fn health_status_serialization() {
        assert_eq!(
            serde_json::to_string(&HealthStatus::Healthy).unwrap(),
            "\"healthy\""
        );
        assert_eq!(
            serde_json::to_string(&HealthStatus::ShuttingDown).unwrap(),
            "\"shutting_down\""
        );
    }

    #[tokio::test]
    async fn health_reports_hosted_datasets() {
        let shutdown = CancellationToken::new();
        let (status, body) = fetch(HealthServer::router(state(&shutdown)), "/health").await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["version"], "1.2.3");
        assert_eq!(json["services"], serde_json::json!(["parking"]));
        assert_eq!(json["datasets"]["lots"], 2);
        assert!(json["datasets"].get("lights").is_none());
        assert_eq!(json["active_subscriptions"], 0);
    }

    #[tokio::test]
    async fn readiness_follows_shutdown() {
        let shutdown = CancellationToken::new();
        let app = HealthServer::router(state(&shutdown));

        let (status, _) = fetch(app.clone(), "/readyz").await;
        assert_eq!(status, StatusCode::OK);

        shutdown.cancel();
        let (status, body) = fetch(app.clone(), "/readyz").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body, "NOT READY");

        let (status, _) = fetch(app, "/healthz").await;
        assert_eq!(status, StatusCode::OK);
    }
}
