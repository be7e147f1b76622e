//! HTTP/JSON Gateway
//!
//! Translates browser-friendly JSON calls into unary gRPC calls against the
//! three city services. See [`routes`] for the route table.

pub mod backend;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub use backend::{BackendError, CityBackend, GrpcCityBackend};
pub use routes::router;

/// Gateway HTTP server.
pub struct GatewayServer {
    port: u16,
    backend: Arc<dyn CityBackend>,
    cancel: CancellationToken,
}

impl GatewayServer {
    /// Create a gateway serving `backend` on `port`.
    #[must_use]
    pub fn new(port: u16, backend: Arc<dyn CityBackend>, cancel: CancellationToken) -> Self {
        Self {
            port,
            backend,
            cancel,
        }
    }

    /// Serve until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` if binding fails or the HTTP server stops with
    /// an error.
    pub async fn run(self) -> Result<(), GatewayError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "Gateway listening");

        axum::serve(listener, router(self.backend))
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| GatewayError::ServerFailed(e.to_string()))?;

        tracing::info!("Gateway stopped");
        Ok(())
    }
}

/// Gateway errors.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// An upstream endpoint is not a valid URI.
    #[error("invalid endpoint {endpoint}: {reason}")]
    InvalidEndpoint {
        /// Configured endpoint.
        endpoint: String,
        /// Parse failure.
        reason: String,
    },

    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}
