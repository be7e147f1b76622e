//! Infrastructure Layer - Adapters and external integrations.
//!
//! Concrete implementations of the application ports plus the network
//! surfaces (gRPC servers, HTTP gateway, health endpoint).

/// Configuration loading.
pub mod config;

/// HTTP/JSON gateway in front of the gRPC services.
pub mod gateway;

/// gRPC service adapters and generated stubs.
pub mod grpc;

/// Health check HTTP endpoint.
pub mod health;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Dotenv loading and signal handling for the binaries.
pub mod process;

/// Random telemetry sampler.
pub mod sampler;

/// Tracing and OpenTelemetry integration.
pub mod telemetry;
