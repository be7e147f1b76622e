//! Prometheus Metrics Module
//!
//! # Metrics Categories
//!
//! - **RPC**: call counts and latency per service, method and status code
//! - **Streaming**: active traffic-flow subscriptions and ticks produced
//! - **Parking**: reservation outcomes
//!
//! Metrics are exposed at `/metrics` on the health server port.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder.
///
/// Later calls return the handle installed by the first one.
///
/// # Errors
///
/// Returns the exporter error if another global recorder is already
/// installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

fn register_metrics() {
    describe_counter!(
        "smart_city_rpc_requests_total",
        "Total RPC calls by service, method and status code"
    );
    describe_histogram!(
        "smart_city_rpc_duration_seconds",
        "Time spent handling a unary RPC"
    );
    describe_gauge!(
        "smart_city_active_subscriptions",
        "Traffic-flow subscriptions currently streaming"
    );
    describe_counter!(
        "smart_city_monitor_ticks_total",
        "Traffic-flow updates produced"
    );
    describe_counter!(
        "smart_city_reservations_total",
        "Parking reservation attempts by outcome"
    );
}

/// Service label values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    /// Traffic light service.
    Traffic,
    /// Parking service.
    Parking,
    /// Transport service.
    Transport,
}

impl Service {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Traffic => "traffic",
            Self::Parking => "parking",
            Self::Transport => "transport",
        }
    }
}

/// Record one finished RPC.
pub fn record_rpc(service: Service, method: &'static str, code: tonic::Code, elapsed: Duration) {
    counter!(
        "smart_city_rpc_requests_total",
        "service" => service.as_str(),
        "method" => method,
        "code" => code_label(code)
    )
    .increment(1);
    histogram!(
        "smart_city_rpc_duration_seconds",
        "service" => service.as_str(),
        "method" => method
    )
    .record(elapsed.as_secs_f64());
}

/// Publish the number of streaming subscriptions.
#[allow(clippy::cast_precision_loss)]
pub fn set_active_subscriptions(count: usize) {
    gauge!("smart_city_active_subscriptions").set(count as f64);
}

/// Count one produced traffic-flow update.
pub fn record_monitor_tick() {
    counter!("smart_city_monitor_ticks_total").increment(1);
}

/// Count one reservation attempt.
pub fn record_reservation(reserved: bool) {
    let outcome = if reserved { "reserved" } else { "full" };
    counter!("smart_city_reservations_total", "outcome" => outcome).increment(1);
}

const fn code_label(code: tonic::Code) -> &'static str {
    match code {
        tonic::Code::Ok => "ok",
        tonic::Code::InvalidArgument => "invalid_argument",
        tonic::Code::NotFound => "not_found",
        tonic::Code::Internal => "internal",
        tonic::Code::Cancelled => "cancelled",
        tonic::Code::Unavailable => "unavailable",
        _ => "other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_as_str() {
        assert_eq!(Service::Traffic.as_str(), "traffic");
        assert_eq!(Service::Parking.as_str(), "parking");
        assert_eq!(Service::Transport.as_str(), "transport");
    }

    #[test]
    fn code_labels() {
        assert_eq!(code_label(tonic::Code::Ok), "ok");
        assert_eq!(code_label(tonic::Code::NotFound), "not_found");
        assert_eq!(code_label(tonic::Code::DeadlineExceeded), "other");
    }

    #[test]
    fn recording_without_recorder_is_a_no_op() {
        record_rpc(
            Service::Parking,
            "ReserveSpace",
            tonic::Code::Ok,
            Duration::from_millis(3),
        );
        record_reservation(true);
        record_monitor_tick();
        set_active_subscriptions(2);
    }
}
