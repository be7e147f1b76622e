//! gRPC Service Adapters
//!
//! Bridge the generated tonic traits to the application handlers. Every
//! handler runs inside [`guarded`], so a panic becomes an internal error
//! instead of a dropped call. [`respond`] then records metrics and converts
//! a [`CityError`] into a status with rich error details.

pub mod parking;
pub mod traffic;
pub mod transport;

use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use chrono::{DateTime, Utc};
use prost_types::Timestamp;
use tonic::{Response, Status};

use crate::error::{CityError, ErrorCode};
use crate::infrastructure::metrics::{self, Service};

// Allow clippy warnings and missing docs in generated code
#[allow(
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::unwrap_used,
    clippy::expect_used
)]
pub mod proto {
    pub mod smartcity {
        pub mod v1 {
            include!(concat!(env!("OUT_DIR"), "/smartcity.v1.rs"));
        }
    }
}

pub use parking::ParkingGrpcService;
pub use traffic::TrafficGrpcService;
pub use transport::TransportGrpcService;

type UnaryResult<T> = Result<Response<T>, Status>;

/// Run a handler, turning a panic into an internal error.
fn guarded<T>(
    method: &'static str,
    handler: impl FnOnce() -> Result<T, CityError>,
) -> Result<T, CityError> {
    panic::catch_unwind(AssertUnwindSafe(handler)).unwrap_or_else(|payload| {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_default();
        tracing::error!(method, reason = %reason, "Handler panicked");
        Err(CityError::internal("Internal error"))
    })
}

/// Record the call and map the handler result onto the wire.
fn respond<T>(
    service: Service,
    method: &'static str,
    started: Instant,
    result: Result<T, CityError>,
) -> UnaryResult<T> {
    match result {
        Ok(body) => {
            metrics::record_rpc(service, method, tonic::Code::Ok, started.elapsed());
            Ok(Response::new(body))
        }
        Err(error) => {
            let status = error.to_status();
            metrics::record_rpc(service, method, status.code(), started.elapsed());
            if error.code() == ErrorCode::Internal {
                tracing::error!(method, error = %error, "RPC failed");
            } else {
                tracing::debug!(method, error = %error, "RPC rejected");
            }
            Err(status)
        }
    }
}

fn datetime_to_timestamp(dt: DateTime<Utc>) -> Timestamp {
    Timestamp {
        seconds: dt.timestamp(),
        nanos: i32::try_from(dt.timestamp_subsec_nanos()).unwrap_or(0),
    }
}
