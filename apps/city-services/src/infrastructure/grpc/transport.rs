//! `TransportService` over gRPC.

use std::time::Instant;

use tonic::Request;

use super::proto::smartcity::v1::{
    self as proto, GetVehicleLocationRequest, GetVehicleLocationResponse, ListVehiclesRequest,
    ListVehiclesResponse, UpdateVehicleLocationRequest, UpdateVehicleLocationResponse,
    transport_service_server::{TransportService, TransportServiceServer},
};
use super::{UnaryResult, guarded, respond};
use crate::application::services::TransportTracker;
use crate::application::services::transport::LOCATION_UPDATED_MESSAGE;
use crate::domain::transport::{LocationReport, Vehicle};
use crate::infrastructure::metrics::Service;

/// gRPC front of the transport handlers.
#[derive(Debug, Clone)]
pub struct TransportGrpcService {
    tracker: TransportTracker,
}

impl TransportGrpcService {
    /// Create the service.
    #[must_use]
    pub const fn new(tracker: TransportTracker) -> Self {
        Self { tracker }
    }

    /// Wrap in the generated tonic server.
    #[must_use]
    pub fn into_server(self) -> TransportServiceServer<Self> {
        TransportServiceServer::new(self)
    }
}

#[tonic::async_trait]
impl TransportService for TransportGrpcService {
    async fn get_vehicle_location(
        &self,
        request: Request<GetVehicleLocationRequest>,
    ) -> UnaryResult<GetVehicleLocationResponse> {
        let started = Instant::now();
        let req = request.into_inner();

        let result = guarded("GetVehicleLocation", || {
            self.tracker
                .location(&req.vehicle_id)
                .map(|vehicle| GetVehicleLocationResponse {
                    vehicle_id: vehicle.id,
                    latitude: vehicle.latitude,
                    longitude: vehicle.longitude,
                    next_stop: vehicle.next_stop,
                    eta_minutes: vehicle.eta_minutes,
                })
        });

        respond(Service::Transport, "GetVehicleLocation", started, result)
    }

    async fn list_vehicles(
        &self,
        _request: Request<ListVehiclesRequest>,
    ) -> UnaryResult<ListVehiclesResponse> {
        let started = Instant::now();
        let result = guarded("ListVehicles", || {
            let vehicles = self
                .tracker
                .list_vehicles()
                .into_iter()
                .map(vehicle_to_proto)
                .collect();
            Ok(ListVehiclesResponse { vehicles })
        });

        respond(Service::Transport, "ListVehicles", started, result)
    }

    async fn update_vehicle_location(
        &self,
        request: Request<UpdateVehicleLocationRequest>,
    ) -> UnaryResult<UpdateVehicleLocationResponse> {
        let started = Instant::now();
        let req = request.into_inner();
        let report = LocationReport {
            latitude: req.latitude,
            longitude: req.longitude,
            next_stop: req.next_stop,
            eta_minutes: req.eta_minutes,
        };

        let result = guarded("UpdateVehicleLocation", || {
            self.tracker
                .update_location(&req.vehicle_id, &report)
                .map(|_| UpdateVehicleLocationResponse {
                    success: true,
                    message: LOCATION_UPDATED_MESSAGE.to_string(),
                })
        });

        respond(Service::Transport, "UpdateVehicleLocation", started, result)
    }
}

fn vehicle_to_proto(vehicle: Vehicle) -> proto::Vehicle {
    proto::Vehicle {
        vehicle_id: vehicle.id,
        vehicle_type: vehicle.vehicle_type,
        latitude: vehicle.latitude,
        longitude: vehicle.longitude,
        next_stop: vehicle.next_stop,
        eta_minutes: vehicle.eta_minutes,
    }
}
