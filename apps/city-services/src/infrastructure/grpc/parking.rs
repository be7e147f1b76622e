//! `ParkingService` over gRPC.

use std::sync::Arc;
use std::time::Instant;

use tonic::Request;

use super::proto::smartcity::v1::{
    self as proto, GetAvailableSpacesRequest, GetAvailableSpacesResponse, ListLotsRequest,
    ListLotsResponse, ReserveSpaceRequest, ReserveSpaceResponse,
    parking_service_server::{ParkingService, ParkingServiceServer},
};
use super::{UnaryResult, guarded, respond};
use crate::application::services::ParkingManager;
use crate::domain::parking::ParkingLot;
use crate::infrastructure::metrics::{self, Service};

/// gRPC front of the parking handlers.
#[derive(Debug, Clone)]
pub struct ParkingGrpcService {
    manager: Arc<ParkingManager>,
}

impl ParkingGrpcService {
    /// Create the service.
    #[must_use]
    pub const fn new(manager: Arc<ParkingManager>) -> Self {
        Self { manager }
    }

    /// Wrap in the generated tonic server.
    #[must_use]
    pub fn into_server(self) -> ParkingServiceServer<Self> {
        ParkingServiceServer::new(self)
    }
}

#[tonic::async_trait]
impl ParkingService for ParkingGrpcService {
    async fn get_available_spaces(
        &self,
        request: Request<GetAvailableSpacesRequest>,
    ) -> UnaryResult<GetAvailableSpacesResponse> {
        let started = Instant::now();
        let req = request.into_inner();

        let result = guarded("GetAvailableSpaces", || {
            self.manager
                .available_spaces(&req.lot_id)
                .map(|lot| GetAvailableSpacesResponse {
                    lot_id: lot.id,
                    total_spaces: lot.total_spaces,
                    available_spaces: lot.available_spaces,
                })
        });

        respond(Service::Parking, "GetAvailableSpaces", started, result)
    }

    async fn list_lots(&self, _request: Request<ListLotsRequest>) -> UnaryResult<ListLotsResponse> {
        let started = Instant::now();
        let result = guarded("ListLots", || {
            let lots = self
                .manager
                .list_lots()
                .into_iter()
                .map(lot_to_proto)
                .collect();
            Ok(ListLotsResponse { lots })
        });

        respond(Service::Parking, "ListLots", started, result)
    }

    async fn reserve_space(
        &self,
        request: Request<ReserveSpaceRequest>,
    ) -> UnaryResult<ReserveSpaceResponse> {
        let started = Instant::now();
        let req = request.into_inner();

        let result = guarded("ReserveSpace", || {
            self.manager
                .reserve(&req.lot_id, &req.vehicle_id)
                .map(|outcome| {
                    metrics::record_reservation(outcome.is_reserved());
                    ReserveSpaceResponse {
                        success: outcome.is_reserved(),
                        reservation_id: outcome.reservation_id().to_string(),
                        message: outcome.message().to_string(),
                    }
                })
        });

        respond(Service::Parking, "ReserveSpace", started, result)
    }
}

fn lot_to_proto(lot: ParkingLot) -> proto::ParkingLot {
    proto::ParkingLot {
        lot_id: lot.id,
        name: lot.name,
        total_spaces: lot.total_spaces,
        available_spaces: lot.available_spaces,
    }
}
