//! Upstream gRPC backends of the gateway.

use std::time::Duration;

use async_trait::async_trait;
use tonic::transport::{Channel, Endpoint};

use super::GatewayError;
use crate::infrastructure::config::GatewaySettings;
use crate::infrastructure::grpc::proto::smartcity::v1::{
    ChangeLightRequest, ChangeLightResponse, ChangeLightTimingRequest, ChangeLightTimingResponse,
    GetAvailableSpacesRequest, GetAvailableSpacesResponse, GetLightStatusRequest,
    GetLightStatusResponse, GetVehicleLocationRequest, GetVehicleLocationResponse,
    ListLightsRequest, ListLightsResponse, ListLotsRequest, ListLotsResponse, ListVehiclesRequest,
    ListVehiclesResponse, ReserveSpaceRequest, ReserveSpaceResponse, UpdateVehicleLocationRequest,
    UpdateVehicleLocationResponse, parking_service_client::ParkingServiceClient,
    traffic_light_service_client::TrafficLightServiceClient,
    transport_service_client::TransportServiceClient,
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// A failed upstream call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct BackendError {
    /// Status code returned by the service.
    pub code: tonic::Code,
    /// Status message, forwarded to HTTP clients.
    pub message: String,
}

impl BackendError {
    /// Create a backend error.
    #[must_use]
    pub fn new(code: tonic::Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<tonic::Status> for BackendError {
    fn from(status: tonic::Status) -> Self {
        Self::new(status.code(), status.message())
    }
}

/// The ten unary calls the gateway fans out to.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CityBackend: Send + Sync {
    /// `TrafficLightService.ListLights`.
    async fn list_lights(&self) -> Result<ListLightsResponse, BackendError>;

    /// `TrafficLightService.GetLightStatus`.
    async fn light_status(&self, light_id: String) -> Result<GetLightStatusResponse, BackendError>;

    /// `TrafficLightService.ChangeLight`.
    async fn change_light(
        &self,
        request: ChangeLightRequest,
    ) -> Result<ChangeLightResponse, BackendError>;

    /// `TrafficLightService.ChangeLightTiming`.
    async fn change_light_timing(
        &self,
        request: ChangeLightTimingRequest,
    ) -> Result<ChangeLightTimingResponse, BackendError>;

    /// `ParkingService.ListLots`.
    async fn list_lots(&self) -> Result<ListLotsResponse, BackendError>;

    /// `ParkingService.GetAvailableSpaces`.
    async fn available_spaces(
        &self,
        lot_id: String,
    ) -> Result<GetAvailableSpacesResponse, BackendError>;

    /// `ParkingService.ReserveSpace`.
    async fn reserve_space(
        &self,
        request: ReserveSpaceRequest,
    ) -> Result<ReserveSpaceResponse, BackendError>;

    /// `TransportService.ListVehicles`.
    async fn list_vehicles(&self) -> Result<ListVehiclesResponse, BackendError>;

    /// `TransportService.GetVehicleLocation`.
    async fn vehicle_location(
        &self,
        vehicle_id: String,
    ) -> Result<GetVehicleLocationResponse, BackendError>;

    /// `TransportService.UpdateVehicleLocation`.
    async fn update_vehicle_location(
        &self,
        request: UpdateVehicleLocationRequest,
    ) -> Result<UpdateVehicleLocationResponse, BackendError>;
}

/// [`CityBackend`] over tonic clients.
///
/// Channels connect on first use, so the gateway starts even when a service
/// is down; calls to it fail with `UNAVAILABLE` until it comes up.
#[derive(Debug, Clone)]
pub struct GrpcCityBackend {
    traffic: TrafficLightServiceClient<Channel>,
    parking: ParkingServiceClient<Channel>,
    transport: TransportServiceClient<Channel>,
}

impl GrpcCityBackend {
    /// Build lazily connected clients for the configured endpoints.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::InvalidEndpoint` if an endpoint is not a URI.
    pub fn connect_lazy(settings: &GatewaySettings) -> Result<Self, GatewayError> {
        Ok(Self {
            traffic: TrafficLightServiceClient::new(lazy_channel(&settings.traffic_endpoint)?),
            parking: ParkingServiceClient::new(lazy_channel(&settings.parking_endpoint)?),
            transport: TransportServiceClient::new(lazy_channel(&settings.transport_endpoint)?),
        })
    }
}

fn lazy_channel(endpoint: &str) -> Result<Channel, GatewayError> {
    let endpoint = Endpoint::from_shared(endpoint.to_string()).map_err(|e| {
        GatewayError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        }
    })?;
    Ok(endpoint.connect_timeout(CONNECT_TIMEOUT).connect_lazy())
}

// Generated clients take `&mut self`; clones share the underlying channel.
#[async_trait]
impl CityBackend for GrpcCityBackend {
    async fn list_lights(&self) -> Result<ListLightsResponse, BackendError> {
        let response = self.traffic.clone().list_lights(ListLightsRequest {}).await?;
        Ok(response.into_inner())
    }

    async fn light_status(&self, light_id: String) -> Result<GetLightStatusResponse, BackendError> {
        let response = self
            .traffic
            .clone()
            .get_light_status(GetLightStatusRequest { light_id })
            .await?;
        Ok(response.into_inner())
    }

    async fn change_light(
        &self,
        request: ChangeLightRequest,
    ) -> Result<ChangeLightResponse, BackendError> {
        let response = self.traffic.clone().change_light(request).await?;
        Ok(response.into_inner())
    }

    async fn change_light_timing(
        &self,
        request: ChangeLightTimingRequest,
    ) -> Result<ChangeLightTimingResponse, BackendError> {
        let response = self.traffic.clone().change_light_timing(request).await?;
        Ok(response.into_inner())
    }

    async fn list_lots(&self) -> Result<ListLotsResponse, BackendError> {
        let response = self.parking.clone().list_lots(ListLotsRequest {}).await?;
        Ok(response.into_inner())
    }

    async fn available_spaces(
        &self,
        lot_id: String,
    ) -> Result<GetAvailableSpacesResponse, BackendError> {
        let response = self
            .parking
            .clone()
            .get_available_spaces(GetAvailableSpacesRequest { lot_id })
            .await?;
        Ok(response.into_inner())
    }

    async fn reserve_space(
        &self,
        request: ReserveSpaceRequest,
    ) -> Result<ReserveSpaceResponse, BackendError> {
        let response = self.parking.clone().reserve_space(request).await?;
        Ok(response.into_inner())
    }

    async fn list_vehicles(&self) -> Result<ListVehiclesResponse, BackendError> {
        let response = self
            .transport
            .clone()
            .list_vehicles(ListVehiclesRequest {})
            .await?;
        Ok(response.into_inner())
    }

    async fn vehicle_location(
        &self,
        vehicle_id: String,
    ) -> Result<GetVehicleLocationResponse, BackendError> {
        let response = self
            .transport
            .clone()
            .get_vehicle_location(GetVehicleLocationRequest { vehicle_id })
            .await?;
        Ok(response.into_inner())
    }

    async fn update_vehicle_location(
        &self,
        request: UpdateVehicleLocationRequest,
    ) -> Result<UpdateVehicleLocationResponse, BackendError> {
        let response = self.transport.clone().update_vehicle_location(request).await?;
        Ok(response.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_message_is_kept() {
        let error = BackendError::from(tonic::Status::not_found("Lot not found"));
        assert_eq!(error.code, tonic::Code::NotFound);
        assert_eq!(error.to_string(), "Lot not found");
    }

    #[tokio::test]
    async fn rejects_malformed_endpoint() {
        let settings = GatewaySettings {
            parking_endpoint: "not a uri".to_string(),
            ..GatewaySettings::default()
        };

        let err = GrpcCityBackend::connect_lazy(&settings).unwrap_err();
        assert!(matches!(
            err,
            GatewayError::InvalidEndpoint { ref endpoint, .. } if endpoint == "not a uri"
        ));
    }

    #[tokio::test]
    async fn unreachable_service_reports_unavailable() {
        let settings = GatewaySettings {
            traffic_endpoint: "http://127.0.0.1:1".to_string(),
            ..GatewaySettings::default()
        };
        let backend = GrpcCityBackend::connect_lazy(&settings).unwrap();

        let err = backend.list_lights().await.unwrap_err();
        assert_eq!(err.code, tonic::Code::Unavailable);
    }
}
