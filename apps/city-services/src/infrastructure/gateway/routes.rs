//! JSON routes of the gateway.
//!
//! Bodies use camelCase. A failed upstream call becomes HTTP 500 with
//! `{"success": false, "message": <status message>}`; business outcomes such
//! as a full lot pass through with 200.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use super::backend::{BackendError, CityBackend};
use crate::infrastructure::grpc::proto::smartcity::v1::{
    self as proto, ChangeLightRequest, ChangeLightTimingRequest, ReserveSpaceRequest,
    UpdateVehicleLocationRequest,
};

type Backend = Arc<dyn CityBackend>;
type ApiResult<T> = Result<Json<T>, ApiError>;

/// Routes served by the gateway.
pub fn router(backend: Backend) -> Router {
    Router::new()
        .route("/healthz", get(liveness))
        .route("/api/traffic/lights", get(list_lights))
        .route("/api/traffic/lights/{id}", get(light_status))
        .route("/api/traffic/lights/{id}/change", post(change_light))
        .route("/api/traffic/lights/{id}/timing", post(change_light_timing))
        .route("/api/parking/lots", get(list_lots))
        .route("/api/parking/lots/{id}", get(lot_status))
        .route("/api/parking/lots/{id}/reserve", post(reserve_space))
        .route("/api/transport/vehicles", get(list_vehicles))
        .route("/api/transport/vehicles/{id}", get(vehicle_location))
        .route(
            "/api/transport/vehicles/{id}/location",
            post(update_vehicle_location),
        )
        .with_state(backend)
}

// ---------------------------------------------------------------------------
// Bodies
// ---------------------------------------------------------------------------

/// A traffic light.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LightView {
    /// Light id.
    pub id: String,
    /// Current color.
    pub color: String,
    /// Seconds left in the current phase.
    pub seconds_remaining: u32,
}

/// Body of `POST /api/traffic/lights/{id}/change`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChangeLightBody {
    /// Requested color; validated by the traffic service.
    pub color: String,
}

/// Body of `POST /api/traffic/lights/{id}/timing`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimingBody {
    /// Red phase length.
    pub red_seconds: u32,
    /// Yellow phase length.
    pub yellow_seconds: u32,
    /// Green phase length.
    pub green_seconds: u32,
}

/// A parking lot. `name` is absent from single-lot lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LotView {
    /// Lot id.
    pub id: String,
    /// Display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Capacity.
    pub total_spaces: u32,
    /// Free spaces.
    pub available_spaces: u32,
}

/// Body of `POST /api/parking/lots/{id}/reserve`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReserveBody {
    /// Vehicle taking the space.
    pub vehicle_id: String,
}

/// Reservation result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationView {
    /// Whether a space was taken.
    pub success: bool,
    /// Reservation id; empty when no space was taken.
    pub reservation_id: String,
    /// Human-readable outcome.
    pub message: String,
}

/// A vehicle. `type` is absent from single-vehicle lookups.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleView {
    /// Vehicle id.
    pub id: String,
    /// Vehicle type.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub vehicle_type: Option<String>,
    /// Latitude.
    pub latitude: f64,
    /// Longitude.
    pub longitude: f64,
    /// Next stop.
    pub next_stop: String,
    /// Minutes to the next stop.
    pub eta_minutes: u32,
}

/// Body of `POST /api/transport/vehicles/{id}/location`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LocationBody {
    /// Latitude.
    pub latitude: f64,
    /// Longitude.
    pub longitude: f64,
    /// Next stop.
    pub next_stop: String,
    /// Minutes to the next stop.
    pub eta_minutes: u32,
}

/// `{success, message}` acknowledgement, also used for failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    /// Whether the call succeeded.
    pub success: bool,
    /// Human-readable outcome.
    pub message: String,
}

/// An upstream failure rendered as HTTP 500.
#[derive(Debug)]
pub struct ApiError(BackendError);

impl From<BackendError> for ApiError {
    fn from(error: BackendError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::warn!(code = ?self.0.code, message = %self.0.message, "Upstream call failed");
        let body = Ack {
            success: false,
            message: self.0.message,
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn liveness() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn list_lights(State(backend): State<Backend>) -> ApiResult<Vec<LightView>> {
    let response = backend.list_lights().await?;
    Ok(Json(response.lights.into_iter().map(light_view).collect()))
}

async fn light_status(
    State(backend): State<Backend>,
    Path(id): Path<String>,
) -> ApiResult<LightView> {
    let response = backend.light_status(id).await?;
    Ok(Json(LightView {
        id: response.light_id,
        color: response.color,
        seconds_remaining: response.seconds_remaining,
    }))
}

async fn change_light(
    State(backend): State<Backend>,
    Path(id): Path<String>,
    Json(body): Json<ChangeLightBody>,
) -> ApiResult<Ack> {
    let response = backend
        .change_light(ChangeLightRequest {
            light_id: id,
            color: body.color,
        })
        .await?;
    Ok(Json(Ack {
        success: response.success,
        message: response.message,
    }))
}

async fn change_light_timing(
    State(backend): State<Backend>,
    Path(id): Path<String>,
    Json(body): Json<TimingBody>,
) -> ApiResult<Ack> {
    let response = backend
        .change_light_timing(ChangeLightTimingRequest {
            light_id: id,
            red_seconds: body.red_seconds,
            yellow_seconds: body.yellow_seconds,
            green_seconds: body.green_seconds,
        })
        .await?;
    Ok(Json(Ack {
        success: response.success,
        message: response.message,
    }))
}

async fn list_lots(State(backend): State<Backend>) -> ApiResult<Vec<LotView>> {
    let response = backend.list_lots().await?;
    Ok(Json(response.lots.into_iter().map(lot_view).collect()))
}

async fn lot_status(State(backend): State<Backend>, Path(id): Path<String>) -> ApiResult<LotView> {
    let response = backend.available_spaces(id).await?;
    Ok(Json(LotView {
        id: response.lot_id,
        name: None,
        total_spaces: response.total_spaces,
        available_spaces: response.available_spaces,
    }))
}

async fn reserve_space(
    State(backend): State<Backend>,
    Path(id): Path<String>,
    Json(body): Json<ReserveBody>,
) -> ApiResult<ReservationView> {
    let response = backend
        .reserve_space(ReserveSpaceRequest {
            lot_id: id,
            vehicle_id: body.vehicle_id,
        })
        .await?;
    Ok(Json(ReservationView {
        success: response.success,
        reservation_id: response.reservation_id,
        message: response.message,
    }))
}

async fn list_vehicles(State(backend): State<Backend>) -> ApiResult<Vec<VehicleView>> {
    let response = backend.list_vehicles().await?;
    Ok(Json(response.vehicles.into_iter().map(vehicle_view).collect()))
}

async fn vehicle_location(
    State(backend): State<Backend>,
    Path(id): Path<String>,
) -> ApiResult<VehicleView> {
    let response = backend.vehicle_location(id).await?;
    Ok(Json(VehicleView {
        id: response.vehicle_id,
        vehicle_type: None,
        latitude: response.latitude,
        longitude: response.longitude,
        next_stop: response.next_stop,
        eta_minutes: response.eta_minutes,
    }))
}

async fn update_vehicle_location(
    State(backend): State<Backend>,
    Path(id): Path<String>,
    Json(body): Json<LocationBody>,
) -> ApiResult<Ack> {
    let response = backend
        .update_vehicle_location(UpdateVehicleLocationRequest {
            vehicle_id: id,
            latitude: body.latitude,
            longitude: body.longitude,
            next_stop: body.next_stop,
            eta_minutes: body.eta_minutes,
        })
        .await?;
    Ok(Json(Ack {
        success: response.success,
        message: response.message,
    }))
}

fn light_view(light: proto::LightStatus) -> LightView {
    LightView {
        id: light.light_id,
        color: light.color,
        seconds_remaining: light.seconds_remaining,
    }
}

fn lot_view(lot: proto::ParkingLot) -> LotView {
    LotView {
        id: lot.lot_id,
        name: Some(lot.name),
        total_spaces: lot.total_spaces,
        available_spaces: lot.available_spaces,
    }
}

fn vehicle_view(vehicle: proto::Vehicle) -> VehicleView {
    VehicleView {
        id: vehicle.vehicle_id,
        vehicle_type: Some(vehicle.vehicle_type),
        latitude: vehicle.latitude,
        longitude: vehicle.longitude,
        next_stop: vehicle.next_stop,
        eta_minutes: vehicle.eta_minutes,
    }
}
