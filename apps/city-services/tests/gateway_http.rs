//! Gateway Integration Tests
//!
//! Runs the JSON gateway against real gRPC services.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use city_services::infrastructure::gateway::router;
use city_services::{GatewaySettings, GrpcCityBackend};
use common::TestHost;
use serde_json::{Value, json};
use tower::ServiceExt;

fn gateway(host: &TestHost) -> axum::Router {
    let endpoint = host.endpoint();
    let settings = GatewaySettings {
        http_port: 0,
        traffic_endpoint: endpoint.clone(),
        parking_endpoint: endpoint.clone(),
        transport_endpoint: endpoint,
    };
    router(Arc::new(GrpcCityBackend::connect_lazy(&settings).unwrap()))
}

async fn send(
    app: axum::Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_reserve_then_query_lot() {
    let host = TestHost::start().await;
    let app = gateway(&host);

    let (status, body) = send(
        app.clone(),
        Method::POST,
        "/api/parking/lots/lot-002/reserve",
        Some(json!({"vehicleId": "car-42"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["reservationId"].as_str().unwrap().starts_with("res-"));

    let (status, body) = send(app, Method::GET, "/api/parking/lots/lot-002", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"id": "lot-002", "totalSpaces": 200, "availableSpaces": 119})
    );

    host.stop().await;
}

#[tokio::test]
async fn test_not_found_becomes_500_with_message() {
    let host = TestHost::start().await;

    let (status, body) = send(
        gateway(&host),
        Method::GET,
        "/api/transport/vehicles/bus-404",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        json!({"success": false, "message": "Vehicle not found"})
    );

    host.stop().await;
}

#[tokio::test]
async fn test_change_light_round_trip() {
    let host = TestHost::start().await;
    let app = gateway(&host);

    let (status, body) = send(
        app.clone(),
        Method::POST,
        "/api/traffic/lights/light-003/change",
        Some(json!({"color": "red"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Light changed to red");

    let (_, body) = send(app, Method::GET, "/api/traffic/lights", None).await;
    let light = body
        .as_array()
        .unwrap()
        .iter()
        .find(|l| l["id"] == "light-003")
        .unwrap();
    assert_eq!(light["color"], "red");

    host.stop().await;
}

#[tokio::test]
async fn test_vehicle_listing_uses_camel_case() {
    let host = TestHost::start().await;

    let (status, body) = send(
        gateway(&host),
        Method::GET,
        "/api/transport/vehicles",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let first = &body[0];
    assert_eq!(first["id"], "bus-001");
    assert_eq!(first["type"], "bus");
    assert_eq!(first["nextStop"], "Downtown Station");
    assert_eq!(first["etaMinutes"], 5);

    host.stop().await;
}
