//! Unary Call Integration Tests
//!
//! Exercises the traffic, parking and transport calls over the wire,
//! including the status codes clients see for rejected requests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use city_services::proto::{
    ChangeLightRequest, ChangeLightTimingRequest, GetAvailableSpacesRequest,
    GetLightStatusRequest, GetVehicleLocationRequest, ListLightsRequest, ListLotsRequest,
    ListVehiclesRequest, ReserveSpaceRequest, UpdateVehicleLocationRequest,
};
use common::TestHost;
use tonic::{Code, Request};

// =============================================================================
// Traffic Lights
// =============================================================================

#[tokio::test]
async fn test_light_status_and_listing() {
    let host = TestHost::start().await;
    let mut client = host.traffic().await;

    let status = client
        .get_light_status(Request::new(GetLightStatusRequest {
            light_id: "light-002".to_string(),
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(status.light_id, "light-002");
    assert_eq!(status.color, "green");
    assert_eq!(status.seconds_remaining, 45);

    let lights = client
        .list_lights(Request::new(ListLightsRequest {}))
        .await
        .unwrap()
        .into_inner()
        .lights;
    let ids: Vec<&str> = lights.iter().map(|l| l.light_id.as_str()).collect();
    assert_eq!(ids, ["light-001", "light-002", "light-003"]);

    host.stop().await;
}

#[tokio::test]
async fn test_change_light_then_read_back() {
    let host = TestHost::start().await;
    let mut client = host.traffic().await;

    let response = client
        .change_light(Request::new(ChangeLightRequest {
            light_id: "light-001".to_string(),
            color: "green".to_string(),
        }))
        .await
        .unwrap()
        .into_inner();
    assert!(response.success);
    assert_eq!(response.message, "Light changed to green");

    let status = client
        .get_light_status(Request::new(GetLightStatusRequest {
            light_id: "light-001".to_string(),
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(status.color, "green");

    host.stop().await;
}

#[tokio::test]
async fn test_invalid_color_leaves_light_unchanged() {
    let host = TestHost::start().await;
    let mut client = host.traffic().await;

    let status = client
        .change_light(Request::new(ChangeLightRequest {
            light_id: "light-001".to_string(),
            color: "purple".to_string(),
        }))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);

    let light = host.container.lights().get("light-001").unwrap();
    assert_eq!(light.color.as_str(), "red");

    host.stop().await;
}

#[tokio::test]
async fn test_unknown_light_is_not_found() {
    let host = TestHost::start().await;
    let mut client = host.traffic().await;

    let status = client
        .get_light_status(Request::new(GetLightStatusRequest {
            light_id: "light-404".to_string(),
        }))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::NotFound);
    assert_eq!(status.message(), "Traffic light not found");

    host.stop().await;
}

#[tokio::test]
async fn test_timing_is_acknowledged() {
    let host = TestHost::start().await;
    let mut client = host.traffic().await;

    let response = client
        .change_light_timing(Request::new(ChangeLightTimingRequest {
            light_id: "light-003".to_string(),
            red_seconds: 40,
            yellow_seconds: 4,
            green_seconds: 30,
        }))
        .await
        .unwrap()
        .into_inner();
    assert!(response.success);
    assert_eq!(response.message, "Timing updated for light light-003");

    host.stop().await;
}

// =============================================================================
// Parking
// =============================================================================

#[tokio::test]
async fn test_reservation_takes_one_space() {
    let host = TestHost::start().await;
    let mut client = host.parking().await;

    let response = client
        .reserve_space(Request::new(ReserveSpaceRequest {
            lot_id: "lot-001".to_string(),
            vehicle_id: "car-1".to_string(),
        }))
        .await
        .unwrap()
        .into_inner();
    assert!(response.success);
    assert!(response.reservation_id.starts_with("res-"));

    let lot = client
        .get_available_spaces(Request::new(GetAvailableSpacesRequest {
            lot_id: "lot-001".to_string(),
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(lot.total_spaces, 100);
    assert_eq!(lot.available_spaces, 44);

    host.stop().await;
}

#[tokio::test]
async fn test_unknown_lot_is_not_found() {
    let host = TestHost::start().await;
    let mut client = host.parking().await;

    let status = client
        .reserve_space(Request::new(ReserveSpaceRequest {
            lot_id: "lot-999".to_string(),
            vehicle_id: "car-1".to_string(),
        }))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::NotFound);

    host.stop().await;
}

#[tokio::test]
async fn test_concurrent_reservations_never_oversell() {
    let host = TestHost::start().await;
    let available = host
        .container
        .lots()
        .get("lot-001")
        .unwrap()
        .available_spaces;
    let attempts = available + 15;

    let mut handles = Vec::new();
    for i in 0..attempts {
        let mut client = host.parking().await;
        handles.push(tokio::spawn(async move {
            client
                .reserve_space(Request::new(ReserveSpaceRequest {
                    lot_id: "lot-001".to_string(),
                    vehicle_id: format!("car-{i}"),
                }))
                .await
                .unwrap()
                .into_inner()
        }));
    }

    let mut reserved = 0;
    let mut refused = 0;
    for handle in handles {
        let response = handle.await.unwrap();
        if response.success {
            reserved += 1;
        } else {
            assert!(response.reservation_id.is_empty());
            refused += 1;
        }
    }

    assert_eq!(reserved, available);
    assert_eq!(refused, 15);
    assert_eq!(
        host.container.lots().get("lot-001").unwrap().available_spaces,
        0
    );

    // A full lot is a business outcome, not an error.
    let mut client = host.parking().await;
    let response = client
        .reserve_space(Request::new(ReserveSpaceRequest {
            lot_id: "lot-001".to_string(),
            vehicle_id: "late".to_string(),
        }))
        .await
        .unwrap()
        .into_inner();
    assert!(!response.success);

    host.stop().await;
}

#[tokio::test]
async fn test_list_lots() {
    let host = TestHost::start().await;
    let mut client = host.parking().await;

    let lots = client
        .list_lots(Request::new(ListLotsRequest {}))
        .await
        .unwrap()
        .into_inner()
        .lots;
    assert_eq!(lots.len(), 2);
    assert_eq!(lots[0].name, "Downtown Parking");

    host.stop().await;
}

// =============================================================================
// Transport
// =============================================================================

#[tokio::test]
async fn test_update_registers_unknown_vehicle() {
    let host = TestHost::start().await;
    let mut client = host.transport().await;

    let response = client
        .update_vehicle_location(Request::new(UpdateVehicleLocationRequest {
            vehicle_id: "tram-7".to_string(),
            latitude: 47.61,
            longitude: -122.33,
            next_stop: "Pioneer Square".to_string(),
            eta_minutes: 3,
        }))
        .await
        .unwrap()
        .into_inner();
    assert!(response.success);

    let location = client
        .get_vehicle_location(Request::new(GetVehicleLocationRequest {
            vehicle_id: "tram-7".to_string(),
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(location.next_stop, "Pioneer Square");
    assert_eq!(location.eta_minutes, 3);

    let vehicles = client
        .list_vehicles(Request::new(ListVehiclesRequest {}))
        .await
        .unwrap()
        .into_inner()
        .vehicles;
    let tram = vehicles.iter().find(|v| v.vehicle_id == "tram-7").unwrap();
    assert_eq!(tram.vehicle_type, "unknown");

    host.stop().await;
}

#[tokio::test]
async fn test_update_keeps_vehicle_type() {
    let host = TestHost::start().await;
    let mut client = host.transport().await;

    client
        .update_vehicle_location(Request::new(UpdateVehicleLocationRequest {
            vehicle_id: "bus-001".to_string(),
            latitude: 47.6,
            longitude: -122.3,
            next_stop: "Harbor".to_string(),
            eta_minutes: 2,
        }))
        .await
        .unwrap();

    let bus = host.container.vehicles().get("bus-001").unwrap();
    assert_eq!(bus.vehicle_type, "bus");
    assert_eq!(bus.next_stop, "Harbor");

    host.stop().await;
}

#[tokio::test]
async fn test_blank_vehicle_id_is_invalid() {
    let host = TestHost::start().await;
    let mut client = host.transport().await;

    let status = client
        .get_vehicle_location(Request::new(GetVehicleLocationRequest {
            vehicle_id: String::new(),
        }))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);

    host.stop().await;
}
