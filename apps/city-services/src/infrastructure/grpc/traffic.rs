//! `TrafficLightService` over gRPC.

use std::pin::Pin;
use std::time::Instant;

use tokio_stream::{Stream, StreamExt};
use tonic::{Request, Status};

use super::proto::smartcity::v1::{
    ChangeLightRequest, ChangeLightResponse, ChangeLightTimingRequest, ChangeLightTimingResponse,
    GetLightStatusRequest, GetLightStatusResponse, LightStatus, ListLightsRequest,
    ListLightsResponse, MonitorTrafficFlowRequest, TrafficFlowUpdate,
    traffic_light_service_server::{TrafficLightService, TrafficLightServiceServer},
};
use super::{UnaryResult, datetime_to_timestamp, guarded, respond};
use crate::application::services::{FlowMonitor, TrafficController};
use crate::domain::traffic::{LightTiming, TrafficLight, TrafficUpdate};
use crate::infrastructure::metrics::Service;

type BoxedStream<T> = Pin<Box<dyn Stream<Item = Result<T, Status>> + Send>>;

/// gRPC front of the traffic light handlers and the flow monitor.
#[derive(Debug, Clone)]
pub struct TrafficGrpcService {
    controller: TrafficController,
    monitor: FlowMonitor,
}

impl TrafficGrpcService {
    /// Create the service.
    #[must_use]
    pub const fn new(controller: TrafficController, monitor: FlowMonitor) -> Self {
        Self {
            controller,
            monitor,
        }
    }

    /// Wrap in the generated tonic server.
    #[must_use]
    pub fn into_server(self) -> TrafficLightServiceServer<Self> {
        TrafficLightServiceServer::new(self)
    }
}

#[tonic::async_trait]
impl TrafficLightService for TrafficGrpcService {
    type MonitorTrafficFlowStream = BoxedStream<TrafficFlowUpdate>;

    async fn get_light_status(
        &self,
        request: Request<GetLightStatusRequest>,
    ) -> UnaryResult<GetLightStatusResponse> {
        let started = Instant::now();
        let req = request.into_inner();

        let result = guarded("GetLightStatus", || {
            self.controller
                .light_status(&req.light_id)
                .map(|light| GetLightStatusResponse {
                    light_id: light.id,
                    color: light.color.as_str().to_string(),
                    seconds_remaining: light.seconds_remaining,
                })
        });

        respond(Service::Traffic, "GetLightStatus", started, result)
    }

    async fn list_lights(
        &self,
        _request: Request<ListLightsRequest>,
    ) -> UnaryResult<ListLightsResponse> {
        let started = Instant::now();
        let result = guarded("ListLights", || {
            let lights = self
                .controller
                .list_lights()
                .into_iter()
                .map(light_to_proto)
                .collect();
            Ok(ListLightsResponse { lights })
        });

        respond(Service::Traffic, "ListLights", started, result)
    }

    async fn change_light(
        &self,
        request: Request<ChangeLightRequest>,
    ) -> UnaryResult<ChangeLightResponse> {
        let started = Instant::now();
        let req = request.into_inner();

        let result = guarded("ChangeLight", || {
            self.controller
                .change_light(&req.light_id, &req.color)
                .map(|message| ChangeLightResponse {
                    success: true,
                    message,
                })
        });

        respond(Service::Traffic, "ChangeLight", started, result)
    }

    async fn change_light_timing(
        &self,
        request: Request<ChangeLightTimingRequest>,
    ) -> UnaryResult<ChangeLightTimingResponse> {
        let started = Instant::now();
        let req = request.into_inner();
        let timing = LightTiming {
            red_seconds: req.red_seconds,
            yellow_seconds: req.yellow_seconds,
            green_seconds: req.green_seconds,
        };

        let result = guarded("ChangeLightTiming", || {
            self.controller
                .change_timing(&req.light_id, timing)
                .map(|message| ChangeLightTimingResponse {
                    success: true,
                    message,
                })
        });

        respond(Service::Traffic, "ChangeLightTiming", started, result)
    }

    async fn monitor_traffic_flow(
        &self,
        request: Request<MonitorTrafficFlowRequest>,
    ) -> UnaryResult<Self::MonitorTrafficFlowStream> {
        let started = Instant::now();
        let req = request.into_inner();

        let result = guarded("MonitorTrafficFlow", || {
            self.monitor.subscribe(&req.intersection_id).map(|updates| {
                let stream = updates.map(|item| item.map(update_to_proto).map_err(Status::from));
                Box::pin(stream) as Self::MonitorTrafficFlowStream
            })
        });

        respond(Service::Traffic, "MonitorTrafficFlow", started, result)
    }
}

fn light_to_proto(light: TrafficLight) -> LightStatus {
    LightStatus {
        light_id: light.id,
        color: light.color.as_str().to_string(),
        seconds_remaining: light.seconds_remaining,
    }
}

fn update_to_proto(update: TrafficUpdate) -> TrafficFlowUpdate {
    TrafficFlowUpdate {
        intersection_id: update.intersection_id,
        vehicle_count: update.vehicle_count,
        congestion_level: update.congestion_level,
        timestamp: Some(datetime_to_timestamp(update.timestamp)),
        sequence: update.sequence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn update_conversion_keeps_fields() {
        let now = Utc::now();
        let proto = update_to_proto(TrafficUpdate {
            intersection_id: "int-001".to_string(),
            vehicle_count: 9,
            congestion_level: 0.5,
            timestamp: now,
            sequence: 4,
        });

        assert_eq!(proto.intersection_id, "int-001");
        assert_eq!(proto.vehicle_count, 9);
        assert_eq!(proto.sequence, 4);
        assert_eq!(proto.timestamp.unwrap().seconds, now.timestamp());
    }
}
