//! Dependency Injection Container
//!
//! Owns the seeded datasets and wires them into the handlers and gRPC
//! adapters. The service host and the integration tests build through here.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::CityConfig;
use super::settings::ServiceKind;
use crate::application::ports::TelemetrySampler;
use crate::application::services::{
    FlowMonitor, MonitorConfig, ParkingManager, TrafficController, TransportTracker,
};
use crate::domain::parking::{LotStore, sample_lots};
use crate::domain::traffic::{IntersectionStore, LightStore, sample_intersections, sample_lights};
use crate::domain::transport::{VehicleStore, sample_vehicles};
use crate::error::CityError;
use crate::infrastructure::grpc::{ParkingGrpcService, TrafficGrpcService, TransportGrpcService};
use crate::infrastructure::health::HealthServerState;

/// Wired datasets and handlers.
#[derive(Debug)]
pub struct Container {
    lights: Arc<LightStore>,
    intersections: Arc<IntersectionStore>,
    lots: Arc<LotStore>,
    vehicles: Arc<VehicleStore>,
    parking: Arc<ParkingManager>,
    monitor: FlowMonitor,
}

impl Container {
    /// Seed every dataset with the sample entities.
    ///
    /// Cancelling `shutdown` ends every traffic-flow subscription.
    ///
    /// # Errors
    ///
    /// Fails if the sample parking data is inconsistent.
    pub fn seeded(
        monitor_config: MonitorConfig,
        sampler: Arc<dyn TelemetrySampler>,
        shutdown: CancellationToken,
    ) -> Result<Self, CityError> {
        Ok(Self::new(
            LightStore::with_entities(sample_lights()),
            IntersectionStore::with_entities(sample_intersections()),
            LotStore::with_entities(sample_lots()?),
            VehicleStore::with_entities(sample_vehicles()),
            monitor_config,
            sampler,
            shutdown,
        ))
    }

    /// Wire explicit datasets.
    #[must_use]
    pub fn new(
        lights: LightStore,
        intersections: IntersectionStore,
        lots: LotStore,
        vehicles: VehicleStore,
        monitor_config: MonitorConfig,
        sampler: Arc<dyn TelemetrySampler>,
        shutdown: CancellationToken,
    ) -> Self {
        let intersections = Arc::new(intersections);
        let lots = Arc::new(lots);
        let monitor = FlowMonitor::new(
            Arc::clone(&intersections),
            sampler,
            monitor_config,
            shutdown,
        );

        Self {
            lights: Arc::new(lights),
            intersections,
            parking: Arc::new(ParkingManager::new(Arc::clone(&lots))),
            lots,
            vehicles: Arc::new(vehicles),
            monitor,
        }
    }

    /// Traffic lights.
    #[must_use]
    pub fn lights(&self) -> Arc<LightStore> {
        Arc::clone(&self.lights)
    }

    /// Monitored intersections.
    #[must_use]
    pub fn intersections(&self) -> Arc<IntersectionStore> {
        Arc::clone(&self.intersections)
    }

    /// Parking lots.
    #[must_use]
    pub fn lots(&self) -> Arc<LotStore> {
        Arc::clone(&self.lots)
    }

    /// Vehicles.
    #[must_use]
    pub fn vehicles(&self) -> Arc<VehicleStore> {
        Arc::clone(&self.vehicles)
    }

    /// The flow monitor shared by every traffic service instance.
    #[must_use]
    pub fn monitor(&self) -> FlowMonitor {
        self.monitor.clone()
    }

    /// Traffic gRPC adapter.
    #[must_use]
    pub fn traffic_service(&self) -> TrafficGrpcService {
        TrafficGrpcService::new(TrafficController::new(self.lights()), self.monitor())
    }

    /// Parking gRPC adapter.
    #[must_use]
    pub fn parking_service(&self) -> ParkingGrpcService {
        ParkingGrpcService::new(Arc::clone(&self.parking))
    }

    /// Transport gRPC adapter.
    #[must_use]
    pub fn transport_service(&self) -> TransportGrpcService {
        TransportGrpcService::new(TransportTracker::new(self.vehicles()))
    }

    /// Health state reporting the datasets of the services `config` hosts.
    #[must_use]
    pub fn health_state(
        &self,
        version: &str,
        config: &CityConfig,
        shutdown: CancellationToken,
    ) -> HealthServerState {
        let mut state = HealthServerState::new(version, shutdown);
        for service in &config.services {
            state = match service {
                ServiceKind::Traffic => {
                    state.with_traffic(self.lights(), self.intersections(), self.monitor())
                }
                ServiceKind::Parking => state.with_parking(self.lots()),
                ServiceKind::Transport => state.with_transport(self.vehicles()),
            };
        }
        state
    }
}
