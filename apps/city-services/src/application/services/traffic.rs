//! Traffic light queries and control.

use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::traffic::{LightColor, LightStore, LightTiming, TrafficLight};
use crate::error::{CityError, require_id};

/// Handles the unary traffic-light calls.
#[derive(Debug, Clone)]
pub struct TrafficController {
    lights: Arc<LightStore>,
}

impl TrafficController {
    /// Create a controller over `lights`.
    #[must_use]
    pub const fn new(lights: Arc<LightStore>) -> Self {
        Self { lights }
    }

    /// Current state of one light.
    ///
    /// # Errors
    ///
    /// `MissingField` for a blank id, `LightNotFound` for an unknown one.
    pub fn light_status(&self, light_id: &str) -> Result<TrafficLight, CityError> {
        let light_id = require_id("light_id", light_id)?;
        self.lights.get(light_id)
    }

    /// Every light, ordered by id.
    #[must_use]
    pub fn list_lights(&self) -> Vec<TrafficLight> {
        self.lights.list()
    }

    /// Switch a light to `color`.
    ///
    /// The light is looked up before the color is checked, so an unknown
    /// light wins over an invalid color. A rejected color leaves the light
    /// untouched.
    ///
    /// # Errors
    ///
    /// `MissingField`, `LightNotFound` or `InvalidColor`.
    pub fn change_light(&self, light_id: &str, color: &str) -> Result<String, CityError> {
        let light_id = require_id("light_id", light_id)?;

        let color = self
            .lights
            .update(light_id, |light| -> Result<LightColor, CityError> {
                let color = color.parse::<LightColor>()?;
                light.color = color;
                Ok(color)
            })??;

        info!(light_id, %color, "Light changed");
        Ok(format!("Light changed to {color}"))
    }

    /// Acknowledge new phase durations for a light.
    ///
    /// The durations are accepted but not applied.
    ///
    /// # Errors
    ///
    /// `MissingField` or `LightNotFound`.
    pub fn change_timing(&self, light_id: &str, timing: LightTiming) -> Result<String, CityError> {
        let light_id = require_id("light_id", light_id)?;
        self.lights.get(light_id)?;

        debug!(
            light_id,
            red = timing.red_seconds,
            yellow = timing.yellow_seconds,
            green = timing.green_seconds,
            "Timing change acknowledged"
        );
        Ok(format!("Timing updated for light {light_id}"))
    }
}
