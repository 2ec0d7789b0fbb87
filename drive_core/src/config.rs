//! All tuning in one place.
//!
//! Every section has working defaults and `#[serde(default)]`, so a JSON
//! override only needs the fields it changes:
//!
//! ```json
//! { "gesture": { "hands_lost": "Brake" }, "world": { "max_obstacles": 8 } }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::gesture::GestureConfig;
use crate::progression::ProgressionConfig;
use crate::scheduler::SchedulerConfig;
use crate::vehicle::VehicleConfig;
use crate::world::WorldConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub gesture:     GestureConfig,
    pub vehicle:     VehicleConfig,
    pub world:       WorldConfig,
    pub progression: ProgressionConfig,
    pub scheduler:   SchedulerConfig,
}

impl Tuning {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.gesture.validate()?;
        self.vehicle.validate()?;
        self.world.validate()?;
        self.progression.validate()?;
        self.scheduler.validate()?;
        Ok(())
    }
}
