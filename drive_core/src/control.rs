//! The control signal shared between the gesture interpreter (sole writer)
//! and the vehicle model (reader).

use serde::{Deserialize, Serialize};

/// Discrete throttle classification derived from a gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DriveState {
    Gas,
    Brake,
    #[default]
    Neutral,
}

impl DriveState {
    pub fn label(&self) -> &'static str {
        match self {
            DriveState::Gas     => "GAS",
            DriveState::Brake   => "BRAKE",
            DriveState::Neutral => "NEUTRAL",
        }
    }
}

/// Latest steering / throttle command.
///
/// `target_steer` is always within [-1, 1]; the setter enforces it so no
/// caller can store an out-of-range value.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControlSignal {
    target_steer: f32,
    pub drive_state: DriveState,
    pub two_hand_mode: bool,
    /// Angle between the two hands in degrees, for the wheel overlay only.
    pub virtual_wheel_angle: f32,
}

impl ControlSignal {
    pub fn target_steer(&self) -> f32 { self.target_steer }

    pub fn set_target_steer(&mut self, steer: f32) {
        self.target_steer = if steer.is_finite() { steer.clamp(-1.0, 1.0) } else { 0.0 };
    }
}
