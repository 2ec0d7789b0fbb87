//! Gesture interpretation — hand landmarks to steering and throttle.
//!
//! ## Modes
//!
//! | Hands | Mode | Steering | Throttle |
//! |---|---|---|---|
//! | 0 | — | decays toward centre | [`HandsLostPolicy`] |
//! | 1 | joystick | wrist → middle-knuckle horizontal offset | fist openness with hysteresis |
//! | 2 | wheel | angle of the line between the hands | [`TwoHandBrakePolicy`] |
//!
//! Every reading goes through the same post-processing: clamp, a signed
//! power curve (fine control near centre, strong response at the ends) and
//! an exponential moving average into the shared [`ControlSignal`].

use log::trace;
use serde::{Deserialize, Serialize};

use crate::control::{ControlSignal, DriveState};
use crate::error::ConfigError;
use crate::landmarks::{HandObservation, Landmark, FINGERTIPS, LANDMARK_COUNT, MIDDLE_KNUCKLE, WRIST};

// ════════════════════════════════════════════════════════════════════════════
// Policies
// ════════════════════════════════════════════════════════════════════════════

/// What the car does when no valid hand is in view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HandsLostPolicy {
    /// Coast.
    #[default]
    Neutral,
    /// Brake until a hand comes back.
    Brake,
}

/// Whether the two-hand wheel grip has a brake gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TwoHandBrakePolicy {
    /// Holding the wheel always means gas.
    #[default]
    AlwaysGas,
    /// Closing both fists brakes; anything else is gas.
    BothFists,
}

// ════════════════════════════════════════════════════════════════════════════
// GestureConfig
// ════════════════════════════════════════════════════════════════════════════

/// Thresholds and gains, empirically tuned for normalised image coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// One-hand |dx| below this steers exactly straight.
    pub dead_zone: f32,
    /// One-hand gain applied to the wrist→knuckle offset.
    pub joystick_gain: f32,
    /// Two-hand gain applied to the hand-line angle (radians).
    pub wheel_gain: f32,
    /// Mean wrist→fingertip distance below which the hand is a fist.
    pub fist_closed: f32,
    /// Mean wrist→fingertip distance above which the hand is open.
    pub fist_open: f32,
    /// Extra margin a held state keeps before it is released.
    pub fist_hysteresis: f32,
    /// Exponent of the signed response curve.
    pub response_exponent: f32,
    /// Weight of the previous target in the moving average.
    pub smoothing_keep: f32,
    pub hands_lost: HandsLostPolicy,
    pub two_hand_brake: TwoHandBrakePolicy,
}

impl Default for GestureConfig {
    fn default() -> Self {
        GestureConfig {
            dead_zone:         0.03,
            joystick_gain:     7.5,
            wheel_gain:        2.0,
            fist_closed:       0.11,
            fist_open:         0.16,
            fist_hysteresis:   0.01,
            response_exponent: 1.5,
            smoothing_keep:    0.7,
            hands_lost:        HandsLostPolicy::Neutral,
            two_hand_brake:    TwoHandBrakePolicy::AlwaysGas,
        }
    }
}

impl GestureConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fist_closed + self.fist_hysteresis >= self.fist_open - self.fist_hysteresis {
            return Err(ConfigError::InvertedThresholds {
                name: "fist openness",
                closed: self.fist_closed,
                open: self.fist_open,
            });
        }
        if self.joystick_gain <= 0.0 { return Err(ConfigError::NotPositive("joystick_gain")); }
        if self.wheel_gain <= 0.0    { return Err(ConfigError::NotPositive("wheel_gain")); }
        if self.response_exponent <= 0.0 {
            return Err(ConfigError::NotPositive("response_exponent"));
        }
        if !(0.0..=1.0).contains(&self.smoothing_keep) {
            return Err(ConfigError::OutOfUnitRange("smoothing_keep"));
        }
        Ok(())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// GestureReading
// ════════════════════════════════════════════════════════════════════════════

/// Raw interpretation of one poll, before smoothing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureReading {
    /// Steering after clamp and response curve, before the moving average.
    pub steer: f32,
    pub drive_state: DriveState,
    pub two_hand_mode: bool,
    pub wheel_angle_deg: f32,
    /// Number of valid hands that produced this reading.
    pub hands: usize,
}

// ════════════════════════════════════════════════════════════════════════════
// GestureInterpreter
// ════════════════════════════════════════════════════════════════════════════

/// Owns the [`ControlSignal`] and is the only thing that writes to it.
#[derive(Debug, Clone)]
pub struct GestureInterpreter {
    cfg:    GestureConfig,
    signal: ControlSignal,
    /// Last one-hand fist classification; the hysteresis band needs it.
    fist:   DriveState,
}

impl GestureInterpreter {
    pub fn new(cfg: GestureConfig) -> Self {
        GestureInterpreter { cfg, signal: ControlSignal::default(), fist: DriveState::Neutral }
    }

    pub fn signal(&self) -> &ControlSignal { &self.signal }
    pub fn config(&self) -> &GestureConfig { &self.cfg }

    /// Forget everything; used at race (re)start.
    pub fn reset(&mut self) {
        self.signal = ControlSignal::default();
        self.fist = DriveState::Neutral;
    }

    /// Interpret one poll's worth of hands and blend it into the signal.
    ///
    /// Malformed observations are dropped before counting, so a poll that
    /// only carried truncated skeletons reads as "no hands".
    pub fn apply(&mut self, hands: &[HandObservation]) -> GestureReading {
        let mut valid = hands.iter().filter_map(HandObservation::joints);
        let first  = valid.next();
        let second = valid.next();

        let reading = match (first, second) {
            (None, _)          => self.read_no_hands(),
            (Some(h), None)    => self.read_joystick(h),
            (Some(a), Some(b)) => self.read_wheel(a, b),
        };

        let keep = self.cfg.smoothing_keep;
        let blended = self.signal.target_steer() * keep + reading.steer * (1.0 - keep);
        self.signal.set_target_steer(blended);
        self.signal.drive_state = reading.drive_state;
        self.signal.two_hand_mode = reading.two_hand_mode;
        self.signal.virtual_wheel_angle = reading.wheel_angle_deg;

        trace!(
            "gesture: hands={} raw={:.3} target={:.3} drive={}",
            reading.hands, reading.steer, self.signal.target_steer(), reading.drive_state.label()
        );
        reading
    }

    // ── zero hands ────────────────────────────────────────────────────────

    fn read_no_hands(&mut self) -> GestureReading {
        self.fist = DriveState::Neutral;
        let drive_state = match self.cfg.hands_lost {
            HandsLostPolicy::Neutral => DriveState::Neutral,
            HandsLostPolicy::Brake   => DriveState::Brake,
        };
        // A zero raw steer makes the moving average decay toward centre.
        GestureReading { steer: 0.0, drive_state, two_hand_mode: false, wheel_angle_deg: 0.0, hands: 0 }
    }

    // ── one hand: joystick ────────────────────────────────────────────────

    fn read_joystick(&mut self, hand: &[Landmark; LANDMARK_COUNT]) -> GestureReading {
        let dx = hand[MIDDLE_KNUCKLE].x - hand[WRIST].x;
        let raw = if dx.abs() < self.cfg.dead_zone { 0.0 } else { dx * -self.cfg.joystick_gain };

        self.fist = self.classify_fist(openness(hand));
        GestureReading {
            steer: self.shape(raw),
            drive_state: self.fist,
            two_hand_mode: false,
            wheel_angle_deg: 0.0,
            hands: 1,
        }
    }

    /// Three-way classification with a held-state margin on both edges, so
    /// noise around either threshold cannot toggle the state every sample.
    fn classify_fist(&self, open: f32) -> DriveState {
        let closed = self.cfg.fist_closed;
        let opened = self.cfg.fist_open;
        let margin = self.cfg.fist_hysteresis;
        match self.fist {
            DriveState::Brake if open <= closed + margin => DriveState::Brake,
            DriveState::Gas   if open >= opened - margin => DriveState::Gas,
            _ if open < closed => DriveState::Brake,
            _ if open > opened => DriveState::Gas,
            _ => DriveState::Neutral,
        }
    }

    // ── two hands: wheel ──────────────────────────────────────────────────

    fn read_wheel(
        &mut self,
        a: &[Landmark; LANDMARK_COUNT],
        b: &[Landmark; LANDMARK_COUNT],
    ) -> GestureReading {
        // Detection slots say nothing about handedness; screen position does.
        let (left, right) = if a[MIDDLE_KNUCKLE].x <= b[MIDDLE_KNUCKLE].x { (a, b) } else { (b, a) };
        let l = left[MIDDLE_KNUCKLE];
        let r = right[MIDDLE_KNUCKLE];
        let angle = (r.y - l.y).atan2(r.x - l.x);

        let drive_state = match self.cfg.two_hand_brake {
            TwoHandBrakePolicy::AlwaysGas => DriveState::Gas,
            TwoHandBrakePolicy::BothFists => {
                if openness(left) < self.cfg.fist_closed && openness(right) < self.cfg.fist_closed {
                    DriveState::Brake
                } else {
                    DriveState::Gas
                }
            }
        };
        self.fist = DriveState::Neutral;

        GestureReading {
            steer: self.shape(angle * -self.cfg.wheel_gain),
            drive_state,
            two_hand_mode: true,
            wheel_angle_deg: angle.to_degrees(),
            hands: 2,
        }
    }

    // ── post-processing ───────────────────────────────────────────────────

    fn shape(&self, raw: f32) -> f32 {
        let s = if raw.is_finite() { raw.clamp(-1.0, 1.0) } else { 0.0 };
        if s == 0.0 { return 0.0; }
        s.signum() * s.abs().powf(self.cfg.response_exponent)
    }
}

/// Mean wrist distance of the four non-thumb fingertips.
pub fn openness(hand: &[Landmark; LANDMARK_COUNT]) -> f32 {
    let wrist = hand[WRIST];
    FINGERTIPS.iter().map(|&i| wrist.distance(&hand[i])).sum::<f32>() / FINGERTIPS.len() as f32
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
