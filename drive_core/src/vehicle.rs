//! Vehicle dynamics — speed, lateral position, drift and visual attitude.
//!
//! An arcade model, not a tyre model: a state machine over [`DriveState`]
//! drives a variable-step integrator.  Speeds are metres per second, lateral
//! position is metres from the track centre line.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::cars::CarSpec;
use crate::control::{ControlSignal, DriveState};
use crate::error::ConfigError;

// ════════════════════════════════════════════════════════════════════════════
// Gear table
// ════════════════════════════════════════════════════════════════════════════

/// One gear: used up to `top_kph`, pulling with `accel` m/s².
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GearBand {
    pub top_kph: f32,
    pub accel:   f32,
}

/// Torque-curve approximation: soft off the line, strongest in the middle
/// gears, fading toward the top.
pub const GEARS: [GearBand; 6] = [
    GearBand { top_kph: 35.0,          accel: 6.0  },
    GearBand { top_kph: 70.0,          accel: 9.0  },
    GearBand { top_kph: 110.0,         accel: 10.0 },
    GearBand { top_kph: 150.0,         accel: 8.0  },
    GearBand { top_kph: 190.0,         accel: 5.5  },
    GearBand { top_kph: f32::INFINITY, accel: 3.5  },
];

pub const KPH_PER_MPS: f32 = 3.6;

fn band_index(kph: f32) -> usize {
    GEARS.iter().position(|g| kph < g.top_kph).unwrap_or(GEARS.len() - 1)
}

/// Gear number 1..=6 for a road speed.
pub fn gear_for_kph(kph: f32) -> u8 { band_index(kph) as u8 + 1 }

/// Acceleration (m/s²) available at a road speed.
pub fn accel_rate(kph: f32) -> f32 { GEARS[band_index(kph)].accel }

// ════════════════════════════════════════════════════════════════════════════
// VehicleConfig
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleConfig {
    /// Top speed of a 1.0× car at difficulty 1 (m/s).
    pub base_max_speed: f32,
    pub brake_rate: f32,
    pub coast_drag: f32,
    /// Fraction of the steer error closed each tick.
    pub steer_lerp: f32,
    /// Lateral speed at full lock and full steering effectiveness (m/s).
    pub lateral_rate: f32,
    /// Speed at which steering reaches full effectiveness.
    pub full_steer_speed: f32,
    pub min_steer_factor: f32,
    pub track_half_width: f32,
    pub barrier_margin: f32,
    /// Health lost per second of barrier contact.
    pub barrier_drain: f32,
    /// Fraction of speed lost per second of barrier contact.
    pub barrier_drag: f32,
    /// Amplitude of the visual shake while scraping.
    pub barrier_jitter: f32,
    pub roll_gain: f32,
    pub yaw_gain: f32,
    pub drift_yaw_gain: f32,
    pub slip_lerp: f32,
    pub drift_threshold: f32,
    pub drift_min_speed_ratio: f32,
    /// Speed kept after a non-fatal crash.
    pub crash_speed_keep: f32,
    /// How long the critical advisory shows after a crash (s).
    pub critical_time: f32,
    /// Health at or below which the car is permanently critical.
    pub critical_health: f32,
    /// Top-speed bonus per difficulty level above 1.
    pub bonus_per_level: f32,
    pub max_difficulty_bonus: f32,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        VehicleConfig {
            base_max_speed:        55.0,
            brake_rate:            30.0,
            coast_drag:            3.0,
            steer_lerp:            0.15,
            lateral_rate:          14.0,
            full_steer_speed:      20.0,
            min_steer_factor:      0.5,
            track_half_width:      7.0,
            barrier_margin:        0.8,
            barrier_drain:         20.0,
            barrier_drag:          1.5,
            barrier_jitter:        0.15,
            roll_gain:             0.12,
            yaw_gain:              0.25,
            drift_yaw_gain:        0.35,
            slip_lerp:             0.1,
            drift_threshold:       0.2,
            drift_min_speed_ratio: 0.5,
            crash_speed_keep:      0.3,
            critical_time:         1.5,
            critical_health:       25.0,
            bonus_per_level:       0.04,
            max_difficulty_bonus:  0.4,
        }
    }
}

impl VehicleConfig {
    /// Outermost lateral position before the barrier.
    pub fn lateral_limit(&self) -> f32 { self.track_half_width - self.barrier_margin }

    pub fn difficulty_bonus(&self, level: u32) -> f32 {
        (level.saturating_sub(1) as f32 * self.bonus_per_level).min(self.max_difficulty_bonus)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_max_speed <= 0.0 { return Err(ConfigError::NotPositive("base_max_speed")); }
        if self.brake_rate <= 0.0     { return Err(ConfigError::NotPositive("brake_rate")); }
        if self.lateral_limit() <= 0.0 {
            return Err(ConfigError::NotPositive("track_half_width - barrier_margin"));
        }
        for (name, v) in [
            ("steer_lerp", self.steer_lerp),
            ("crash_speed_keep", self.crash_speed_keep),
            ("min_steer_factor", self.min_steer_factor),
        ] {
            if !(0.0..=1.0).contains(&v) { return Err(ConfigError::OutOfUnitRange(name)); }
        }
        Ok(())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// VehicleState
// ════════════════════════════════════════════════════════════════════════════

/// Snapshot of the car, read by everything, written only by [`Vehicle`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleState {
    pub speed:          f32,
    pub lateral_x:      f32,
    pub current_steer:  f32,
    pub health:         f32,
    /// Low-passed drift term; sign follows the steer error.
    pub slip:           f32,
    pub roll:           f32,
    pub yaw:            f32,
    /// Presentational shake added to `lateral_x` while scraping.
    pub jitter:         f32,
    pub against_barrier: bool,
    /// Seconds of critical advisory left after a crash.
    pub critical_timer: f32,
}

impl Default for VehicleState {
    fn default() -> Self {
        VehicleState {
            speed: 0.0,
            lateral_x: 0.0,
            current_steer: 0.0,
            health: 100.0,
            slip: 0.0,
            roll: 0.0,
            yaw: 0.0,
            jitter: 0.0,
            against_barrier: false,
            critical_timer: 0.0,
        }
    }
}

impl VehicleState {
    pub fn kph(&self) -> f32 { self.speed * KPH_PER_MPS }
    pub fn gear(&self) -> u8 { gear_for_kph(self.kph()) }
}

/// Result of a crash.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CrashOutcome {
    Survived { health: f32 },
    Fatal,
}

/// What happened during one integration step.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VehicleTick {
    /// Scraping along the barrier this step.
    pub barrier: bool,
    /// Barrier contact drained the last of the health.
    pub fatal: bool,
    pub gear_changed: bool,
}

// ════════════════════════════════════════════════════════════════════════════
// Vehicle
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct Vehicle {
    cfg:   VehicleConfig,
    car:   CarSpec,
    state: VehicleState,
    /// Accumulated scrape time, drives the jitter phase.
    scrape_clock: f32,
}

impl Vehicle {
    pub fn new(cfg: VehicleConfig, car: CarSpec) -> Self {
        Vehicle { cfg, car, state: VehicleState::default(), scrape_clock: 0.0 }
    }

    /// Rolling start at `speed`.
    pub fn with_speed(mut self, speed: f32) -> Self {
        self.state.speed = speed.max(0.0);
        self
    }

    pub fn state(&self) -> &VehicleState { &self.state }
    pub fn car(&self) -> &CarSpec { &self.car }
    pub fn config(&self) -> &VehicleConfig { &self.cfg }

    pub fn reset(&mut self, car: CarSpec) {
        self.car = car;
        self.state = VehicleState::default();
        self.scrape_clock = 0.0;
    }

    pub fn max_speed(&self, level: u32) -> f32 {
        self.cfg.base_max_speed * self.car.speed_multiplier * (1.0 + self.cfg.difficulty_bonus(level))
    }

    pub fn is_critical(&self) -> bool {
        self.state.critical_timer > 0.0 || self.state.health <= self.cfg.critical_health
    }

    pub fn is_drifting(&self, level: u32) -> bool {
        self.state.slip.abs() > self.cfg.drift_threshold
            && self.state.speed / self.max_speed(level) > self.cfg.drift_min_speed_ratio
    }

    /// Advance one simulation step of `dt` seconds.
    pub fn step(&mut self, signal: &ControlSignal, level: u32, dt: f32) -> VehicleTick {
        let cfg = &self.cfg;
        let s = &mut self.state;
        let max_speed = cfg.base_max_speed
            * self.car.speed_multiplier
            * (1.0 + cfg.difficulty_bonus(level));
        let gear_before = s.gear();

        // ── throttle ──────────────────────────────────────────────────────
        match signal.drive_state {
            DriveState::Gas => {
                s.speed = (s.speed + accel_rate(s.kph()) * dt).min(max_speed);
            }
            DriveState::Brake => {
                s.speed = (s.speed - cfg.brake_rate * dt).max(0.0);
            }
            DriveState::Neutral => {
                s.speed = (s.speed - cfg.coast_drag * dt).max(0.0);
            }
        }
        // a car swap or level reset can leave us above the cap
        s.speed = s.speed.min(max_speed);

        // ── steering ──────────────────────────────────────────────────────
        let target = signal.target_steer();
        s.current_steer += (target - s.current_steer) * cfg.steer_lerp;
        s.current_steer = s.current_steer.clamp(-1.0, 1.0);

        let speed_factor = (s.speed / cfg.full_steer_speed).clamp(cfg.min_steer_factor, 1.0);
        s.lateral_x += s.current_steer * cfg.lateral_rate * self.car.handling * speed_factor * dt;

        // ── drift ─────────────────────────────────────────────────────────
        let speed_ratio = s.speed / max_speed;
        s.slip += ((target - s.current_steer) * speed_ratio - s.slip) * cfg.slip_lerp;

        // ── barrier ───────────────────────────────────────────────────────
        let limit = cfg.lateral_limit();
        let mut tick = VehicleTick::default();
        if s.lateral_x.abs() > limit {
            s.lateral_x = limit * s.lateral_x.signum();
            s.against_barrier = true;
            s.health = (s.health - cfg.barrier_drain * dt).max(0.0);
            s.speed *= (1.0 - cfg.barrier_drag * dt).max(0.0);
            self.scrape_clock += dt;
            s.jitter = cfg.barrier_jitter * (self.scrape_clock * 40.0).sin();
            tick.barrier = true;
            tick.fatal = s.health <= 0.0;
        } else {
            s.against_barrier = false;
            s.jitter = 0.0;
        }

        // ── attitude ──────────────────────────────────────────────────────
        s.roll = -s.current_steer * cfg.roll_gain;
        s.yaw = -(s.current_steer * cfg.yaw_gain + s.slip * cfg.drift_yaw_gain);

        s.critical_timer = (s.critical_timer - dt).max(0.0);
        tick.gear_changed = s.gear() != gear_before;
        if tick.gear_changed {
            debug!("gear {} → {} at {:.0} kph", gear_before, s.gear(), s.kph());
        }
        tick
    }

    /// Apply an obstacle hit of `damage` health points.
    pub fn crash(&mut self, damage: f32) -> CrashOutcome {
        let s = &mut self.state;
        s.health = (s.health - damage).max(0.0);
        s.speed *= self.cfg.crash_speed_keep;
        s.current_steer = 0.0;
        s.slip = 0.0;
        s.critical_timer = self.cfg.critical_time;
        if s.health <= 0.0 {
            info!("fatal crash");
            CrashOutcome::Fatal
        } else {
            info!("crash: -{:.0} hp, {:.0} left", damage, s.health);
            CrashOutcome::Survived { health: s.health }
        }
    }

    /// Terminal crash regardless of remaining health.
    pub fn wreck(&mut self) {
        let s = &mut self.state;
        s.health = 0.0;
        s.speed = 0.0;
        s.current_steer = 0.0;
        s.slip = 0.0;
        s.critical_timer = self.cfg.critical_time;
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cars;

    const DT: f32 = 1.0 / 60.0;

    fn signal(drive: DriveState, steer: f32) -> ControlSignal {
        let mut s = ControlSignal::default();
        s.drive_state = drive;
        s.set_target_steer(steer);
        s
    }

    fn car() -> Vehicle { Vehicle::new(VehicleConfig::default(), cars::starter()) }

    #[test]
    fn gear_table_shape() {
        assert_eq!(gear_for_kph(0.0), 1);
        assert_eq!(gear_for_kph(80.0), 3);
        assert_eq!(gear_for_kph(500.0), 6);
        assert!(accel_rate(10.0) < accel_rate(90.0));
        assert!(accel_rate(250.0) < accel_rate(90.0));
    }

    #[test]
    fn gas_accelerates_strictly_and_respects_cap() {
        let mut v = car();
        let sig = signal(DriveState::Gas, 0.0);
        let max = v.max_speed(1);
        let mut last = v.state().speed;
        for _ in 0..60 {
            v.step(&sig, 1, DT);
            assert!(v.state().speed > last);
            assert!(v.state().speed <= max);
            last = v.state().speed;
        }
    }

    #[test]
    fn gas_never_exceeds_cap_over_long_runs() {
        let mut v = car();
        let sig = signal(DriveState::Gas, 0.0);
        for _ in 0..3600 { v.step(&sig, 1, DT); }
        assert!((v.state().speed - v.max_speed(1)).abs() < 1e-3);
    }

    #[test]
    fn brake_stops_at_exactly_zero() {
        let mut v = car().with_speed(2.0);
        let sig = signal(DriveState::Brake, 0.0);
        let mut ticks = 0;
        while v.state().speed > 0.0 {
            v.step(&sig, 1, DT);
            ticks += 1;
            assert!(ticks < 60);
        }
        assert_eq!(v.state().speed, 0.0);
        for _ in 0..30 {
            v.step(&sig, 1, DT);
            assert_eq!(v.state().speed, 0.0);
        }
    }

    #[test]
    fn coasting_slows_down() {
        let mut v = car().with_speed(20.0);
        v.step(&signal(DriveState::Neutral, 0.0), 1, DT);
        assert!(v.state().speed < 20.0);
    }

    #[test]
    fn difficulty_raises_top_speed() {
        let v = car();
        assert!(v.max_speed(5) > v.max_speed(1));
        assert_eq!(v.max_speed(1000), v.max_speed(11));
    }

    #[test]
    fn steering_is_low_passed() {
        let mut v = car().with_speed(30.0);
        v.step(&signal(DriveState::Neutral, 1.0), 1, DT);
        assert!((v.state().current_steer - 0.15).abs() < 1e-6);
        assert!(v.state().lateral_x > 0.0);
        assert!(v.state().roll < 0.0);
    }

    #[test]
    fn lateral_position_is_bounded() {
        let mut v = car().with_speed(40.0);
        let limit = v.config().lateral_limit();
        for i in 0..2000 {
            let steer = if (i / 300) % 2 == 0 { 1.0 } else { -1.0 };
            v.step(&signal(DriveState::Gas, steer), 1, DT);
            assert!(v.state().lateral_x.abs() <= limit + 1e-6);
        }
    }

    #[test]
    fn barrier_drains_health_and_speed() {
        let mut v = car().with_speed(40.0);
        let sig = signal(DriveState::Neutral, 1.0);
        for _ in 0..120 { v.step(&sig, 1, DT); }
        assert!(v.state().against_barrier);
        assert!(v.state().health < 100.0);
        assert!(v.state().speed < 40.0);
    }

    #[test]
    fn barrier_eventually_fatal() {
        let mut v = car().with_speed(40.0);
        let sig = signal(DriveState::Gas, 1.0);
        let mut fatal = false;
        for _ in 0..(60 * 10) {
            if v.step(&sig, 1, DT).fatal { fatal = true; break; }
        }
        assert!(fatal);
        assert_eq!(v.state().health, 0.0);
    }

    #[test]
    fn crash_penalises_and_flags_critical() {
        let mut v = car().with_speed(40.0);
        v.step(&signal(DriveState::Gas, 0.8), 1, DT);
        assert_eq!(v.crash(30.0), CrashOutcome::Survived { health: 70.0 });
        assert!((v.state().speed - 40.0 * 0.3).abs() < 1.0);
        assert_eq!(v.state().current_steer, 0.0);
        assert!(v.is_critical());
        assert_eq!(v.crash(80.0), CrashOutcome::Fatal);
    }

    #[test]
    fn critical_advisory_expires() {
        let mut v = car().with_speed(10.0);
        v.crash(10.0);
        for _ in 0..120 { v.step(&signal(DriveState::Neutral, 0.0), 1, DT); }
        assert!(!v.is_critical());
    }

    #[test]
    fn hard_steering_at_speed_drifts() {
        let mut v = car().with_speed(50.0);
        let mut drifted = false;
        for i in 0..40 {
            let steer = if i % 20 < 10 { 1.0 } else { -1.0 };
            v.step(&signal(DriveState::Gas, steer), 1, DT);
            drifted |= v.is_drifting(1);
        }
        assert!(drifted);
    }
}
