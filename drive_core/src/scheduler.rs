//! Dual-rate frame scheduling on one thread.
//!
//! Two repeating tasks share each display refresh:
//!
//! * **simulation/render** — runs every refresh with the real elapsed time
//!   as `dt` (one variable step per refresh, never catch-up steps);
//! * **perception** — asked every refresh but throttles itself to the
//!   perception interval, so the expensive landmark poll runs at roughly
//!   half the render rate.
//!
//! Pausing disarms both tasks and freezes the step clock; stopping also bumps
//! a generation counter so a [`Frame`] issued before the stop can no longer
//! be applied.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ════════════════════════════════════════════════════════════════════════════
// Clock
// ════════════════════════════════════════════════════════════════════════════

/// Monotonic time source.
pub trait Clock {
    /// Time since an arbitrary fixed origin.
    fn now(&self) -> Duration;
}

/// Wall clock backed by [`Instant`].
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self { SystemClock { origin: Instant::now() } }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration { self.origin.elapsed() }
}

/// Hand-advanced clock for deterministic runs.  Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn advance(&self, by: Duration) { self.now.set(self.now.get() + by); }
    pub fn set(&self, to: Duration) { self.now.set(to); }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration { self.now.get() }
}

// ════════════════════════════════════════════════════════════════════════════
// SchedulerConfig
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Display refresh the front end aims for.
    pub render_interval_ms: u64,
    /// Minimum spacing between landmark polls.
    pub perception_interval_ms: u64,
    /// Longest step ever handed to the simulation.
    pub max_frame_dt_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            render_interval_ms:     16,
            perception_interval_ms: 32,
            max_frame_dt_ms:        100,
        }
    }
}

impl SchedulerConfig {
    pub fn render_interval(&self) -> Duration { Duration::from_millis(self.render_interval_ms) }
    pub fn perception_interval(&self) -> Duration { Duration::from_millis(self.perception_interval_ms) }
    pub fn max_frame_dt(&self) -> Duration { Duration::from_millis(self.max_frame_dt_ms) }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.render_interval_ms == 0 { return Err(ConfigError::NotPositive("render_interval_ms")); }
        if self.max_frame_dt_ms == 0    { return Err(ConfigError::NotPositive("max_frame_dt_ms")); }
        Ok(())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Frame / RunState
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState { Stopped, Running, Paused }

/// Work order for one display refresh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    /// Simulation step in seconds.
    pub dt: f32,
    pub timestamp: Duration,
    /// The perception task is due this refresh.
    pub poll_perception: bool,
    generation: u64,
}

/// Comparable summary of the scheduler's internal state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerStatus {
    pub state: RunState,
    pub generation: u64,
    pub sim_armed: bool,
    pub perception_armed: bool,
    pub last_frame: Option<Duration>,
    pub last_poll: Option<Duration>,
}

// ════════════════════════════════════════════════════════════════════════════
// FrameScheduler
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub struct FrameScheduler<C: Clock> {
    clock: C,
    cfg:   SchedulerConfig,
    state: RunState,
    generation: u64,
    sim_armed:        bool,
    perception_armed: bool,
    last_frame: Option<Duration>,
    last_poll:  Option<Duration>,
}

impl<C: Clock> FrameScheduler<C> {
    pub fn new(clock: C, cfg: SchedulerConfig) -> Self {
        FrameScheduler {
            clock,
            cfg,
            state: RunState::Stopped,
            generation: 0,
            sim_armed: false,
            perception_armed: false,
            last_frame: None,
            last_poll: None,
        }
    }

    pub fn state(&self) -> RunState { self.state }
    pub fn config(&self) -> &SchedulerConfig { &self.cfg }
    pub fn clock(&self) -> &C { &self.clock }

    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            state: self.state,
            generation: self.generation,
            sim_armed: self.sim_armed,
            perception_armed: self.perception_armed,
            last_frame: self.last_frame,
            last_poll: self.last_poll,
        }
    }

    /// Arm both tasks from a stopped scheduler.  No effect otherwise.
    pub fn start(&mut self) {
        if self.state != RunState::Stopped { return; }
        self.generation += 1;
        self.last_frame = Some(self.clock.now());
        self.last_poll = None;
        self.arm();
        self.state = RunState::Running;
        debug!("scheduler started (generation {})", self.generation);
    }

    /// Disarm both tasks and freeze the step clock.  Idempotent.
    pub fn pause(&mut self) {
        if self.state != RunState::Running { return; }
        self.disarm();
        self.state = RunState::Paused;
        debug!("scheduler paused");
    }

    /// Re-arm after a pause.  The paused interval is never charged as `dt`.
    pub fn resume(&mut self) {
        if self.state != RunState::Paused { return; }
        self.last_frame = Some(self.clock.now());
        self.arm();
        self.state = RunState::Running;
        debug!("scheduler resumed");
    }

    /// Cancel both pending tasks and invalidate every outstanding [`Frame`].
    pub fn stop(&mut self) {
        if self.state == RunState::Stopped { return; }
        self.disarm();
        self.generation += 1;
        self.last_frame = None;
        self.state = RunState::Stopped;
        debug!("scheduler stopped");
    }

    /// Called once per display refresh.  Returns the work for this refresh,
    /// or `None` when the scheduler is not running.
    pub fn next_frame(&mut self) -> Option<Frame> {
        if self.state != RunState::Running || !self.sim_armed { return None; }
        let now = self.clock.now();

        let elapsed = self.last_frame.map_or(Duration::ZERO, |t| now.saturating_sub(t));
        let dt = elapsed.min(self.cfg.max_frame_dt());
        self.last_frame = Some(now);

        // Perception re-arms every refresh but only polls once its interval
        // has passed.
        let poll_perception = self.perception_armed
            && self.last_poll.map_or(true, |t| now.saturating_sub(t) >= self.cfg.perception_interval());
        if poll_perception {
            self.last_poll = Some(now);
        }

        Some(Frame { dt: dt.as_secs_f32(), timestamp: now, poll_perception, generation: self.generation })
    }

    /// True while `frame` belongs to the current run and the run is live.
    pub fn is_live(&self, frame: &Frame) -> bool {
        self.state == RunState::Running && frame.generation == self.generation
    }

    fn arm(&mut self) {
        self.sim_armed = true;
        self.perception_armed = true;
    }

    fn disarm(&mut self) {
        self.sim_armed = false;
        self.perception_armed = false;
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_millis(16);

    fn sched() -> (ManualClock, FrameScheduler<ManualClock>) {
        let clock = ManualClock::default();
        let s = FrameScheduler::new(clock.clone(), SchedulerConfig::default());
        (clock, s)
    }

    #[test]
    fn stopped_scheduler_yields_nothing() {
        let (clock, mut s) = sched();
        clock.advance(TICK);
        assert!(s.next_frame().is_none());
    }

    #[test]
    fn dt_tracks_elapsed_time() {
        let (clock, mut s) = sched();
        s.start();
        clock.advance(TICK);
        let f = s.next_frame().unwrap();
        assert!((f.dt - 0.016).abs() < 1e-6);
        clock.advance(Duration::from_millis(40));
        assert!((s.next_frame().unwrap().dt - 0.040).abs() < 1e-6);
    }

    #[test]
    fn stalled_frame_is_one_clamped_step() {
        let (clock, mut s) = sched();
        s.start();
        clock.advance(Duration::from_secs(3));
        let f = s.next_frame().unwrap();
        assert!((f.dt - 0.1).abs() < 1e-6);
        // no catch-up frames are owed
        assert_eq!(s.next_frame().unwrap().dt, 0.0);
    }

    #[test]
    fn perception_runs_at_half_rate() {
        let (clock, mut s) = sched();
        s.start();
        let mut polls = 0;
        for _ in 0..60 {
            clock.advance(TICK);
            if s.next_frame().unwrap().poll_perception { polls += 1; }
        }
        assert_eq!(polls, 30);
    }

    #[test]
    fn pause_is_idempotent_and_resume_does_not_charge_pause() {
        let (clock, mut s) = sched();
        s.start();
        clock.advance(TICK);
        s.next_frame();

        s.pause();
        let once = s.status();
        s.pause();
        assert_eq!(s.status(), once);
        assert!(s.next_frame().is_none());

        clock.advance(Duration::from_secs(30));
        s.resume();
        clock.advance(TICK);
        let f = s.next_frame().unwrap();
        assert!(f.dt <= 0.017);
    }

    #[test]
    fn stop_invalidates_outstanding_frames() {
        let (clock, mut s) = sched();
        s.start();
        clock.advance(TICK);
        let stale = s.next_frame().unwrap();
        assert!(s.is_live(&stale));

        s.stop();
        assert!(!s.is_live(&stale));
        s.start();
        assert!(!s.is_live(&stale));
        clock.advance(TICK);
        let fresh = s.next_frame().unwrap();
        assert!(s.is_live(&fresh));
    }

    #[test]
    fn paused_frame_is_not_live() {
        let (clock, mut s) = sched();
        s.start();
        clock.advance(TICK);
        let f = s.next_frame().unwrap();
        s.pause();
        assert!(!s.is_live(&f));
        s.resume();
        assert!(s.is_live(&f));
    }
}
