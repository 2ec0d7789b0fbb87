//! One race: the per-frame driver tying perception, dynamics, world and
//! progression together, plus the collaborator seams around it.
//!
//! Ownership follows the data flow.  The interpreter is the only writer of
//! the control signal, the vehicle the only writer of the car state, the
//! world manager the only writer of the pools.  `Race` just calls them in
//! order once per frame.

use log::{debug, info};

use crate::cars::CarSpec;
use crate::config::Tuning;
use crate::control::{ControlSignal, DriveState};
use crate::error::{ConfigError, StartupError};
use crate::gesture::GestureInterpreter;
use crate::landmarks::{HandObservation, LandmarkSource};
use crate::progression::{Progression, ProgressionState};
use crate::scheduler::{Clock, Frame, FrameScheduler, RunState};
use crate::vehicle::{CrashOutcome, Vehicle, VehicleState};
use crate::world::{EntityKind, WorldManager};

// ════════════════════════════════════════════════════════════════════════════
// Collaborator seams
// ════════════════════════════════════════════════════════════════════════════

/// Engine parameters pushed to the audio collaborator every step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineParams {
    pub speed:       f32,
    pub max_speed:   f32,
    pub kph:         f32,
    pub gear:        u8,
    pub drive_state: DriveState,
}

/// One-shot sound events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCue {
    Crash,
    Coin,
    LevelUp,
    GameOver,
}

/// Receives engine state; nothing flows back into the core.
pub trait EngineAudio {
    fn update(&mut self, params: &EngineParams);
    fn cue(&mut self, _cue: AudioCue) {}
    fn stop(&mut self);
}

/// Audio sink that drops everything.
#[derive(Debug, Default)]
pub struct SilentAudio;

impl EngineAudio for SilentAudio {
    fn update(&mut self, _params: &EngineParams) {}
    fn stop(&mut self) {}
}

/// Something that can draw a [`RaceView`].
pub trait RenderSurface {
    fn present(&mut self, view: &RaceView<'_>);
}

// ════════════════════════════════════════════════════════════════════════════
// GameState / RaceResult / StepReport
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameState {
    /// Built but never started.
    Ready,
    Running,
    Paused,
    /// Wrecked; holds a result until the next restart.
    Over,
}

/// Final numbers of a finished race, for the leaderboard.
#[derive(Debug, Clone, PartialEq)]
pub struct RaceResult {
    pub score:    u64,
    pub distance: f64,
    pub coins:    u32,
    pub level:    u32,
    pub car_id:   String,
}

/// What happened during one applied frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepReport {
    pub applied:  bool,
    pub polled:   bool,
    pub hits:     Vec<EntityKind>,
    pub coins:    u32,
    pub level_up: Option<u32>,
    pub finished: Option<RaceResult>,
}

/// Everything the presentation layer reads for one frame.
pub struct RaceView<'a> {
    pub state:       GameState,
    pub vehicle:     &'a VehicleState,
    pub car:         &'a CarSpec,
    pub critical:    bool,
    pub drifting:    bool,
    pub signal:      &'a ControlSignal,
    pub progression: ProgressionState,
    pub world:       &'a WorldManager,
    /// Valid hands from the latest successful poll, for the skeleton overlay.
    pub hands:       &'a [HandObservation],
    /// Distance from the centre line to the barrier face (m).
    pub track_half_width: f32,
}

// ════════════════════════════════════════════════════════════════════════════
// Race
// ════════════════════════════════════════════════════════════════════════════

pub struct Race<C: Clock> {
    state:       GameState,
    interpreter: GestureInterpreter,
    vehicle:     Vehicle,
    world:       WorldManager,
    progression: Progression,
    scheduler:   FrameScheduler<C>,
    last_hands:  Vec<HandObservation>,
    result:      Option<RaceResult>,
}

impl<C: Clock> Race<C> {
    /// Build a race in the `Ready` state.  Tuning that could not drive a
    /// simulation (no lanes, inverted thresholds, zero pools) is rejected.
    pub fn new(tuning: Tuning, car: CarSpec, clock: C, seed: Option<u64>) -> Result<Self, ConfigError> {
        tuning.validate()?;
        Ok(Race {
            state:       GameState::Ready,
            interpreter: GestureInterpreter::new(tuning.gesture),
            vehicle:     Vehicle::new(tuning.vehicle, car),
            world:       WorldManager::new(tuning.world, seed),
            progression: Progression::new(tuning.progression),
            scheduler:   FrameScheduler::new(clock, tuning.scheduler),
            last_hands:  Vec::new(),
            result:      None,
        })
    }

    pub fn state(&self) -> GameState { self.state }
    pub fn result(&self) -> Option<&RaceResult> { self.result.as_ref() }
    pub fn signal(&self) -> &ControlSignal { self.interpreter.signal() }
    pub fn vehicle(&self) -> &VehicleState { self.vehicle.state() }
    pub fn car(&self) -> &CarSpec { self.vehicle.car() }
    pub fn world(&self) -> &WorldManager { &self.world }
    pub fn progression(&self) -> ProgressionState {
        self.progression.snapshot(self.vehicle.state().health)
    }
    pub fn scheduler_state(&self) -> RunState { self.scheduler.state() }

    // ── lifecycle ─────────────────────────────────────────────────────────

    /// First start: acquire the landmark source, then arm the scheduler.
    /// If the source cannot be opened nothing is started.
    pub fn start(&mut self, source: &mut dyn LandmarkSource) -> Result<(), StartupError> {
        if self.state != GameState::Ready { return Ok(()); }
        source.open()?;
        self.reset_and_run(None);
        Ok(())
    }

    pub fn pause(&mut self) {
        if self.state == GameState::Running {
            self.scheduler.pause();
            self.state = GameState::Paused;
            info!("race paused");
        }
    }

    pub fn resume(&mut self) {
        if self.state == GameState::Paused {
            self.scheduler.resume();
            self.state = GameState::Running;
            info!("race resumed");
        }
    }

    pub fn toggle_pause(&mut self) {
        match self.state {
            GameState::Running => self.pause(),
            GameState::Paused  => self.resume(),
            GameState::Ready | GameState::Over => {}
        }
    }

    /// New race, optionally in a different car.  Pending frames from the
    /// previous race are cancelled before any state is cleared.
    pub fn restart(&mut self, car: Option<CarSpec>) {
        self.reset_and_run(car);
    }

    /// Swap cars between races.  Ignored while a race is live.
    pub fn set_car(&mut self, car: CarSpec) {
        match self.state {
            GameState::Ready | GameState::Over => self.vehicle.reset(car),
            GameState::Running | GameState::Paused => {}
        }
    }

    /// Back to the menu without a result.
    pub fn abort(&mut self) {
        self.scheduler.stop();
        self.state = GameState::Ready;
        info!("race aborted");
    }

    fn reset_and_run(&mut self, car: Option<CarSpec>) {
        self.scheduler.stop();

        let car = car.unwrap_or_else(|| self.vehicle.car().clone());
        self.vehicle.reset(car);
        self.world.clear();
        self.progression.reset();
        self.interpreter.reset();
        self.last_hands.clear();
        self.result = None;

        self.scheduler.start();
        self.state = GameState::Running;
        info!("race started in {}", self.vehicle.car().name);
    }

    // ── per-frame ─────────────────────────────────────────────────────────

    /// The work order for this display refresh, if the race is running.
    pub fn begin_frame(&mut self) -> Option<Frame> {
        self.scheduler.next_frame()
    }

    /// Convenience: `begin_frame` + `step`.
    pub fn tick(
        &mut self,
        source: &mut dyn LandmarkSource,
        audio:  &mut dyn EngineAudio,
    ) -> Option<StepReport> {
        let frame = self.begin_frame()?;
        Some(self.step(&frame, source, audio))
    }

    /// Apply one frame.  Frames from a stopped or restarted run are ignored.
    pub fn step(
        &mut self,
        frame:  &Frame,
        source: &mut dyn LandmarkSource,
        audio:  &mut dyn EngineAudio,
    ) -> StepReport {
        let mut report = StepReport::default();
        if self.state != GameState::Running || !self.scheduler.is_live(frame) {
            debug!("dropping stale frame at {:?}", frame.timestamp);
            return report;
        }
        report.applied = true;
        let dt = frame.dt;

        // ── perception ────────────────────────────────────────────────────
        if frame.poll_perception {
            match source.poll(frame.timestamp) {
                Some(hands) => {
                    self.interpreter.apply(&hands);
                    self.last_hands.clear();
                    self.last_hands.extend(hands.into_iter().filter(HandObservation::is_valid));
                    report.polled = true;
                }
                None => debug!("no fresh landmarks, holding last control"),
            }
        }

        // ── dynamics ──────────────────────────────────────────────────────
        let level = self.progression.difficulty();
        let tick = self.vehicle.step(self.interpreter.signal(), level, dt);
        let mut fatal = tick.fatal;

        // ── world ─────────────────────────────────────────────────────────
        let car = *self.vehicle.state();
        let mut world = self.world.update(dt, car.speed, car.lateral_x, level);
        let mut applied = 0;
        for &kind in &world.hits {
            applied += 1;
            audio.cue(AudioCue::Crash);
            let damage = self.world.config().damage(kind);
            info!("hit {:?} for {:.0}", kind, damage);
            if self.vehicle.crash(damage) == CrashOutcome::Fatal {
                fatal = true;
                break;
            }
        }
        // hits after a fatal one never landed
        world.hits.truncate(applied);
        if tick.fatal {
            info!("wrecked against the barrier");
            self.vehicle.wreck();
        }
        if world.coins > 0 { audio.cue(AudioCue::Coin); }
        report.hits = world.hits;
        report.coins = world.coins;

        // ── progression ───────────────────────────────────────────────────
        let drifting = if self.vehicle.is_drifting(level) { dt } else { 0.0 };
        let travelled = self.vehicle.state().speed * dt;
        report.level_up = self.progression.advance(travelled, world.coins, drifting);
        if report.level_up.is_some() { audio.cue(AudioCue::LevelUp); }

        let s = self.vehicle.state();
        audio.update(&EngineParams {
            speed:       s.speed,
            max_speed:   self.vehicle.max_speed(self.progression.difficulty()),
            kph:         s.kph(),
            gear:        s.gear(),
            drive_state: self.interpreter.signal().drive_state,
        });

        if fatal {
            report.finished = Some(self.finish(audio));
        }
        report
    }

    fn finish(&mut self, audio: &mut dyn EngineAudio) -> RaceResult {
        self.scheduler.stop();
        audio.cue(AudioCue::GameOver);
        audio.stop();
        self.state = GameState::Over;

        let p = self.progression.snapshot(0.0);
        let result = RaceResult {
            score:    p.score,
            distance: p.distance,
            coins:    p.coins,
            level:    p.difficulty,
            car_id:   self.vehicle.car().id.clone(),
        };
        info!("race over: score {} over {:.0} m, {} coins", result.score, result.distance, result.coins);
        self.result = Some(result.clone());
        result
    }

    pub fn view(&self) -> RaceView<'_> {
        let level = self.progression.difficulty();
        RaceView {
            state:       self.state,
            vehicle:     self.vehicle.state(),
            car:         self.vehicle.car(),
            critical:    self.vehicle.is_critical(),
            drifting:    self.vehicle.is_drifting(level),
            signal:      self.interpreter.signal(),
            progression: self.progression(),
            world:       &self.world,
            hands:       &self.last_hands,
            track_half_width: self.vehicle.config().track_half_width,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::time::Duration;

    use crate::cars;
    use crate::landmarks::{synthetic_hand, Landmark};
    use crate::scheduler::ManualClock;
    use crate::world::WorldConfig;

    const TICK: Duration = Duration::from_millis(16);

    /// Replays a script of polls, then repeats the last one.
    #[derive(Default)]
    struct Scripted {
        polls: VecDeque<Option<Vec<HandObservation>>>,
        last:  Option<Vec<HandObservation>>,
        calls: usize,
        fail_open: bool,
    }

    impl Scripted {
        fn always(hands: Vec<HandObservation>) -> Self {
            Scripted { last: Some(hands), ..Default::default() }
        }
    }

    impl LandmarkSource for Scripted {
        fn open(&mut self) -> Result<(), StartupError> {
            if self.fail_open {
                Err(StartupError::DeviceUnavailable("scripted".into()))
            } else {
                Ok(())
            }
        }

        fn poll(&mut self, _ts: Duration) -> Option<Vec<HandObservation>> {
            self.calls += 1;
            match self.polls.pop_front() {
                Some(p) => p,
                None    => self.last.clone(),
            }
        }
    }

    #[derive(Default)]
    struct Recorder {
        updates: usize,
        cues:    Vec<AudioCue>,
        stopped: bool,
    }

    impl EngineAudio for Recorder {
        fn update(&mut self, _p: &EngineParams) { self.updates += 1; }
        fn cue(&mut self, cue: AudioCue) { self.cues.push(cue); }
        fn stop(&mut self) { self.stopped = true; }
    }

    fn open_hand() -> Vec<HandObservation> {
        vec![synthetic_hand(Landmark::new(0.5, 0.7), 0.0, 0.25)]
    }

    fn quiet_tuning() -> Tuning {
        Tuning {
            world: WorldConfig {
                obstacle_rate: 0.0,
                obstacle_rate_per_level: 0.0,
                coin_rate: 0.0,
                ..WorldConfig::default()
            },
            ..Tuning::default()
        }
    }

    fn race() -> (ManualClock, Race<ManualClock>) {
        let clock = ManualClock::default();
        let r = Race::new(quiet_tuning(), cars::starter(), clock.clone(), Some(3)).unwrap();
        (clock, r)
    }

    fn run(clock: &ManualClock, r: &mut Race<ManualClock>, src: &mut Scripted, audio: &mut Recorder, n: usize) {
        for _ in 0..n {
            clock.advance(TICK);
            r.tick(src, audio);
        }
    }

    #[test]
    fn failed_source_never_starts() {
        let (_clock, mut r) = race();
        let mut src = Scripted { fail_open: true, ..Default::default() };
        assert!(r.start(&mut src).is_err());
        assert_eq!(r.state(), GameState::Ready);
        assert!(r.begin_frame().is_none());
    }

    #[test]
    fn open_hand_accelerates_the_car() {
        let (clock, mut r) = race();
        let mut src = Scripted::always(open_hand());
        let mut audio = Recorder::default();
        r.start(&mut src).unwrap();
        run(&clock, &mut r, &mut src, &mut audio, 60);
        assert_eq!(r.signal().drive_state, DriveState::Gas);
        assert!(r.vehicle().speed > 4.0);
        assert!(r.progression().score > 0);
        assert_eq!(audio.updates, 60);
        // perception ran at half the frame rate
        assert_eq!(src.calls, 30);
    }

    #[test]
    fn failed_poll_keeps_last_control() {
        let (clock, mut r) = race();
        let mut src = Scripted::always(open_hand());
        let mut audio = Recorder::default();
        r.start(&mut src).unwrap();
        run(&clock, &mut r, &mut src, &mut audio, 4);
        let before = *r.signal();

        src.last = None;
        run(&clock, &mut r, &mut src, &mut audio, 20);
        assert_eq!(*r.signal(), before);
        assert_eq!(r.signal().drive_state, DriveState::Gas);
    }

    #[test]
    fn traffic_hit_is_one_crash() {
        let (clock, mut r) = race();
        let mut src = Scripted::always(Vec::new());
        let mut audio = Recorder::default();
        r.start(&mut src).unwrap();

        // the car starts on the centre line; lane 1 traffic overlaps it
        assert_eq!(r.vehicle().lateral_x, 0.0);
        let idx = r.world.spawn_obstacle(EntityKind::Traffic, 1, 0.0).unwrap();

        clock.advance(TICK);
        let report = r.tick(&mut src, &mut audio).unwrap();
        assert_eq!(report.hits, vec![EntityKind::Traffic]);
        assert!(r.world.obstacle(idx).is_none());
        assert_eq!(audio.cues.iter().filter(|c| **c == AudioCue::Crash).count(), 1);
        assert!(r.vehicle().health < 100.0);
        assert_eq!(r.state(), GameState::Running);
    }

    #[test]
    fn fatal_crash_ends_the_race() {
        let (clock, mut r) = race();
        let mut src = Scripted::always(Vec::new());
        let mut audio = Recorder::default();
        r.start(&mut src).unwrap();
        r.vehicle.crash(90.0);
        let idx = r.world.spawn_obstacle(EntityKind::Wall, 1, 0.0).unwrap();
        assert!((r.world.obstacle(idx).unwrap().x - r.vehicle().lateral_x).abs() < 2.5);

        clock.advance(TICK);
        let report = r.tick(&mut src, &mut audio).unwrap();
        let result = report.finished.expect("race should be over");
        assert_eq!(r.state(), GameState::Over);
        assert_eq!(r.scheduler_state(), RunState::Stopped);
        assert!(audio.stopped);
        assert!(audio.cues.contains(&AudioCue::GameOver));
        assert_eq!(result.car_id, "hatch");
        assert_eq!(r.result(), Some(&result));

        clock.advance(TICK);
        assert!(r.tick(&mut src, &mut audio).is_none());
    }

    #[test]
    fn hits_after_a_fatal_one_are_not_reported() {
        let (clock, mut r) = race();
        let mut src = Scripted::always(Vec::new());
        let mut audio = Recorder::default();
        r.start(&mut src).unwrap();
        r.vehicle.crash(90.0);
        // both overlap a car on the centre line; the wall sits in the first slot
        r.world.spawn_obstacle(EntityKind::Wall, 1, 0.0).unwrap();
        r.world.spawn_obstacle(EntityKind::Traffic, 2, 0.0).unwrap();

        clock.advance(TICK);
        let report = r.tick(&mut src, &mut audio).unwrap();
        assert_eq!(report.hits, vec![EntityKind::Wall]);
        assert!(report.finished.is_some());
        assert_eq!(audio.cues.iter().filter(|c| **c == AudioCue::Crash).count(), 1);
    }

    #[test]
    fn unusable_tuning_is_rejected() {
        let mut tuning = quiet_tuning();
        tuning.world.lanes.clear();
        let built = Race::new(tuning, cars::starter(), ManualClock::default(), None);
        assert_eq!(built.err(), Some(ConfigError::NoLanes));
    }

    #[test]
    fn stale_frame_cannot_touch_new_race() {
        let (clock, mut r) = race();
        let mut src = Scripted::always(open_hand());
        let mut audio = Recorder::default();
        r.start(&mut src).unwrap();
        run(&clock, &mut r, &mut src, &mut audio, 30);

        clock.advance(TICK);
        let stale = r.begin_frame().unwrap();
        r.restart(None);
        assert_eq!(r.vehicle().speed, 0.0);

        let report = r.step(&stale, &mut src, &mut audio);
        assert!(!report.applied);
        assert_eq!(r.vehicle().speed, 0.0);
        assert_eq!(r.progression().score, 0);
    }

    #[test]
    fn paused_race_does_not_advance() {
        let (clock, mut r) = race();
        let mut src = Scripted::always(open_hand());
        let mut audio = Recorder::default();
        r.start(&mut src).unwrap();
        run(&clock, &mut r, &mut src, &mut audio, 10);

        r.pause();
        r.pause();
        let speed = r.vehicle().speed;
        run(&clock, &mut r, &mut src, &mut audio, 100);
        assert_eq!(r.vehicle().speed, speed);
        assert_eq!(r.state(), GameState::Paused);

        clock.advance(Duration::from_secs(60));
        r.resume();
        clock.advance(TICK);
        let f = r.begin_frame().unwrap();
        assert!(f.dt < 0.02);
    }

    #[test]
    fn restart_switches_car() {
        let (clock, mut r) = race();
        let mut src = Scripted::always(open_hand());
        let mut audio = Recorder::default();
        r.start(&mut src).unwrap();
        run(&clock, &mut r, &mut src, &mut audio, 5);
        r.set_car(cars::find("coupe").unwrap());
        assert_eq!(r.car().id, "hatch");
        r.restart(cars::find("rally"));
        assert_eq!(r.car().id, "rally");
        assert_eq!(r.state(), GameState::Running);
        assert_eq!(r.world().active_obstacles(), 0);
    }
}
