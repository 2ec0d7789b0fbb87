//! Top-level application state machine.
//!
//! `AppState` owns the `Race`, the save data and the HUD animations.  It
//! turns window keys into race lifecycle calls, banks finished races into
//! the profile and leaderboard, and hands the visualizer one `Screen` per
//! frame.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Instant;

use chrono::Utc;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use drive_core::cars;
use drive_core::race::{GameState, Race, StepReport};
use drive_core::{Clock, LandmarkSource, SystemClock, Tuning};
use race_store::{default_dir, JsonStore, SaveData};

use crate::audio::EngineSound;
use crate::error::AppError;
use crate::hud::HudState;
use crate::input::SimInput;
use crate::visualizer::{AppKey, Screen, Visualizer};

// ════════════════════════════════════════════════════════════════════════════
// AppConfig
// ════════════════════════════════════════════════════════════════════════════

/// Configuration for the full application.  Loadable from JSON; missing
/// fields keep their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Overrides the saved profile name when non-empty.
    pub player_name: String,
    /// Car id to select at launch, if owned.
    pub car:         Option<String>,
    /// Where `save.json` lives; `None` uses the per-user default.
    pub save_dir:    Option<PathBuf>,
    /// Fixed world seed for repeatable tracks.
    pub seed:        Option<u64>,
    /// GM program for the engine drone.
    pub instrument:  u8,
    pub mute:        bool,
    pub tuning:      Tuning,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            player_name: String::new(),
            car:         None,
            save_dir:    None,
            seed:        None,
            instrument:  30, // distortion guitar
            mute:        false,
            tuning:      Tuning::default(),
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let bad = |reason: String| AppError::Config { path: path.to_path_buf(), reason };
        let text = fs::read_to_string(path).map_err(|e| bad(e.to_string()))?;
        let cfg: AppConfig = serde_json::from_str(&text).map_err(|e| bad(e.to_string()))?;
        cfg.tuning.validate()?;
        Ok(cfg)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// AppState
// ════════════════════════════════════════════════════════════════════════════

pub struct AppState<C: Clock> {
    race:      Race<C>,
    save:      SaveData,
    store:     JsonStore,
    hud:       HudState,
    /// Start-screen message: a startup failure or a garage event.
    notice:    Option<String>,
    last_rank: Option<usize>,
}

impl<C: Clock> AppState<C> {
    pub fn new(cfg: &AppConfig, clock: C) -> Result<Self, AppError> {
        let store = JsonStore::in_dir(cfg.save_dir.clone().unwrap_or_else(default_dir));
        let mut save = store.load()?;

        if !cfg.player_name.trim().is_empty() {
            save.profile.name = cfg.player_name.trim().to_string();
        }
        if let Some(id) = &cfg.car {
            if let Err(e) = save.profile.select(id) {
                warn!("cannot select {}: {}", id, e);
            }
        }
        let car = save.profile.selected_car();
        info!("profile {}: {} coins, driving {}", save.profile.name, save.profile.coins, car.name);

        let mut hud = HudState::default();
        hud.status = "Press Enter to start".to_string();

        Ok(AppState {
            race: Race::new(cfg.tuning.clone(), car, clock, cfg.seed)?,
            save,
            store,
            hud,
            notice: None,
            last_rank: None,
        })
    }

    pub fn race(&self) -> &Race<C> { &self.race }
    pub fn save(&self) -> &SaveData { &self.save }
    pub fn notice(&self) -> Option<&str> { self.notice.as_deref() }
    pub fn last_rank(&self) -> Option<usize> { self.last_rank }

    // ── keys ──────────────────────────────────────────────────────────────

    /// Apply one key.  Returns false when the app should quit.
    pub fn handle(&mut self, key: AppKey, source: &mut dyn LandmarkSource) -> bool {
        match key {
            AppKey::Quit => return false,
            AppKey::TogglePause => self.race.toggle_pause(),
            AppKey::Start | AppKey::Restart => match self.race.state() {
                GameState::Ready => self.start(source),
                GameState::Over  => self.restart(),
                GameState::Running | GameState::Paused => {
                    if key == AppKey::Restart { self.restart(); }
                }
            },
            AppKey::CycleCar => {
                if self.in_menu() {
                    let car = self.save.profile.cycle_selection();
                    self.notice = Some(format!("Selected {}", car.name));
                    self.race.set_car(car);
                    self.persist();
                }
            }
            AppKey::BuyCar => {
                if self.in_menu() { self.buy_next_car(); }
            }
        }
        true
    }

    fn in_menu(&self) -> bool {
        matches!(self.race.state(), GameState::Ready | GameState::Over)
    }

    fn start(&mut self, source: &mut dyn LandmarkSource) {
        match self.race.start(source) {
            Ok(()) => self.on_race_started(),
            Err(e) => {
                warn!("cannot start race: {}", e);
                self.notice = Some(e.user_message().to_string());
            }
        }
    }

    fn restart(&mut self) {
        self.race.restart(Some(self.save.profile.selected_car()));
        self.on_race_started();
    }

    fn on_race_started(&mut self) {
        self.hud.reset();
        self.hud.status = format!("Racing in {}", self.race.car().name);
        self.notice = None;
        self.last_rank = None;
    }

    /// Buy the cheapest car not yet in the garage and select it.
    fn buy_next_car(&mut self) {
        let Some(next) = cars::catalog().into_iter().find(|c| !self.save.profile.owns(&c.id)) else {
            self.notice = Some("Garage full".to_string());
            return;
        };
        match self.save.profile.purchase(&next.id) {
            Ok(car) => {
                self.save.profile.selected = car.id.clone();
                self.notice = Some(format!("Bought {}", car.name));
                self.race.set_car(car);
                self.persist();
            }
            Err(e) => self.notice = Some(e.to_string()),
        }
    }

    // ── frames ────────────────────────────────────────────────────────────

    /// Fold one applied frame into the HUD and bank a finished race.
    pub fn on_step(&mut self, report: &StepReport, dt: f32) {
        self.hud.on_step(report, dt);
        if let Some(result) = &report.finished {
            self.last_rank = self.save.record_race(result, Utc::now());
            self.persist();
        }
    }

    pub fn screen(&self, time: f32) -> Screen<'_> {
        Screen {
            view:        self.race.view(),
            hud:         &self.hud,
            profile:     &self.save.profile,
            leaderboard: &self.save.leaderboard,
            notice:      self.notice.as_deref(),
            last_rank:   self.last_rank,
            time,
        }
    }

    /// Write the save file; a failure is logged and play goes on.
    pub fn persist(&self) {
        if let Err(e) = self.store.save(&self.save) {
            warn!("could not save progress: {}", e);
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// run — the blocking main loop
// ════════════════════════════════════════════════════════════════════════════

pub fn run(cfg: AppConfig) -> Result<(), AppError> {
    // ── Landmark source ───────────────────────────────────────────────────
    let (sim_tx, sim_rx) = mpsc::channel::<SimInput>();
    #[cfg(feature = "leap")]
    let mut source: Box<dyn LandmarkSource> = {
        drop(sim_rx);
        Box::new(crate::input::spawn_hand_tracker(crate::input::LeapTracker))
    };
    #[cfg(not(feature = "leap"))]
    let mut source: Box<dyn LandmarkSource> = Box::new(crate::input::SimHandRig::new(sim_rx));

    // ── Audio, window, state ──────────────────────────────────────────────
    let mut audio = if cfg.mute { EngineSound::muted() } else { EngineSound::spawn(cfg.instrument) };
    let mut vis = Visualizer::new(sim_tx, cfg.tuning.scheduler.render_interval())?;
    let mut app = AppState::new(&cfg, SystemClock::default())?;
    let launched = Instant::now();

    // ── Main loop ─────────────────────────────────────────────────────────
    'main: while vis.is_open() {
        for key in vis.poll_input() {
            if !app.handle(key, source.as_mut()) { break 'main; }
        }

        if let Some(frame) = app.race.begin_frame() {
            let report = app.race.step(&frame, source.as_mut(), &mut audio);
            app.on_step(&report, frame.dt);
        }

        vis.render(&app.screen(launched.elapsed().as_secs_f32()));
    }

    audio.quit();
    app.persist();
    info!("bye");
    Ok(())
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use drive_core::landmarks::{HandObservation, NoHands};
    use drive_core::race::RaceResult;
    use drive_core::scheduler::ManualClock;
    use drive_core::world::WorldConfig;
    use drive_core::StartupError;

    struct NoDevice;

    impl LandmarkSource for NoDevice {
        fn open(&mut self) -> Result<(), StartupError> {
            Err(StartupError::DeviceUnavailable("no leap".into()))
        }
        fn poll(&mut self, _t: Duration) -> Option<Vec<HandObservation>> { None }
    }

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("hand_racer_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn config(dir: &Path) -> AppConfig {
        AppConfig {
            player_name: "ADA".into(),
            save_dir: Some(dir.to_path_buf()),
            seed: Some(3),
            tuning: Tuning {
                world: WorldConfig { obstacle_rate: 0.0, coin_rate: 0.0, ..WorldConfig::default() },
                ..Tuning::default()
            },
            ..AppConfig::default()
        }
    }

    fn app(name: &str) -> (AppState<ManualClock>, PathBuf) {
        let dir = scratch(name);
        let app = AppState::new(&config(&dir), ManualClock::default()).unwrap();
        (app, dir)
    }

    fn finished(score: u64, coins: u32) -> StepReport {
        StepReport {
            applied: true,
            finished: Some(RaceResult { score, distance: 500.0, coins, level: 2, car_id: "hatch".into() }),
            ..StepReport::default()
        }
    }

    #[test]
    fn missing_device_shows_a_notice() {
        let (mut app, _) = app("no_device");
        assert!(app.handle(AppKey::Start, &mut NoDevice));
        assert_eq!(app.race().state(), GameState::Ready);
        assert!(app.notice().unwrap().contains("device"));

        assert!(app.handle(AppKey::Start, &mut NoHands));
        assert_eq!(app.race().state(), GameState::Running);
        assert_eq!(app.notice(), None);
    }

    #[test]
    fn quit_key_stops_the_loop() {
        let (mut app, _) = app("quit");
        assert!(!app.handle(AppKey::Quit, &mut NoHands));
    }

    #[test]
    fn finished_race_is_banked_and_saved() {
        let (mut app, dir) = app("banked");
        app.handle(AppKey::Start, &mut NoHands);
        app.on_step(&finished(900, 40), 1.0 / 60.0);
        assert_eq!(app.last_rank(), Some(0));
        assert!(app.hud.status.contains("900"));

        let stored = JsonStore::in_dir(&dir).load().unwrap();
        assert_eq!(stored.profile.name, "ADA");
        assert_eq!(stored.profile.coins, 40);
        assert_eq!(stored.profile.races, 1);
        assert_eq!(stored.leaderboard.entries()[0].score, 900);
    }

    #[test]
    fn buying_needs_coins() {
        let (mut app, dir) = app("buy");
        app.handle(AppKey::BuyCar, &mut NoHands);
        assert!(app.notice().unwrap().contains("150"));
        assert_eq!(app.race().car().id, "hatch");

        app.on_step(&finished(10, 200), 0.0);
        app.handle(AppKey::BuyCar, &mut NoHands);
        assert_eq!(app.race().car().id, "coupe");
        assert_eq!(app.save().profile.coins, 50);

        let stored = JsonStore::in_dir(&dir).load().unwrap();
        assert!(stored.profile.owns("coupe"));
        assert_eq!(stored.profile.selected, "coupe");
    }

    #[test]
    fn garage_is_locked_while_racing() {
        let (mut app, _) = app("locked");
        app.handle(AppKey::Start, &mut NoHands);
        app.handle(AppKey::CycleCar, &mut NoHands);
        app.handle(AppKey::BuyCar, &mut NoHands);
        assert_eq!(app.notice(), None);
        assert_eq!(app.race().car().id, "hatch");
    }

    #[test]
    fn pause_and_restart_keys() {
        let (mut app, _) = app("pause");
        app.handle(AppKey::TogglePause, &mut NoHands);
        assert_eq!(app.race().state(), GameState::Ready);

        app.handle(AppKey::Start, &mut NoHands);
        app.handle(AppKey::TogglePause, &mut NoHands);
        assert_eq!(app.race().state(), GameState::Paused);
        app.handle(AppKey::Restart, &mut NoHands);
        assert_eq!(app.race().state(), GameState::Running);
    }

    #[test]
    fn config_file_overrides_tuning() {
        let dir = scratch("config");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("racer.json");
        fs::write(&path, r#"{ "seed": 9, "tuning": { "world": { "max_obstacles": 4 } } }"#).unwrap();
        let cfg = AppConfig::load(&path).unwrap();
        assert_eq!(cfg.seed, Some(9));
        assert_eq!(cfg.tuning.world.max_obstacles, 4);

        fs::write(&path, r#"{ "tuning": { "world": { "lanes": [] } } }"#).unwrap();
        assert!(matches!(AppConfig::load(&path), Err(AppError::Tuning(_))));
        fs::write(&path, "not json").unwrap();
        assert!(matches!(AppConfig::load(&path), Err(AppError::Config { .. })));
    }
}
