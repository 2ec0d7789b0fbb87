//! # race_store
//!
//! Everything that outlives a race: the player profile (banked coins and
//! the garage of unlocked cars) and a local top-ten leaderboard, kept
//! together in one pretty-printed JSON file.
//!
//! ```rust,no_run
//! use race_store::JsonStore;
//!
//! let store = JsonStore::in_dir(race_store::default_dir());
//! let mut save = store.load().unwrap();
//! save.profile.purchase("coupe").ok();
//! store.save(&save).unwrap();
//! ```
//!
//! A missing save file is a fresh profile.  A corrupt one is logged and
//! replaced by a fresh profile on the next save rather than blocking play.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use drive_core::cars::{self, CarSpec};
use drive_core::RaceResult;

pub const SAVE_FILE: &str = "save.json";
pub const MAX_LEADERBOARD_ENTRIES: usize = 10;

// ════════════════════════════════════════════════════════════════════════════
// Errors
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot access {path}: {source}")]
    Io { path: PathBuf, #[source] source: io::Error },
    #[error("cannot encode save data: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PurchaseError {
    #[error("no car called {0:?}")]
    UnknownCar(String),
    #[error("{0} is already in the garage")]
    AlreadyOwned(String),
    #[error("{name} costs {price} coins, you have {have}")]
    NotEnoughCoins { name: String, price: u64, have: u64 },
    #[error("{0} has not been unlocked")]
    Locked(String),
}

// ════════════════════════════════════════════════════════════════════════════
// Profile
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub name:       String,
    pub coins:      u64,
    /// Car ids in purchase order; always contains the starter.
    pub unlocked:   Vec<String>,
    pub selected:   String,
    pub races:      u32,
    pub best_score: u64,
}

impl Default for Profile {
    fn default() -> Self {
        let starter = cars::starter().id;
        Profile {
            name:       "PLAYER".to_string(),
            coins:      0,
            unlocked:   vec![starter.clone()],
            selected:   starter,
            races:      0,
            best_score: 0,
        }
    }
}

impl Profile {
    pub fn owns(&self, car_id: &str) -> bool {
        self.unlocked.iter().any(|id| id == car_id)
    }

    /// Spend coins on a car and add it to the garage.
    pub fn purchase(&mut self, car_id: &str) -> Result<CarSpec, PurchaseError> {
        let car = cars::find(car_id).ok_or_else(|| PurchaseError::UnknownCar(car_id.to_string()))?;
        if self.owns(&car.id) {
            return Err(PurchaseError::AlreadyOwned(car.name));
        }
        if self.coins < car.price {
            return Err(PurchaseError::NotEnoughCoins { name: car.name, price: car.price, have: self.coins });
        }
        self.coins -= car.price;
        self.unlocked.push(car.id.clone());
        info!("bought {} for {} coins, {} left", car.name, car.price, self.coins);
        Ok(car)
    }

    /// Make an owned car the one used for the next race.
    pub fn select(&mut self, car_id: &str) -> Result<CarSpec, PurchaseError> {
        let car = cars::find(car_id).ok_or_else(|| PurchaseError::UnknownCar(car_id.to_string()))?;
        if !self.owns(&car.id) {
            return Err(PurchaseError::Locked(car.name));
        }
        self.selected = car.id.clone();
        Ok(car)
    }

    /// The selected car, or the starter if the save names a car that no
    /// longer exists.
    pub fn selected_car(&self) -> CarSpec {
        cars::find(&self.selected)
            .filter(|c| self.owns(&c.id))
            .unwrap_or_else(cars::starter)
    }

    /// Next owned car after the selected one, wrapping around.
    pub fn cycle_selection(&mut self) -> CarSpec {
        let owned: Vec<CarSpec> = cars::catalog().into_iter().filter(|c| self.owns(&c.id)).collect();
        let at = owned.iter().position(|c| c.id == self.selected).unwrap_or(0);
        let next = owned.get((at + 1) % owned.len().max(1)).cloned().unwrap_or_else(cars::starter);
        self.selected = next.id.clone();
        next
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Leaderboard
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub name:        String,
    pub score:       u64,
    pub distance:    f64,
    pub level:       u32,
    pub car:         String,
    pub recorded_at: DateTime<Utc>,
}

/// Best scores, highest first, at most [`MAX_LEADERBOARD_ENTRIES`] long.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Leaderboard {
    entries: Vec<LeaderboardEntry>,
}

impl Leaderboard {
    pub fn entries(&self) -> &[LeaderboardEntry] { &self.entries }
    pub fn best(&self) -> Option<&LeaderboardEntry> { self.entries.first() }

    /// Whether `score` would make the board.  A tie with the last entry of
    /// a full board does not.
    pub fn qualifies(&self, score: u64) -> bool {
        self.entries.len() < MAX_LEADERBOARD_ENTRIES
            || self.entries.last().map_or(true, |e| score > e.score)
    }

    /// Insert `entry` in rank order.  Ties go below existing scores.
    /// Returns the zero-based rank, or `None` if it did not make the board.
    pub fn submit(&mut self, entry: LeaderboardEntry) -> Option<usize> {
        if !self.qualifies(entry.score) { return None; }
        let rank = self.entries.iter().position(|e| e.score < entry.score).unwrap_or(self.entries.len());
        self.entries.insert(rank, entry);
        self.entries.truncate(MAX_LEADERBOARD_ENTRIES);
        Some(rank)
    }

    /// Re-establish ordering and length after loading hand-edited data.
    fn normalise(&mut self) {
        self.entries.sort_by(|a, b| b.score.cmp(&a.score));
        self.entries.truncate(MAX_LEADERBOARD_ENTRIES);
    }
}

// ════════════════════════════════════════════════════════════════════════════
// SaveData
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveData {
    pub profile:     Profile,
    pub leaderboard: Leaderboard,
}

impl SaveData {
    /// Bank the race's coins, update the profile stats and submit the score.
    /// Returns the leaderboard rank when the score made the board.
    pub fn record_race(&mut self, result: &RaceResult, at: DateTime<Utc>) -> Option<usize> {
        let p = &mut self.profile;
        p.coins += result.coins as u64;
        p.races += 1;
        p.best_score = p.best_score.max(result.score);

        let rank = self.leaderboard.submit(LeaderboardEntry {
            name:        p.name.clone(),
            score:       result.score,
            distance:    result.distance,
            level:       result.level,
            car:         result.car_id.clone(),
            recorded_at: at,
        });
        match rank {
            Some(r) => info!("score {} placed #{} on the leaderboard", result.score, r + 1),
            None    => info!("score {} missed the leaderboard", result.score),
        }
        rank
    }
}

// ════════════════════════════════════════════════════════════════════════════
// JsonStore
// ════════════════════════════════════════════════════════════════════════════

/// `$HAND_RACER_HOME`, else `~/.hand_racer`, else the working directory.
pub fn default_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("HAND_RACER_HOME") {
        return PathBuf::from(dir);
    }
    std::env::var_os("HOME")
        .map(|h| PathBuf::from(h).join(".hand_racer"))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self { JsonStore { path: path.into() } }

    /// Store at `<dir>/save.json`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self { Self::new(dir.as_ref().join(SAVE_FILE)) }

    pub fn path(&self) -> &Path { &self.path }

    pub fn load(&self) -> Result<SaveData, StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("no save at {}, starting fresh", self.path.display());
                return Ok(SaveData::default());
            }
            Err(e) => return Err(StoreError::Io { path: self.path.clone(), source: e }),
        };
        match serde_json::from_str::<SaveData>(&text) {
            Ok(mut data) => {
                data.leaderboard.normalise();
                let starter = cars::starter().id;
                if !data.profile.owns(&starter) {
                    data.profile.unlocked.insert(0, starter);
                }
                Ok(data)
            }
            Err(e) => {
                warn!("save at {} is unreadable ({}), starting fresh", self.path.display(), e);
                Ok(SaveData::default())
            }
        }
    }

    /// Write through a temporary file so a crash mid-write keeps the old save.
    pub fn save(&self, data: &SaveData) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io { path: self.path.clone(), source };
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(data)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)?;
        Ok(())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("race_store_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).single().unwrap()
    }

    fn entry(score: u64) -> LeaderboardEntry {
        LeaderboardEntry {
            name: "T".into(), score, distance: score as f64, level: 1, car: "hatch".into(), recorded_at: at(0),
        }
    }

    fn result(score: u64, coins: u32) -> RaceResult {
        RaceResult { score, distance: score as f64, coins, level: 1, car_id: "hatch".into() }
    }

    // ── Profile ──────────────────────────────────────────────────────────
    #[test]
    fn fresh_profile_owns_only_starter() {
        let p = Profile::default();
        assert!(p.owns("hatch"));
        assert!(!p.owns("coupe"));
        assert_eq!(p.selected_car().id, "hatch");
    }

    #[test]
    fn purchase_spends_coins() {
        let mut p = Profile { coins: 500, ..Profile::default() };
        let car = p.purchase("coupe").unwrap();
        assert_eq!(car.id, "coupe");
        assert_eq!(p.coins, 350);
        assert!(p.owns("coupe"));
        assert_eq!(p.purchase("coupe"), Err(PurchaseError::AlreadyOwned("Coupe".into())));
    }

    #[test]
    fn purchase_rejects_poor_and_unknown() {
        let mut p = Profile { coins: 100, ..Profile::default() };
        assert!(matches!(p.purchase("proto"), Err(PurchaseError::NotEnoughCoins { price: 1200, have: 100, .. })));
        assert_eq!(p.coins, 100);
        assert_eq!(p.purchase("tank"), Err(PurchaseError::UnknownCar("tank".into())));
    }

    #[test]
    fn select_needs_ownership() {
        let mut p = Profile { coins: 1000, ..Profile::default() };
        assert_eq!(p.select("rally"), Err(PurchaseError::Locked("Rally".into())));
        p.purchase("rally").unwrap();
        assert_eq!(p.select("rally").unwrap().id, "rally");
        assert_eq!(p.selected_car().id, "rally");
    }

    #[test]
    fn cycle_walks_owned_cars() {
        let mut p = Profile { coins: 10_000, ..Profile::default() };
        p.purchase("muscle").unwrap();
        p.purchase("coupe").unwrap();
        assert_eq!(p.cycle_selection().id, "coupe");
        assert_eq!(p.cycle_selection().id, "muscle");
        assert_eq!(p.cycle_selection().id, "hatch");
    }

    // ── Leaderboard ──────────────────────────────────────────────────────
    #[test]
    fn leaderboard_sorted_and_bounded() {
        let mut b = Leaderboard::default();
        for s in [50, 10, 90, 30, 70, 20, 80, 60, 40, 100, 5, 65] {
            b.submit(entry(s));
        }
        let scores: Vec<u64> = b.entries().iter().map(|e| e.score).collect();
        assert_eq!(scores, vec![100, 90, 80, 70, 65, 60, 50, 40, 30, 20]);
        assert!(!b.qualifies(20));
        assert!(b.qualifies(21));
        assert_eq!(b.submit(entry(1)), None);
    }

    #[test]
    fn ties_rank_below_existing() {
        let mut b = Leaderboard::default();
        b.submit(LeaderboardEntry { name: "first".into(), ..entry(50) });
        assert_eq!(b.submit(LeaderboardEntry { name: "second".into(), ..entry(50) }), Some(1));
        assert_eq!(b.best().unwrap().name, "first");
    }

    #[test]
    fn tie_with_last_of_full_board_is_rejected() {
        let mut b = Leaderboard::default();
        for s in 1..=MAX_LEADERBOARD_ENTRIES as u64 {
            b.submit(entry(s * 10));
        }
        assert_eq!(b.submit(entry(10)), None);
        assert_eq!(b.entries().len(), MAX_LEADERBOARD_ENTRIES);
        assert_eq!(b.submit(entry(11)), Some(MAX_LEADERBOARD_ENTRIES - 1));
    }

    #[test]
    fn record_race_banks_coins() {
        let mut save = SaveData::default();
        assert_eq!(save.record_race(&result(1234, 7), at(1)), Some(0));
        assert_eq!(save.record_race(&result(200, 3), at(2)), Some(1));
        assert_eq!(save.profile.coins, 10);
        assert_eq!(save.profile.races, 2);
        assert_eq!(save.profile.best_score, 1234);
    }

    // ── JsonStore ────────────────────────────────────────────────────────
    #[test]
    fn missing_file_is_fresh_profile() {
        let store = JsonStore::in_dir(scratch("missing"));
        assert_eq!(store.load().unwrap(), SaveData::default());
    }

    #[test]
    fn save_then_load_keeps_everything() {
        let dir = scratch("persist");
        let store = JsonStore::in_dir(&dir);
        let mut save = SaveData::default();
        save.profile.coins = 900;
        save.profile.purchase("muscle").unwrap();
        save.record_race(&result(777, 4), at(5));
        store.save(&save).unwrap();

        let back = store.load().unwrap();
        assert_eq!(back, save);
        assert!(!dir.join("save.json.tmp").exists());
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn corrupt_file_starts_fresh() {
        let dir = scratch("corrupt");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(SAVE_FILE), "{ not json").unwrap();
        let store = JsonStore::in_dir(&dir);
        assert_eq!(store.load().unwrap(), SaveData::default());
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = scratch("partial");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(SAVE_FILE), r#"{ "profile": { "coins": 42, "unlocked": [] } }"#).unwrap();
        let save = JsonStore::in_dir(&dir).load().unwrap();
        assert_eq!(save.profile.coins, 42);
        assert!(save.profile.owns("hatch"));
        assert!(save.leaderboard.entries().is_empty());
        let _ = fs::remove_dir_all(dir);
    }
}
