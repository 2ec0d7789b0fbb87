//! Score, coins and difficulty.
//!
//! Score is earned by distance, plus bonuses for coins and drifting; the
//! difficulty level is always derived from the score, never stored apart
//! from it.

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressionConfig {
    pub points_per_meter: f64,
    /// Score needed per difficulty level.
    pub points_per_level: u64,
    /// Bonus score for each coin picked up.
    pub coin_score: u64,
    /// Bonus score per second spent drifting.
    pub drift_points_per_second: f32,
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        ProgressionConfig {
            points_per_meter:        1.0,
            points_per_level:        1000,
            coin_score:              25,
            drift_points_per_second: 40.0,
        }
    }
}

impl ProgressionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.points_per_level == 0 { return Err(ConfigError::NotPositive("points_per_level")); }
        if self.points_per_meter <= 0.0 { return Err(ConfigError::NotPositive("points_per_meter")); }
        Ok(())
    }
}

/// Read-only view handed to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressionState {
    pub score:      u64,
    pub difficulty: u32,
    pub health:     f32,
    pub coins:      u32,
    pub distance:   f64,
}

#[derive(Debug, Clone)]
pub struct Progression {
    cfg:      ProgressionConfig,
    distance: f64,
    bonus:    u64,
    coins:    u32,
    /// Fractional drift points not yet paid out.
    drift_carry: f32,
}

impl Progression {
    pub fn new(cfg: ProgressionConfig) -> Self {
        Progression { cfg, distance: 0.0, bonus: 0, coins: 0, drift_carry: 0.0 }
    }

    pub fn reset(&mut self) {
        self.distance = 0.0;
        self.bonus = 0;
        self.coins = 0;
        self.drift_carry = 0.0;
    }

    pub fn score(&self) -> u64 {
        (self.distance * self.cfg.points_per_meter).floor() as u64 + self.bonus
    }

    pub fn difficulty(&self) -> u32 {
        level_for_score(self.score(), self.cfg.points_per_level)
    }

    pub fn coins(&self) -> u32 { self.coins }
    pub fn distance(&self) -> f64 { self.distance }

    /// Credit one step of travel.  Returns the new level if this step
    /// crossed a level boundary.
    pub fn advance(&mut self, meters: f32, coins: u32, drift_seconds: f32) -> Option<u32> {
        let before = self.difficulty();

        self.distance += meters.max(0.0) as f64;
        self.coins += coins;
        self.bonus += coins as u64 * self.cfg.coin_score;

        self.drift_carry += drift_seconds.max(0.0) * self.cfg.drift_points_per_second;
        let whole = self.drift_carry.floor();
        self.bonus += whole as u64;
        self.drift_carry -= whole;

        let after = self.difficulty();
        if after > before {
            info!("level up: {} (score {})", after, self.score());
            Some(after)
        } else {
            None
        }
    }

    pub fn snapshot(&self, health: f32) -> ProgressionState {
        ProgressionState {
            score:      self.score(),
            difficulty: self.difficulty(),
            health,
            coins:      self.coins,
            distance:   self.distance,
        }
    }
}

/// Level 1 until the first threshold, then one level per `per_level` points.
pub fn level_for_score(score: u64, per_level: u64) -> u32 {
    (1 + score / per_level.max(1)).min(u32::MAX as u64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prog() -> Progression { Progression::new(ProgressionConfig::default()) }

    #[test]
    fn level_is_floor_division() {
        assert_eq!(level_for_score(0, 1000), 1);
        assert_eq!(level_for_score(999, 1000), 1);
        assert_eq!(level_for_score(1000, 1000), 2);
        assert_eq!(level_for_score(4321, 1000), 5);
    }

    #[test]
    fn score_follows_distance_not_time() {
        let mut p = prog();
        for _ in 0..600 { p.advance(0.0, 0, 0.0); }
        assert_eq!(p.score(), 0);
        p.advance(12.7, 0, 0.0);
        assert_eq!(p.score(), 12);
    }

    #[test]
    fn score_is_monotonic() {
        let mut p = prog();
        let mut last = 0;
        for i in 0..1000 {
            p.advance((i % 7) as f32 * 0.3, (i % 50 == 0) as u32, 0.01);
            assert!(p.score() >= last);
            last = p.score();
        }
    }

    #[test]
    fn level_up_reported_once() {
        let mut p = prog();
        assert_eq!(p.advance(999.0, 0, 0.0), None);
        assert_eq!(p.advance(1.0, 0, 0.0), Some(2));
        assert_eq!(p.advance(1.0, 0, 0.0), None);
        assert_eq!(p.difficulty(), 2);
    }

    #[test]
    fn coins_and_drift_add_bonus() {
        let mut p = prog();
        p.advance(0.0, 2, 0.0);
        assert_eq!(p.coins(), 2);
        assert_eq!(p.score(), 50);
        for _ in 0..60 { p.advance(0.0, 0, 1.0 / 60.0); }
        assert!(p.score() >= 89 && p.score() <= 90);
    }

    #[test]
    fn reset_restores_initial_state() {
        let mut p = prog();
        p.advance(5000.0, 3, 1.0);
        p.reset();
        assert_eq!(p.score(), 0);
        assert_eq!(p.difficulty(), 1);
        assert_eq!(p.coins(), 0);
    }
}
