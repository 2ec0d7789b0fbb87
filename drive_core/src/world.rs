//! World streaming — pooled obstacles and coins.
//!
//! The car sits at `z = 0` and the world flows toward it: entities are
//! spawned far ahead at negative `z`, move toward positive `z` at the car's
//! speed (minus their own, for traffic), and are recycled once they fall
//! behind.  Hits and pickups consume the entity on the spot.

use log::{debug, trace};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::pool::{EntityPool, Poolable};

// ════════════════════════════════════════════════════════════════════════════
// EntityKind / TrackEntity
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EntityKind {
    Traffic,
    Wall,
    #[default]
    Rock,
    Coin,
}

impl EntityKind {
    pub fn is_obstacle(&self) -> bool { !matches!(self, EntityKind::Coin) }
}

/// Lane-change state carried only by traffic.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrafficState {
    /// Seconds until the next lane decision.
    pub lane_timer:  f32,
    pub target_lane: usize,
    /// Forward speed of the traffic car itself (m/s).
    pub own_speed:   f32,
}

/// One pooled obstacle or pickup.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrackEntity {
    pub kind:    EntityKind,
    pub lane:    usize,
    /// Lateral position (m); traffic slides between lanes.
    pub x:       f32,
    /// Longitudinal position relative to the car; negative is ahead.
    pub z:       f32,
    /// `z` before the latest move; hit tests sweep from here to `z`.
    pub prev_z:  f32,
    pub active:  bool,
    pub traffic: Option<TrafficState>,
}

impl TrackEntity {
    /// Whether the stretch swept during the last move overlaps `±window`
    /// around the car, so a long frame cannot carry an entity past it.
    pub fn swept_within(&self, window: f32) -> bool {
        self.prev_z.min(self.z) < window && self.prev_z.max(self.z) > -window
    }
}

impl Poolable for TrackEntity {
    fn is_active(&self) -> bool { self.active }
    fn set_active(&mut self, active: bool) { self.active = active; }
}

// ════════════════════════════════════════════════════════════════════════════
// WorldConfig
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub max_obstacles: usize,
    pub max_coins:     usize,
    /// Lateral centres of the lanes (m).
    pub lanes:         Vec<f32>,
    pub spawn_distance: f32,
    /// Entities further behind the car than this are recycled.
    pub recycle_behind: f32,
    /// Entities further ahead than this are recycled too (fast traffic).
    pub recycle_ahead:  f32,
    /// Obstacle spawn attempts per second at difficulty 1.
    pub obstacle_rate:  f32,
    pub obstacle_rate_per_level: f32,
    pub min_traffic_gap: f32,
    pub traffic_weight: u32,
    pub wall_weight:    u32,
    pub rock_weight:    u32,
    pub traffic_speed_min: f32,
    pub traffic_speed_max: f32,
    pub lane_change_min: f32,
    pub lane_change_max: f32,
    /// Fraction of the lateral gap closed per second while changing lanes.
    pub lane_change_rate: f32,
    pub hit_window_z:   f32,
    pub car_half_width: f32,
    pub traffic_half_width: f32,
    pub wall_half_width:    f32,
    pub rock_half_width:    f32,
    pub traffic_damage: f32,
    pub wall_damage:    f32,
    pub rock_damage:    f32,
    /// Coin-run triggers per second.
    pub coin_rate:      f32,
    pub coin_run_length: usize,
    pub coin_spacing:   f32,
    /// From this level on, coin runs zig-zag.
    pub zigzag_level:   u32,
    pub zigzag_offset:  f32,
    pub pickup_window_z: f32,
    pub coin_half_width: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        WorldConfig {
            max_obstacles:           12,
            max_coins:               24,
            lanes:                   vec![-5.25, -1.75, 1.75, 5.25],
            spawn_distance:          220.0,
            recycle_behind:          15.0,
            recycle_ahead:           400.0,
            obstacle_rate:           0.8,
            obstacle_rate_per_level: 0.25,
            min_traffic_gap:         30.0,
            traffic_weight:          5,
            wall_weight:             2,
            rock_weight:             3,
            traffic_speed_min:       8.0,
            traffic_speed_max:       20.0,
            lane_change_min:         2.0,
            lane_change_max:         5.0,
            lane_change_rate:        2.5,
            hit_window_z:            2.5,
            car_half_width:          0.9,
            traffic_half_width:      1.0,
            wall_half_width:         1.6,
            rock_half_width:         0.7,
            traffic_damage:          35.0,
            wall_damage:             50.0,
            rock_damage:             20.0,
            coin_rate:               0.35,
            coin_run_length:         5,
            coin_spacing:            8.0,
            zigzag_level:            3,
            zigzag_offset:           1.2,
            pickup_window_z:         2.0,
            coin_half_width:         0.6,
        }
    }
}

impl WorldConfig {
    pub fn half_width(&self, kind: EntityKind) -> f32 {
        match kind {
            EntityKind::Traffic => self.traffic_half_width,
            EntityKind::Wall    => self.wall_half_width,
            EntityKind::Rock    => self.rock_half_width,
            EntityKind::Coin    => self.coin_half_width,
        }
    }

    pub fn damage(&self, kind: EntityKind) -> f32 {
        match kind {
            EntityKind::Traffic => self.traffic_damage,
            EntityKind::Wall    => self.wall_damage,
            EntityKind::Rock    => self.rock_damage,
            EntityKind::Coin    => 0.0,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lanes.is_empty() { return Err(ConfigError::NoLanes); }
        if self.max_obstacles == 0 { return Err(ConfigError::NotPositive("max_obstacles")); }
        if self.max_coins == 0     { return Err(ConfigError::NotPositive("max_coins")); }
        if self.spawn_distance <= 0.0 { return Err(ConfigError::NotPositive("spawn_distance")); }
        if self.traffic_weight + self.wall_weight + self.rock_weight == 0 {
            return Err(ConfigError::NotPositive("obstacle weights"));
        }
        if self.traffic_speed_min > self.traffic_speed_max
            || self.lane_change_min > self.lane_change_max
        {
            return Err(ConfigError::NotPositive("traffic ranges (max - min)"));
        }
        Ok(())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// WorldReport
// ════════════════════════════════════════════════════════════════════════════

/// Everything the car ran into during one update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorldReport {
    /// One entry per obstacle hit, in pool order.
    pub hits: Vec<EntityKind>,
    pub coins: u32,
    /// Entities recycled for falling out of range (hits and pickups excluded).
    pub recycled: usize,
}

// ════════════════════════════════════════════════════════════════════════════
// WorldManager
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct WorldManager {
    cfg:       WorldConfig,
    obstacles: EntityPool<TrackEntity>,
    coins:     EntityPool<TrackEntity>,
    rng:       ChaCha8Rng,
}

impl WorldManager {
    pub fn new(cfg: WorldConfig, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => ChaCha8Rng::seed_from_u64(s),
            None    => ChaCha8Rng::from_entropy(),
        };
        WorldManager {
            obstacles: EntityPool::new(cfg.max_obstacles),
            coins:     EntityPool::new(cfg.max_coins),
            cfg,
            rng,
        }
    }

    pub fn config(&self) -> &WorldConfig { &self.cfg }

    /// Empty both pools; used at race (re)start.
    pub fn clear(&mut self) {
        self.obstacles.clear();
        self.coins.clear();
    }

    pub fn obstacles(&self) -> impl Iterator<Item = &TrackEntity> { self.obstacles.iter_active() }
    pub fn coins(&self) -> impl Iterator<Item = &TrackEntity> { self.coins.iter_active() }
    pub fn obstacle(&self, idx: usize) -> Option<&TrackEntity> { self.obstacles.get(idx) }
    pub fn active_obstacles(&self) -> usize { self.obstacles.active_count() }
    pub fn active_coins(&self) -> usize { self.coins.active_count() }

    fn lane_x(&self, lane: usize) -> f32 {
        self.cfg.lanes[lane.min(self.cfg.lanes.len() - 1)]
    }

    // ── spawning ──────────────────────────────────────────────────────────

    /// Place an obstacle of `kind` in `lane` at `z`.
    ///
    /// Returns `None` when the pool is full, or when `kind` is traffic and
    /// another traffic car is closer than the minimum gap.
    pub fn spawn_obstacle(&mut self, kind: EntityKind, lane: usize, z: f32) -> Option<usize> {
        if !kind.is_obstacle() { return None; }
        if self.obstacles.is_full() {
            trace!("obstacle pool full, skipping {:?}", kind);
            return None;
        }
        let traffic = if kind == EntityKind::Traffic {
            let gap = self.cfg.min_traffic_gap;
            let crowded = self.obstacles.iter_active()
                .any(|e| e.kind == EntityKind::Traffic && (e.z - z).abs() < gap);
            if crowded {
                trace!("traffic gap violated at z={:.1}, skipping", z);
                return None;
            }
            Some(TrafficState {
                lane_timer:  self.rng.gen_range(self.cfg.lane_change_min..=self.cfg.lane_change_max),
                target_lane: lane,
                own_speed:   self.rng.gen_range(self.cfg.traffic_speed_min..=self.cfg.traffic_speed_max),
            })
        } else {
            None
        };

        let lane = lane.min(self.cfg.lanes.len() - 1);
        let x = self.lane_x(lane);
        self.obstacles.spawn(|e| {
            e.kind = kind;
            e.lane = lane;
            e.x = x;
            e.z = z;
            e.prev_z = z;
            e.traffic = traffic;
        })
    }

    /// One random obstacle far ahead.
    pub fn try_spawn_obstacle(&mut self) -> Option<usize> {
        let c = &self.cfg;
        let total = c.traffic_weight + c.wall_weight + c.rock_weight;
        let roll = self.rng.gen_range(0..total);
        let kind = if roll < c.traffic_weight {
            EntityKind::Traffic
        } else if roll < c.traffic_weight + c.wall_weight {
            EntityKind::Wall
        } else {
            EntityKind::Rock
        };
        let lane = self.rng.gen_range(0..c.lanes.len());
        let z = -c.spawn_distance;
        self.spawn_obstacle(kind, lane, z)
    }

    /// A short run of coins starting far ahead.  Returns how many spawned;
    /// the run is cut short if the pool fills up.
    pub fn spawn_coin_run(&mut self, level: u32) -> usize {
        let lane = self.rng.gen_range(0..self.cfg.lanes.len());
        let base_x = self.lane_x(lane);
        let lo = self.cfg.lanes.iter().cloned().fold(f32::INFINITY, f32::min);
        let hi = self.cfg.lanes.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let zigzag = level >= self.cfg.zigzag_level;

        let mut spawned = 0;
        for i in 0..self.cfg.coin_run_length {
            let offset = if zigzag {
                if i % 2 == 0 { self.cfg.zigzag_offset } else { -self.cfg.zigzag_offset }
            } else {
                0.0
            };
            let x = (base_x + offset).clamp(lo, hi);
            let z = -self.cfg.spawn_distance - i as f32 * self.cfg.coin_spacing;
            let placed = self.coins.spawn(|e| {
                e.kind = EntityKind::Coin;
                e.lane = lane;
                e.x = x;
                e.z = z;
                e.prev_z = z;
            });
            if placed.is_none() {
                trace!("coin pool full after {} of run", spawned);
                break;
            }
            spawned += 1;
        }
        spawned
    }

    // ── per-tick update ───────────────────────────────────────────────────

    /// Spawn, move, collide and recycle for one step of `dt` seconds with
    /// the car at lateral `car_x` travelling at `speed`.
    pub fn update(&mut self, dt: f32, speed: f32, car_x: f32, level: u32) -> WorldReport {
        let mut report = WorldReport::default();

        // ── spawn attempts ────────────────────────────────────────────────
        let rate = self.cfg.obstacle_rate
            + self.cfg.obstacle_rate_per_level * level.saturating_sub(1) as f32;
        if self.rng.gen::<f32>() < (rate * dt).min(1.0) {
            self.try_spawn_obstacle();
        }
        if self.rng.gen::<f32>() < (self.cfg.coin_rate * dt).min(1.0) {
            self.spawn_coin_run(level);
        }

        // ── movement ──────────────────────────────────────────────────────
        let cfg = &self.cfg;
        let rng = &mut self.rng;
        for e in self.obstacles.iter_active_mut() {
            e.prev_z = e.z;
            match e.traffic.as_mut() {
                Some(t) => {
                    e.z += (speed - t.own_speed) * dt;
                    t.lane_timer -= dt;
                    if t.lane_timer <= 0.0 {
                        t.target_lane = neighbour_lane(rng, t.target_lane, cfg.lanes.len());
                        t.lane_timer = rng.gen_range(cfg.lane_change_min..=cfg.lane_change_max);
                    }
                    let target_x = cfg.lanes[t.target_lane];
                    e.x += (target_x - e.x) * (cfg.lane_change_rate * dt).min(1.0);
                    e.lane = t.target_lane;
                }
                None => e.z += speed * dt,
            }
        }
        for c in self.coins.iter_active_mut() {
            c.prev_z = c.z;
            c.z += speed * dt;
        }

        // ── collisions ────────────────────────────────────────────────────
        let hits = &mut report.hits;
        self.obstacles.recycle_where(|e| {
            let hit = e.swept_within(cfg.hit_window_z)
                && (e.x - car_x).abs() < cfg.half_width(e.kind) + cfg.car_half_width;
            if hit { hits.push(e.kind); }
            hit
        });
        let picked = self.coins.recycle_where(|c| {
            c.swept_within(cfg.pickup_window_z)
                && (c.x - car_x).abs() < cfg.coin_half_width + cfg.car_half_width
        });
        report.coins = picked as u32;

        // ── recycle out-of-range ──────────────────────────────────────────
        let out_of_range = |e: &TrackEntity| e.z > cfg.recycle_behind || e.z < -cfg.recycle_ahead;
        report.recycled = self.obstacles.recycle_where(out_of_range)
            + self.coins.recycle_where(out_of_range);

        if !report.hits.is_empty() {
            debug!("hit {:?} at car_x={:.2}", report.hits, car_x);
        }
        report
    }
}

/// Pick a lane next to `lane`, staying on the road.
fn neighbour_lane(rng: &mut ChaCha8Rng, lane: usize, lanes: usize) -> usize {
    if lanes <= 1 { return 0; }
    if lane == 0 { return 1; }
    if lane + 1 >= lanes { return lanes - 2; }
    if rng.gen_bool(0.5) { lane - 1 } else { lane + 1 }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
