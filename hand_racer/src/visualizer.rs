//! Software-rendered track view and HUD using `minifb`.
//!
//! Layout:
//!
//! ```text
//! ┌──────────────────────────────┬──────────────────────────┐
//! │▌ :    :    :    ▐            │  SCORE / LEVEL / COINS   │
//! │▌ :  [T]    :    ▐            │  SPEED  GEAR             │
//! │▌ :    :  o :    ▐            │  HEALTH ██████▒▒▒        │
//! │▌ :    :  o :  # ▐            │  GAS · JOYSTICK          │
//! │▌ :    :    :    ▐            │  ┌ hand skeleton ─────┐  │
//! │▌ :   [car] :    ▐            │  └────────────────────┘  │
//! │▌ :    :    :    ▐            │  LEADERBOARD             │
//! ├──────────────────────────────┴──────────────────────────┤
//! │ status line · key legend                                │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! The car is fixed near the bottom of the road; the world scrolls down
//! toward it.

use std::sync::mpsc::Sender;
use std::time::Duration;

use minifb::{Key, KeyRepeat, Window, WindowOptions};

use drive_core::landmarks::LANDMARK_COUNT;
use drive_core::race::{GameState, RaceView, RenderSurface};
use drive_core::world::EntityKind;
use drive_core::DriveState;
use race_store::{Leaderboard, Profile};

use crate::error::AppError;
use crate::hud::{blend, health_color, hsv_to_argb, HudState};
use crate::input::{SimInput, SimKey};

// ════════════════════════════════════════════════════════════════════════════
// Layout constants
// ════════════════════════════════════════════════════════════════════════════

pub const WIN_W:     usize = 1000;
pub const WIN_H:     usize = 660;
const STATUS_H:      i32   = 36;
const PANEL_X:       i32   = 500;
const ROAD_CX:       i32   = 250;
/// Horizontal pixels per metre.
const PX_PER_M:      f32   = 30.0;
/// Vertical pixels per metre of track.
const PX_PER_M_Z:    f32   = 2.4;
const CAR_Y:         i32   = WIN_H as i32 - STATUS_H - 90;
const CAR_W:         i32   = 54;
const CAR_H:         i32   = 46;
const STRIPE_PERIOD: f32   = 12.0;
const STRIPE_LEN:    f32   = 5.0;

const GRASS:     u32 = 0xFF2E5E2E;
const ASPHALT:   u32 = 0xFF3A3A40;
const STRIPE:    u32 = 0xFFE8E8E8;
const BARRIER_A: u32 = 0xFFD03030;
const BARRIER_B: u32 = 0xFFF0F0F0;
const PANEL_BG:  u32 = 0xFF16213E;
const TEXT_BG:   u32 = 0xFF0F3460;
const TEXT:      u32 = 0xFFEEEEEE;
const DIM:       u32 = 0xFF8888AA;
const GOLD:      u32 = 0xFFFFD700;
const COIN:      u32 = 0xFFFFC83C;
const WALL:      u32 = 0xFF9A9A9A;
const ROCK:      u32 = 0xFF7A5A3A;

// ════════════════════════════════════════════════════════════════════════════
// Canvas — pixel buffer plus drawing primitives
// ════════════════════════════════════════════════════════════════════════════

/// Off-screen ARGB buffer, `WIN_W × WIN_H`.  All coordinates are signed and
/// clipped, so shapes may hang off any edge.
pub struct Canvas {
    pub buf: Vec<u32>,
}

impl Default for Canvas {
    fn default() -> Self { Canvas { buf: vec![0xFF000000; WIN_W * WIN_H] } }
}

impl Canvas {
    pub fn pixel(&self, x: i32, y: i32) -> Option<u32> {
        if x < 0 || y < 0 || x >= WIN_W as i32 || y >= WIN_H as i32 { return None; }
        Some(self.buf[y as usize * WIN_W + x as usize])
    }

    fn set_pixel(&mut self, x: i32, y: i32, color: u32) {
        if x >= 0 && y >= 0 && (x as usize) < WIN_W && (y as usize) < WIN_H {
            self.buf[y as usize * WIN_W + x as usize] = color;
        }
    }

    fn fill_rect(&mut self, x: i32, y: i32, w: i32, h: i32, color: u32) {
        let (x0, x1) = (x.clamp(0, WIN_W as i32), (x + w).clamp(0, WIN_W as i32));
        let (y0, y1) = (y.clamp(0, WIN_H as i32), (y + h).clamp(0, WIN_H as i32));
        if x1 <= x0 { return; }
        for row in y0..y1 {
            let base = row as usize * WIN_W;
            self.buf[base + x0 as usize..base + x1 as usize].fill(color);
        }
    }

    fn draw_border(&mut self, x: i32, y: i32, w: i32, h: i32, thick: i32, color: u32) {
        self.fill_rect(x, y, w, thick, color);
        self.fill_rect(x, y + h - thick, w, thick, color);
        self.fill_rect(x, y, thick, h, color);
        self.fill_rect(x + w - thick, y, thick, h, color);
    }

    fn disc(&mut self, cx: i32, cy: i32, r: i32, color: u32) {
        for dy in -r..=r {
            let half = ((r * r - dy * dy) as f32).sqrt() as i32;
            self.fill_rect(cx - half, cy + dy, half * 2 + 1, 1, color);
        }
    }

    /// Bresenham line.
    fn line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: u32) {
        let (dx, dy) = ((x1 - x0).abs(), -(y1 - y0).abs());
        let (sx, sy) = (if x0 < x1 { 1 } else { -1 }, if y0 < y1 { 1 } else { -1 });
        let (mut x, mut y, mut err) = (x0, y0, dx + dy);
        loop {
            self.set_pixel(x, y, color);
            if x == x1 && y == y1 { break; }
            let e2 = 2 * err;
            if e2 >= dy { err += dy; x += sx; }
            if e2 <= dx { err += dx; y += sy; }
        }
    }

    /// Draw `text` with the 3×5 font, each font pixel `scale` screen pixels.
    fn text(&mut self, text: &str, x: i32, y: i32, scale: i32, color: u32) {
        let mut cx = x;
        for ch in text.chars() {
            let bits = glyph(ch);
            for row in 0..5 {
                for col in 0..3 {
                    if bits & (1 << (14 - row * 3 - col)) != 0 {
                        self.fill_rect(cx + col * scale, y + row * scale, scale, scale, color);
                    }
                }
            }
            cx += 4 * scale;
        }
    }

    fn text_centered(&mut self, text: &str, cx: i32, y: i32, scale: i32, color: u32) {
        self.text(text, cx - text_width(text, scale) / 2, y, scale, color);
    }

    /// Centred message, shrunk to scale 1 if it would overflow the scene.
    fn notice(&mut self, text: &str, y: i32, color: u32) {
        let scale = if text_width(text, 2) > PANEL_X - 20 { 1 } else { 2 };
        self.text_centered(text, PANEL_X / 2, y, scale, color);
    }
}

pub fn text_width(text: &str, scale: i32) -> i32 {
    (text.chars().count() as i32 * 4 - 1).max(0) * scale
}

// ════════════════════════════════════════════════════════════════════════════
// Track scene
// ════════════════════════════════════════════════════════════════════════════

fn screen_x(x_m: f32) -> i32 { ROAD_CX + (x_m * PX_PER_M).round() as i32 }
fn screen_y(z_m: f32) -> i32 { CAR_Y + (z_m * PX_PER_M_Z).round() as i32 }

/// First stripe position for a travelled distance; stripes move toward
/// the car as distance grows.
fn stripe_offset(distance: f64) -> f32 {
    (distance as f32).rem_euclid(STRIPE_PERIOD)
}

impl RenderSurface for Canvas {
    fn present(&mut self, view: &RaceView<'_>) {
        let half = view.track_half_width;
        let road_l = screen_x(-half);
        let road_r = screen_x(half);
        let bottom = WIN_H as i32 - STATUS_H;

        self.fill_rect(0, 0, PANEL_X, bottom, GRASS);
        self.fill_rect(road_l, 0, road_r - road_l, bottom, ASPHALT);

        // ── barriers and stripes ──────────────────────────────────────────
        let offset = stripe_offset(view.progression.distance);
        let far = -(CAR_Y as f32) / PX_PER_M_Z;
        let lanes: Vec<f32> = view.world.config().lanes.clone();
        let mut z = far - STRIPE_PERIOD + offset;
        let mut k = 0;
        while z < (bottom - CAR_Y) as f32 / PX_PER_M_Z {
            let y0 = screen_y(z);
            let h = (STRIPE_LEN * PX_PER_M_Z) as i32;
            for pair in lanes.windows(2) {
                let x = screen_x((pair[0] + pair[1]) * 0.5);
                self.fill_rect(x - 2, y0, 4, h, STRIPE);
            }
            let color = if k % 2 == 0 { BARRIER_A } else { BARRIER_B };
            self.fill_rect(road_l - 8, y0, 8, (STRIPE_PERIOD * PX_PER_M_Z) as i32, color);
            self.fill_rect(road_r, y0, 8, (STRIPE_PERIOD * PX_PER_M_Z) as i32, color);
            z += STRIPE_PERIOD;
            k += 1;
        }

        // ── entities ──────────────────────────────────────────────────────
        let cfg = view.world.config();
        for c in view.world.coins() {
            self.disc(screen_x(c.x), screen_y(c.z), 7, COIN);
        }
        for e in view.world.obstacles() {
            let w = (cfg.half_width(e.kind) * 2.0 * PX_PER_M) as i32;
            let (x, y) = (screen_x(e.x), screen_y(e.z));
            match e.kind {
                EntityKind::Traffic => {
                    let body = hsv_to_argb(e.lane as f32 * 77.0 + 200.0, 0.6, 0.85);
                    self.fill_rect(x - w / 2, y - 20, w, 40, body);
                    self.fill_rect(x - w / 2 + 6, y - 12, w - 12, 10, 0xFF202830);
                }
                EntityKind::Wall => {
                    self.fill_rect(x - w / 2, y - 7, w, 14, WALL);
                    self.draw_border(x - w / 2, y - 7, w, 14, 2, BARRIER_A);
                }
                EntityKind::Rock => self.disc(x, y, w / 2, ROCK),
                EntityKind::Coin => {}
            }
        }

        // ── the car ───────────────────────────────────────────────────────
        let car = view.vehicle;
        let cx = screen_x(car.lateral_x + car.jitter);
        if view.drifting {
            for i in 0..6 {
                let spread = (i as f32 - 2.5) * 6.0;
                self.disc(cx + spread as i32, CAR_Y + CAR_H / 2 + 6 + (i % 2) * 4, 4, 0xFFB0B0B0);
            }
        }
        // rows shear sideways with yaw
        for row in 0..CAR_H {
            let shear = (car.yaw * (row - CAR_H / 2) as f32) as i32;
            let color = if row < 10 || row > CAR_H - 8 { blend(view.car.color, 0xFF000000, 0.3) } else { view.car.color };
            self.fill_rect(cx - CAR_W / 2 + shear, CAR_Y - CAR_H / 2 + row, CAR_W, 1, color);
        }
        if view.critical {
            self.draw_border(cx - CAR_W / 2 - 3, CAR_Y - CAR_H / 2 - 3, CAR_W + 6, CAR_H + 6, 2, BARRIER_A);
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Screen — one frame of everything the window shows
// ════════════════════════════════════════════════════════════════════════════

pub struct Screen<'a> {
    pub view:        RaceView<'a>,
    pub hud:         &'a HudState,
    pub profile:     &'a Profile,
    pub leaderboard: &'a Leaderboard,
    /// Startup or purchase message shown on the start screen.
    pub notice:      Option<&'a str>,
    /// Leaderboard row of the last finished race.
    pub last_rank:   Option<usize>,
    /// Monotonic seconds, for blinking.
    pub time:        f32,
}

/// Hand bones as landmark index pairs.
const HAND_BONES: [(usize, usize); 20] = [
    (0, 1), (1, 2), (2, 3), (3, 4),
    (0, 5), (5, 6), (6, 7), (7, 8),
    (0, 9), (9, 10), (10, 11), (11, 12),
    (0, 13), (13, 14), (14, 15), (15, 16),
    (0, 17), (17, 18), (18, 19), (19, 20),
];

impl Canvas {
    /// Whole frame: scene, side panel, overlays.
    pub fn draw_screen(&mut self, s: &Screen<'_>) {
        self.present(&s.view);
        self.draw_panel(s);
        self.draw_overlays(s);

        // ── status bar ────────────────────────────────────────────────────
        let y = WIN_H as i32 - STATUS_H;
        self.fill_rect(0, y, WIN_W as i32, STATUS_H, TEXT_BG);
        self.text(&s.hud.status, 10, y + 6, 2, TEXT);
        self.text(
            "ARROWS=HAND  UP=OPEN  DOWN=FIST  W=WHEEL  P=PAUSE  R=RESTART  G=CAR  B=BUY  Q=QUIT",
            10, y + 24, 1, DIM,
        );
    }

    fn draw_panel(&mut self, s: &Screen<'_>) {
        let v = &s.view;
        let x = PANEL_X + 16;
        self.fill_rect(PANEL_X, 0, WIN_W as i32 - PANEL_X, WIN_H as i32 - STATUS_H, PANEL_BG);

        let p = v.progression;
        self.text(&format!("SCORE {}", p.score), x, 14, 4, GOLD);
        self.text(&format!("LEVEL {}   COINS {}", p.difficulty, p.coins), x, 42, 2, TEXT);
        self.text(
            &format!("{:>3.0} KPH   GEAR {}", v.vehicle.kph(), v.vehicle.gear()),
            x, 62, 3, TEXT,
        );

        // ── health ────────────────────────────────────────────────────────
        let bar_w = 300;
        let filled = (bar_w as f32 * (v.vehicle.health / 100.0).clamp(0.0, 1.0)) as i32;
        self.fill_rect(x, 92, bar_w, 14, 0xFF303040);
        self.fill_rect(x, 92, filled, 14, health_color(v.vehicle.health));
        self.draw_border(x, 92, bar_w, 14, 1, DIM);
        self.text(&format!("{:.0}", v.vehicle.health), x + bar_w + 8, 94, 2, TEXT);
        if v.critical && (s.time * 4.0) as i32 % 2 == 0 {
            self.text("CRITICAL", x, 112, 2, BARRIER_A);
        }
        if v.drifting {
            self.text("DRIFT!", x + 120, 112, 2, GOLD);
        }

        // ── control ───────────────────────────────────────────────────────
        let sig = v.signal;
        let drive_color = match sig.drive_state {
            DriveState::Gas     => 0xFF50D070,
            DriveState::Brake   => 0xFFE04848,
            DriveState::Neutral => DIM,
        };
        let mode = match (v.hands.len(), sig.two_hand_mode) {
            (0, _)     => "NO HANDS",
            (_, true)  => "WHEEL",
            (_, false) => "JOYSTICK",
        };
        self.text(sig.drive_state.label(), x, 134, 3, drive_color);
        self.text(mode, x + 150, 136, 2, TEXT);

        // steer bar: target above, actual below
        let (bar_x, bar_y, half_w) = (x, 160, 150);
        self.fill_rect(bar_x, bar_y, half_w * 2, 12, 0xFF303040);
        self.fill_rect(bar_x + half_w - 1, bar_y - 2, 2, 16, DIM);
        let t = (sig.target_steer() * half_w as f32) as i32;
        let c = (v.vehicle.current_steer * half_w as f32) as i32;
        self.fill_rect(bar_x + half_w + t.min(0), bar_y, t.abs(), 5, GOLD);
        self.fill_rect(bar_x + half_w + c.min(0), bar_y + 7, c.abs(), 5, TEXT);

        // wheel gauge
        if sig.two_hand_mode {
            let (gx, gy, r) = (x + 360, 166, 26);
            let a = sig.virtual_wheel_angle.to_radians();
            let (dx, dy) = ((a.cos() * r as f32) as i32, (a.sin() * r as f32) as i32);
            self.line(gx - dx, gy - dy, gx + dx, gy + dy, GOLD);
            self.disc(gx, gy, 3, GOLD);
        }

        // ── skeleton ──────────────────────────────────────────────────────
        let (bx, by, bw, bh) = (x, 190, 440, 180);
        self.fill_rect(bx, by, bw, bh, 0xFF0C1628);
        self.draw_border(bx, by, bw, bh, 1, DIM);
        for hand in v.hands {
            if hand.points.len() != LANDMARK_COUNT { continue; }
            let pt = |i: usize| {
                let l = hand.points[i];
                (bx + (l.x.clamp(0.0, 1.0) * bw as f32) as i32, by + (l.y.clamp(0.0, 1.0) * bh as f32) as i32)
            };
            for &(a, b) in &HAND_BONES {
                let (p, q) = (pt(a), pt(b));
                self.line(p.0, p.1, q.0, q.1, 0xFF6FD0FF);
            }
            for i in 0..LANDMARK_COUNT {
                let (px, py) = pt(i);
                self.fill_rect(px - 1, py - 1, 3, 3, TEXT);
            }
        }

        // ── leaderboard ───────────────────────────────────────────────────
        let ly = 390;
        self.text("LEADERBOARD", x, ly, 2, GOLD);
        for (i, e) in s.leaderboard.entries().iter().enumerate() {
            let color = if s.last_rank == Some(i) { GOLD } else { TEXT };
            let name: String = e.name.chars().take(10).collect();
            self.text(
                &format!("{:>2}. {:<10} {:>7} {}", i + 1, name, e.score, e.car),
                x, ly + 20 + i as i32 * 16, 2, color,
            );
        }
    }

    fn draw_overlays(&mut self, s: &Screen<'_>) {
        let v = &s.view;
        let mid = PANEL_X / 2;

        // crash flash
        let flash = s.hud.flash.intensity();
        if flash > 0.0 {
            let edge = blend(ASPHALT, 0xFFFF2020, flash);
            self.draw_border(0, 0, PANEL_X, WIN_H as i32 - STATUS_H, 10, edge);
        }

        // level banner slides down from the top
        let vis = s.hud.banner.visibility();
        if vis > 0.0 {
            let y = (-50.0 + vis * 110.0) as i32;
            self.fill_rect(mid - 120, y, 240, 44, TEXT_BG);
            self.draw_border(mid - 120, y, 240, 44, 2, GOLD);
            self.text_centered(&format!("LEVEL {}", s.hud.banner.level), mid, y + 10, 5, GOLD);
        }

        match v.state {
            GameState::Running => {}
            GameState::Paused => {
                self.dim_scene();
                self.text_centered("PAUSED", mid, 220, 8, TEXT);
                self.text_centered("P TO RESUME", mid, 280, 3, DIM);
            }
            GameState::Ready => {
                self.dim_scene();
                self.text_centered("HAND RACER", mid, 140, 7, GOLD);
                self.text_centered(&format!("CAR: {}", v.car.name), mid, 220, 3, TEXT);
                self.text_centered(&format!("BANK: {} COINS", s.profile.coins), mid, 250, 3, TEXT);
                if let Some(best) = s.leaderboard.best() {
                    self.text_centered(&format!("BEST {} BY {}", best.score, best.name), mid, 275, 2, GOLD);
                }
                self.text_centered("ENTER TO START", mid, 300, 3, TEXT);
                self.text_centered("G = NEXT CAR   B = BUY CAR", mid, 330, 2, DIM);
                if let Some(n) = s.notice {
                    self.notice(n, 380, BARRIER_A);
                }
            }
            GameState::Over => {
                self.dim_scene();
                self.text_centered("WRECKED", mid, 150, 8, BARRIER_A);
                self.text_centered(&format!("SCORE {}", v.progression.score), mid, 220, 4, GOLD);
                self.text_centered(&format!("{:.0} M   {} COINS", v.progression.distance, v.progression.coins), mid, 260, 3, TEXT);
                if let Some(r) = s.last_rank {
                    self.text_centered(&format!("NEW HIGH SCORE #{}", r + 1), mid, 295, 3, GOLD);
                }
                self.text_centered("R OR ENTER TO RACE AGAIN", mid, 340, 2, TEXT);
                if let Some(n) = s.notice {
                    self.notice(n, 370, DIM);
                }
            }
        }
    }

    fn dim_scene(&mut self) {
        let bottom = WIN_H - STATUS_H as usize;
        for row in 0..bottom {
            for px in &mut self.buf[row * WIN_W..row * WIN_W + PANEL_X as usize] {
                *px = blend(*px, 0xFF000000, 0.6);
            }
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Visualizer — the window
// ════════════════════════════════════════════════════════════════════════════

/// Commands the window turns into app actions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppKey {
    Start,
    TogglePause,
    Restart,
    CycleCar,
    BuyCar,
    Quit,
}

/// Arrow/W keys and the hand-rig keys they drive.
const RIG_KEYS: [(Key, SimKey); 5] = [
    (Key::Left,  SimKey::SteerLeft),
    (Key::Right, SimKey::SteerRight),
    (Key::Up,    SimKey::Open),
    (Key::Down,  SimKey::Fist),
    (Key::W,     SimKey::WheelGrip),
];

pub struct Visualizer {
    window: Window,
    canvas: Canvas,
    sim_tx: Sender<SimInput>,
}

impl Visualizer {
    pub fn new(sim_tx: Sender<SimInput>, frame_interval: Duration) -> Result<Self, AppError> {
        let mut window = Window::new(
            "Hand Racer",
            WIN_W, WIN_H,
            WindowOptions { resize: false, ..WindowOptions::default() },
        ).map_err(|e| AppError::Window(e.to_string()))?;
        window.limit_update_rate(Some(frame_interval));

        Ok(Visualizer { window, canvas: Canvas::default(), sim_tx })
    }

    pub fn is_open(&self) -> bool { self.window.is_open() }

    /// Forward rig keys to the hand rig and return this frame's app keys.
    pub fn poll_input(&mut self) -> Vec<AppKey> {
        for (key, sim) in RIG_KEYS {
            if self.window.is_key_pressed(key, KeyRepeat::No) {
                let _ = self.sim_tx.send(SimInput::KeyDown(sim));
            }
            if self.window.is_key_released(key) {
                let _ = self.sim_tx.send(SimInput::KeyUp(sim));
            }
        }

        let pressed = |k: Key| self.window.is_key_pressed(k, KeyRepeat::No);
        let mut keys = Vec::new();
        if pressed(Key::Escape) || pressed(Key::Q) { keys.push(AppKey::Quit); }
        if pressed(Key::Enter)                     { keys.push(AppKey::Start); }
        if pressed(Key::P) || pressed(Key::Space)  { keys.push(AppKey::TogglePause); }
        if pressed(Key::R)                         { keys.push(AppKey::Restart); }
        if pressed(Key::G)                         { keys.push(AppKey::CycleCar); }
        if pressed(Key::B)                         { keys.push(AppKey::BuyCar); }
        keys
    }

    pub fn render(&mut self, screen: &Screen<'_>) {
        self.canvas.draw_screen(screen);
        self.window.update_with_buffer(&self.canvas.buf, WIN_W, WIN_H).ok();
    }
}

// ────────────────────────────────────────────────────────────────────────────
// 3×5 font, packed: five 3-bit rows, top row in the high bits
// ────────────────────────────────────────────────────────────────────────────

fn glyph(c: char) -> u16 {
    match c.to_ascii_uppercase() {
        '0'  => 0x7B6F,
        '1'  => 0x2C97,
        '2'  => 0x73E7,
        '3'  => 0x73CF,
        '4'  => 0x5BC9,
        '5'  => 0x79CF,
        '6'  => 0x79EF,
        '7'  => 0x7249,
        '8'  => 0x7BEF,
        '9'  => 0x7BCF,
        'A'  => 0x2BED,
        'B'  => 0x6BAE,
        'C'  => 0x3923,
        'D'  => 0x6B6E,
        'E'  => 0x79A7,
        'F'  => 0x79A4,
        'G'  => 0x396B,
        'H'  => 0x5BED,
        'I'  => 0x7497,
        'J'  => 0x126A,
        'K'  => 0x5BAD,
        'L'  => 0x4927,
        'M'  => 0x5FED,
        'N'  => 0x6B6D,
        'O'  => 0x2B6A,
        'P'  => 0x6BA4,
        'Q'  => 0x2B73,
        'R'  => 0x6BAD,
        'S'  => 0x388E,
        'T'  => 0x7492,
        'U'  => 0x5B6F,
        'V'  => 0x5B6A,
        'W'  => 0x5BFD,
        'X'  => 0x5AAD,
        'Y'  => 0x5A92,
        'Z'  => 0x72A7,
        '-'  => 0x01C0,
        '.'  => 0x0002,
        ','  => 0x0014,
        ':'  => 0x0410,
        '='  => 0x0E38,
        '+'  => 0x05D0,
        '/'  => 0x12A4,
        '!'  => 0x2482,
        '?'  => 0x6282,
        '#'  => 0x5F7D,
        '('  => 0x1491,
        ')'  => 0x4494,
        '<'  => 0x1511,
        '>'  => 0x4454,
        '%'  => 0x52A5,
        '\'' => 0x2400,
        '*'  => 0x0AA8,
        ' '  => 0x0000,
        _    => 0x0080, // centre dot
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use drive_core::cars;
    use drive_core::race::Race;
    use drive_core::scheduler::ManualClock;
    use drive_core::world::WorldConfig;
    use drive_core::Tuning;

    fn race() -> Race<ManualClock> {
        let tuning = Tuning {
            world: WorldConfig { obstacle_rate: 0.0, coin_rate: 0.0, ..WorldConfig::default() },
            ..Tuning::default()
        };
        Race::new(tuning, cars::starter(), ManualClock::default(), Some(1)).unwrap()
    }

    #[test]
    fn glyphs_fit_the_grid() {
        for c in "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ-.,:=+/!?#()<>%'* ".chars() {
            assert!(glyph(c) < 1 << 15, "glyph {:?} overflows", c);
        }
        assert_eq!(glyph('a'), glyph('A'));
        assert_eq!(glyph(' '), 0);
    }

    #[test]
    fn text_width_counts_gaps() {
        assert_eq!(text_width("", 2), 0);
        assert_eq!(text_width("A", 1), 3);
        assert_eq!(text_width("AB", 2), 14);
    }

    #[test]
    fn shapes_clip_at_edges() {
        let mut c = Canvas::default();
        c.fill_rect(-50, -50, 100, 100, 0xFFFFFFFF);
        c.fill_rect(WIN_W as i32 - 5, WIN_H as i32 - 5, 100, 100, 0xFFFFFFFF);
        c.line(-10, -10, WIN_W as i32 + 10, WIN_H as i32 + 10, 0xFF00FF00);
        c.disc(0, 0, 30, 0xFF0000FF);
        assert_eq!(c.pixel(10, 10), Some(0xFF0000FF));
        assert_eq!(c.pixel(WIN_W as i32 - 1, WIN_H as i32 - 1), Some(0xFF00FF00));
        assert_eq!(c.pixel(-1, 0), None);
    }

    #[test]
    fn car_is_drawn_in_its_colour() {
        let r = race();
        let mut c = Canvas::default();
        c.present(&r.view());
        assert_eq!(c.pixel(screen_x(0.0), CAR_Y), Some(r.car().color));
    }

    #[test]
    fn stripes_follow_distance() {
        assert_eq!(stripe_offset(0.0), 0.0);
        assert!((stripe_offset(STRIPE_PERIOD as f64 * 4.0 + 3.0) - 3.0).abs() < 1e-3);
    }

    #[test]
    fn full_screen_renders_every_state() {
        let mut r = race();
        let hud = HudState::default();
        let profile = Profile::default();
        let board = Leaderboard::default();
        let mut c = Canvas::default();
        let draw = |r: &Race<ManualClock>, c: &mut Canvas| {
            c.draw_screen(&Screen {
                view: r.view(), hud: &hud, profile: &profile, leaderboard: &board,
                notice: Some("NO DEVICE"), last_rank: None, time: 0.0,
            });
        };
        draw(&r, &mut c);
        r.start(&mut drive_core::landmarks::NoHands).unwrap();
        draw(&r, &mut c);
        r.pause();
        draw(&r, &mut c);
        assert_eq!(c.pixel(PANEL_X + 1, 1), Some(PANEL_BG));
    }
}
