//! HUD animation state.
//!
//! Pure data, advanced once per frame by the app and read by the
//! visualizer: crash flash, level-up banner, status line and colour
//! helpers.

use drive_core::race::StepReport;

// ════════════════════════════════════════════════════════════════════════════
// Colour helpers
// ════════════════════════════════════════════════════════════════════════════

/// Convert HSV → packed ARGB (0xAARRGGBB, A=0xFF).
pub fn hsv_to_argb(h: f32, s: f32, v: f32) -> u32 {
    let h  = h.rem_euclid(360.0);
    let hi = (h / 60.0) as u32;
    let f  = h / 60.0 - hi as f32;
    let p  = v * (1.0 - s);
    let q  = v * (1.0 - s * f);
    let t  = v * (1.0 - s * (1.0 - f));
    let (r, g, b) = match hi {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };
    let ri = (r * 255.0) as u32;
    let gi = (g * 255.0) as u32;
    let bi = (b * 255.0) as u32;
    0xFF000000 | (ri << 16) | (gi << 8) | bi
}

/// Health bar colour: green when full, through yellow, to red when empty.
pub fn health_color(health: f32) -> u32 {
    let frac = (health / 100.0).clamp(0.0, 1.0);
    hsv_to_argb(frac * 120.0, 0.85, 0.9)
}

/// Alpha-blend two ARGB colours. `t` = 0.0 → all `a`, `t` = 1.0 → all `b`.
pub fn blend(a: u32, b: u32, t: f32) -> u32 {
    let t = t.clamp(0.0, 1.0);
    let lerp = |ca: u32, cb: u32| (ca as f32 * (1.0 - t) + cb as f32 * t) as u32;
    let ar = (a >> 16) & 0xFF; let br = (b >> 16) & 0xFF;
    let ag = (a >>  8) & 0xFF; let bg = (b >>  8) & 0xFF;
    let ab =  a        & 0xFF; let bb =  b        & 0xFF;
    0xFF000000 | (lerp(ar, br) << 16) | (lerp(ag, bg) << 8) | lerp(ab, bb)
}

// ════════════════════════════════════════════════════════════════════════════
// CrashFlash — red screen edge after a hit
// ════════════════════════════════════════════════════════════════════════════

const FLASH_SECONDS: f32 = 0.4;

#[derive(Debug, Default, Clone, Copy)]
pub struct CrashFlash {
    remaining: f32,
}

impl CrashFlash {
    pub fn trigger(&mut self) { self.remaining = FLASH_SECONDS; }
    pub fn tick(&mut self, dt: f32) { self.remaining = (self.remaining - dt).max(0.0); }

    /// 1.0 right after the hit, fading to 0.0.
    pub fn intensity(&self) -> f32 { self.remaining / FLASH_SECONDS }
}

// ════════════════════════════════════════════════════════════════════════════
// LevelBanner — "LEVEL n" slides in, holds, slides out
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug, PartialEq)]
pub enum BannerPhase {
    Hidden,
    SlideIn  { progress: f32 },
    Hold     { left: f32 },
    SlideOut { progress: f32 },
}

const BANNER_SLIDE: f32 = 0.3;
const BANNER_HOLD:  f32 = 1.2;

#[derive(Clone, Debug)]
pub struct LevelBanner {
    pub level: u32,
    pub phase: BannerPhase,
}

impl Default for LevelBanner {
    fn default() -> Self { LevelBanner { level: 1, phase: BannerPhase::Hidden } }
}

impl LevelBanner {
    pub fn show(&mut self, level: u32) {
        self.level = level;
        self.phase = BannerPhase::SlideIn { progress: 0.0 };
    }

    /// Advance by `dt` seconds.  Returns true when the banner has gone.
    pub fn tick(&mut self, dt: f32) -> bool {
        let step = dt / BANNER_SLIDE;
        match &mut self.phase {
            BannerPhase::Hidden => return false,
            BannerPhase::SlideIn { progress } => {
                *progress += step;
                if *progress >= 1.0 { self.phase = BannerPhase::Hold { left: BANNER_HOLD }; }
            }
            BannerPhase::Hold { left } => {
                *left -= dt;
                if *left <= 0.0 { self.phase = BannerPhase::SlideOut { progress: 0.0 }; }
            }
            BannerPhase::SlideOut { progress } => {
                *progress += step;
                if *progress >= 1.0 {
                    self.phase = BannerPhase::Hidden;
                    return true;
                }
            }
        }
        false
    }

    /// How much of the banner is on screen, 0.0–1.0.
    pub fn visibility(&self) -> f32 {
        match self.phase {
            BannerPhase::Hidden                 => 0.0,
            BannerPhase::SlideIn { progress }   => progress.min(1.0),
            BannerPhase::Hold { .. }            => 1.0,
            BannerPhase::SlideOut { progress }  => 1.0 - progress.min(1.0),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// HudState — everything above, driven by step reports
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
pub struct HudState {
    pub flash:  CrashFlash,
    pub banner: LevelBanner,
    /// One-line message along the bottom of the screen.
    pub status: String,
}

impl HudState {
    pub fn reset(&mut self) {
        *self = HudState::default();
    }

    /// Fold one applied frame into the animations.
    pub fn on_step(&mut self, report: &StepReport, dt: f32) {
        self.flash.tick(dt);
        self.banner.tick(dt);

        if !report.hits.is_empty() {
            self.flash.trigger();
            self.status = format!("Hit {:?}!", report.hits[0]);
        }
        if let Some(level) = report.level_up {
            self.banner.show(level);
            self.status = format!("Level {}", level);
        }
        if let Some(result) = &report.finished {
            self.status = format!("Wrecked! Final score {}", result.score);
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use drive_core::world::EntityKind;

    #[test]
    fn health_colour_goes_green_to_red() {
        let full = health_color(100.0);
        let empty = health_color(0.0);
        assert_ne!(full, empty);
        assert_eq!(empty, hsv_to_argb(0.0, 0.85, 0.9));
        assert!((full >> 8) & 0xFF > (full >> 16) & 0xFF, "full health should be mostly green");
    }

    #[test]
    fn colours_are_opaque() {
        for h in 0..36 {
            assert_eq!(hsv_to_argb(h as f32 * 10.0, 0.8, 0.9) >> 24, 0xFF);
        }
        assert_eq!(blend(0xFF000000, 0xFFFFFFFF, 0.0), 0xFF000000);
        assert_eq!(blend(0xFF000000, 0xFFFFFFFF, 1.0), 0xFFFFFFFF);
    }

    #[test]
    fn crash_flash_fades() {
        let mut f = CrashFlash::default();
        assert_eq!(f.intensity(), 0.0);
        f.trigger();
        assert_eq!(f.intensity(), 1.0);
        f.tick(0.2);
        assert!(f.intensity() > 0.0 && f.intensity() < 1.0);
        f.tick(1.0);
        assert_eq!(f.intensity(), 0.0);
    }

    #[test]
    fn banner_runs_its_course() {
        let mut b = LevelBanner::default();
        b.show(3);
        assert_eq!(b.visibility(), 0.0);
        let mut done = false;
        for _ in 0..(60 * 5) {
            if b.tick(1.0 / 60.0) { done = true; break; }
        }
        assert!(done);
        assert_eq!(b.phase, BannerPhase::Hidden);
        assert_eq!(b.level, 3);
    }

    #[test]
    fn hit_report_triggers_flash() {
        let mut hud = HudState::default();
        let report = StepReport { applied: true, hits: vec![EntityKind::Rock], ..StepReport::default() };
        hud.on_step(&report, 1.0 / 60.0);
        assert_eq!(hud.flash.intensity(), 1.0);
        assert!(hud.status.contains("Rock"));

        let report = StepReport { applied: true, level_up: Some(2), ..StepReport::default() };
        hud.on_step(&report, 1.0 / 60.0);
        assert!(matches!(hud.banner.phase, BannerPhase::SlideIn { .. }));
    }
}
