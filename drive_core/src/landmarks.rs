//! Hand landmark observations and the source that produces them.
//!
//! A landmark source is polled, never awaited.  It answers every call
//! immediately with either a fresh set of hands (possibly empty) or `None`
//! when it has nothing new for this frame.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::StartupError;

// ════════════════════════════════════════════════════════════════════════════
// Landmark indices
// ════════════════════════════════════════════════════════════════════════════

/// Number of joints in a complete hand observation.
pub const LANDMARK_COUNT: usize = 21;

pub const WRIST:          usize = 0;
pub const THUMB_TIP:      usize = 4;
pub const INDEX_TIP:      usize = 8;
pub const MIDDLE_KNUCKLE: usize = 9;
pub const MIDDLE_TIP:     usize = 12;
pub const RING_TIP:       usize = 16;
pub const PINKY_TIP:      usize = 20;

/// The four non-thumb fingertips used for fist openness.
pub const FINGERTIPS: [usize; 4] = [INDEX_TIP, MIDDLE_TIP, RING_TIP, PINKY_TIP];

// ════════════════════════════════════════════════════════════════════════════
// Landmark / HandObservation
// ════════════════════════════════════════════════════════════════════════════

/// A single joint estimate in normalised image coordinates (y grows downward).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
}

impl Landmark {
    pub const fn new(x: f32, y: f32) -> Self { Landmark { x, y } }

    pub fn distance(&self, other: &Landmark) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// One detected hand, exactly as the detector delivered it.
///
/// The point list is not trusted: a detector may hand back a truncated
/// skeleton, so callers go through [`HandObservation::joints`] which only
/// yields complete 21-point hands.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HandObservation {
    pub points: Vec<Landmark>,
}

impl HandObservation {
    pub fn new(points: Vec<Landmark>) -> Self { HandObservation { points } }

    /// The full joint array, or `None` when the observation is malformed.
    pub fn joints(&self) -> Option<&[Landmark; LANDMARK_COUNT]> {
        self.points.as_slice().try_into().ok()
    }

    pub fn is_valid(&self) -> bool { self.joints().is_some() }
}

// ════════════════════════════════════════════════════════════════════════════
// LandmarkSource
// ════════════════════════════════════════════════════════════════════════════

/// Anything that can be polled for hand observations once per frame.
///
/// * `Some(hands)` — a fresh detection; an empty list means no hands are
///   visible, which is itself a meaningful signal.
/// * `None` — the detector is not ready, the poll failed, or nothing new
///   arrived.  The caller keeps its last control state.
pub trait LandmarkSource {
    /// Acquire the underlying device or model.  Called once before a race
    /// starts; a failure here is the only way the source can stop the core
    /// from running.
    fn open(&mut self) -> Result<(), StartupError> { Ok(()) }

    fn poll(&mut self, frame_timestamp: Duration) -> Option<Vec<HandObservation>>;
}

/// A source that never sees anything.  Handy for headless runs.
#[derive(Debug, Default)]
pub struct NoHands;

impl LandmarkSource for NoHands {
    fn poll(&mut self, _frame_timestamp: Duration) -> Option<Vec<HandObservation>> {
        Some(Vec::new())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Synthetic hands
// ════════════════════════════════════════════════════════════════════════════

/// Build a plausible 21-point hand.
///
/// `wrist` is the wrist position, `tilt` the horizontal offset of the middle
/// knuckle relative to the wrist, and `openness` the wrist-to-fingertip
/// distance of the four non-thumb fingers.  Used by the keyboard rig and by
/// tests; the geometry is arranged so that the interpreter reads back exactly
/// `tilt` and `openness`.
pub fn synthetic_hand(wrist: Landmark, tilt: f32, openness: f32) -> HandObservation {
    let mut points = vec![wrist; LANDMARK_COUNT];
    let knuckle = Landmark::new(wrist.x + tilt, wrist.y - 0.08);

    // finger chains 1–4 thumb, 5–8 index, 9–12 middle, 13–16 ring, 17–20 pinky
    let spread = [-0.06_f32, -0.03, 0.0, 0.03, 0.05];
    for (finger, &dx) in spread.iter().enumerate() {
        let base = 1 + finger * 4;
        let reach = if finger == 0 { openness * 0.7 } else { openness };
        let dir_x = dx + tilt * 0.5;
        let len = (dir_x * dir_x + 1.0).sqrt();
        let (ux, uy) = (dir_x / len, -1.0 / len);
        for joint in 0..4 {
            let frac = (joint + 1) as f32 / 4.0;
            points[base + joint] = Landmark::new(
                wrist.x + ux * reach * frac,
                wrist.y + uy * reach * frac,
            );
        }
    }
    points[MIDDLE_KNUCKLE] = knuckle;
    HandObservation::new(points)
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncated_hand_is_invalid() {
        let hand = HandObservation::new(vec![Landmark::default(); 20]);
        assert!(!hand.is_valid());
        assert!(hand.joints().is_none());
    }

    #[test]
    fn synthetic_hand_is_complete() {
        let hand = synthetic_hand(Landmark::new(0.5, 0.7), 0.05, 0.2);
        assert!(hand.is_valid());
    }

    #[test]
    fn synthetic_hand_reports_requested_openness() {
        let hand = synthetic_hand(Landmark::new(0.5, 0.7), 0.0, 0.2);
        let j = hand.joints().unwrap();
        for &tip in &FINGERTIPS {
            assert!((j[WRIST].distance(&j[tip]) - 0.2).abs() < 1e-5);
        }
        assert!((j[MIDDLE_KNUCKLE].x - j[WRIST].x).abs() < 1e-6);
    }
}
