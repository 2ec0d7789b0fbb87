//! Landmark sources for the front end — keyboard hand rig and LeapMotion.
//!
//! Both produce real 21-point [`HandObservation`]s, so everything downstream
//! (interpreter, HUD skeleton) behaves the same whichever one is active.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};

use drive_core::landmarks::{synthetic_hand, HandObservation, Landmark, LandmarkSource};
use drive_core::StartupError;

// ════════════════════════════════════════════════════════════════════════════
// SimInput — raw key events from the window
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimInput {
    KeyDown(SimKey),
    KeyUp(SimKey),
}

/// Keys that move the simulated hands (mapped from minifb keys).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimKey {
    SteerLeft,   // ←
    SteerRight,  // →
    Open,        // ↑  open hand = gas
    Fist,        // ↓  fist = brake
    WheelGrip,   // W  toggles the two-hand rig
}

// ════════════════════════════════════════════════════════════════════════════
// SimHandRig — keyboard-driven synthetic hands
// ════════════════════════════════════════════════════════════════════════════

/// Horizontal wrist→knuckle offset at full keyboard lock.
const RIG_TILT:      f32 = 0.12;
/// Vertical hand offset at full lock in the two-hand rig.
const RIG_WHEEL_DY:  f32 = 0.12;
const RIG_OPEN:      f32 = 0.22;
const RIG_RELAXED:   f32 = 0.135;
const RIG_FIST:      f32 = 0.08;
/// Fraction of the remaining tilt closed per poll.
const RIG_EASE:      f32 = 0.5;

/// Turns held arrow keys into one or two synthetic hands.
///
/// With no key held and the wheel grip off, no hand is in view at all.
pub struct SimHandRig {
    rx:     Receiver<SimInput>,
    left:   bool,
    right:  bool,
    open:   bool,
    fist:   bool,
    wheel:  bool,
    /// Eased steering input in [-1, 1].
    tilt:   f32,
}

impl SimHandRig {
    pub fn new(rx: Receiver<SimInput>) -> Self {
        SimHandRig { rx, left: false, right: false, open: false, fist: false, wheel: false, tilt: 0.0 }
    }

    pub fn wheel_grip(&self) -> bool { self.wheel }

    fn drain(&mut self) {
        loop {
            match self.rx.try_recv() {
                Ok(SimInput::KeyDown(k)) => self.set(k, true),
                Ok(SimInput::KeyUp(k))   => self.set(k, false),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
    }

    fn set(&mut self, key: SimKey, down: bool) {
        match key {
            SimKey::SteerLeft  => self.left = down,
            SimKey::SteerRight => self.right = down,
            SimKey::Open       => self.open = down,
            SimKey::Fist       => self.fist = down,
            SimKey::WheelGrip  => if down {
                self.wheel = !self.wheel;
                info!("keyboard rig: {} grip", if self.wheel { "two-hand" } else { "one-hand" });
            },
        }
    }

    /// Hands for the current key state.
    pub fn hands(&mut self) -> Vec<HandObservation> {
        let target = match (self.left, self.right) {
            (true, false) => -1.0,
            (false, true) => 1.0,
            _             => 0.0,
        };
        self.tilt += (target - self.tilt) * RIG_EASE;
        if self.tilt.abs() < 1e-3 { self.tilt = 0.0; }

        let openness = match (self.open, self.fist) {
            (true, false) => RIG_OPEN,
            (false, true) => RIG_FIST,
            _             => RIG_RELAXED,
        };

        if self.wheel {
            // Right hand raised relative to the left reads as steering right.
            let dy = self.tilt * RIG_WHEEL_DY;
            return vec![
                synthetic_hand(Landmark::new(0.3, 0.6 + dy), 0.0, openness),
                synthetic_hand(Landmark::new(0.7, 0.6 - dy), 0.0, openness),
            ];
        }
        if !(self.left || self.right || self.open || self.fist) && self.tilt == 0.0 {
            return Vec::new();
        }
        // Knuckle left of the wrist steers right in the mirrored camera frame.
        vec![synthetic_hand(Landmark::new(0.5, 0.7), -self.tilt * RIG_TILT, openness)]
    }
}

impl LandmarkSource for SimHandRig {
    fn poll(&mut self, _frame_timestamp: Duration) -> Option<Vec<HandObservation>> {
        self.drain();
        Some(self.hands())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// HandTracker — hardware on its own thread
// ════════════════════════════════════════════════════════════════════════════

/// A blocking hand tracker that runs on a background thread.
///
/// `run` reports readiness once on `ready`, then streams frames until the
/// receiver is dropped.
pub trait HandTracker: Send + 'static {
    fn run(
        self: Box<Self>,
        ready: Sender<Result<(), StartupError>>,
        frames: Sender<Vec<HandObservation>>,
    );
}

/// How long `open` waits for a tracker to report in.
const TRACKER_STARTUP: Duration = Duration::from_secs(5);

/// Landmark source fed by a [`HandTracker`] thread.
///
/// Each poll returns the newest frame that arrived since the last poll,
/// or `None` if nothing new came in.
pub struct ChannelLandmarkSource {
    ready:  Option<Receiver<Result<(), StartupError>>>,
    frames: Receiver<Vec<HandObservation>>,
    lost:   bool,
}

/// Spawn `tracker` on its own thread.
pub fn spawn_hand_tracker<T: HandTracker>(tracker: T) -> ChannelLandmarkSource {
    let (ready_tx, ready_rx) = mpsc::channel();
    let (frame_tx, frame_rx) = mpsc::channel();
    thread::spawn(move || Box::new(tracker).run(ready_tx, frame_tx));
    ChannelLandmarkSource { ready: Some(ready_rx), frames: frame_rx, lost: false }
}

impl LandmarkSource for ChannelLandmarkSource {
    fn open(&mut self) -> Result<(), StartupError> {
        let Some(ready) = self.ready.take() else { return Ok(()) };
        match ready.recv_timeout(TRACKER_STARTUP) {
            Ok(result) => result,
            Err(_) => Err(StartupError::DeviceUnavailable("hand tracker did not start".into())),
        }
    }

    fn poll(&mut self, _frame_timestamp: Duration) -> Option<Vec<HandObservation>> {
        let mut latest = None;
        loop {
            match self.frames.try_recv() {
                Ok(hands) => latest = Some(hands),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.lost {
                        warn!("hand tracker thread exited; holding last control");
                        self.lost = true;
                    }
                    break;
                }
            }
        }
        if latest.is_none() { debug!("no new tracker frame"); }
        latest
    }
}

// ════════════════════════════════════════════════════════════════════════════
// LeapTracker — real hardware (feature = "leap")
// ════════════════════════════════════════════════════════════════════════════

/// LeapMotion tracker.  Projects the Leap's millimetre skeleton onto the
/// horizontal plane (x right, z toward the user) and scales it into the same
/// normalised units a camera detector would report.
///
/// Requires the `leap` feature flag and the LeapC shared library installed.
#[cfg(feature = "leap")]
pub struct LeapTracker;

#[cfg(feature = "leap")]
impl HandTracker for LeapTracker {
    fn run(
        self: Box<Self>,
        ready: Sender<Result<(), StartupError>>,
        frames: Sender<Vec<HandObservation>>,
    ) {
        use leaprs::*;

        let mut connection = match Connection::create(ConnectionConfig::default()) {
            Ok(c) => c,
            Err(e) => {
                let _ = ready.send(Err(StartupError::DetectorLoad(format!("LeapC: {:?}", e))));
                return;
            }
        };
        if let Err(e) = connection.open() {
            let _ = ready.send(Err(StartupError::DeviceUnavailable(format!("LeapMotion: {:?}", e))));
            return;
        }
        let _ = ready.send(Ok(()));
        info!("LeapMotion connection open");

        loop {
            let msg = match connection.poll(100) {
                Ok(m)  => m,
                Err(_) => continue,
            };
            if let Event::Tracking(frame) = msg.event() {
                let hands: Vec<HandObservation> = frame.hands().map(|h| leap_hand(&h)).collect();
                if frames.send(hands).is_err() { return; }
            }
        }
    }
}

/// Millimetres → normalised units.
#[cfg(feature = "leap")]
const LEAP_MM: f32 = 1000.0;

#[cfg(feature = "leap")]
fn leap_hand(hand: &leaprs::Hand) -> HandObservation {
    let project = |x: f32, z: f32| Landmark::new(0.5 + x / LEAP_MM, 0.5 + z / LEAP_MM);

    let digits: Vec<_> = hand.digits().collect();
    let mut points = Vec::with_capacity(drive_core::landmarks::LANDMARK_COUNT);
    // wrist: base of the middle metacarpal
    match digits.get(2) {
        Some(middle) => {
            let w = middle.metacarpal().prev_joint();
            points.push(project(w.x, w.z));
        }
        None         => return HandObservation::new(Vec::new()),
    }
    for digit in &digits {
        let joints = [
            digit.metacarpal().next_joint(),
            digit.proximal().next_joint(),
            digit.intermediate().next_joint(),
            digit.distal().next_joint(),
        ];
        points.extend(joints.iter().map(|j| project(j.x, j.z)));
    }
    HandObservation::new(points)
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use drive_core::gesture::{GestureConfig, GestureInterpreter};
    use drive_core::DriveState;

    fn rig() -> (Sender<SimInput>, SimHandRig) {
        let (tx, rx) = mpsc::channel();
        (tx, SimHandRig::new(rx))
    }

    fn poll(r: &mut SimHandRig) -> Vec<HandObservation> {
        r.poll(Duration::ZERO).unwrap()
    }

    #[test]
    fn no_keys_no_hands() {
        let (_tx, mut r) = rig();
        assert!(poll(&mut r).is_empty());
    }

    #[test]
    fn up_arrow_reads_as_gas() {
        let (tx, mut r) = rig();
        tx.send(SimInput::KeyDown(SimKey::Open)).unwrap();
        let mut gi = GestureInterpreter::new(GestureConfig::default());
        let reading = gi.apply(&poll(&mut r));
        assert_eq!(reading.hands, 1);
        assert_eq!(reading.drive_state, DriveState::Gas);
    }

    #[test]
    fn down_arrow_reads_as_brake() {
        let (tx, mut r) = rig();
        tx.send(SimInput::KeyDown(SimKey::Fist)).unwrap();
        let mut gi = GestureInterpreter::new(GestureConfig::default());
        assert_eq!(gi.apply(&poll(&mut r)).drive_state, DriveState::Brake);
    }

    #[test]
    fn arrows_steer_the_right_way() {
        let (tx, mut r) = rig();
        let mut gi = GestureInterpreter::new(GestureConfig::default());
        tx.send(SimInput::KeyDown(SimKey::SteerRight)).unwrap();
        for _ in 0..10 { gi.apply(&poll(&mut r)); }
        assert!(gi.signal().target_steer() > 0.3);

        tx.send(SimInput::KeyUp(SimKey::SteerRight)).unwrap();
        tx.send(SimInput::KeyDown(SimKey::SteerLeft)).unwrap();
        for _ in 0..20 { gi.apply(&poll(&mut r)); }
        assert!(gi.signal().target_steer() < -0.3);
    }

    #[test]
    fn wheel_grip_shows_two_hands() {
        let (tx, mut r) = rig();
        tx.send(SimInput::KeyDown(SimKey::WheelGrip)).unwrap();
        tx.send(SimInput::KeyUp(SimKey::WheelGrip)).unwrap();
        tx.send(SimInput::KeyDown(SimKey::SteerRight)).unwrap();
        let mut gi = GestureInterpreter::new(GestureConfig::default());
        let mut reading = gi.apply(&poll(&mut r));
        for _ in 0..10 { reading = gi.apply(&poll(&mut r)); }
        assert!(reading.two_hand_mode);
        assert_eq!(reading.drive_state, DriveState::Gas);
        assert!(gi.signal().target_steer() > 0.3);

        tx.send(SimInput::KeyDown(SimKey::WheelGrip)).unwrap();
        assert_eq!(poll(&mut r).len(), 1);
        assert!(!r.wheel_grip());
    }

    struct FailingTracker;
    impl HandTracker for FailingTracker {
        fn run(self: Box<Self>, ready: Sender<Result<(), StartupError>>, _f: Sender<Vec<HandObservation>>) {
            let _ = ready.send(Err(StartupError::PermissionDenied("test".into())));
        }
    }

    struct OneFrame;
    impl HandTracker for OneFrame {
        fn run(self: Box<Self>, ready: Sender<Result<(), StartupError>>, frames: Sender<Vec<HandObservation>>) {
            let _ = ready.send(Ok(()));
            let _ = frames.send(vec![synthetic_hand(Landmark::new(0.5, 0.5), 0.0, 0.2)]);
        }
    }

    #[test]
    fn tracker_failure_surfaces_from_open() {
        let mut src = spawn_hand_tracker(FailingTracker);
        let err = src.open().unwrap_err();
        assert_eq!(err.category(), drive_core::ErrorCategory::Permission);
    }

    #[test]
    fn tracker_frames_arrive_once() {
        let mut src = spawn_hand_tracker(OneFrame);
        src.open().unwrap();
        let mut got = None;
        for _ in 0..200 {
            if let Some(h) = src.poll(Duration::ZERO) { got = Some(h); break; }
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(got.map(|h| h.len()), Some(1));
        thread::sleep(Duration::from_millis(20));
        assert!(src.poll(Duration::ZERO).is_none());
    }
}
