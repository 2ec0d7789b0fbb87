//! # drive_core
//!
//! Real-time core of a hand-steered arcade racer.  Hand landmarks come in,
//! a steering/throttle signal is derived from them, and a simple vehicle
//! runs down a four-lane road full of pooled traffic, walls, rocks and coins.
//!
//! ## Pipeline
//!
//! | Stage | Module | Rate |
//! |---|---|---|
//! | Landmark poll | [`landmarks`] | perception interval (~30 Hz) |
//! | Gesture → [`ControlSignal`] | [`gesture`] | perception interval |
//! | Speed / lateral / drift | [`vehicle`] | every refresh |
//! | Spawn, move, collide, recycle | [`world`] | every refresh |
//! | Score and level | [`progression`] | every refresh |
//!
//! [`scheduler::FrameScheduler`] decides which stages run on a refresh and
//! [`race::Race`] runs them in order.
//!
//! ## Gestures
//!
//! | Hands | Steering | Throttle |
//! |---|---|---|
//! | none | decays to centre | neutral (or brake, see [`gesture::HandsLostPolicy`]) |
//! | one | wrist → middle knuckle tilt | open = gas, fist = brake |
//! | two | angle of the line between the hands | gas (or both fists = brake) |
//!
//! Nothing here touches a window, a device or the filesystem; those live
//! behind [`landmarks::LandmarkSource`], [`race::EngineAudio`] and
//! [`race::RenderSurface`].

pub mod cars;
pub mod config;
pub mod control;
pub mod error;
pub mod gesture;
pub mod landmarks;
pub mod pool;
pub mod progression;
pub mod race;
pub mod scheduler;
pub mod vehicle;
pub mod world;

pub use cars::CarSpec;
pub use config::Tuning;
pub use control::{ControlSignal, DriveState};
pub use error::{ConfigError, ErrorCategory, StartupError};
pub use gesture::GestureInterpreter;
pub use landmarks::{HandObservation, Landmark, LandmarkSource};
pub use race::{EngineAudio, GameState, Race, RaceResult, RaceView, RenderSurface};
pub use scheduler::{Clock, FrameScheduler, ManualClock, SystemClock};
