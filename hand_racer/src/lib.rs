//! # hand_racer
//!
//! Arcade racer steered with bare hands.  Hand landmarks from a LeapMotion
//! controller (or a keyboard-driven hand rig) feed the `drive_core`
//! simulation, which is drawn into a software framebuffer with a MIDI
//! engine drone underneath.
//!
//! ## Hand → control mapping
//!
//! | Hands | Pose | Control |
//! |---|---|---|
//! | One | Open palm | Gas |
//! | One | Fist | Brake |
//! | One | Wrist→knuckle tilt | Joystick steering |
//! | Two | Any | Gas, steering from the angle between wrists (virtual wheel) |
//! | None | — | Neutral, steering eases back to centre |
//!
//! ## Feature flags
//!
//! * (default) — **Keyboard rig**: arrow keys pose synthetic hands.
//! * `leap` — **Hardware mode**: real hands from a LeapMotion controller via LeapC.
//!
//! ### Keys
//!
//! | Key | Effect |
//! |---|---|
//! | `←` / `→` | Tilt the rig hand (or raise one wheel hand) |
//! | `↑` | Open hand |
//! | `↓` | Fist |
//! | `W` | Toggle the two-hand wheel grip |
//! | `Enter` | Start / race again |
//! | `P` / `Space` | Pause / resume |
//! | `R` | Restart |
//! | `G` / `B` | Next owned car / buy the next car |
//! | `Q` / `Esc` | Quit |

pub mod app;
pub mod audio;
pub mod error;
pub mod hud;
pub mod input;
pub mod visualizer;
