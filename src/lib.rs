//! padhost — USB host driver for game controller peripherals.
//!
//! Discovers, classifies, and polls wired USB game controllers, turning raw
//! descriptor bytes and periodic HID/vendor report packets into a normalized
//! [`GamepadState`] (digital buttons, analog triggers, analog joysticks) and
//! a stream of press/release [`ButtonEvent`]s.
//!
//! The USB transport itself is a capability supplied by the host platform via
//! the [`transport`] traits; everything above it — descriptor parsing, family
//! classification, per-family report decoding, polling discipline, failure
//! quarantine — lives here.
//!
//! ```no_run
//! use padhost::Gamepad;
//! # fn host() -> padhost::transport::mock::MockHost { padhost::transport::mock::MockHost::new() }
//!
//! let mut pad = Gamepad::new(host(), None);
//! loop {
//!     if pad.update() {
//!         for event in pad.events() {
//!             println!("{} {}", event.button, if event.pressed { "pressed" } else { "released" });
//!         }
//!     }
//! }
//! ```

pub mod classifier;
pub mod config;
pub mod descriptor;
mod device;
pub mod error;
mod families;
pub mod gamepad;
pub mod registry;
pub mod state;
pub mod transport;

pub use classifier::*;
pub use config::*;
pub use error::*;
pub use gamepad::*;
pub use registry::*;
pub use state::*;
