//! Character-device drivers for the board's keys, LED and beeper.
//!
//! The interesting part is the key path: an edge interrupt arms a per-line settle
//! timer ([`debounce`]), and only when the contacts have been quiet for the settle
//! delay is the line sampled and the key classified. Devices are opened through an
//! [`admission`] gate that lets one session in at a time.
//!
//! Hardware access goes through `embedded-hal` digital pins ([`line`]), so the same
//! drivers run against real GPIO or against a simulated pad.

#[macro_use]
mod fmt;

pub mod admission;
pub mod config;
pub mod debounce;
pub mod device;
pub mod error;
pub mod key_codes;
pub mod line;
pub mod timer;

pub use admission::{AdmissionGate, AdmissionToken};
pub use config::{DriverConfig, KeyDesc};
pub use debounce::{Debouncer, KeyEvent, SlotState};
pub use device::{BlinkDevice, FileOperations, IoctlCommand, KeyDevice, OutputDevice, Session};
pub use error::{Error, Result};
pub use key_codes::KeyValue;
pub use line::{Direction, Line, LineId, LinePin, LineRegistry, Polarity};
pub use timer::{DeadlineTimer, TimerHandle};
