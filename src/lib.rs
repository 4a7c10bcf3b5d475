//! Shift Trainer - reflex drills for the left and right shift keys
//!
//! Shows a shifted character, waits for a shift press and scores whether
//! the correct side was used. Key presses are captured on a listener thread
//! and handed to an async training loop.

pub mod bridge;
pub mod config;
pub mod keyboard;
pub mod session;
pub mod trial;

pub use bridge::{BridgeError, KeyEventBridge};
pub use config::Config;
pub use session::{SessionSummary, StopHandle, TrainingSession};
pub use trial::{Side, TrialGenerator, TrialSpec};
