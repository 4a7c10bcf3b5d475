//! Key identity and raw key sources

mod event;
pub mod keymap;
#[cfg(target_os = "linux")]
mod evdev_listener;

pub use event::{open_source, Backend, DeviceQuerySource, KeyEvent, KeyEventType, KeySource, ListenerError};
pub use keymap::KeyCode;

#[cfg(target_os = "linux")]
pub use evdev_listener::EvdevSource;
