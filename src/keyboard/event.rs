//! Keyboard event types and key sources

use super::KeyCode;
use device_query::{DeviceQuery, DeviceState};
use serde::{Deserialize, Serialize};
use std::io;
use std::time::Instant;
use thiserror::Error;

/// Type of keyboard event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEventType {
    /// Key was pressed down
    Press,
    /// Key was released
    Release,
}

/// A keyboard event with timing information
#[derive(Debug, Clone)]
pub struct KeyEvent {
    /// The key code
    pub key: KeyCode,
    /// Type of event (press/release)
    pub event_type: KeyEventType,
    /// When the event was observed
    pub timestamp: Instant,
}

impl KeyEvent {
    pub fn new(key: KeyCode, event_type: KeyEventType, timestamp: Instant) -> Self {
        Self {
            key,
            event_type,
            timestamp,
        }
    }

    pub fn press(key: KeyCode) -> Self {
        Self::new(key, KeyEventType::Press, Instant::now())
    }

    pub fn release(key: KeyCode) -> Self {
        Self::new(key, KeyEventType::Release, Instant::now())
    }

    pub fn is_press(&self) -> bool {
        self.event_type == KeyEventType::Press
    }
}

/// Error raised when a key source cannot attach to the keyboard
#[derive(Debug, Error)]
pub enum ListenerError {
    /// No keyboard devices found
    #[error("no keyboard devices found")]
    NoDevices,
    /// Permission denied accessing device
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// The requested backend does not exist on this platform
    #[error("backend {0:?} is not supported on this platform")]
    Unsupported(Backend),
    /// The listener thread died before reporting readiness
    #[error("listener thread exited during startup")]
    ThreadExited,
}

/// Which key capture mechanism to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Raw evdev on Linux when accessible, device_query otherwise
    #[default]
    Auto,
    /// Portable polling through device_query
    DeviceQuery,
    /// Raw Linux evdev devices
    Evdev,
}

/// A producer of raw key events, polled from the listener thread.
pub trait KeySource {
    /// Append newly observed key edges to `out`.
    /// Returns the number of events appended.
    fn poll(&mut self, out: &mut Vec<KeyEvent>) -> usize;

    /// Whether the source can still produce events
    fn is_alive(&self) -> bool {
        true
    }
}

impl KeySource for Box<dyn KeySource> {
    fn poll(&mut self, out: &mut Vec<KeyEvent>) -> usize {
        (**self).poll(out)
    }

    fn is_alive(&self) -> bool {
        (**self).is_alive()
    }
}

/// Key source that polls key state through device_query
pub struct DeviceQuerySource {
    device_state: DeviceState,
    last_keys: Vec<device_query::Keycode>,
}

impl DeviceQuerySource {
    /// Attach to the platform keyboard state
    pub fn new() -> Result<Self, ListenerError> {
        Ok(Self {
            device_state: Self::device_state()?,
            last_keys: Vec::new(),
        })
    }

    #[cfg(target_os = "linux")]
    fn device_state() -> Result<DeviceState, ListenerError> {
        // Without an X display device_query cannot see the keyboard
        DeviceState::checked_new().ok_or(ListenerError::NoDevices)
    }

    #[cfg(not(target_os = "linux"))]
    fn device_state() -> Result<DeviceState, ListenerError> {
        Ok(DeviceState::new())
    }
}

impl KeySource for DeviceQuerySource {
    fn poll(&mut self, out: &mut Vec<KeyEvent>) -> usize {
        let now = Instant::now();
        let current_keys = self.device_state.get_keys();
        let mut event_count = 0;

        for key in &current_keys {
            if !self.last_keys.contains(key) {
                out.push(KeyEvent::new(KeyCode::from(*key), KeyEventType::Press, now));
                event_count += 1;
            }
        }

        for key in &self.last_keys {
            if !current_keys.contains(key) {
                out.push(KeyEvent::new(KeyCode::from(*key), KeyEventType::Release, now));
                event_count += 1;
            }
        }

        self.last_keys = current_keys;
        event_count
    }
}

/// Open the key source for a backend.
///
/// Must be called on the thread that will poll the source, since some
/// platform handles are not `Send`.
pub fn open_source(backend: Backend) -> Result<Box<dyn KeySource>, ListenerError> {
    match backend {
        Backend::DeviceQuery => Ok(Box::new(DeviceQuerySource::new()?)),
        #[cfg(target_os = "linux")]
        Backend::Evdev => Ok(Box::new(super::EvdevSource::new()?)),
        #[cfg(not(target_os = "linux"))]
        Backend::Evdev => Err(ListenerError::Unsupported(Backend::Evdev)),
        #[cfg(target_os = "linux")]
        Backend::Auto => match super::EvdevSource::new() {
            Ok(evdev) => {
                log::info!("using evdev key source ({} device(s))", evdev.device_count());
                Ok(Box::new(evdev))
            }
            Err(e) => {
                log::warn!("evdev unavailable ({}), falling back to device_query", e);
                Ok(Box::new(DeviceQuerySource::new()?))
            }
        },
        #[cfg(not(target_os = "linux"))]
        Backend::Auto => Ok(Box::new(DeviceQuerySource::new()?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_helper_builds_press() {
        let event = KeyEvent::press(KeyCode::LEFT_SHIFT);
        assert!(event.is_press());
        assert_eq!(event.key, KeyCode::LEFT_SHIFT);
    }

    #[test]
    fn release_helper_builds_release() {
        let event = KeyEvent::release(KeyCode::RIGHT_SHIFT);
        assert!(!event.is_press());
        assert_eq!(event.event_type, KeyEventType::Release);
    }

    #[test]
    fn backend_deserializes_snake_case() {
        #[derive(Deserialize)]
        struct Wrapper {
            backend: Backend,
        }
        let w: Wrapper = toml::from_str("backend = \"device_query\"").unwrap();
        assert_eq!(w.backend, Backend::DeviceQuery);
        let w: Wrapper = toml::from_str("backend = \"evdev\"").unwrap();
        assert_eq!(w.backend, Backend::Evdev);
    }

    #[test]
    fn listener_error_display() {
        assert_eq!(ListenerError::NoDevices.to_string(), "no keyboard devices found");
        assert!(ListenerError::Unsupported(Backend::Evdev)
            .to_string()
            .contains("Evdev"));
    }
}
