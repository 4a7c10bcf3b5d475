//! Raw evdev key source for Linux
//!
//! Reads `input_event` records straight from `/dev/input/event*`. This works
//! without an X display (Wayland, console) as long as the user may read the
//! devices, which usually means membership in the `input` group.

use super::{KeyCode, KeyEvent, KeyEventType, KeySource, ListenerError};
use nix::libc;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Read};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// A raw input event from the kernel
#[repr(C)]
#[derive(Debug, Clone, Copy)]
struct InputEvent {
    tv_sec: i64,
    tv_usec: i64,
    event_type: u16,
    code: u16,
    value: i32,
}

const EV_KEY: u16 = 0x01;
const KEY_REPEAT: i32 = 2;
const INPUT_EVENT_SIZE: usize = std::mem::size_of::<InputEvent>();

/// Find all keyboard input devices
fn find_keyboard_devices() -> Result<Vec<PathBuf>, ListenerError> {
    let input_dir = Path::new("/dev/input");
    if !input_dir.exists() {
        return Err(ListenerError::NoDevices);
    }

    let keyboards: Vec<PathBuf> = fs::read_dir(input_dir)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("event"))
        })
        .filter(|path| is_keyboard_device(path))
        .collect();

    if keyboards.is_empty() {
        return Err(ListenerError::NoDevices);
    }

    Ok(keyboards)
}

/// Check sysfs for a device that advertises both shift keys
fn is_keyboard_device(device_path: &Path) -> bool {
    let Some(name) = device_path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };

    let caps_path = format!("/sys/class/input/{}/device/capabilities/key", name);
    if let Ok(caps) = fs::read_to_string(&caps_path) {
        return has_key_capability(&caps, KeyCode::LEFT_SHIFT)
            && has_key_capability(&caps, KeyCode::RIGHT_SHIFT);
    }

    let name_path = format!("/sys/class/input/{}/device/name", name);
    fs::read_to_string(&name_path)
        .map(|dev_name| {
            let lower = dev_name.to_lowercase();
            lower.contains("keyboard") || lower.contains("kbd")
        })
        .unwrap_or(false)
}

/// Test a sysfs key capability bitmap for one scancode.
///
/// The bitmap is a list of 64-bit hex words, most significant word first.
fn has_key_capability(caps: &str, key: KeyCode) -> bool {
    let words: Vec<u64> = caps
        .split_whitespace()
        .filter_map(|hex| u64::from_str_radix(hex, 16).ok())
        .collect();
    let code = key.as_u16() as usize;
    let word_from_end = code / 64;
    if word_from_end >= words.len() {
        return false;
    }
    let word = words[words.len() - 1 - word_from_end];
    word & (1u64 << (code % 64)) != 0
}

/// Evdev-based key source
pub struct EvdevSource {
    devices: Vec<File>,
    pressed_keys: HashSet<u16>,
    buffer: Vec<u8>,
}

impl EvdevSource {
    /// Open every readable keyboard device in non-blocking mode
    pub fn new() -> Result<Self, ListenerError> {
        let mut devices = Vec::new();

        for path in find_keyboard_devices()? {
            match File::open(&path) {
                Ok(file) => {
                    let fd = file.as_raw_fd();
                    unsafe {
                        let flags = libc::fcntl(fd, libc::F_GETFL);
                        libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK);
                    }
                    devices.push(file);
                }
                Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                    log::debug!("skipping {}: permission denied", path.display());
                    continue;
                }
                Err(e) => return Err(ListenerError::Io(e)),
            }
        }

        if devices.is_empty() {
            return Err(ListenerError::PermissionDenied(
                "cannot read any keyboard device, add the user to the 'input' group".to_string(),
            ));
        }

        Ok(Self {
            devices,
            pressed_keys: HashSet::new(),
            buffer: vec![0u8; INPUT_EVENT_SIZE * 64],
        })
    }

    /// Number of opened devices
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Turn one kernel record into a press/release edge
    fn decode(&mut self, input_event: &InputEvent, now: Instant) -> Option<KeyEvent> {
        if input_event.event_type != EV_KEY || input_event.value == KEY_REPEAT {
            return None;
        }
        let scancode = input_event.code;
        let pressed = input_event.value != 0;
        let changed = if pressed {
            self.pressed_keys.insert(scancode)
        } else {
            self.pressed_keys.remove(&scancode)
        };
        if !changed {
            return None;
        }
        let event_type = if pressed {
            KeyEventType::Press
        } else {
            KeyEventType::Release
        };
        Some(KeyEvent::new(KeyCode::new(scancode), event_type, now))
    }
}

impl KeySource for EvdevSource {
    fn poll(&mut self, out: &mut Vec<KeyEvent>) -> usize {
        let now = Instant::now();
        let mut records = Vec::new();
        let mut lost = Vec::new();

        for (index, device) in self.devices.iter_mut().enumerate() {
            loop {
                match device.read(&mut self.buffer) {
                    Ok(bytes_read) if bytes_read >= INPUT_EVENT_SIZE => {
                        for chunk in self.buffer[..bytes_read].chunks_exact(INPUT_EVENT_SIZE) {
                            let record: InputEvent = unsafe {
                                std::ptr::read_unaligned(chunk.as_ptr() as *const InputEvent)
                            };
                            records.push(record);
                        }
                    }
                    Ok(_) => break,
                    Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                    Err(e) => {
                        log::warn!("evdev read failed, dropping device: {}", e);
                        lost.push(index);
                        break;
                    }
                }
            }
        }

        // An unplugged keyboard must not take the others down with it
        for index in lost.into_iter().rev() {
            self.devices.remove(index);
        }
        if self.devices.is_empty() {
            log::warn!("no readable keyboard devices left");
        }

        let before = out.len();
        for record in &records {
            if let Some(event) = self.decode(record, now) {
                out.push(event);
            }
        }
        out.len() - before
    }

    fn is_alive(&self) -> bool {
        !self.devices.is_empty()
    }
}
