//! Key code definitions

/// Represents a physical key code (Linux evdev scancode)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyCode(pub u16);

impl KeyCode {
    /// Key a backend could not identify (KEY_RESERVED)
    pub const UNMAPPED: KeyCode = KeyCode(0);
    pub const LEFT_CTRL: KeyCode = KeyCode(29);
    pub const LEFT_SHIFT: KeyCode = KeyCode(42);
    pub const RIGHT_SHIFT: KeyCode = KeyCode(54);
    pub const LEFT_ALT: KeyCode = KeyCode(56);
    pub const RIGHT_CTRL: KeyCode = KeyCode(97);
    pub const RIGHT_ALT: KeyCode = KeyCode(100);
    pub const LEFT_META: KeyCode = KeyCode(125);
    pub const RIGHT_META: KeyCode = KeyCode(126);

    pub fn new(code: u16) -> Self {
        Self(code)
    }

    pub fn as_u16(&self) -> u16 {
        self.0
    }

    /// Whether this is one of the two shift keys
    pub fn is_shift(&self) -> bool {
        *self == Self::LEFT_SHIFT || *self == Self::RIGHT_SHIFT
    }

    /// Human readable name for logging
    pub fn name(&self) -> &'static str {
        match *self {
            Self::LEFT_SHIFT => "LeftShift",
            Self::RIGHT_SHIFT => "RightShift",
            Self::LEFT_CTRL => "LeftCtrl",
            Self::RIGHT_CTRL => "RightCtrl",
            Self::LEFT_ALT => "LeftAlt",
            Self::RIGHT_ALT => "RightAlt",
            Self::LEFT_META => "LeftMeta",
            Self::RIGHT_META => "RightMeta",
            Self::UNMAPPED => "Unmapped",
            _ => "Other",
        }
    }
}

impl From<u16> for KeyCode {
    fn from(code: u16) -> Self {
        Self(code)
    }
}

impl From<device_query::Keycode> for KeyCode {
    fn from(keycode: device_query::Keycode) -> Self {
        use device_query::Keycode as DK;
        // Only modifiers matter to the trainer; the rest collapse to UNMAPPED
        match keycode {
            DK::LShift => Self::LEFT_SHIFT,
            DK::RShift => Self::RIGHT_SHIFT,
            DK::LControl => Self::LEFT_CTRL,
            DK::RControl => Self::RIGHT_CTRL,
            DK::LAlt => Self::LEFT_ALT,
            DK::RAlt => Self::RIGHT_ALT,
            DK::LMeta => Self::LEFT_META,
            DK::RMeta => Self::RIGHT_META,
            _ => Self::UNMAPPED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shift_scancodes_match_evdev() {
        assert_eq!(KeyCode::LEFT_SHIFT.as_u16(), 42);
        assert_eq!(KeyCode::RIGHT_SHIFT.as_u16(), 54);
    }

    #[test]
    fn only_shifts_are_shift() {
        assert!(KeyCode::LEFT_SHIFT.is_shift());
        assert!(KeyCode::RIGHT_SHIFT.is_shift());
        assert!(!KeyCode::LEFT_CTRL.is_shift());
        assert!(!KeyCode(30).is_shift());
        assert!(!KeyCode::UNMAPPED.is_shift());
    }

    #[test]
    fn device_query_shifts_convert() {
        assert_eq!(KeyCode::from(device_query::Keycode::LShift), KeyCode::LEFT_SHIFT);
        assert_eq!(KeyCode::from(device_query::Keycode::RShift), KeyCode::RIGHT_SHIFT);
    }

    #[test]
    fn device_query_letters_are_unmapped() {
        assert_eq!(KeyCode::from(device_query::Keycode::A), KeyCode::UNMAPPED);
        assert_eq!(KeyCode::from(device_query::Keycode::Space), KeyCode::UNMAPPED);
    }

    #[test]
    fn key_names() {
        assert_eq!(KeyCode::LEFT_SHIFT.name(), "LeftShift");
        assert_eq!(KeyCode(30).name(), "Other");
    }
}
