//! Trial generation from the US shift layout
//!
//! Each side's table holds the characters a touch typist produces while
//! holding the *opposite* hand's shift key, so the prompt `Q` (typed with
//! the left hand) expects the right shift.

use crate::keyboard::KeyCode;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::fmt;

/// Which shift key is expected or observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// Identify a shift key; every other key yields `None`
    pub fn from_key(key: KeyCode) -> Option<Side> {
        match key {
            KeyCode::LEFT_SHIFT => Some(Side::Left),
            KeyCode::RIGHT_SHIFT => Some(Side::Right),
            _ => None,
        }
    }

    /// The physical key for this side
    pub fn key(self) -> KeyCode {
        match self {
            Side::Left => KeyCode::LEFT_SHIFT,
            Side::Right => KeyCode::RIGHT_SHIFT,
        }
    }

    pub fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    /// Characters that call for this side's shift
    pub fn table(self) -> &'static [char] {
        match self {
            Side::Left => &LEFT_SHIFT_CHARS,
            Side::Right => &RIGHT_SHIFT_CHARS,
        }
    }

    /// Which table a character belongs to
    pub fn of_char(c: char) -> Option<Side> {
        if LEFT_SHIFT_CHARS.contains(&c) {
            Some(Side::Left)
        } else if RIGHT_SHIFT_CHARS.contains(&c) {
            Some(Side::Right)
        } else {
            None
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => write!(f, "left"),
            Side::Right => write!(f, "right"),
        }
    }
}

/// Shifted characters typed with the right hand (left shift expected)
pub static LEFT_SHIFT_CHARS: [char; 26] = [
    '^', '&', '*', '(', ')', '_', '+',
    'Y', 'U', 'I', 'O', 'P', '{', '}', '|',
    'H', 'J', 'K', 'L', ':', '"',
    'N', 'M', '<', '>', '?',
];

/// Shifted characters typed with the left hand (right shift expected)
pub static RIGHT_SHIFT_CHARS: [char; 21] = [
    '~', '!', '@', '#', '$', '%',
    'Q', 'W', 'E', 'R', 'T',
    'A', 'S', 'D', 'F', 'G',
    'Z', 'X', 'C', 'V', 'B',
];

/// One prompt: the character shown and the shift it calls for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrialSpec {
    pub character: char,
    pub expected: Side,
}

/// Random source of trials
pub struct TrialGenerator {
    rng: SmallRng,
}

impl TrialGenerator {
    /// Generator seeded from OS entropy
    pub fn new() -> Self {
        Self {
            rng: SmallRng::from_entropy(),
        }
    }

    /// Reproducible generator
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Pick a side with equal probability, then a character from its table
    pub fn next_trial(&mut self) -> TrialSpec {
        let side = if self.rng.gen_bool(0.5) {
            Side::Left
        } else {
            Side::Right
        };
        self.trial_for(side)
    }

    /// Pick a character uniformly from one side's table
    pub fn trial_for(&mut self, side: Side) -> TrialSpec {
        let table = side.table();
        let character = table[self.rng.gen_range(0..table.len())];
        TrialSpec {
            character,
            expected: side,
        }
    }
}

impl Default for TrialGenerator {
    fn default() -> Self {
        Self::new()
    }
}
