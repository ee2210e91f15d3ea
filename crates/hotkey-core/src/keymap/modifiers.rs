//! Modifier flags and live modifier tracking.
//!
//! [`ModifierKeys`] is the side-less flag set stored in a gesture
//! (Control, Alt, Shift, Windows).  [`ModifierTracker`] follows the
//! physical left/right modifier keys from key-down/up edges and produces the
//! snapshot that is stamped onto every captured event.

use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

use super::key::Key;

/// Bit set of side-less modifier keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModifierKeys(u8);

impl ModifierKeys {
    pub const NONE: ModifierKeys = ModifierKeys(0);
    pub const CONTROL: ModifierKeys = ModifierKeys(1 << 0);
    pub const ALT: ModifierKeys = ModifierKeys(1 << 1);
    pub const SHIFT: ModifierKeys = ModifierKeys(1 << 2);
    pub const WINDOWS: ModifierKeys = ModifierKeys(1 << 3);

    /// Canonical display order: Control, Alt, Shift, Windows.
    pub const ORDERED: [ModifierKeys; 4] = [
        ModifierKeys::CONTROL,
        ModifierKeys::ALT,
        ModifierKeys::SHIFT,
        ModifierKeys::WINDOWS,
    ];

    /// Raw bit value.
    pub fn bits(self) -> u8 {
        self.0
    }

    /// Builds a set from raw bits, dropping unknown bits.
    pub fn from_bits_truncate(bits: u8) -> Self {
        ModifierKeys(bits & 0x0F)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if every flag in `other` is also set in `self`.
    pub fn contains(self, other: ModifierKeys) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if any flag of `other` is set in `self`.
    pub fn intersects(self, other: ModifierKeys) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: ModifierKeys) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: ModifierKeys) {
        self.0 &= !other.0;
    }

    pub fn union(self, other: ModifierKeys) -> ModifierKeys {
        ModifierKeys(self.0 | other.0)
    }

    /// Iterates the set flags in canonical order.
    pub fn iter(self) -> impl Iterator<Item = ModifierKeys> {
        ModifierKeys::ORDERED
            .into_iter()
            .filter(move |flag| self.contains(*flag))
    }

    /// Canonical name of a single flag (`Ctrl`, `Alt`, `Shift`, `Win`).
    ///
    /// Returns `None` for the empty set or for a combination of flags.
    pub fn name(self) -> Option<&'static str> {
        match self {
            ModifierKeys::CONTROL => Some("Ctrl"),
            ModifierKeys::ALT => Some("Alt"),
            ModifierKeys::SHIFT => Some("Shift"),
            ModifierKeys::WINDOWS => Some("Win"),
            _ => None,
        }
    }

    /// Parses a single modifier token, ignoring ASCII case.
    ///
    /// Accepts `Ctrl`/`Control`, `Alt`, `Shift` and `Win`/`Windows`.
    pub fn from_name(name: &str) -> Option<ModifierKeys> {
        match name.to_ascii_lowercase().as_str() {
            "ctrl" | "control" => Some(ModifierKeys::CONTROL),
            "alt" => Some(ModifierKeys::ALT),
            "shift" => Some(ModifierKeys::SHIFT),
            "win" | "windows" => Some(ModifierKeys::WINDOWS),
            _ => None,
        }
    }
}

impl BitOr for ModifierKeys {
    type Output = ModifierKeys;

    fn bitor(self, rhs: ModifierKeys) -> ModifierKeys {
        self.union(rhs)
    }
}

impl BitOrAssign for ModifierKeys {
    fn bitor_assign(&mut self, rhs: ModifierKeys) {
        self.insert(rhs);
    }
}

/// Tracks which physical modifier keys are currently held.
///
/// Left and right keys are tracked separately so that releasing one Ctrl
/// while the other is still held keeps [`ModifierKeys::CONTROL`] set.
#[derive(Debug, Default, Clone, Copy)]
pub struct ModifierTracker {
    /// One bit per physical modifier key, indexed by [`Self::slot`].
    held: u8,
}

impl ModifierTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a key edge.  Non-modifier keys are ignored.
    pub fn update(&mut self, key: Key, is_down: bool) {
        let Some(slot) = Self::slot(key) else {
            return;
        };
        if is_down {
            self.held |= 1 << slot;
        } else {
            self.held &= !(1 << slot);
        }
    }

    /// Returns the current side-less modifier snapshot.
    pub fn snapshot(&self) -> ModifierKeys {
        let mut flags = ModifierKeys::NONE;
        for (slot, key) in Self::SLOTS.iter().enumerate() {
            if self.held & (1 << slot) != 0 {
                if let Some(flag) = key.modifier() {
                    flags |= flag;
                }
            }
        }
        flags
    }

    /// Forgets every held key (e.g. after the hooks were reinstalled).
    pub fn clear(&mut self) {
        self.held = 0;
    }

    const SLOTS: [Key; 8] = [
        Key::LeftCtrl,
        Key::RightCtrl,
        Key::LeftAlt,
        Key::RightAlt,
        Key::LeftShift,
        Key::RightShift,
        Key::LWin,
        Key::RWin,
    ];

    fn slot(key: Key) -> Option<usize> {
        Self::SLOTS.iter().position(|k| *k == key)
    }
}
