//! Hotkey gestures: the canonical, comparable form of a key/mouse chord.
//!
//! A [`HotkeyGesture`] is an immutable value made of an optional [`Key`], an
//! optional [`MouseButton`] and a set of [`ModifierKeys`].  It is what the user
//! configures ("Ctrl+Shift+F5") and also what every captured key or button
//! event is turned into, so matching a configured hotkey is plain equality.
//!
//! # Normalization (for beginners)
//!
//! The keyboard has *physical* modifier keys (left Ctrl, right Ctrl, ...) but
//! a configured hotkey only says "Ctrl".  When a gesture is constructed with a
//! modifier key as its main key, the key is folded into the modifier flags and
//! cleared:
//!
//! ```rust
//! use hotkey_core::{HotkeyGesture, Key, ModifierKeys};
//!
//! let pressed = HotkeyGesture::from_key(Key::LeftCtrl, ModifierKeys::NONE);
//! let configured: HotkeyGesture = "Ctrl".parse().unwrap();
//! assert_eq!(pressed, configured);
//! assert_eq!(pressed.key(), None);
//! ```
//!
//! # Canonical string form
//!
//! Modifiers in the fixed order `Ctrl`, `Alt`, `Shift`, `Win`, then the key
//! name, then the mouse-button name, all joined with `+`.  The empty gesture
//! renders as `None`.  Parsing the canonical string always reconstructs an
//! equal gesture.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::keymap::{Key, ModifierKeys, MouseButton};

/// String form of the empty gesture.
const EMPTY_NAME: &str = "None";

/// Error returned when a gesture string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GestureParseError {
    #[error("gesture string is empty")]
    Empty,
    #[error("unknown gesture token '{0}'")]
    UnknownToken(String),
    #[error("gesture names more than one key ('{first}' and '{second}')")]
    DuplicateKey { first: Key, second: Key },
    #[error("gesture names more than one mouse button ('{first}' and '{second}')")]
    DuplicateButton {
        first: MouseButton,
        second: MouseButton,
    },
}

/// A normalized key chord or mouse button plus modifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct HotkeyGesture {
    mouse_button: Option<MouseButton>,
    key: Option<Key>,
    modifiers: ModifierKeys,
}

impl HotkeyGesture {
    /// The gesture with no key, button or modifier.
    pub const EMPTY: HotkeyGesture = HotkeyGesture {
        mouse_button: None,
        key: None,
        modifiers: ModifierKeys::NONE,
    };

    /// Builds a gesture, folding a modifier main key into the flags.
    pub fn new(key: Option<Key>, mouse_button: Option<MouseButton>, modifiers: ModifierKeys) -> Self {
        let mut modifiers = modifiers;
        let key = match key {
            Some(k) => match k.modifier() {
                Some(flag) => {
                    modifiers |= flag;
                    None
                }
                None => Some(k),
            },
            None => None,
        };
        Self {
            mouse_button,
            key,
            modifiers,
        }
    }

    /// Gesture for a key pressed together with `modifiers`.
    pub fn from_key(key: Key, modifiers: ModifierKeys) -> Self {
        Self::new(Some(key), None, modifiers)
    }

    /// Gesture for a mouse button pressed together with `modifiers`.
    pub fn from_button(button: MouseButton, modifiers: ModifierKeys) -> Self {
        Self::new(None, Some(button), modifiers)
    }

    /// Gesture made only of modifiers (e.g. `Ctrl+Shift`).
    pub fn from_modifiers(modifiers: ModifierKeys) -> Self {
        Self::new(None, None, modifiers)
    }

    /// Returns a copy with `modifiers` replacing the current flags.
    pub fn with_modifiers(self, modifiers: ModifierKeys) -> Self {
        Self::new(self.key, self.mouse_button, modifiers)
    }

    pub fn key(&self) -> Option<Key> {
        self.key
    }

    pub fn mouse_button(&self) -> Option<MouseButton> {
        self.mouse_button
    }

    pub fn modifiers(&self) -> ModifierKeys {
        self.modifiers
    }

    /// `true` when no key, button or modifier is set.
    pub fn is_empty(&self) -> bool {
        self.key.is_none() && self.mouse_button.is_none() && self.modifiers.is_empty()
    }

    /// `true` when `key` is the main key, or a modifier key whose flag is
    /// part of this gesture.
    pub fn involves_key(&self, key: Key) -> bool {
        match key.modifier() {
            Some(flag) => self.modifiers.contains(flag),
            None => self.key == Some(key),
        }
    }

    /// `true` when `button` is this gesture's mouse button.
    pub fn involves_button(&self, button: MouseButton) -> bool {
        self.mouse_button == Some(button)
    }
}

impl fmt::Display for HotkeyGesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str(EMPTY_NAME);
        }
        let parts: Vec<&str> = self
            .modifiers
            .iter()
            .filter_map(ModifierKeys::name)
            .chain(self.key.map(Key::name))
            .chain(self.mouse_button.map(MouseButton::name))
            .collect();
        f.write_str(&parts.join("+"))
    }
}

impl FromStr for HotkeyGesture {
    type Err = GestureParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(GestureParseError::Empty);
        }
        if trimmed.eq_ignore_ascii_case(EMPTY_NAME) {
            return Ok(HotkeyGesture::EMPTY);
        }

        let mut key: Option<Key> = None;
        let mut button: Option<MouseButton> = None;
        let mut modifiers = ModifierKeys::NONE;

        for token in trimmed.split('+').map(str::trim) {
            if let Some(flag) = ModifierKeys::from_name(token) {
                modifiers |= flag;
                continue;
            }
            if let Some(b) = MouseButton::from_name(token) {
                if let Some(first) = button {
                    return Err(GestureParseError::DuplicateButton { first, second: b });
                }
                button = Some(b);
                continue;
            }
            if let Some(k) = Key::from_name(token) {
                if let Some(flag) = k.modifier() {
                    modifiers |= flag;
                    continue;
                }
                if let Some(first) = key {
                    return Err(GestureParseError::DuplicateKey { first, second: k });
                }
                key = Some(k);
                continue;
            }
            return Err(GestureParseError::UnknownToken(token.to_string()));
        }

        Ok(HotkeyGesture::new(key, button, modifiers))
    }
}

impl Serialize for HotkeyGesture {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for HotkeyGesture {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
