//! Logical keyboard keys and mouse buttons.
//!
//! [`Key`] is the canonical key representation used throughout the workspace.
//! The numeric value of each variant is its Windows Virtual-Key code, so the
//! hook layer can convert with a single table lookup in either direction (see
//! [`super::windows_vk`]).
//!
//! # Canonical names (for beginners)
//!
//! Every key has exactly one canonical name, which is the variant name
//! (`A`, `D1`, `F5`, `LeftCtrl`, `OemPlus`, ...).  These names are what a
//! gesture string such as `Ctrl+Shift+F5` is built from, and what the TOML
//! configuration stores.  Parsing is case-insensitive so hand-written config
//! files do not have to match the exact capitalisation.

use serde::{Deserialize, Serialize};

use super::modifiers::ModifierKeys;

/// Declares the [`Key`] enum together with its lookup slice.
///
/// Keeping the variant list in one place guarantees that `Key::ALL`, the VK
/// table and the name table can never drift apart.
macro_rules! define_keys {
    ($( $variant:ident = $vk:literal, )+) => {
        /// A logical keyboard key.  The discriminant is the Windows VK code.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[repr(u8)]
        pub enum Key {
            $( $variant = $vk, )+
        }

        impl Key {
            /// Every defined key, in VK order of declaration.
            pub const ALL: &'static [Key] = &[ $( Key::$variant, )+ ];

            /// Returns the canonical name of the key (e.g. `"LeftCtrl"`).
            pub fn name(self) -> &'static str {
                match self {
                    $( Key::$variant => stringify!($variant), )+
                }
            }
        }
    };
}

define_keys! {
    // ── Editing / control ─────────────────────────────────────────────────────
    Back = 0x08,
    Tab = 0x09,
    Enter = 0x0D,
    Pause = 0x13,
    CapsLock = 0x14,
    Escape = 0x1B,
    Space = 0x20,
    PageUp = 0x21,
    PageDown = 0x22,
    End = 0x23,
    Home = 0x24,
    Left = 0x25,
    Up = 0x26,
    Right = 0x27,
    Down = 0x28,
    PrintScreen = 0x2C,
    Insert = 0x2D,
    Delete = 0x2E,

    // ── Digit row ─────────────────────────────────────────────────────────────
    D0 = 0x30,
    D1 = 0x31,
    D2 = 0x32,
    D3 = 0x33,
    D4 = 0x34,
    D5 = 0x35,
    D6 = 0x36,
    D7 = 0x37,
    D8 = 0x38,
    D9 = 0x39,

    // ── Letters ───────────────────────────────────────────────────────────────
    A = 0x41,
    B = 0x42,
    C = 0x43,
    D = 0x44,
    E = 0x45,
    F = 0x46,
    G = 0x47,
    H = 0x48,
    I = 0x49,
    J = 0x4A,
    K = 0x4B,
    L = 0x4C,
    M = 0x4D,
    N = 0x4E,
    O = 0x4F,
    P = 0x50,
    Q = 0x51,
    R = 0x52,
    S = 0x53,
    T = 0x54,
    U = 0x55,
    V = 0x56,
    W = 0x57,
    X = 0x58,
    Y = 0x59,
    Z = 0x5A,

    // ── Windows / context keys ────────────────────────────────────────────────
    LWin = 0x5B,
    RWin = 0x5C,
    Apps = 0x5D,

    // ── Numpad ────────────────────────────────────────────────────────────────
    NumPad0 = 0x60,
    NumPad1 = 0x61,
    NumPad2 = 0x62,
    NumPad3 = 0x63,
    NumPad4 = 0x64,
    NumPad5 = 0x65,
    NumPad6 = 0x66,
    NumPad7 = 0x67,
    NumPad8 = 0x68,
    NumPad9 = 0x69,
    Multiply = 0x6A,
    Add = 0x6B,
    Subtract = 0x6D,
    Decimal = 0x6E,
    Divide = 0x6F,

    // ── Function keys ─────────────────────────────────────────────────────────
    F1 = 0x70,
    F2 = 0x71,
    F3 = 0x72,
    F4 = 0x73,
    F5 = 0x74,
    F6 = 0x75,
    F7 = 0x76,
    F8 = 0x77,
    F9 = 0x78,
    F10 = 0x79,
    F11 = 0x7A,
    F12 = 0x7B,
    F13 = 0x7C,
    F14 = 0x7D,
    F15 = 0x7E,
    F16 = 0x7F,
    F17 = 0x80,
    F18 = 0x81,
    F19 = 0x82,
    F20 = 0x83,
    F21 = 0x84,
    F22 = 0x85,
    F23 = 0x86,
    F24 = 0x87,

    // ── Locks ─────────────────────────────────────────────────────────────────
    NumLock = 0x90,
    Scroll = 0x91,

    // ── Left/right modifiers ──────────────────────────────────────────────────
    LeftShift = 0xA0,
    RightShift = 0xA1,
    LeftCtrl = 0xA2,
    RightCtrl = 0xA3,
    LeftAlt = 0xA4,
    RightAlt = 0xA5,

    // ── Media ─────────────────────────────────────────────────────────────────
    VolumeMute = 0xAD,
    VolumeDown = 0xAE,
    VolumeUp = 0xAF,
    MediaNextTrack = 0xB0,
    MediaPreviousTrack = 0xB1,
    MediaStop = 0xB2,
    MediaPlayPause = 0xB3,

    // ── OEM punctuation (US layout legends in comments) ───────────────────────
    OemSemicolon = 0xBA,     // ; :
    OemPlus = 0xBB,          // = +
    OemComma = 0xBC,         // , <
    OemMinus = 0xBD,         // - _
    OemPeriod = 0xBE,        // . >
    OemQuestion = 0xBF,      // / ?
    OemTilde = 0xC0,         // ` ~
    OemOpenBrackets = 0xDB,  // [ {
    OemPipe = 0xDC,          // \ |
    OemCloseBrackets = 0xDD, // ] }
    OemQuotes = 0xDE,        // ' "
}

impl Key {
    /// Returns the Windows Virtual-Key code of this key.
    pub fn vk(self) -> u8 {
        self as u8
    }

    /// Looks a key up by its canonical name, ignoring ASCII case.
    pub fn from_name(name: &str) -> Option<Key> {
        Key::ALL
            .iter()
            .copied()
            .find(|k| k.name().eq_ignore_ascii_case(name))
    }

    /// Returns the modifier flag this key normalizes into, if it is a
    /// left/right modifier key.
    pub fn modifier(self) -> Option<ModifierKeys> {
        match self {
            Key::LeftCtrl | Key::RightCtrl => Some(ModifierKeys::CONTROL),
            Key::LeftAlt | Key::RightAlt => Some(ModifierKeys::ALT),
            Key::LeftShift | Key::RightShift => Some(ModifierKeys::SHIFT),
            Key::LWin | Key::RWin => Some(ModifierKeys::WINDOWS),
            _ => None,
        }
    }

    /// Returns `true` for the eight left/right modifier keys.
    pub fn is_modifier(self) -> bool {
        self.modifier().is_some()
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Mouse buttons that can take part in a gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    XButton1,
    XButton2,
}

impl MouseButton {
    /// Every mouse button, in canonical order.
    pub const ALL: [MouseButton; 5] = [
        MouseButton::Left,
        MouseButton::Right,
        MouseButton::Middle,
        MouseButton::XButton1,
        MouseButton::XButton2,
    ];

    /// Canonical gesture-string name of the button.
    pub fn name(self) -> &'static str {
        match self {
            MouseButton::Left => "LeftButton",
            MouseButton::Right => "RightButton",
            MouseButton::Middle => "MiddleButton",
            MouseButton::XButton1 => "XButton1",
            MouseButton::XButton2 => "XButton2",
        }
    }

    /// Parses a button name.  Accepts the canonical names plus the
    /// `MouseLeft`/`MouseRight`/`MouseMiddle`/`Mouse4`/`Mouse5` aliases.
    pub fn from_name(name: &str) -> Option<MouseButton> {
        if let Some(b) = MouseButton::ALL
            .iter()
            .copied()
            .find(|b| b.name().eq_ignore_ascii_case(name))
        {
            return Some(b);
        }
        let alias = name.to_ascii_lowercase();
        match alias.as_str() {
            "mouseleft" => Some(MouseButton::Left),
            "mouseright" => Some(MouseButton::Right),
            "mousemiddle" => Some(MouseButton::Middle),
            "mouse4" => Some(MouseButton::XButton1),
            "mouse5" => Some(MouseButton::XButton2),
            _ => None,
        }
    }

    /// Dense index (0..5) used by pressed-state tables.
    pub fn index(self) -> usize {
        match self {
            MouseButton::Left => 0,
            MouseButton::Right => 1,
            MouseButton::Middle => 2,
            MouseButton::XButton1 => 3,
            MouseButton::XButton2 => 4,
        }
    }
}

impl std::fmt::Display for MouseButton {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
