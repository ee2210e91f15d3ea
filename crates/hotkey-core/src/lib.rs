//! # hotkey-core
//!
//! Shared library for the hotkey host containing key tables, hotkey
//! gestures, block latches and recorded input sequences.
//!
//! It has zero dependencies on OS APIs, UI frameworks or threads of its own;
//! the hook plumbing lives in `hotkey-host`.
//!
//! # Architecture overview (for beginners)
//!
//! The host installs global keyboard and mouse hooks so that hotkeys work
//! even while another application has focus.  Every captured event is
//! normalized into the types defined here:
//!
//! - **`keymap`** – [`Key`] (Windows VK codes as discriminants),
//!   [`MouseButton`], [`ModifierKeys`] and the live [`ModifierTracker`].
//! - **`domain`** – [`HotkeyGesture`] (what is compared when matching a
//!   hotkey), [`BlockLatch`] (reference-counted suppression gates) and
//!   [`SequenceList`] (recorded macros).

pub mod domain;
pub mod keymap;

// Re-export the most-used types at the crate root so callers can write
// `hotkey_core::HotkeyGesture` instead of `hotkey_core::domain::gesture::HotkeyGesture`.
pub use domain::gesture::{GestureParseError, HotkeyGesture};
pub use domain::latch::{BlockLatch, LatchGuard};
pub use domain::sequence::{CapacityExceeded, SequenceItem, SequenceLimits, SequenceList};
pub use keymap::{Key, KeyMapper, ModifierKeys, ModifierTracker, MouseButton};
