//! Key, mouse-button and modifier definitions.
//!
//! The canonical key representation is [`Key`], whose discriminants are
//! Windows Virtual-Key codes.  Platform codes are translated to keys at the
//! hook boundary; everything downstream (gestures, trackers, the recorder)
//! only ever sees [`Key`], [`MouseButton`] and [`ModifierKeys`].

pub mod key;
pub mod modifiers;
pub mod windows_vk;

pub use key::{Key, MouseButton};
pub use modifiers::{ModifierKeys, ModifierTracker};

/// Unified key mapper for the platform code directions the hook layer needs.
pub struct KeyMapper;

impl KeyMapper {
    /// Translates a Windows Virtual Key code to a [`Key`].
    ///
    /// Returns `None` if no keyboard key exists for `vk`.
    pub fn windows_vk_to_key(vk: u8) -> Option<Key> {
        windows_vk::vk_to_key(vk)
    }

    /// Translates a [`Key`] to its Windows Virtual Key code.
    pub fn key_to_windows_vk(key: Key) -> u8 {
        windows_vk::key_to_vk(key)
    }
}
