//! Windows Virtual Key (VK) code to [`Key`] translation table.
//!
//! Reference: Windows Virtual-Key Codes (winuser.h).
//!
//! # What is a Windows Virtual Key (VK) code? (for beginners)
//!
//! Windows assigns each keyboard key a number called a "Virtual Key code".
//! These are defined in `<winuser.h>` and named `VK_*` (e.g., `VK_RETURN = 0x0D`,
//! `VK_SPACE = 0x20`).  They are "virtual" because they represent *logical* keys
//! rather than physical scan codes.
//!
//! # How this table works
//!
//! `VK_TO_KEY_TABLE` is a compile-time constant array of 256 `Option<Key>`
//! values, indexed by VK code.  It is filled from [`Key::ALL`], whose
//! discriminants already are VK codes, so the two can never disagree.
//! Indexing into this array is an O(1) lookup; every captured key event goes
//! through it on the hook thread.

use super::key::Key;

/// Translates a Windows Virtual Key code to a [`Key`].
///
/// Returns `None` for VK codes with no keyboard key (mouse-button VKs,
/// reserved ranges, IME keys).  The generic `VK_SHIFT`, `VK_CONTROL` and
/// `VK_MENU` codes map to the left-hand variants.
///
/// # Panics
///
/// This function never panics; all u8 inputs are handled.
pub fn vk_to_key(vk: u8) -> Option<Key> {
    VK_TO_KEY_TABLE[vk as usize]
}

/// Translates a [`Key`] back to its Windows Virtual Key code.
pub fn key_to_vk(key: Key) -> u8 {
    key.vk()
}

/// Complete VK → Key mapping table indexed by VK code (0x00–0xFF).
const VK_TO_KEY_TABLE: [Option<Key>; 256] = {
    let mut t: [Option<Key>; 256] = [None; 256];

    let mut i = 0;
    while i < Key::ALL.len() {
        let key = Key::ALL[i];
        t[key as usize] = Some(key);
        i += 1;
    }

    // ── Generic modifier VKs ──────────────────────────────────────────────────
    // WH_KEYBOARD_LL reports sided codes, but SendInput callers and some
    // remote-desktop clients still produce the generic ones.
    t[0x10] = Some(Key::LeftShift); // VK_SHIFT
    t[0x11] = Some(Key::LeftCtrl); // VK_CONTROL
    t[0x12] = Some(Key::LeftAlt); // VK_MENU

    t
};
