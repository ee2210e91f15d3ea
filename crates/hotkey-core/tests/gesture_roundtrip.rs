//! Integration tests for gesture normalization and the canonical string form.
//!
//! These exercise the public API the host and its config layer rely on:
//! every constructible gesture must survive `to_string` → `parse`, and a
//! physical modifier key must compare equal to its configured flag.

use hotkey_core::{HotkeyGesture, Key, KeyMapper, ModifierKeys, MouseButton};

/// Every modifier combination (16 sets).
fn all_modifier_sets() -> impl Iterator<Item = ModifierKeys> {
    (0u8..16).map(ModifierKeys::from_bits_truncate)
}

#[test]
fn test_every_constructible_gesture_round_trips() {
    let keys = std::iter::once(None).chain(Key::ALL.iter().copied().map(Some));
    for key in keys {
        let buttons = std::iter::once(None).chain(MouseButton::ALL.into_iter().map(Some));
        for button in buttons {
            for mods in all_modifier_sets() {
                let gesture = HotkeyGesture::new(key, button, mods);
                let text = gesture.to_string();
                let parsed: HotkeyGesture = text
                    .parse()
                    .unwrap_or_else(|e| panic!("'{text}' failed to parse: {e}"));
                assert_eq!(parsed, gesture, "round-trip mismatch for '{text}'");
            }
        }
    }
}

#[test]
fn test_raw_left_ctrl_event_equals_configured_ctrl() {
    // Arrange: what the hook layer builds for a left-ctrl key-down
    let vk_lcontrol = 0xA2;
    let key = KeyMapper::windows_vk_to_key(vk_lcontrol).expect("VK_LCONTROL is mapped");
    let from_event = HotkeyGesture::from_key(key, ModifierKeys::CONTROL);

    // Act
    let configured = HotkeyGesture::new(None, None, ModifierKeys::CONTROL);

    // Assert
    assert_eq!(from_event, configured);
    assert_eq!(from_event.to_string(), "Ctrl");
}

#[test]
fn test_gestures_hash_consistently_with_equality() {
    use std::collections::HashSet;

    let mut set = HashSet::new();
    set.insert(HotkeyGesture::from_key(Key::LeftAlt, ModifierKeys::NONE));
    set.insert(HotkeyGesture::from_key(Key::RightAlt, ModifierKeys::ALT));
    set.insert("Alt".parse::<HotkeyGesture>().unwrap());

    assert_eq!(set.len(), 1);
}

#[test]
fn test_key_and_button_in_one_gesture() {
    let gesture: HotkeyGesture = "Shift+A+XButton2".parse().unwrap();
    assert_eq!(gesture.key(), Some(Key::A));
    assert_eq!(gesture.mouse_button(), Some(MouseButton::XButton2));
    assert_eq!(gesture.modifiers(), ModifierKeys::SHIFT);
    assert_eq!(gesture.to_string(), "Shift+A+XButton2");
}
