//! Recorded input sequences (macros).
//!
//! A [`SequenceList`] is an ordered list of [`SequenceItem`]s with its total
//! duration and item count tracked live as items are added or removed.  The
//! recorder appends to it while a session is armed; an editor can also build
//! or modify one directly.
//!
//! # Bounds
//!
//! [`SequenceLimits`] caps both the accumulated duration and the number of
//! items.  [`SequenceList::can_add`] is the single predicate that decides
//! whether an item still fits; [`SequenceList::try_push`] never appends an
//! item that would overshoot either bound.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::gesture::HotkeyGesture;

/// One step of a recorded sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SequenceItem {
    /// A key or mouse-button edge.
    Hotkey { gesture: HotkeyGesture, is_down: bool },
    /// A pause.  `is_key_press` marks the hold time between a down and the
    /// matching up of the same key or button.
    Delay {
        #[serde(with = "duration_ms")]
        duration: Duration,
        #[serde(default)]
        is_key_press: bool,
    },
    /// Literal text typed as a unit.
    Text { text: String },
    /// A sampled cursor position, absolute or relative to the previous sample.
    MousePosition { x: i32, y: i32, is_relative: bool },
    /// A wheel notch count (positive = away from the user).
    MouseWheel { delta: i16, #[serde(default)] horizontal: bool },
}

impl SequenceItem {
    /// Convenience constructor for a plain (non key-press) delay.
    pub fn delay(duration: Duration) -> Self {
        SequenceItem::Delay {
            duration,
            is_key_press: false,
        }
    }

    /// Time this item contributes to the sequence duration.
    pub fn duration(&self) -> Duration {
        match self {
            SequenceItem::Delay { duration, .. } => *duration,
            _ => Duration::ZERO,
        }
    }

    /// The gesture of a `Hotkey` item.
    pub fn gesture(&self) -> Option<&HotkeyGesture> {
        match self {
            SequenceItem::Hotkey { gesture, .. } => Some(gesture),
            _ => None,
        }
    }
}

/// Upper bounds applied when appending to a [`SequenceList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceLimits {
    pub max_duration: Duration,
    pub max_items_count: usize,
}

impl SequenceLimits {
    /// No effective bound.
    pub const UNBOUNDED: SequenceLimits = SequenceLimits {
        max_duration: Duration::MAX,
        max_items_count: usize::MAX,
    };
}

/// Returned when an append would exceed [`SequenceLimits`].
///
/// This is a normal terminal condition for a recording, not a fault.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "sequence capacity exceeded: {count} items / {duration:?} with limits {max_items_count} items / {max_duration:?}"
)]
pub struct CapacityExceeded {
    pub count: usize,
    pub duration: Duration,
    pub max_items_count: usize,
    pub max_duration: Duration,
}

/// Ordered, mutable list of sequence items with live totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<SequenceItem>", into = "Vec<SequenceItem>")]
pub struct SequenceList {
    items: Vec<SequenceItem>,
    total_duration: Duration,
}

impl SequenceList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of all item durations.
    pub fn total_duration(&self) -> Duration {
        self.total_duration
    }

    pub fn items(&self) -> &[SequenceItem] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SequenceItem> {
        self.items.iter()
    }

    pub fn last(&self) -> Option<&SequenceItem> {
        self.items.last()
    }

    /// `true` if `item` fits: count + 1 ≤ max items and
    /// duration + item ≤ max duration.
    pub fn can_add(&self, item: &SequenceItem, limits: &SequenceLimits) -> bool {
        self.can_add_all(std::slice::from_ref(item), limits)
    }

    /// `true` if all of `items` fit when appended together.
    pub fn can_add_all(&self, items: &[SequenceItem], limits: &SequenceLimits) -> bool {
        let count_ok = self
            .items
            .len()
            .checked_add(items.len())
            .is_some_and(|n| n <= limits.max_items_count);
        let added = items
            .iter()
            .try_fold(self.total_duration, |acc, i| acc.checked_add(i.duration()));
        let duration_ok = added.is_some_and(|d| d <= limits.max_duration);
        count_ok && duration_ok
    }

    /// Appends `item` only if it fits.
    pub fn try_push(
        &mut self,
        item: SequenceItem,
        limits: &SequenceLimits,
    ) -> Result<(), CapacityExceeded> {
        self.try_extend(vec![item], limits)
    }

    /// Appends all of `items` or none of them.
    pub fn try_extend(
        &mut self,
        items: Vec<SequenceItem>,
        limits: &SequenceLimits,
    ) -> Result<(), CapacityExceeded> {
        if !self.can_add_all(&items, limits) {
            return Err(self.capacity_error(limits));
        }
        for item in items {
            self.push(item);
        }
        Ok(())
    }

    /// Appends without checking bounds (editor use).
    pub fn push(&mut self, item: SequenceItem) {
        self.total_duration = self.total_duration.saturating_add(item.duration());
        self.items.push(item);
    }

    /// Inserts at `index`, shifting later items.
    ///
    /// # Panics
    ///
    /// Panics if `index > len`, like [`Vec::insert`].
    pub fn insert(&mut self, index: usize, item: SequenceItem) {
        self.total_duration = self.total_duration.saturating_add(item.duration());
        self.items.insert(index, item);
    }

    /// Removes and returns the item at `index`, or `None` if out of range.
    pub fn remove(&mut self, index: usize) -> Option<SequenceItem> {
        if index >= self.items.len() {
            return None;
        }
        let item = self.items.remove(index);
        self.total_duration = self.total_duration.saturating_sub(item.duration());
        Some(item)
    }

    pub fn pop(&mut self) -> Option<SequenceItem> {
        let item = self.items.pop()?;
        self.total_duration = self.total_duration.saturating_sub(item.duration());
        Some(item)
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.total_duration = Duration::ZERO;
    }

    /// Appends a full key press: down, a key-press delay of `hold`, up.
    pub fn push_key_press(&mut self, gesture: HotkeyGesture, hold: Duration) {
        self.push(SequenceItem::Hotkey {
            gesture,
            is_down: true,
        });
        self.push(SequenceItem::Delay {
            duration: hold,
            is_key_press: true,
        });
        self.push(SequenceItem::Hotkey {
            gesture,
            is_down: false,
        });
    }

    /// Appends a text item.
    pub fn push_text(&mut self, text: impl Into<String>) {
        self.push(SequenceItem::Text { text: text.into() });
    }

    pub fn into_vec(self) -> Vec<SequenceItem> {
        self.items
    }

    fn capacity_error(&self, limits: &SequenceLimits) -> CapacityExceeded {
        CapacityExceeded {
            count: self.items.len(),
            duration: self.total_duration,
            max_items_count: limits.max_items_count,
            max_duration: limits.max_duration,
        }
    }
}

impl From<Vec<SequenceItem>> for SequenceList {
    fn from(items: Vec<SequenceItem>) -> Self {
        let mut list = SequenceList::new();
        for item in items {
            list.push(item);
        }
        list
    }
}

impl From<SequenceList> for Vec<SequenceItem> {
    fn from(list: SequenceList) -> Self {
        list.items
    }
}

impl<'a> IntoIterator for &'a SequenceList {
    type Item = &'a SequenceItem;
    type IntoIter = std::slice::Iter<'a, SequenceItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Serializes a `Duration` as integer milliseconds.
mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keymap::{Key, ModifierKeys};

    fn key_down(key: Key) -> SequenceItem {
        SequenceItem::Hotkey {
            gesture: HotkeyGesture::from_key(key, ModifierKeys::NONE),
            is_down: true,
        }
    }

    fn limits(ms: u64, count: usize) -> SequenceLimits {
        SequenceLimits {
            max_duration: Duration::from_millis(ms),
            max_items_count: count,
        }
    }

    #[test]
    fn test_totals_are_tracked_live() {
        // Arrange
        let mut list = SequenceList::new();

        // Act
        list.push(SequenceItem::delay(Duration::from_millis(100)));
        list.push(key_down(Key::A));
        list.push(SequenceItem::delay(Duration::from_millis(50)));

        // Assert
        assert_eq!(list.len(), 3);
        assert_eq!(list.total_duration(), Duration::from_millis(150));

        list.remove(0);
        assert_eq!(list.total_duration(), Duration::from_millis(50));
        list.clear();
        assert_eq!(list.total_duration(), Duration::ZERO);
        assert!(list.is_empty());
    }

    #[test]
    fn test_try_push_rejects_exactly_at_count_bound() {
        let lim = limits(10_000, 2);
        let mut list = SequenceList::new();
        assert!(list.try_push(key_down(Key::A), &lim).is_ok());
        assert!(list.try_push(key_down(Key::B), &lim).is_ok());
        let err = list.try_push(key_down(Key::C), &lim).unwrap_err();
        assert_eq!(err.count, 2);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_try_push_allows_duration_equal_to_limit() {
        let lim = limits(100, 100);
        let mut list = SequenceList::new();
        assert!(list
            .try_push(SequenceItem::delay(Duration::from_millis(60)), &lim)
            .is_ok());
        assert!(list
            .try_push(SequenceItem::delay(Duration::from_millis(40)), &lim)
            .is_ok());
        assert!(list
            .try_push(SequenceItem::delay(Duration::from_millis(1)), &lim)
            .is_err());
        assert_eq!(list.total_duration(), Duration::from_millis(100));
    }

    #[test]
    fn test_try_extend_is_all_or_nothing() {
        let lim = limits(10_000, 3);
        let mut list = SequenceList::new();
        list.push(key_down(Key::A));
        list.push(key_down(Key::B));

        let result = list.try_extend(
            vec![SequenceItem::delay(Duration::from_millis(1)), key_down(Key::C)],
            &lim,
        );

        assert!(result.is_err());
        assert_eq!(list.len(), 2, "no partial append");
    }

    #[test]
    fn test_push_key_press_marks_hold_delay() {
        let mut list = SequenceList::new();
        let gesture = HotkeyGesture::from_key(Key::Space, ModifierKeys::NONE);

        list.push_key_press(gesture, Duration::from_millis(30));

        assert_eq!(list.len(), 3);
        assert_eq!(
            list.items()[1],
            SequenceItem::Delay {
                duration: Duration::from_millis(30),
                is_key_press: true
            }
        );
        assert_eq!(list.total_duration(), Duration::from_millis(30));
    }

    #[test]
    fn test_non_delay_items_have_zero_duration() {
        assert_eq!(key_down(Key::A).duration(), Duration::ZERO);
        assert_eq!(
            SequenceItem::Text {
                text: "hi".to_string()
            }
            .duration(),
            Duration::ZERO
        );
    }

    #[test]
    fn test_serialized_list_rebuilds_totals() {
        // Arrange
        #[derive(Serialize, Deserialize)]
        struct Doc {
            items: SequenceList,
        }
        let mut list = SequenceList::new();
        list.push_key_press(
            HotkeyGesture::from_key(Key::A, ModifierKeys::SHIFT),
            Duration::from_millis(25),
        );
        list.push_text("hello");

        // Act
        let text = toml::to_string(&Doc { items: list.clone() }).unwrap();
        let back: Doc = toml::from_str(&text).unwrap();

        // Assert
        assert_eq!(back.items, list);
        assert_eq!(back.items.total_duration(), Duration::from_millis(25));
    }
}
