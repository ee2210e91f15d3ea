//! HotkeyTracker: turns captured input into an "is this hotkey active" flag.
//!
//! A tracker holds a set of [`HotkeyGesture`]s and a [`TrackerMode`]:
//!
//! - **Hold**: active while a matching gesture is physically held.  It
//!   activates on the matching down edge and deactivates when any constituent
//!   key or button of that gesture is released.
//! - **Click**: each matching down edge toggles the active flag.
//!
//! Key auto-repeat (repeated down edges without an up) never toggles or
//! re-activates.  Injected events are ignored.
//!
//! When `suppress_key` is set, matching edges are marked handled so the
//! focused application never sees them, unless the host's own window is in
//! front.  The release of a suppressed trigger is suppressed as well, even
//! when another key of the chord went up first.
//! [`HotkeyTracker::dispose_after_release`] keeps a tracker subscribed until
//! that release has been swallowed.
//!
//! Activation changes are published on a `tokio::sync::watch` channel and
//! can be read synchronously with [`HotkeyTracker::is_active`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use hotkey_core::HotkeyGesture;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::application::capture::{InputEventCapture, InputSubscriber, Subscription};
use crate::application::window_focus::WindowFocus;
use crate::infrastructure::input_capture::{EdgeSource, RawInputEvent};

/// How matching down edges change the active flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerMode {
    /// Each press toggles.
    #[default]
    Click,
    /// Active while held.
    Hold,
}

/// Tracker behavior switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackerOptions {
    pub mode: TrackerMode,
    pub suppress_key: bool,
}

#[derive(Debug)]
struct HeldGesture {
    gesture: HotkeyGesture,
    trigger: EdgeSource,
    suppressed: bool,
}

#[derive(Debug)]
struct TrackerState {
    gestures: Vec<HotkeyGesture>,
    options: TrackerOptions,
    held: Option<HeldGesture>,
    /// Suppressed trigger still physically down after its gesture ended.
    swallow_release: Option<EdgeSource>,
}

impl TrackerState {
    /// Drops the held gesture; a suppressed trigger keeps its release owed.
    fn forget_held(&mut self) {
        if let Some(held) = self.held.take() {
            if held.suppressed {
                self.swallow_release = Some(held.trigger);
            }
        }
    }
}

/// Tracks one logical hotkey (possibly bound to several gestures).
pub struct HotkeyTracker {
    name: String,
    state: Mutex<TrackerState>,
    active: watch::Sender<bool>,
    focus: Arc<dyn WindowFocus>,
    subscription: Mutex<Option<Subscription>>,
    disposed: AtomicBool,
    dispose_on_release: AtomicBool,
    /// Keeps a tracker alive while it waits to dispose on release.
    lingering: Mutex<Option<Arc<HotkeyTracker>>>,
}

impl HotkeyTracker {
    /// Creates a disabled tracker (no gestures) that is not yet attached.
    pub fn new(name: impl Into<String>, options: TrackerOptions, focus: Arc<dyn WindowFocus>) -> Arc<Self> {
        let (active, _) = watch::channel(false);
        Arc::new(Self {
            name: name.into(),
            state: Mutex::new(TrackerState {
                gestures: Vec::new(),
                options,
                held: None,
                swallow_release: None,
            }),
            active,
            focus,
            subscription: Mutex::new(None),
            disposed: AtomicBool::new(false),
            dispose_on_release: AtomicBool::new(false),
            lingering: Mutex::new(None),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replaces the gesture set.  Empty gestures are dropped; an empty set
    /// disables the tracker and forces it inactive.
    pub fn set_gestures(&self, gestures: impl IntoIterator<Item = HotkeyGesture>) {
        let mut state = self.state.lock();
        state.gestures = gestures.into_iter().filter(|g| !g.is_empty()).collect();
        state.gestures.dedup();
        state.forget_held();
        let enabled = !state.gestures.is_empty();
        drop(state);
        if !enabled {
            self.set_active(false);
        }
        debug!(tracker = %self.name, enabled, "hotkey gestures updated");
    }

    /// Binds a single gesture; `None` disables the tracker.
    pub fn set_gesture(&self, gesture: Option<HotkeyGesture>) {
        self.set_gestures(gesture);
    }

    pub fn gestures(&self) -> Vec<HotkeyGesture> {
        self.state.lock().gestures.clone()
    }

    pub fn is_enabled(&self) -> bool {
        !self.state.lock().gestures.is_empty()
    }

    pub fn options(&self) -> TrackerOptions {
        self.state.lock().options
    }

    /// Changes mode or suppression.  Resets any held state.
    pub fn set_options(&self, options: TrackerOptions) {
        let mut state = self.state.lock();
        state.options = options;
        state.forget_held();
    }

    pub fn is_active(&self) -> bool {
        *self.active.borrow()
    }

    /// Receiver notified on every activation change.
    pub fn watch_active(&self) -> watch::Receiver<bool> {
        self.active.subscribe()
    }

    /// Forgets any held gesture and forces the tracker inactive.
    pub fn reset(&self) {
        {
            let mut state = self.state.lock();
            state.held = None;
            state.swallow_release = None;
        }
        self.set_active(false);
    }

    /// Starts receiving events from `capture`.  Re-attaching replaces the
    /// previous subscription.
    pub fn attach(self: &Arc<Self>, capture: &InputEventCapture) {
        if self.disposed.load(Ordering::Acquire) {
            return;
        }
        let adapter = Arc::new(TrackerSubscriber {
            name: format!("hotkey-tracker:{}", self.name),
            tracker: Arc::downgrade(self),
        });
        let subscription = capture.subscribe(adapter);
        *self.subscription.lock() = Some(subscription);
    }

    pub fn is_attached(&self) -> bool {
        self.subscription.lock().is_some()
    }

    /// Unsubscribes and deactivates.  Idempotent.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        drop(self.subscription.lock().take());
        let lingering = self.lingering.lock().take();
        self.reset();
        debug!(tracker = %self.name, "hotkey tracker disposed");
        drop(lingering);
    }

    /// Feeds one event.  Returns `true` if the event was one of the tracked
    /// gesture's edges (including ignored repeats).
    pub fn process(&self, event: &RawInputEvent) -> bool {
        if event.injected {
            return false;
        }
        let Some((source, is_down)) = event.edge() else {
            return false;
        };
        if is_down {
            self.on_down(source, event)
        } else {
            self.on_up(source, event)
        }
    }

    fn on_down(&self, source: EdgeSource, event: &RawInputEvent) -> bool {
        let Some(gesture) = event.gesture() else {
            return false;
        };
        let suppress_key = {
            let state = self.state.lock();
            if state.swallow_release == Some(source) {
                // Repeat of a suppressed trigger whose chord was broken up.
                event.mark_handled();
                return true;
            }
            if !state.gestures.contains(&gesture) {
                return false;
            }
            if let Some(held) = &state.held {
                if held.gesture == gesture && held.trigger == source {
                    // Auto-repeat: keep the original verdict, no transition.
                    if held.suppressed {
                        event.mark_handled();
                    }
                    return true;
                }
            }
            state.options.suppress_key
        };

        // The foreground query is an OS call; keep it outside the state lock,
        // which the hook thread takes through `may_suppress`.
        let suppressed =
            suppress_key && !self.focus.is_host_foreground() && event.mark_handled();

        let mut state = self.state.lock();
        state.held = Some(HeldGesture {
            gesture,
            trigger: source,
            suppressed,
        });
        let mode = state.options.mode;
        drop(state);
        match mode {
            TrackerMode::Hold => self.set_active(true),
            TrackerMode::Click => self.set_active(!self.is_active()),
        }
        true
    }

    fn on_up(&self, source: EdgeSource, event: &RawInputEvent) -> bool {
        let mut state = self.state.lock();
        if state.swallow_release == Some(source) {
            state.swallow_release = None;
            event.mark_handled();
            let settled = state.held.is_none();
            drop(state);
            if settled {
                self.dispose_if_pending();
            }
            return true;
        }

        let Some(held) = &state.held else {
            return false;
        };
        let releases = match source {
            EdgeSource::Key(key) => held.gesture.involves_key(key),
            EdgeSource::Button(button) => held.gesture.involves_button(button),
        };
        if !releases {
            return false;
        }
        let suppressed_trigger = held.suppressed.then_some(held.trigger);
        let mode = state.options.mode;
        state.held = None;
        match suppressed_trigger {
            Some(trigger) if trigger == source => {
                event.mark_handled();
            }
            // Another constituent went up first; the trigger's own release
            // is still owed a swallow.
            Some(trigger) => state.swallow_release = Some(trigger),
            None => {}
        }
        let settled = state.swallow_release.is_none();
        drop(state);
        if mode == TrackerMode::Hold {
            self.set_active(false);
        }
        if settled {
            self.dispose_if_pending();
        }
        true
    }

    /// Disposes the tracker, but if the focused application was denied the
    /// press of the held gesture, first stays subscribed to `capture` until
    /// that press is released so its release is swallowed too.
    pub fn dispose_after_release(self: &Arc<Self>, capture: &InputEventCapture) {
        if self.disposed.load(Ordering::Acquire) {
            return;
        }
        let pending = {
            let state = self.state.lock();
            state.held.as_ref().is_some_and(|held| held.suppressed)
                || state.swallow_release.is_some()
        };
        if !pending {
            self.dispose();
            return;
        }
        self.dispose_on_release.store(true, Ordering::Release);
        *self.lingering.lock() = Some(Arc::clone(self));
        self.attach(capture);
        debug!(tracker = %self.name, "hotkey tracker disposes after release");
    }

    fn dispose_if_pending(&self) {
        if self.dispose_on_release.load(Ordering::Acquire) {
            self.dispose();
        }
    }

    fn set_active(&self, value: bool) {
        let changed = self.active.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
        if changed {
            info!(tracker = %self.name, active = value, "hotkey activation changed");
        }
    }

    fn may_suppress(&self) -> bool {
        let state = self.state.lock();
        (state.options.suppress_key && !state.gestures.is_empty())
            || state.swallow_release.is_some()
            || state.held.as_ref().is_some_and(|held| held.suppressed)
    }
}

impl Drop for HotkeyTracker {
    fn drop(&mut self) {
        self.subscription.get_mut().take();
    }
}

/// Registered with the capture in place of the tracker so that the capture
/// never keeps a tracker alive.
struct TrackerSubscriber {
    name: String,
    tracker: Weak<HotkeyTracker>,
}

impl InputSubscriber for TrackerSubscriber {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_event(&self, event: &RawInputEvent) -> anyhow::Result<()> {
        if let Some(tracker) = self.tracker.upgrade() {
            tracker.process(event);
        }
        Ok(())
    }

    fn may_suppress(&self) -> bool {
        self.tracker
            .upgrade()
            .map(|t| t.may_suppress())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::window_focus::MockWindowFocus;
    use hotkey_core::{Key, ModifierKeys, MouseButton};

    fn focus(host_foreground: bool) -> Arc<dyn WindowFocus> {
        let mut focus = MockWindowFocus::new();
        focus
            .expect_is_host_foreground()
            .return_const(host_foreground);
        Arc::new(focus)
    }

    fn tracker(mode: TrackerMode, suppress_key: bool, gesture: &str) -> Arc<HotkeyTracker> {
        let t = HotkeyTracker::new("test", TrackerOptions { mode, suppress_key }, focus(false));
        t.set_gesture(Some(gesture.parse().unwrap()));
        t
    }

    fn ctrl(event: RawInputEvent) -> RawInputEvent {
        event.with_modifiers(ModifierKeys::CONTROL)
    }

    #[test]
    fn test_hold_mode_follows_press_and_release() {
        // Arrange
        let t = tracker(TrackerMode::Hold, false, "Ctrl+A");

        // Act / Assert
        t.process(&RawInputEvent::key_down(Key::LeftCtrl).with_modifiers(ModifierKeys::CONTROL));
        assert!(!t.is_active());
        t.process(&ctrl(RawInputEvent::key_down(Key::A)));
        assert!(t.is_active());
        t.process(&ctrl(RawInputEvent::key_up(Key::A)));
        assert!(!t.is_active());
    }

    #[test]
    fn test_hold_mode_releases_on_modifier_up() {
        let t = tracker(TrackerMode::Hold, false, "Ctrl+A");
        t.process(&ctrl(RawInputEvent::key_down(Key::A)));
        assert!(t.is_active());

        t.process(&RawInputEvent::key_up(Key::LeftCtrl));

        assert!(!t.is_active());
    }

    #[test]
    fn test_click_mode_toggles_once_per_press() {
        // Arrange
        let t = tracker(TrackerMode::Click, false, "F8");

        // Act – press with three auto-repeats, release, press again
        for _ in 0..4 {
            t.process(&RawInputEvent::key_down(Key::F8));
        }
        let after_first = t.is_active();
        t.process(&RawInputEvent::key_up(Key::F8));
        t.process(&RawInputEvent::key_down(Key::F8));

        // Assert
        assert!(after_first);
        assert!(!t.is_active());
    }

    #[test]
    fn test_modifier_mismatch_does_not_match() {
        let t = tracker(TrackerMode::Hold, false, "A");
        assert!(!t.process(&ctrl(RawInputEvent::key_down(Key::A))));
        assert!(!t.is_active());
    }

    #[test]
    fn test_mouse_button_gesture() {
        let t = tracker(TrackerMode::Hold, false, "Alt+XButton1");
        let down = RawInputEvent::button_down(MouseButton::XButton1, 0, 0)
            .with_modifiers(ModifierKeys::ALT);
        t.process(&down);
        assert!(t.is_active());
        t.process(&RawInputEvent::button_up(MouseButton::XButton1, 0, 0));
        assert!(!t.is_active());
    }

    #[test]
    fn test_suppression_marks_down_and_matching_up() {
        // Arrange
        let t = tracker(TrackerMode::Hold, true, "F13");
        let down = RawInputEvent::key_down(Key::F13);
        let repeat = RawInputEvent::key_down(Key::F13);
        let up = RawInputEvent::key_up(Key::F13);

        // Act
        t.process(&down);
        t.process(&repeat);
        t.process(&up);

        // Assert
        assert!(down.is_handled());
        assert!(repeat.is_handled());
        assert!(up.is_handled());
    }

    #[test]
    fn test_modifier_release_of_suppressed_gesture_is_not_suppressed() {
        let t = tracker(TrackerMode::Hold, true, "Ctrl+F13");
        let ctrl_down = RawInputEvent::key_down(Key::LeftCtrl);
        let key_down = ctrl(RawInputEvent::key_down(Key::F13));
        let ctrl_up = RawInputEvent::key_up(Key::LeftCtrl);

        t.process(&ctrl_down);
        t.process(&key_down);
        t.process(&ctrl_up);

        assert!(!ctrl_down.is_handled());
        assert!(key_down.is_handled());
        assert!(!ctrl_up.is_handled());
    }

    #[test]
    fn test_no_suppression_when_host_window_in_front() {
        let t = HotkeyTracker::new(
            "host",
            TrackerOptions {
                mode: TrackerMode::Hold,
                suppress_key: true,
            },
            focus(true),
        );
        t.set_gesture(Some("F13".parse().unwrap()));
        let down = RawInputEvent::key_down(Key::F13);

        t.process(&down);

        assert!(t.is_active());
        assert!(!down.is_handled());
    }

    #[test]
    fn test_injected_events_are_ignored() {
        let t = tracker(TrackerMode::Hold, true, "F13");
        let down = RawInputEvent::key_down(Key::F13).with_injected(true);
        assert!(!t.process(&down));
        assert!(!t.is_active());
        assert!(!down.is_handled());
    }

    #[test]
    fn test_clearing_gesture_forces_inactive() {
        let t = tracker(TrackerMode::Click, false, "F8");
        t.process(&RawInputEvent::key_down(Key::F8));
        assert!(t.is_active());

        t.set_gesture(None);

        assert!(!t.is_active());
        assert!(!t.is_enabled());
        assert!(!t.process(&RawInputEvent::key_down(Key::F8)));
    }

    #[test]
    fn test_multiple_gestures_any_matches() {
        let t = tracker(TrackerMode::Hold, false, "F8");
        t.set_gestures(["F8".parse().unwrap(), "MiddleButton".parse().unwrap()]);
        t.process(&RawInputEvent::button_down(MouseButton::Middle, 0, 0));
        assert!(t.is_active());
    }

    #[test]
    fn test_watch_receives_activation_changes() {
        let t = tracker(TrackerMode::Hold, false, "F8");
        let mut rx = t.watch_active();

        t.process(&RawInputEvent::key_down(Key::F8));

        assert!(rx.has_changed().unwrap());
        assert!(*rx.borrow_and_update());
    }

    #[test]
    fn test_auto_repeat_does_not_wake_watchers() {
        let t = tracker(TrackerMode::Hold, false, "F8");
        t.process(&RawInputEvent::key_down(Key::F8));
        let mut rx = t.watch_active();
        let mut changed = tokio_test::task::spawn(async move { rx.changed().await });

        t.process(&RawInputEvent::key_down(Key::F8));
        tokio_test::assert_pending!(changed.poll());

        t.process(&RawInputEvent::key_up(Key::F8));
        assert!(changed.is_woken());
        tokio_test::assert_ready_ok!(changed.poll());
    }

    #[test]
    fn test_dispose_is_idempotent_and_resets() {
        let t = tracker(TrackerMode::Click, false, "F8");
        t.process(&RawInputEvent::key_down(Key::F8));
        t.dispose();
        t.dispose();
        assert!(!t.is_active());
    }

    #[test]
    fn test_trigger_release_after_modifier_release_is_still_suppressed() {
        // Arrange
        let t = tracker(TrackerMode::Hold, true, "Ctrl+F13");
        let key_down = ctrl(RawInputEvent::key_down(Key::F13));
        let ctrl_up = RawInputEvent::key_up(Key::LeftCtrl);
        let repeat = RawInputEvent::key_down(Key::F13);
        let key_up = RawInputEvent::key_up(Key::F13);

        // Act
        t.process(&key_down);
        t.process(&ctrl_up);
        t.process(&repeat);
        t.process(&key_up);

        // Assert
        assert!(!t.is_active());
        assert!(!ctrl_up.is_handled());
        assert!(repeat.is_handled());
        assert!(key_up.is_handled());
    }

    /// Records whether the tracker's state lock was free during the query.
    struct LockCheckingFocus {
        tracker: Mutex<Weak<HotkeyTracker>>,
        lock_free: AtomicBool,
    }

    impl WindowFocus for LockCheckingFocus {
        fn foreground_window(&self) -> Option<crate::application::window_focus::WindowHandle> {
            None
        }

        fn activate(&self, _window: crate::application::window_focus::WindowHandle) -> bool {
            false
        }

        fn is_host_foreground(&self) -> bool {
            if let Some(t) = self.tracker.lock().upgrade() {
                self.lock_free
                    .store(t.state.try_lock().is_some(), Ordering::SeqCst);
            }
            false
        }
    }

    #[test]
    fn test_foreground_query_runs_without_state_lock() {
        // Arrange
        let focus = Arc::new(LockCheckingFocus {
            tracker: Mutex::new(Weak::new()),
            lock_free: AtomicBool::new(false),
        });
        let t = HotkeyTracker::new(
            "lock",
            TrackerOptions {
                mode: TrackerMode::Hold,
                suppress_key: true,
            },
            focus.clone(),
        );
        t.set_gesture(Some("F8".parse().unwrap()));
        *focus.tracker.lock() = Arc::downgrade(&t);
        let down = RawInputEvent::key_down(Key::F8);

        // Act
        t.process(&down);

        // Assert
        assert!(down.is_handled());
        assert!(focus.lock_free.load(Ordering::SeqCst));
    }

    #[test]
    fn test_dispose_after_release_swallows_the_held_trigger_release() {
        use crate::application::capture::{CaptureOptions, DeliveryMode};
        use crate::infrastructure::input_capture::mock::MockInputSource;
        use crate::infrastructure::input_capture::HookDecision;

        // Arrange – the trigger went down before the tracker was handed over
        let source = MockInputSource::new();
        let capture = InputEventCapture::start(
            &source,
            CaptureOptions {
                delivery_mode: DeliveryMode::Realtime,
                ..CaptureOptions::default()
            },
        )
        .unwrap();
        let t = tracker(TrackerMode::Hold, true, "F8");
        let down = RawInputEvent::key_down(Key::F8);
        t.process(&down);
        assert!(down.is_handled());

        // Act
        t.dispose_after_release(&capture);
        assert!(t.is_attached());
        let up = source.inject_event(RawInputEvent::key_up(Key::F8));

        // Assert
        assert_eq!(up, HookDecision::Suppress);
        assert!(!t.is_attached());
        assert!(!t.is_active());
        assert_eq!(capture.subscriber_count(), 0);
    }

    #[test]
    fn test_dispose_after_release_without_suppressed_press_disposes_now() {
        use crate::application::capture::CaptureOptions;
        use crate::infrastructure::input_capture::mock::MockInputSource;

        let source = MockInputSource::new();
        let capture = InputEventCapture::start(&source, CaptureOptions::default()).unwrap();
        let t = tracker(TrackerMode::Hold, false, "F8");
        t.attach(&capture);
        t.process(&RawInputEvent::key_down(Key::F8));

        t.dispose_after_release(&capture);

        assert!(!t.is_attached());
        assert!(!t.is_active());
    }
}
