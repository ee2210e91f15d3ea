//! Input capture infrastructure.
//!
//! On Windows, this installs low-level keyboard and mouse hooks (WH_KEYBOARD_LL,
//! WH_MOUSE_LL) on a dedicated Win32 message loop thread.  Each hook callback
//! builds a normalized [`RawInputEvent`] and hands it to a [`HookCallback`],
//! whose [`HookDecision`] says whether the native event is swallowed.
//!
//! # Windows-Specific Implementation
//!
//! The hook callbacks must complete within the OS hook timeout or Windows will
//! silently remove the hook.  The application layer
//! ([`crate::application::capture`]) therefore pushes events to a queue and
//! only waits for a verdict, with a bounded timeout, while some subscriber can
//! suppress input.
//!
//! # Testability
//!
//! The [`InputSource`] trait allows unit tests to inject synthetic events
//! without requiring Windows hooks (see [`mock::MockInputSource`]).

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use hotkey_core::{HotkeyGesture, Key, ModifierKeys, MouseButton};
use parking_lot::{Condvar, Mutex};

pub mod mock;

#[cfg(target_os = "windows")]
pub mod windows;

/// Which physical device produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputDevice {
    Keyboard,
    Mouse,
}

/// What happened on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    Down,
    Up,
    Move,
    Wheel,
}

/// Device-specific payload of a [`RawInputEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEventKind {
    /// A key was pressed down (or auto-repeated by the OS).
    KeyDown { key: Key },
    /// A key was released.
    KeyUp { key: Key },
    /// The mouse cursor moved to an absolute screen position.
    MouseMove {
        /// Absolute X in virtual screen coordinates (multi-monitor aware).
        x: i32,
        /// Absolute Y in virtual screen coordinates.
        y: i32,
    },
    /// A mouse button was pressed.
    MouseButtonDown { button: MouseButton, x: i32, y: i32 },
    /// A mouse button was released.
    MouseButtonUp { button: MouseButton, x: i32, y: i32 },
    /// A wheel was scrolled.
    MouseWheel {
        /// Scroll delta; positive = away from user (or right for horizontal).
        delta: i16,
        horizontal: bool,
        x: i32,
        y: i32,
    },
}

/// The key or button whose edge an event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeSource {
    Key(Key),
    Button(MouseButton),
}

/// Shared "handled" flag of one native event.
///
/// The hook thread keeps a clone while the event is in flight; a subscriber
/// calls [`EventAck::mark_handled`] to ask for the native event to be
/// swallowed, and the consumer completes the ack once every subscriber has
/// seen the event.
///
/// Once the hook has stopped waiting and let the event through, it calls
/// [`EventAck::expire`]; later `mark_handled` calls then report `false` so
/// subscribers do not treat the event as swallowed.
#[derive(Clone, Default)]
pub struct EventAck {
    inner: Arc<AckState>,
}

const ACK_PENDING: u8 = 0;
const ACK_HANDLED: u8 = 1;
const ACK_EXPIRED: u8 = 2;

#[derive(Default)]
struct AckState {
    verdict: AtomicU8,
    done: Mutex<bool>,
    signal: Condvar,
}

impl EventAck {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests that the native event is not propagated further.
    ///
    /// Returns `true` if the event is (or already was) swallowed, `false` if
    /// the verdict came too late and the event has already been passed on.
    pub fn mark_handled(&self) -> bool {
        match self.inner.verdict.compare_exchange(
            ACK_PENDING,
            ACK_HANDLED,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => true,
            Err(current) => current == ACK_HANDLED,
        }
    }

    pub fn is_handled(&self) -> bool {
        self.inner.verdict.load(Ordering::Acquire) == ACK_HANDLED
    }

    /// Closes the verdict: the native event is passed on.  Returns `false`
    /// when a subscriber marked it handled first, in which case the event
    /// must still be swallowed.
    pub fn expire(&self) -> bool {
        match self.inner.verdict.compare_exchange(
            ACK_PENDING,
            ACK_EXPIRED,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => true,
            Err(current) => current == ACK_EXPIRED,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.inner.verdict.load(Ordering::Acquire) == ACK_EXPIRED
    }

    /// Signals that dispatch of this event has finished (or was discarded).
    pub fn complete(&self) {
        let mut done = self.inner.done.lock();
        *done = true;
        self.inner.signal.notify_all();
    }

    pub fn is_complete(&self) -> bool {
        *self.inner.done.lock()
    }

    /// Blocks until [`complete`](Self::complete) is called or `timeout`
    /// elapses.  Returns `true` if the ack completed in time.
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut done = self.inner.done.lock();
        while !*done {
            if self.inner.signal.wait_until(&mut done, deadline).timed_out() {
                return *done;
            }
        }
        true
    }
}

impl std::fmt::Debug for EventAck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventAck")
            .field("handled", &self.is_handled())
            .finish()
    }
}

/// A normalized input event produced by the input capture infrastructure.
///
/// Ephemeral: created per hook callback and discarded after dispatch.
#[derive(Debug, Clone)]
pub struct RawInputEvent {
    pub kind: InputEventKind,
    /// Modifier snapshot at the time of the event (stamped by the capture).
    pub modifiers: ModifierKeys,
    /// Milliseconds since system start (from the hook struct).
    pub time_ms: u32,
    /// `true` for synthetic input (`SendInput`, other injectors).
    pub injected: bool,
    ack: EventAck,
}

impl RawInputEvent {
    pub fn new(kind: InputEventKind, time_ms: u32) -> Self {
        Self {
            kind,
            modifiers: ModifierKeys::NONE,
            time_ms,
            injected: false,
            ack: EventAck::new(),
        }
    }

    pub fn key_down(key: Key) -> Self {
        Self::new(InputEventKind::KeyDown { key }, 0)
    }

    pub fn key_up(key: Key) -> Self {
        Self::new(InputEventKind::KeyUp { key }, 0)
    }

    pub fn button_down(button: MouseButton, x: i32, y: i32) -> Self {
        Self::new(InputEventKind::MouseButtonDown { button, x, y }, 0)
    }

    pub fn button_up(button: MouseButton, x: i32, y: i32) -> Self {
        Self::new(InputEventKind::MouseButtonUp { button, x, y }, 0)
    }

    pub fn mouse_move(x: i32, y: i32) -> Self {
        Self::new(InputEventKind::MouseMove { x, y }, 0)
    }

    pub fn wheel(delta: i16, x: i32, y: i32) -> Self {
        Self::new(
            InputEventKind::MouseWheel {
                delta,
                horizontal: false,
                x,
                y,
            },
            0,
        )
    }

    pub fn with_modifiers(mut self, modifiers: ModifierKeys) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_injected(mut self, injected: bool) -> Self {
        self.injected = injected;
        self
    }

    pub fn with_time(mut self, time_ms: u32) -> Self {
        self.time_ms = time_ms;
        self
    }

    pub fn device(&self) -> InputDevice {
        match self.kind {
            InputEventKind::KeyDown { .. } | InputEventKind::KeyUp { .. } => InputDevice::Keyboard,
            _ => InputDevice::Mouse,
        }
    }

    pub fn action(&self) -> InputAction {
        match self.kind {
            InputEventKind::KeyDown { .. } | InputEventKind::MouseButtonDown { .. } => {
                InputAction::Down
            }
            InputEventKind::KeyUp { .. } | InputEventKind::MouseButtonUp { .. } => InputAction::Up,
            InputEventKind::MouseMove { .. } => InputAction::Move,
            InputEventKind::MouseWheel { .. } => InputAction::Wheel,
        }
    }

    /// The key or button of a down/up event, with `true` for down.
    pub fn edge(&self) -> Option<(EdgeSource, bool)> {
        match self.kind {
            InputEventKind::KeyDown { key } => Some((EdgeSource::Key(key), true)),
            InputEventKind::KeyUp { key } => Some((EdgeSource::Key(key), false)),
            InputEventKind::MouseButtonDown { button, .. } => Some((EdgeSource::Button(button), true)),
            InputEventKind::MouseButtonUp { button, .. } => Some((EdgeSource::Button(button), false)),
            _ => None,
        }
    }

    /// Normalized gesture of a key or button edge, including the modifier
    /// snapshot.  `None` for moves and wheel events.
    pub fn gesture(&self) -> Option<HotkeyGesture> {
        match self.edge()? {
            (EdgeSource::Key(key), _) => Some(HotkeyGesture::from_key(key, self.modifiers)),
            (EdgeSource::Button(button), _) => {
                Some(HotkeyGesture::from_button(button, self.modifiers))
            }
        }
    }

    /// Cursor position carried by mouse events.
    pub fn position(&self) -> Option<(i32, i32)> {
        match self.kind {
            InputEventKind::MouseMove { x, y }
            | InputEventKind::MouseButtonDown { x, y, .. }
            | InputEventKind::MouseButtonUp { x, y, .. }
            | InputEventKind::MouseWheel { x, y, .. } => Some((x, y)),
            _ => None,
        }
    }

    /// See [`EventAck::mark_handled`].
    pub fn mark_handled(&self) -> bool {
        self.ack.mark_handled()
    }

    pub fn is_handled(&self) -> bool {
        self.ack.is_handled()
    }

    pub fn ack(&self) -> &EventAck {
        &self.ack
    }
}

/// Verdict returned to the hook for one native event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookDecision {
    /// Forward the event to the next hook / the focused application.
    PassThrough,
    /// Swallow the event.
    Suppress,
}

impl HookDecision {
    pub fn from_handled(handled: bool) -> Self {
        if handled {
            HookDecision::Suppress
        } else {
            HookDecision::PassThrough
        }
    }
}

/// Error type for input capture operations.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("failed to install keyboard hook: {0}")]
    KeyboardHookInstallFailed(String),
    #[error("failed to install mouse hook: {0}")]
    MouseHookInstallFailed(String),
    #[error("failed to spawn capture thread: {0}")]
    ThreadSpawn(String),
    #[error("input hooks are already installed by another capture")]
    AlreadyInstalled,
    #[error("capture service has already been stopped")]
    AlreadyStopped,
    #[error("platform not supported: {0}")]
    UnsupportedPlatform(String),
}

/// Receives every event from the installed hooks, on the hook thread.
pub trait HookCallback: Send + Sync {
    fn on_hook_event(&self, event: RawInputEvent) -> HookDecision;
}

/// Scoped ownership of installed hooks.  Dropping it uninstalls them.
#[must_use = "dropping the handle uninstalls the hooks"]
pub struct HookHandle {
    uninstall: Option<Box<dyn FnOnce() + Send>>,
}

impl HookHandle {
    pub fn new(uninstall: impl FnOnce() + Send + 'static) -> Self {
        Self {
            uninstall: Some(Box::new(uninstall)),
        }
    }

    /// Uninstalls now.  Equivalent to dropping the handle.
    pub fn uninstall(mut self) {
        self.run_uninstall();
    }

    fn run_uninstall(&mut self) {
        if let Some(uninstall) = self.uninstall.take() {
            uninstall();
        }
    }
}

impl Drop for HookHandle {
    fn drop(&mut self) {
        self.run_uninstall();
    }
}

/// Trait abstracting the OS hook facility.
///
/// The production implementation uses Windows hooks; tests use [`mock::MockInputSource`].
pub trait InputSource: Send + Sync {
    /// Installs global keyboard and mouse hooks delivering to `callback`.
    ///
    /// Must report installation failure synchronously.
    fn install(&self, callback: Arc<dyn HookCallback>) -> Result<HookHandle, CaptureError>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

/// Returns the hook facility for the current platform.
pub fn system_input_source() -> Box<dyn InputSource> {
    #[cfg(target_os = "windows")]
    {
        Box::new(windows::WindowsInputSource::new())
    }

    #[cfg(not(target_os = "windows"))]
    {
        Box::new(UnsupportedInputSource)
    }
}

/// Stand-in for platforms without a global hook implementation.
#[cfg(not(target_os = "windows"))]
struct UnsupportedInputSource;

#[cfg(not(target_os = "windows"))]
impl InputSource for UnsupportedInputSource {
    fn install(&self, _callback: Arc<dyn HookCallback>) -> Result<HookHandle, CaptureError> {
        Err(CaptureError::UnsupportedPlatform(
            std::env::consts::OS.to_string(),
        ))
    }

    fn name(&self) -> &'static str {
        "unsupported"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_event_gesture_uses_modifier_snapshot() {
        let event = RawInputEvent::key_down(Key::A).with_modifiers(ModifierKeys::CONTROL);
        assert_eq!(
            event.gesture(),
            Some(HotkeyGesture::from_key(Key::A, ModifierKeys::CONTROL))
        );
        assert_eq!(event.device(), InputDevice::Keyboard);
        assert_eq!(event.action(), InputAction::Down);
    }

    #[test]
    fn test_move_and_wheel_have_no_gesture() {
        assert_eq!(RawInputEvent::mouse_move(1, 2).gesture(), None);
        assert_eq!(RawInputEvent::wheel(120, 1, 2).gesture(), None);
        assert_eq!(RawInputEvent::wheel(120, 1, 2).action(), InputAction::Wheel);
        assert_eq!(RawInputEvent::mouse_move(1, 2).position(), Some((1, 2)));
    }

    #[test]
    fn test_handled_flag_is_shared_between_clones() {
        let event = RawInputEvent::key_down(Key::F1);
        let copy = event.clone();
        copy.mark_handled();
        assert!(event.is_handled());
    }

    #[test]
    fn test_late_verdict_does_not_take_effect_after_expiry() {
        // Arrange
        let ack = EventAck::new();

        // Act
        let expired = ack.expire();
        let took_effect = ack.mark_handled();

        // Assert
        assert!(expired);
        assert!(!took_effect);
        assert!(!ack.is_handled());
        assert!(ack.is_expired());
    }

    #[test]
    fn test_expire_loses_to_an_earlier_verdict() {
        let ack = EventAck::new();
        assert!(ack.mark_handled());
        assert!(!ack.expire());
        assert!(ack.is_handled());
        assert!(ack.mark_handled(), "marking twice stays handled");
    }

    #[test]
    fn test_ack_wait_times_out_without_completion() {
        let ack = EventAck::new();
        assert!(!ack.wait(Duration::from_millis(10)));
    }

    #[test]
    fn test_ack_wait_returns_when_completed_from_other_thread() {
        let ack = EventAck::new();
        let remote = ack.clone();
        let t = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            remote.mark_handled();
            remote.complete();
        });
        assert!(ack.wait(Duration::from_secs(5)));
        assert!(ack.is_handled());
        t.join().unwrap();
    }

    #[test]
    fn test_hook_handle_runs_uninstall_once() {
        let count = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let c = Arc::clone(&count);
        let handle = HookHandle::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        handle.uninstall();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
