//! Mock input source for unit testing.
//!
//! Allows tests to inject synthetic [`RawInputEvent`]s without requiring
//! a running Windows message loop or OS hooks.  The calling test thread plays
//! the role of the hook thread: [`MockInputSource::inject_event`] blocks for
//! exactly as long as a real hook callback would, and returns the verdict.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{CaptureError, HookCallback, HookDecision, HookHandle, InputSource, RawInputEvent};

type CallbackSlot = Arc<Mutex<Option<Arc<dyn HookCallback>>>>;

/// A mock implementation of [`InputSource`] that allows tests to inject events.
pub struct MockInputSource {
    callback: CallbackSlot,
    suppress_count: Arc<AtomicU32>,
    install_error: Mutex<Option<CaptureError>>,
}

impl MockInputSource {
    /// Creates a new mock input source.
    pub fn new() -> Self {
        Self {
            callback: Arc::new(Mutex::new(None)),
            suppress_count: Arc::new(AtomicU32::new(0)),
            install_error: Mutex::new(None),
        }
    }

    /// A source whose next `install` fails with `error`.
    pub fn failing(error: CaptureError) -> Self {
        let source = Self::new();
        *source.install_error.lock() = Some(error);
        source
    }

    /// Injects a synthetic event, as if captured from hardware.
    ///
    /// Panics if no capture has installed hooks on this source.
    pub fn inject_event(&self, event: RawInputEvent) -> HookDecision {
        let callback = self
            .callback
            .lock()
            .clone()
            .expect("MockInputSource::inject_event called before install()");
        let decision = callback.on_hook_event(event);
        if decision == HookDecision::Suppress {
            self.suppress_count.fetch_add(1, Ordering::SeqCst);
        }
        decision
    }

    /// Injects every event in order and returns their verdicts.
    pub fn inject_all(&self, events: impl IntoIterator<Item = RawInputEvent>) -> Vec<HookDecision> {
        events.into_iter().map(|e| self.inject_event(e)).collect()
    }

    /// Returns how many injected events were suppressed.
    pub fn suppress_count(&self) -> u32 {
        self.suppress_count.load(Ordering::SeqCst)
    }

    /// `true` while hooks are installed.
    pub fn is_installed(&self) -> bool {
        self.callback.lock().is_some()
    }
}

impl Default for MockInputSource {
    fn default() -> Self {
        Self::new()
    }
}

impl InputSource for MockInputSource {
    fn install(&self, callback: Arc<dyn HookCallback>) -> Result<HookHandle, CaptureError> {
        if let Some(error) = self.install_error.lock().take() {
            return Err(error);
        }
        let mut slot = self.callback.lock();
        if slot.is_some() {
            return Err(CaptureError::AlreadyInstalled);
        }
        *slot = Some(callback);

        let slot = Arc::clone(&self.callback);
        Ok(HookHandle::new(move || {
            slot.lock().take();
        }))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hotkey_core::{Key, MouseButton};

    struct Recording {
        seen: Mutex<Vec<RawInputEvent>>,
        suppress: bool,
    }

    impl HookCallback for Recording {
        fn on_hook_event(&self, event: RawInputEvent) -> HookDecision {
            self.seen.lock().push(event);
            HookDecision::from_handled(self.suppress)
        }
    }

    fn recording(suppress: bool) -> Arc<Recording> {
        Arc::new(Recording {
            seen: Mutex::new(Vec::new()),
            suppress,
        })
    }

    #[test]
    fn test_mock_input_source_installs_and_receives_events() {
        // Arrange
        let source = MockInputSource::new();
        let callback = recording(false);
        let _handle = source.install(callback.clone()).expect("install should succeed");

        // Act
        let decision = source.inject_event(RawInputEvent::key_down(Key::A));

        // Assert
        assert_eq!(decision, HookDecision::PassThrough);
        assert_eq!(callback.seen.lock().len(), 1);
    }

    #[test]
    fn test_mock_input_source_drop_handle_uninstalls() {
        // Arrange
        let source = MockInputSource::new();
        let handle = source.install(recording(false)).unwrap();
        assert!(source.is_installed());

        // Act
        drop(handle);

        // Assert
        assert!(!source.is_installed());
    }

    #[test]
    fn test_mock_input_source_tracks_suppress_count() {
        // Arrange
        let source = MockInputSource::new();
        let _handle = source.install(recording(true)).unwrap();

        // Act
        source.inject_all([
            RawInputEvent::key_down(Key::B),
            RawInputEvent::key_up(Key::B),
            RawInputEvent::button_down(MouseButton::Left, 1, 1),
        ]);

        // Assert
        assert_eq!(source.suppress_count(), 3);
    }

    #[test]
    fn test_mock_input_source_rejects_second_install() {
        let source = MockInputSource::new();
        let _handle = source.install(recording(false)).unwrap();
        let second = source.install(recording(false));
        assert!(matches!(second, Err(CaptureError::AlreadyInstalled)));
    }

    #[test]
    fn test_failing_source_reports_error_synchronously() {
        let source = MockInputSource::failing(CaptureError::KeyboardHookInstallFailed(
            "access denied".to_string(),
        ));
        let result = source.install(recording(false));
        assert!(matches!(result, Err(CaptureError::KeyboardHookInstallFailed(_))));
        assert!(!source.is_installed());
    }
}
