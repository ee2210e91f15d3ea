//! Foreground window abstraction.
//!
//! The tracker asks whether the host's own window is in front (suppression is
//! skipped then), and the recorder activates a target window, watches for
//! focus loss and restores the previous foreground window afterwards.
//! Infrastructure implementations call `GetForegroundWindow` /
//! `SetForegroundWindow`; tests use a mock.

use std::fmt;
use std::sync::Arc;

use tracing::warn;

/// Opaque native window handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub isize);

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Read and change which top-level window has keyboard focus.
#[cfg_attr(test, mockall::automock)]
pub trait WindowFocus: Send + Sync {
    /// The current foreground window, if any.
    fn foreground_window(&self) -> Option<WindowHandle>;

    /// Brings `window` to the foreground.  Returns `false` if the OS refused.
    fn activate(&self, window: WindowHandle) -> bool;

    /// `true` when the foreground window belongs to this process.
    fn is_host_foreground(&self) -> bool;
}

/// Remembers the foreground window and reactivates it on drop.
#[must_use = "dropping the guard restores the foreground window immediately"]
pub struct ForegroundRestore {
    focus: Arc<dyn WindowFocus>,
    original: Option<WindowHandle>,
}

impl ForegroundRestore {
    /// Captures the window that is in front right now.
    pub fn capture(focus: Arc<dyn WindowFocus>) -> Self {
        let original = focus.foreground_window();
        Self { focus, original }
    }

    pub fn original(&self) -> Option<WindowHandle> {
        self.original
    }
}

impl Drop for ForegroundRestore {
    fn drop(&mut self) {
        let Some(original) = self.original else {
            return;
        };
        if self.focus.foreground_window() == Some(original) {
            return;
        }
        if !self.focus.activate(original) {
            warn!(window = %original, "failed to restore foreground window");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    #[test]
    fn test_restore_reactivates_original_window() {
        // Arrange
        let mut focus = MockWindowFocus::new();
        let mut calls = 0;
        focus.expect_foreground_window().returning(move || {
            calls += 1;
            if calls == 1 {
                Some(WindowHandle(1))
            } else {
                Some(WindowHandle(2))
            }
        });
        focus
            .expect_activate()
            .with(eq(WindowHandle(1)))
            .times(1)
            .return_const(true);

        // Act
        let guard = ForegroundRestore::capture(Arc::new(focus));
        assert_eq!(guard.original(), Some(WindowHandle(1)));
        drop(guard);
    }

    #[test]
    fn test_restore_skips_activation_when_still_in_front() {
        let mut focus = MockWindowFocus::new();
        focus
            .expect_foreground_window()
            .return_const(Some(WindowHandle(7)));
        focus.expect_activate().never();

        drop(ForegroundRestore::capture(Arc::new(focus)));
    }

    #[test]
    fn test_restore_without_foreground_does_nothing() {
        let mut focus = MockWindowFocus::new();
        focus.expect_foreground_window().times(1).return_const(None);
        focus.expect_activate().never();

        drop(ForegroundRestore::capture(Arc::new(focus)));
    }
}
