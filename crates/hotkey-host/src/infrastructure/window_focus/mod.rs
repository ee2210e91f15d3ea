//! Foreground window adapters.
//!
//! Implements [`WindowFocus`] with `GetForegroundWindow` /
//! `SetForegroundWindow` on Windows.  Other platforms get a detached
//! implementation that reports no foreground window and refuses activation.

use std::sync::Arc;

use crate::application::window_focus::{WindowFocus, WindowHandle};

pub mod mock;

#[cfg(target_os = "windows")]
pub mod windows;

/// Returns the foreground window adapter for the current platform.
pub fn system_window_focus() -> Arc<dyn WindowFocus> {
    #[cfg(target_os = "windows")]
    {
        Arc::new(windows::Win32WindowFocus)
    }

    #[cfg(not(target_os = "windows"))]
    {
        Arc::new(DetachedWindowFocus)
    }
}

/// Used where the process cannot observe window focus.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedWindowFocus;

impl WindowFocus for DetachedWindowFocus {
    fn foreground_window(&self) -> Option<WindowHandle> {
        None
    }

    fn activate(&self, _window: WindowHandle) -> bool {
        false
    }

    fn is_host_foreground(&self) -> bool {
        false
    }
}
