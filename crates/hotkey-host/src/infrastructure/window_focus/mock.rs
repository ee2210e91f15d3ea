//! Scriptable [`WindowFocus`] for integration tests.

use parking_lot::Mutex;

use crate::application::window_focus::{WindowFocus, WindowHandle};

/// In-memory window focus.  `activate` succeeds for any window not listed
/// with [`FakeWindowFocus::refuse`] and moves it to the front.
#[derive(Debug, Default)]
pub struct FakeWindowFocus {
    state: Mutex<FakeState>,
}

#[derive(Debug, Default)]
struct FakeState {
    foreground: Option<WindowHandle>,
    host_foreground: bool,
    refused: Vec<WindowHandle>,
    activations: Vec<WindowHandle>,
}

impl FakeWindowFocus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_foreground(window: WindowHandle) -> Self {
        let fake = Self::new();
        fake.set_foreground(Some(window));
        fake
    }

    /// Simulates the user switching windows.
    pub fn set_foreground(&self, window: Option<WindowHandle>) {
        self.state.lock().foreground = window;
    }

    pub fn set_host_foreground(&self, host: bool) {
        self.state.lock().host_foreground = host;
    }

    /// Makes future `activate(window)` calls fail.
    pub fn refuse(&self, window: WindowHandle) {
        self.state.lock().refused.push(window);
    }

    /// Every window passed to `activate`, in call order.
    pub fn activations(&self) -> Vec<WindowHandle> {
        self.state.lock().activations.clone()
    }
}

impl WindowFocus for FakeWindowFocus {
    fn foreground_window(&self) -> Option<WindowHandle> {
        self.state.lock().foreground
    }

    fn activate(&self, window: WindowHandle) -> bool {
        let mut state = self.state.lock();
        state.activations.push(window);
        if state.refused.contains(&window) {
            return false;
        }
        state.foreground = Some(window);
        true
    }

    fn is_host_foreground(&self) -> bool {
        self.state.lock().host_foreground
    }
}
