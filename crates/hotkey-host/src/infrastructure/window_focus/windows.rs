//! Win32 foreground window control.

#![cfg(target_os = "windows")]

use std::ffi::c_void;

use windows::Win32::Foundation::HWND;
use windows::Win32::System::Threading::GetCurrentProcessId;
use windows::Win32::UI::WindowsAndMessaging::{
    GetForegroundWindow, GetWindowThreadProcessId, SetForegroundWindow,
};

use crate::application::window_focus::{WindowFocus, WindowHandle};

#[derive(Debug, Default, Clone, Copy)]
pub struct Win32WindowFocus;

impl WindowFocus for Win32WindowFocus {
    fn foreground_window(&self) -> Option<WindowHandle> {
        // SAFETY: GetForegroundWindow has no preconditions.
        let hwnd = unsafe { GetForegroundWindow() };
        if hwnd.0.is_null() {
            None
        } else {
            Some(WindowHandle(hwnd.0 as isize))
        }
    }

    fn activate(&self, window: WindowHandle) -> bool {
        // SAFETY: an invalid handle makes the call fail, it does not crash.
        unsafe { SetForegroundWindow(HWND(window.0 as *mut c_void)).as_bool() }
    }

    fn is_host_foreground(&self) -> bool {
        let mut pid = 0u32;
        // SAFETY: pid outlives the call; a null window yields thread id 0.
        unsafe {
            let hwnd = GetForegroundWindow();
            if hwnd.0.is_null() {
                return false;
            }
            GetWindowThreadProcessId(hwnd, Some(&mut pid));
            pid == GetCurrentProcessId()
        }
    }
}
