//! Windows low-level keyboard and mouse hook implementation.
//!
//! This module installs WH_KEYBOARD_LL and WH_MOUSE_LL hooks using the
//! Windows API. Both hooks share a dedicated Win32 message-loop thread
//! that runs at THREAD_PRIORITY_TIME_CRITICAL to minimize callback latency.
//! Uninstalling posts `WM_QUIT` to that thread and joins it.
//!
//! # Safety
//!
//! This module uses `unsafe` code exclusively for Windows API FFI calls.
//! All `unsafe` blocks are annotated with `// SAFETY:` comments.

#![cfg(target_os = "windows")]

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use hotkey_core::{KeyMapper, MouseButton};
use parking_lot::RwLock;
use tracing::{debug, error, info, warn};
use windows::Win32::Foundation::{LPARAM, LRESULT, WPARAM};
use windows::Win32::System::Threading::{
    GetCurrentThread, GetCurrentThreadId, SetThreadPriority, THREAD_PRIORITY_TIME_CRITICAL,
};
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, GetMessageW, PeekMessageW, PostThreadMessageW,
    SetWindowsHookExW, UnhookWindowsHookEx, HC_ACTION, HHOOK, KBDLLHOOKSTRUCT,
    KBDLLHOOKSTRUCT_FLAGS, LLKHF_INJECTED, LLMHF_INJECTED, MSG, MSLLHOOKSTRUCT, PM_NOREMOVE,
    WH_KEYBOARD_LL, WH_MOUSE_LL, WM_KEYDOWN, WM_KEYUP, WM_LBUTTONDOWN, WM_LBUTTONUP,
    WM_MBUTTONDOWN, WM_MBUTTONUP, WM_MOUSEHWHEEL, WM_MOUSEMOVE, WM_MOUSEWHEEL, WM_QUIT,
    WM_RBUTTONDOWN, WM_RBUTTONUP, WM_SYSKEYDOWN, WM_SYSKEYUP, WM_USER, WM_XBUTTONDOWN,
    WM_XBUTTONUP, XBUTTON1,
};

use super::{
    CaptureError, HookCallback, HookDecision, HookHandle, InputEventKind, InputSource,
    RawInputEvent,
};

/// Callback of the installed hooks.  The hook procedures are plain
/// `extern "system"` functions, so the target lives in process-global state;
/// only one capture may own the hooks at a time.
static HOOK_CALLBACK: RwLock<Option<Arc<dyn HookCallback>>> = parking_lot::const_rwlock(None);

/// Windows low-level input hook facility.
#[derive(Debug, Default)]
pub struct WindowsInputSource;

impl WindowsInputSource {
    pub fn new() -> Self {
        Self
    }
}

impl InputSource for WindowsInputSource {
    fn install(&self, callback: Arc<dyn HookCallback>) -> Result<HookHandle, CaptureError> {
        {
            let mut slot = HOOK_CALLBACK.write();
            if slot.is_some() {
                return Err(CaptureError::AlreadyInstalled);
            }
            *slot = Some(callback);
        }

        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<u32, CaptureError>>(1);
        let loop_thread = thread::Builder::new()
            .name("hotkey-hook-loop".to_string())
            .spawn(move || run_hook_message_loop(ready_tx))
            .map_err(|e| {
                HOOK_CALLBACK.write().take();
                CaptureError::ThreadSpawn(e.to_string())
            })?;

        let thread_id = match ready_rx.recv() {
            Ok(Ok(thread_id)) => thread_id,
            Ok(Err(e)) => {
                let _ = loop_thread.join();
                HOOK_CALLBACK.write().take();
                return Err(e);
            }
            Err(_) => {
                let _ = loop_thread.join();
                HOOK_CALLBACK.write().take();
                return Err(CaptureError::KeyboardHookInstallFailed(
                    "hook thread exited before reporting readiness".to_string(),
                ));
            }
        };
        info!(thread_id, "low-level keyboard and mouse hooks installed");

        Ok(HookHandle::new(move || {
            // SAFETY: posting to a thread id we own; failure means the loop already exited.
            if let Err(e) = unsafe { PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) } {
                warn!(error = %e, "failed to post WM_QUIT to hook thread");
            }
            if loop_thread.thread().id() != thread::current().id() {
                let _ = loop_thread.join();
            }
            HOOK_CALLBACK.write().take();
            info!("low-level hooks uninstalled");
        }))
    }

    fn name(&self) -> &'static str {
        "windows-ll-hooks"
    }
}

/// Entry point for the dedicated Win32 message loop thread.
fn run_hook_message_loop(ready: crossbeam_channel::Sender<Result<u32, CaptureError>>) {
    // SAFETY: plain Win32 calls on the current thread.
    let thread_id = unsafe {
        if let Err(e) = SetThreadPriority(GetCurrentThread(), THREAD_PRIORITY_TIME_CRITICAL) {
            debug!(error = %e, "could not raise hook thread priority");
        }
        // Force creation of the thread message queue so WM_QUIT can be posted
        // before GetMessageW is first called.
        let mut msg = MSG::default();
        let _ = PeekMessageW(&mut msg, None, WM_USER, WM_USER, PM_NOREMOVE);
        GetCurrentThreadId()
    };

    // SAFETY: SetWindowsHookExW requires the calling thread to have a message loop.
    // We install both hooks before entering the loop.
    let kbd_hook: HHOOK = match unsafe {
        SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_hook_proc), None, 0)
    } {
        Ok(hook) => hook,
        Err(e) => {
            let _ = ready.send(Err(CaptureError::KeyboardHookInstallFailed(e.to_string())));
            return;
        }
    };
    let mouse_hook: HHOOK = match unsafe {
        SetWindowsHookExW(WH_MOUSE_LL, Some(mouse_hook_proc), None, 0)
    } {
        Ok(hook) => hook,
        Err(e) => {
            // SAFETY: kbd_hook was installed above on this thread.
            unsafe {
                UnhookWindowsHookEx(kbd_hook).ok();
            }
            let _ = ready.send(Err(CaptureError::MouseHookInstallFailed(e.to_string())));
            return;
        }
    };
    let _ = ready.send(Ok(thread_id));

    // Win32 message loop – blocks until WM_QUIT is posted
    let mut msg = MSG::default();
    // SAFETY: Standard Win32 GetMessage/DispatchMessage loop pattern.
    unsafe {
        while GetMessageW(&mut msg, None, 0, 0).as_bool() {
            DispatchMessageW(&msg);
        }
        UnhookWindowsHookEx(kbd_hook).ok();
        UnhookWindowsHookEx(mouse_hook).ok();
    }
}

/// Hands one event to the installed callback.  Panics never cross the FFI
/// boundary; a panicking callback lets the event through.
fn deliver(event: RawInputEvent) -> HookDecision {
    let callback = HOOK_CALLBACK.read().clone();
    let Some(callback) = callback else {
        return HookDecision::PassThrough;
    };
    match catch_unwind(AssertUnwindSafe(|| callback.on_hook_event(event))) {
        Ok(decision) => decision,
        Err(_) => {
            error!("hook callback panicked; event passed through");
            HookDecision::PassThrough
        }
    }
}

/// Low-level keyboard hook callback.
///
/// # Safety
///
/// This function is called by Windows from the hook message loop thread.
/// It must return quickly (< ~300ms) to avoid hook removal by the OS.
unsafe extern "system" fn keyboard_hook_proc(
    n_code: i32,
    w_param: WPARAM,
    l_param: LPARAM,
) -> LRESULT {
    if n_code != HC_ACTION as i32 {
        // SAFETY: Must call CallNextHookEx when n_code < 0.
        return CallNextHookEx(None, n_code, w_param, l_param);
    }

    // SAFETY: l_param points to a KBDLLHOOKSTRUCT when n_code == HC_ACTION.
    let kbs = &*(l_param.0 as *const KBDLLHOOKSTRUCT);

    let Some(key) = KeyMapper::windows_vk_to_key(kbs.vkCode as u8) else {
        return CallNextHookEx(None, n_code, w_param, l_param);
    };
    let kind = match w_param.0 as u32 {
        WM_KEYDOWN | WM_SYSKEYDOWN => InputEventKind::KeyDown { key },
        WM_KEYUP | WM_SYSKEYUP => InputEventKind::KeyUp { key },
        _ => {
            return CallNextHookEx(None, n_code, w_param, l_param);
        }
    };
    let injected = (kbs.flags & LLKHF_INJECTED) != KBDLLHOOKSTRUCT_FLAGS(0);
    let event = RawInputEvent::new(kind, kbs.time).with_injected(injected);

    if deliver(event) == HookDecision::Suppress {
        return LRESULT(1);
    }

    // SAFETY: Forward the event to the next hook in the chain.
    CallNextHookEx(None, n_code, w_param, l_param)
}

/// Low-level mouse hook callback.
///
/// # Safety
///
/// Called by Windows from the hook message loop thread; must return quickly.
unsafe extern "system" fn mouse_hook_proc(
    n_code: i32,
    w_param: WPARAM,
    l_param: LPARAM,
) -> LRESULT {
    if n_code != HC_ACTION as i32 {
        // SAFETY: Must call CallNextHookEx when n_code < 0.
        return CallNextHookEx(None, n_code, w_param, l_param);
    }

    // SAFETY: l_param points to a MSLLHOOKSTRUCT when n_code == HC_ACTION.
    let mhs = &*(l_param.0 as *const MSLLHOOKSTRUCT);

    let x = mhs.pt.x;
    let y = mhs.pt.y;
    let high_word = (mhs.mouseData >> 16) as u16;
    let x_button = || {
        if high_word == XBUTTON1 {
            MouseButton::XButton1
        } else {
            MouseButton::XButton2
        }
    };

    let kind = match w_param.0 as u32 {
        WM_MOUSEMOVE => InputEventKind::MouseMove { x, y },
        WM_LBUTTONDOWN => InputEventKind::MouseButtonDown { button: MouseButton::Left, x, y },
        WM_LBUTTONUP => InputEventKind::MouseButtonUp { button: MouseButton::Left, x, y },
        WM_RBUTTONDOWN => InputEventKind::MouseButtonDown { button: MouseButton::Right, x, y },
        WM_RBUTTONUP => InputEventKind::MouseButtonUp { button: MouseButton::Right, x, y },
        WM_MBUTTONDOWN => InputEventKind::MouseButtonDown { button: MouseButton::Middle, x, y },
        WM_MBUTTONUP => InputEventKind::MouseButtonUp { button: MouseButton::Middle, x, y },
        WM_XBUTTONDOWN => InputEventKind::MouseButtonDown { button: x_button(), x, y },
        WM_XBUTTONUP => InputEventKind::MouseButtonUp { button: x_button(), x, y },
        WM_MOUSEWHEEL => InputEventKind::MouseWheel {
            delta: high_word as i16,
            horizontal: false,
            x,
            y,
        },
        WM_MOUSEHWHEEL => InputEventKind::MouseWheel {
            delta: high_word as i16,
            horizontal: true,
            x,
            y,
        },
        _ => {
            return CallNextHookEx(None, n_code, w_param, l_param);
        }
    };
    let injected = mhs.flags & LLMHF_INJECTED != 0;
    let event = RawInputEvent::new(kind, mhs.time).with_injected(injected);

    if deliver(event) == HookDecision::Suppress {
        return LRESULT(1);
    }

    // SAFETY: Forward to the next hook in the chain.
    CallNextHookEx(None, n_code, w_param, l_param)
}
