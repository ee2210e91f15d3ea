//! Infrastructure layer for the hotkey host.
//!
//! Contains OS-facing adapters: input capture hooks, foreground window
//! control, file-system storage, and the runtime that wires them together.
//!
//! **Dependency rule**: this layer may depend on `application` and `hotkey_core`.
//! The application layer only reaches in for the input event types and the
//! [`input_capture::InputSource`] seam.

pub mod input_capture;
pub mod runtime;
pub mod storage;
pub mod window_focus;
