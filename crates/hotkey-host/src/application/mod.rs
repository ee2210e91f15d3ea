//! Application layer use cases for the hotkey host.
//!
//! # What is the "application" layer? (for beginners)
//!
//! In Clean Architecture the *application* layer sits between the domain
//! (pure value types in `hotkey_core`) and the infrastructure (OS hooks,
//! window APIs, storage).
//!
//! Use cases in this layer:
//!
//! - **Orchestrate** domain objects to fulfil a user goal (e.g., "toggle this
//!   feature when Ctrl+F8 is pressed").
//! - **Depend on abstractions** (traits) rather than concrete implementations,
//!   so the infrastructure can be swapped without changing this code.
//! - **Contain no OS calls** of their own.
//!
//! # Sub-modules
//!
//! - **`capture`** – Fans every hooked input event out to subscribers, on the
//!   hook thread or a dedicated consumer thread.  Runs on every keystroke and
//!   mouse movement.
//!
//! - **`hotkey_tracker`** – Matches events against configured gestures and
//!   publishes an "active" flag (hold or click/toggle semantics).
//!
//! - **`input_blocker`** – Swallows physical input by category while a block
//!   handle is alive, keeping press/release pairs consistent.
//!
//! - **`sequence_recorder`** – Records input into a replayable macro.
//!
//! - **`window_focus`** – The foreground window seam used by the tracker and
//!   the recorder.

pub mod capture;
pub mod hotkey_tracker;
pub mod input_blocker;
pub mod sequence_recorder;
pub mod window_focus;
