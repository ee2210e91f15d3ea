//! Domain entities for global hotkey handling.
//!
//! This module contains pure logic with no OS dependencies: gestures,
//! reference-counted block latches and recorded sequences.  Everything here
//! can be compiled and tested on any platform.
//!
//! # What lives here? (for beginners)
//!
//! - **`gesture`** – [`gesture::HotkeyGesture`], the comparable value that a
//!   configured hotkey and a captured key/button event are both turned into.
//! - **`latch`** – [`latch::BlockLatch`], a counter that is "busy" while any
//!   rented guard is alive.  The input blocker is built from four of them.
//! - **`sequence`** – [`sequence::SequenceList`], the bounded, timed list of
//!   items produced by the macro recorder.

pub mod gesture;
pub mod latch;
pub mod sequence;
