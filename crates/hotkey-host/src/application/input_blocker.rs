//! UserInputBlocker: temporarily swallows physical user input by category.
//!
//! Callers rent a [`BlockHandle`] for a [`BlockType`]; while any handle for a
//! category is alive, physical events of that category are marked handled.
//! Four latches back the categories: `all`, `keyboard`, `mouse` and
//! `mouse-move`.  `All` blocks every category, `Mouse` blocks buttons, wheel
//! and movement, `MouseMove` blocks movement only.
//!
//! # Press consistency
//!
//! The blocker remembers, per key and mouse button, whether the last down
//! edge was suppressed or passed.  An up edge follows its down edge:
//!
//! | last down   | up edge                       |
//! |-------------|-------------------------------|
//! | suppressed  | suppressed, even if unblocked |
//! | passed      | passed, even if now blocked   |
//! | unknown     | follows the current latches   |
//!
//! So no application ever sees a release without its press or vice versa.
//!
//! The blocker is subscribed to the capture only while a latch is busy or a
//! suppressed press still awaits its release.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};

use hotkey_core::{BlockLatch, LatchGuard, MouseButton};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::application::capture::{InputEventCapture, InputSubscriber, Subscription};
use crate::infrastructure::input_capture::{EdgeSource, InputEventKind, RawInputEvent};

/// Which input a [`BlockHandle`] blocks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    /// Blocks nothing; the handle is inert.
    #[default]
    None,
    All,
    Keyboard,
    /// Mouse buttons, wheel and movement.
    Mouse,
    /// Cursor movement only.
    MouseMove,
}

/// Category of a single event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputCategory {
    Keyboard,
    MouseButtons,
    MouseMove,
}

const RELEASED: u8 = 0;
const PASSED: u8 = 1;
const SUPPRESSED: u8 = 2;

const BUTTON_SLOTS: usize = MouseButton::ALL.len();

/// Scoped block.  Dropping it releases the latch.
#[must_use = "dropping the handle ends the block immediately"]
pub struct BlockHandle {
    block_type: BlockType,
    guard: Option<LatchGuard>,
    blocker: Weak<UserInputBlocker>,
}

impl BlockHandle {
    pub fn block_type(&self) -> BlockType {
        self.block_type
    }

    /// Ends the block now.  Equivalent to dropping.
    pub fn release(self) {}
}

impl Drop for BlockHandle {
    fn drop(&mut self) {
        if let Some(guard) = self.guard.take() {
            guard.release();
            if let Some(blocker) = self.blocker.upgrade() {
                blocker.refresh_subscription();
            }
        }
    }
}

impl std::fmt::Debug for BlockHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockHandle")
            .field("block_type", &self.block_type)
            .finish()
    }
}

pub struct UserInputBlocker {
    all: Arc<BlockLatch>,
    keyboard: Arc<BlockLatch>,
    mouse: Arc<BlockLatch>,
    mouse_move: Arc<BlockLatch>,
    keys: [AtomicU8; 256],
    buttons: [AtomicU8; BUTTON_SLOTS],
    capture: Weak<InputEventCapture>,
    subscription: Mutex<Option<Subscription>>,
    this: Weak<UserInputBlocker>,
}

impl UserInputBlocker {
    /// Creates a blocker bound to `capture`.  Pass `Weak::new()` to drive it
    /// manually through [`process`](Self::process).
    pub fn new(capture: Weak<InputEventCapture>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            all: BlockLatch::new("all"),
            keyboard: BlockLatch::new("keyboard"),
            mouse: BlockLatch::new("mouse"),
            mouse_move: BlockLatch::new("mouse-move"),
            keys: std::array::from_fn(|_| AtomicU8::new(RELEASED)),
            buttons: std::array::from_fn(|_| AtomicU8::new(RELEASED)),
            capture,
            subscription: Mutex::new(None),
            this: this.clone(),
        })
    }

    /// Starts blocking `block_type` until the handle is dropped.
    pub fn block(&self, block_type: BlockType) -> BlockHandle {
        let guard = self.latch(block_type).map(|latch| latch.rent());
        if guard.is_some() {
            debug!(?block_type, "user input blocked");
            self.refresh_subscription();
        }
        BlockHandle {
            block_type,
            guard,
            blocker: self.this.clone(),
        }
    }

    pub fn latch(&self, block_type: BlockType) -> Option<&Arc<BlockLatch>> {
        match block_type {
            BlockType::None => None,
            BlockType::All => Some(&self.all),
            BlockType::Keyboard => Some(&self.keyboard),
            BlockType::Mouse => Some(&self.mouse),
            BlockType::MouseMove => Some(&self.mouse_move),
        }
    }

    pub fn is_blocked(&self, category: InputCategory) -> bool {
        if self.all.is_busy() {
            return true;
        }
        match category {
            InputCategory::Keyboard => self.keyboard.is_busy(),
            InputCategory::MouseButtons => self.mouse.is_busy(),
            InputCategory::MouseMove => self.mouse.is_busy() || self.mouse_move.is_busy(),
        }
    }

    /// `true` while any latch is busy.
    pub fn is_blocking(&self) -> bool {
        [&self.all, &self.keyboard, &self.mouse, &self.mouse_move]
            .iter()
            .any(|l| l.is_busy())
    }

    /// `true` while subscribed to the capture.
    pub fn is_subscribed(&self) -> bool {
        self.subscription.lock().is_some()
    }

    /// Applies the blocking rules to one event.
    pub fn process(&self, event: &RawInputEvent) {
        if event.injected || event.is_handled() {
            return;
        }
        let released_suppressed = match event.edge() {
            Some((source, is_down)) => {
                let (slot, category) = self.slot(source);
                if is_down {
                    self.on_down(slot, category, event);
                    false
                } else {
                    self.on_up(slot, category, event)
                }
            }
            None => {
                let category = match event.kind {
                    InputEventKind::MouseMove { .. } => InputCategory::MouseMove,
                    _ => InputCategory::MouseButtons,
                };
                if self.is_blocked(category) {
                    event.mark_handled();
                }
                false
            }
        };
        if released_suppressed && !self.is_blocking() {
            self.refresh_subscription();
        }
    }

    fn slot(&self, source: EdgeSource) -> (&AtomicU8, InputCategory) {
        match source {
            EdgeSource::Key(key) => (&self.keys[key.vk() as usize], InputCategory::Keyboard),
            EdgeSource::Button(button) => (&self.buttons[button.index()], InputCategory::MouseButtons),
        }
    }

    fn on_down(&self, slot: &AtomicU8, category: InputCategory, event: &RawInputEvent) {
        // A press the hook already passed on (late verdict) counts as passed.
        if self.is_blocked(category) && event.mark_handled() {
            slot.store(SUPPRESSED, Ordering::Release);
            trace!(kind = ?event.kind, "press blocked");
        } else {
            slot.store(PASSED, Ordering::Release);
        }
    }

    /// Returns `true` when this release ends a suppressed press.
    fn on_up(&self, slot: &AtomicU8, category: InputCategory, event: &RawInputEvent) -> bool {
        match slot.swap(RELEASED, Ordering::AcqRel) {
            SUPPRESSED => {
                event.mark_handled();
                true
            }
            PASSED => false,
            _ => {
                if self.is_blocked(category) {
                    event.mark_handled();
                }
                false
            }
        }
    }

    fn has_suppressed_presses(&self) -> bool {
        self.keys
            .iter()
            .chain(self.buttons.iter())
            .any(|s| s.load(Ordering::Acquire) == SUPPRESSED)
    }

    /// Subscribes while there is something to block, unsubscribes otherwise.
    ///
    /// Decided under the subscription lock: a rent racing a release on another
    /// thread is always seen by whichever refresh runs last.
    fn refresh_subscription(&self) {
        let mut subscription = self.subscription.lock();
        let needed = self.is_blocking() || self.has_suppressed_presses();
        match (needed, subscription.is_some()) {
            (true, false) => {
                let Some(capture) = self.capture.upgrade() else {
                    return;
                };
                let adapter = Arc::new(BlockerSubscriber {
                    blocker: self.this.clone(),
                });
                *subscription = Some(capture.subscribe(adapter));
                debug!("input blocker subscribed");
            }
            (false, true) => {
                subscription.take();
                // Presses seen while subscribed are stale once we stop listening.
                for slot in self.keys.iter().chain(self.buttons.iter()) {
                    slot.store(RELEASED, Ordering::Release);
                }
                debug!("input blocker unsubscribed");
            }
            _ => {}
        }
    }
}

struct BlockerSubscriber {
    blocker: Weak<UserInputBlocker>,
}

impl InputSubscriber for BlockerSubscriber {
    fn name(&self) -> &str {
        "user-input-blocker"
    }

    fn on_event(&self, event: &RawInputEvent) -> anyhow::Result<()> {
        if let Some(blocker) = self.blocker.upgrade() {
            blocker.process(event);
        }
        Ok(())
    }

    fn may_suppress(&self) -> bool {
        true
    }
}
