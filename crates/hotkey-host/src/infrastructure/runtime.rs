//! Host runtime: wires the configured hotkeys, the input blocker and the
//! recorder onto one input capture.
//!
//! [`HostRuntime`] is the composition root shared by the binary and the
//! integration tests.  It owns the capture and every component subscribed to
//! it, plus the Tokio tasks that react to hotkey activation:
//!
//! - a hotkey bound with `block = "..."` holds a [`BlockHandle`] while active;
//! - the recorder's start hotkey starts a recording on each press, and the
//!   finished recording is kept as [`HostRuntime::last_recording`].
//!
//! Must be started from within a Tokio runtime.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::application::capture::InputEventCapture;
use crate::application::hotkey_tracker::{HotkeyTracker, TrackerMode, TrackerOptions};
use crate::application::input_blocker::{BlockHandle, BlockType, UserInputBlocker};
use crate::application::sequence_recorder::{
    RecordingOutcome, RecordingRequest, SequenceRecorder,
};
use crate::application::window_focus::WindowFocus;
use crate::infrastructure::input_capture::{CaptureError, InputSource};
use crate::infrastructure::storage::config::AppConfig;

/// A configured hotkey and its live tracker.
pub struct BoundHotkey {
    pub name: String,
    pub block: BlockType,
    pub tracker: Arc<HotkeyTracker>,
}

pub struct HostRuntime {
    pub capture: Arc<InputEventCapture>,
    pub blocker: Arc<UserInputBlocker>,
    pub recorder: Arc<SequenceRecorder>,
    pub hotkeys: Vec<BoundHotkey>,
    start_tracker: Option<Arc<HotkeyTracker>>,
    last_recording: Arc<Mutex<Option<RecordingOutcome>>>,
    tasks: Vec<JoinHandle<()>>,
}

impl HostRuntime {
    /// Installs the hooks on `source` and attaches every configured component.
    ///
    /// # Errors
    ///
    /// Returns the [`CaptureError`] of a failed hook installation; nothing is
    /// left running in that case.
    pub fn start(
        config: &AppConfig,
        source: &dyn InputSource,
        focus: Arc<dyn WindowFocus>,
    ) -> Result<Self, CaptureError> {
        let capture = InputEventCapture::start(source, config.general.capture_options())?;
        let blocker = UserInputBlocker::new(Arc::downgrade(&capture));
        let recorder = SequenceRecorder::new(
            Arc::downgrade(&capture),
            Arc::clone(&focus),
            config.recorder.recorder_options(),
        );
        let mut tasks = Vec::new();

        let mut hotkeys = Vec::with_capacity(config.hotkeys.len());
        for binding in &config.hotkeys {
            let tracker = HotkeyTracker::new(
                binding.name.clone(),
                binding.tracker_options(),
                Arc::clone(&focus),
            );
            tracker.set_gesture(Some(binding.gesture));
            tracker.attach(&capture);
            if binding.block != BlockType::None {
                tasks.push(spawn_block_binding(
                    tracker.watch_active(),
                    Arc::clone(&blocker),
                    binding.block,
                ));
            }
            info!(
                hotkey = %binding.name,
                gesture = %binding.gesture,
                mode = ?binding.mode,
                block = ?binding.block,
                "hotkey registered"
            );
            hotkeys.push(BoundHotkey {
                name: binding.name.clone(),
                block: binding.block,
                tracker,
            });
        }

        let last_recording = Arc::new(Mutex::new(None));
        let start_tracker = config.recorder.start_gesture().map(|gesture| {
            let tracker = HotkeyTracker::new(
                "recorder-start",
                TrackerOptions {
                    mode: TrackerMode::Hold,
                    suppress_key: true,
                },
                Arc::clone(&focus),
            );
            tracker.set_gesture(Some(gesture));
            tracker.attach(&capture);
            tasks.push(spawn_recording_trigger(
                tracker.watch_active(),
                Arc::clone(&recorder),
                Arc::clone(&last_recording),
            ));
            info!(gesture = %gesture, "recording hotkey registered");
            tracker
        });

        Ok(Self {
            capture,
            blocker,
            recorder,
            hotkeys,
            start_tracker,
            last_recording,
            tasks,
        })
    }

    pub fn tracker(&self, name: &str) -> Option<&Arc<HotkeyTracker>> {
        self.hotkeys
            .iter()
            .find(|h| h.name == name)
            .map(|h| &h.tracker)
    }

    /// The most recently finished hotkey-triggered recording.
    pub async fn last_recording(&self) -> Option<RecordingOutcome> {
        self.last_recording.lock().await.clone()
    }

    /// Detaches everything and uninstalls the hooks.
    pub fn shutdown(self) {
        for task in &self.tasks {
            task.abort();
        }
        for hotkey in &self.hotkeys {
            hotkey.tracker.dispose();
        }
        if let Some(tracker) = &self.start_tracker {
            tracker.dispose();
        }
        self.capture.stop();
        info!("host runtime stopped");
    }
}

fn spawn_block_binding(
    mut active: watch::Receiver<bool>,
    blocker: Arc<UserInputBlocker>,
    block: BlockType,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut handle: Option<BlockHandle> = None;
        loop {
            let is_active = *active.borrow_and_update();
            if is_active && handle.is_none() {
                handle = Some(blocker.block(block));
            } else if !is_active {
                handle = None;
            }
            if active.changed().await.is_err() {
                break;
            }
        }
    })
}

fn spawn_recording_trigger(
    mut active: watch::Receiver<bool>,
    recorder: Arc<SequenceRecorder>,
    last_recording: Arc<Mutex<Option<RecordingOutcome>>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while active.changed().await.is_ok() {
            if !*active.borrow_and_update() {
                continue;
            }
            let session = match recorder.start_recording(RecordingRequest::default()) {
                Ok(session) => session,
                Err(e) => {
                    warn!(error = %e, "recording hotkey ignored");
                    continue;
                }
            };
            let last_recording = Arc::clone(&last_recording);
            tokio::spawn(async move {
                let outcome = session.wait().await;
                info!(
                    session = %outcome.session_id,
                    reason = ?outcome.reason,
                    items = outcome.items.len(),
                    elapsed_ms = outcome.elapsed.as_millis() as u64,
                    "recording available"
                );
                *last_recording.lock().await = Some(outcome);
            });
        }
    })
}
