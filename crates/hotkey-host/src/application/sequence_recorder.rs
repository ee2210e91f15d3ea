//! SequenceRecorder: records user input into a [`SequenceList`] macro.
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──start_recording──▶ Starting ──▶ Armed ──first edge──▶ Recording
//!   ▲                                      │                      │
//!   └──────────── stop gesture / focus loss / capacity / stop / cancel
//! ```
//!
//! While **Armed**, presses of the stop gesture are ignored: the gesture that
//! started the recording is often still held and auto-repeating.  The first
//! other key or button edge moves the session to **Recording**.
//!
//! # What gets recorded
//!
//! Every key and mouse-button edge becomes a `Hotkey` item of the bare key or
//! button (modifier keys are recorded as their own edges), and every wheel
//! notch a `MouseWheel` item.  Each item is preceded by a `Delay` holding the
//! time since the previous item.  With mouse position sampling enabled, a
//! ticker thread emits `MousePosition` items at a fixed resolution.  Nothing
//! is recorded while Armed; the cursor position is only tracked.
//!
//! The ticker runs even without sampling, so focus loss and the duration
//! limit end an idle session too.
//!
//! Appends go through [`SequenceList::try_extend`], so the limits are never
//! overshot; hitting them ends the session with
//! [`StopReason::CapacityExceeded`].
//!
//! The stop gesture's press is kept from the focused application; its
//! release is swallowed as well, even though the session has ended by then.

use std::collections::HashSet;
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use hotkey_core::{
    HotkeyGesture, ModifierKeys, SequenceItem, SequenceLimits, SequenceList,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::capture::{InputEventCapture, InputSubscriber, Subscription};
use crate::application::hotkey_tracker::{HotkeyTracker, TrackerMode, TrackerOptions};
use crate::application::window_focus::{ForegroundRestore, WindowFocus, WindowHandle};
use crate::infrastructure::input_capture::{CaptureError, EdgeSource, InputEventKind, RawInputEvent};

/// Ticker period when mouse positions are not sampled.
const IDLE_TICK_PERIOD: Duration = Duration::from_millis(100);

/// How cursor movement is recorded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MousePositionRecordingType {
    /// Cursor movement is not recorded.
    #[default]
    None,
    /// Screen coordinates.
    Absolute,
    /// Deltas from the previous sample; the first observed position is the origin.
    Relative,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecorderOptions {
    pub max_duration: Duration,
    pub max_items_count: usize,
    /// Hold time used by editors when inserting a full key press.
    pub default_key_press_duration: Duration,
    pub mouse_position_recording_resolution: Duration,
    pub mouse_position_recording_type: MousePositionRecordingType,
    /// Ends a session when pressed.  `None` leaves only explicit stops.
    pub stop_gesture: Option<HotkeyGesture>,
}

impl RecorderOptions {
    pub fn limits(&self) -> SequenceLimits {
        SequenceLimits {
            max_duration: self.max_duration,
            max_items_count: self.max_items_count,
        }
    }
}

impl Default for RecorderOptions {
    fn default() -> Self {
        Self {
            max_duration: Duration::from_secs(600),
            max_items_count: 10_000,
            default_key_press_duration: Duration::from_millis(50),
            mouse_position_recording_resolution: Duration::from_millis(50),
            mouse_position_recording_type: MousePositionRecordingType::None,
            stop_gesture: None,
        }
    }
}

/// Published recorder state (UI indicator surface).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecorderState {
    Idle,
    Starting,
    Armed,
    Recording,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopReason {
    StopGesture,
    FocusLost,
    CapacityExceeded,
    Stopped,
    Cancelled,
}

#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    #[error("cannot start recording while the recorder is {0:?}")]
    InvalidModeTransition(RecorderState),
    #[error("failed to activate target window {0}")]
    TargetActivationFailed(WindowHandle),
    #[error("input capture unavailable: {0}")]
    Capture(#[from] CaptureError),
}

/// Parameters of one recording.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordingRequest {
    /// Activated before recording; losing focus ends the session.
    pub target_window: Option<WindowHandle>,
}

/// Result of a finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingOutcome {
    pub session_id: Uuid,
    pub items: SequenceList,
    pub reason: StopReason,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionPhase {
    Armed,
    Recording,
    Finished,
}

struct SessionState {
    phase: SessionPhase,
    items: SequenceList,
    started: Instant,
    stopwatch: Instant,
    pressed: HashSet<EdgeSource>,
    cursor: Option<(i32, i32)>,
    last_sample: Option<(i32, i32)>,
}

struct SessionInner {
    id: Uuid,
    recorder: Weak<SequenceRecorder>,
    options: RecorderOptions,
    limits: SequenceLimits,
    target: Option<WindowHandle>,
    focus: Arc<dyn WindowFocus>,
    stop_tracker: Arc<HotkeyTracker>,
    capture: Weak<InputEventCapture>,
    state: Mutex<SessionState>,
    subscription: Mutex<Option<Subscription>>,
    ticker_stop: Mutex<Option<Sender<()>>>,
    restore: Mutex<Option<ForegroundRestore>>,
    outcome: watch::Sender<Option<RecordingOutcome>>,
}

impl SessionInner {
    fn on_event(&self, event: &RawInputEvent) {
        if let Some(reason) = self.record(event) {
            self.finish(reason);
        }
    }

    fn record(&self, event: &RawInputEvent) -> Option<StopReason> {
        let mut st = self.state.lock();
        if st.phase == SessionPhase::Finished {
            return None;
        }
        if self.lost_focus() {
            return Some(StopReason::FocusLost);
        }

        let edge = event.edge();
        if st.phase == SessionPhase::Armed && edge.is_some() && !event.injected {
            let stop_press = edge.is_some_and(|(_, down)| down)
                && self.options.stop_gesture.is_some()
                && event.gesture() == self.options.stop_gesture;
            if stop_press {
                return None;
            }
            self.enter_recording(&mut st);
        }

        let matched = self.stop_tracker.process(event);
        if self.stop_tracker.is_active() {
            return Some(StopReason::StopGesture);
        }
        if matched || event.injected {
            return None;
        }

        let action = match event.kind {
            InputEventKind::MouseMove { x, y } => {
                st.cursor = Some((x, y));
                return None;
            }
            InputEventKind::MouseWheel {
                delta, horizontal, x, y,
            } => {
                st.cursor = Some((x, y));
                if st.phase != SessionPhase::Recording {
                    return None;
                }
                SequenceItem::MouseWheel { delta, horizontal }
            }
            _ => {
                let (source, is_down) = edge?;
                if let Some((x, y)) = event.position() {
                    st.cursor = Some((x, y));
                }
                let fresh = if is_down {
                    st.pressed.insert(source)
                } else {
                    st.pressed.remove(&source)
                };
                if !fresh {
                    // Auto-repeat, or a release whose press predates the session.
                    return None;
                }
                SequenceItem::Hotkey {
                    gesture: bare_gesture(source),
                    is_down,
                }
            }
        };

        match self.append(&mut st, action) {
            Ok(()) => None,
            Err(e) => {
                debug!(session = %self.id, error = %e, "recording limits reached");
                Some(StopReason::CapacityExceeded)
            }
        }
    }

    /// Appends `action` preceded by the elapsed-time delay, both or neither.
    fn append(
        &self,
        st: &mut SessionState,
        action: SequenceItem,
    ) -> Result<(), hotkey_core::CapacityExceeded> {
        let now = Instant::now();
        let is_key_press = match (&action, st.items.last()) {
            (
                SequenceItem::Hotkey {
                    gesture: released,
                    is_down: false,
                },
                Some(SequenceItem::Hotkey {
                    gesture: pressed,
                    is_down: true,
                }),
            ) => released == pressed,
            _ => false,
        };
        let delay = SequenceItem::Delay {
            duration: now.saturating_duration_since(st.stopwatch),
            is_key_press,
        };
        st.items.try_extend(vec![delay, action], &self.limits)?;
        st.stopwatch = now;
        Ok(())
    }

    /// Periodic check: focus, the duration limit, then a position sample.
    fn tick(&self) -> Option<StopReason> {
        let mut st = self.state.lock();
        if st.phase == SessionPhase::Finished {
            return None;
        }
        if self.lost_focus() {
            return Some(StopReason::FocusLost);
        }
        let recorded = st.items.total_duration().saturating_add(st.stopwatch.elapsed());
        if recorded >= self.limits.max_duration {
            debug!(session = %self.id, "recording duration limit reached");
            return Some(StopReason::CapacityExceeded);
        }
        if st.phase != SessionPhase::Recording {
            return None;
        }
        let current = st.cursor?;
        if st.last_sample == Some(current) {
            return None;
        }
        let item = match self.options.mouse_position_recording_type {
            MousePositionRecordingType::None => return None,
            MousePositionRecordingType::Absolute => SequenceItem::MousePosition {
                x: current.0,
                y: current.1,
                is_relative: false,
            },
            MousePositionRecordingType::Relative => match st.last_sample {
                None => {
                    st.last_sample = Some(current);
                    return None;
                }
                Some(previous) => SequenceItem::MousePosition {
                    x: current.0 - previous.0,
                    y: current.1 - previous.1,
                    is_relative: true,
                },
            },
        };
        match self.append(&mut st, item) {
            Ok(()) => {
                st.last_sample = Some(current);
                None
            }
            Err(_) => Some(StopReason::CapacityExceeded),
        }
    }

    fn lost_focus(&self) -> bool {
        self.target
            .is_some_and(|target| self.focus.foreground_window() != Some(target))
    }

    fn enter_recording(&self, st: &mut SessionState) {
        st.phase = SessionPhase::Recording;
        if let Some(recorder) = self.recorder.upgrade() {
            recorder.publish_for(self.id, RecorderState::Recording);
        }
    }

    /// Ends the session.  Idempotent; the first reason wins.
    fn finish(&self, reason: StopReason) {
        let outcome = {
            let mut st = self.state.lock();
            if st.phase == SessionPhase::Finished {
                return;
            }
            st.phase = SessionPhase::Finished;
            if let Some(stop) = self.options.stop_gesture {
                trim_stop_gesture(&mut st.items, stop);
            }
            RecordingOutcome {
                session_id: self.id,
                items: std::mem::take(&mut st.items),
                reason,
                elapsed: st.started.elapsed(),
            }
        };

        self.subscription.lock().take();
        self.ticker_stop.lock().take();
        match self.capture.upgrade() {
            Some(capture) => self.stop_tracker.dispose_after_release(&capture),
            None => self.stop_tracker.dispose(),
        }
        self.restore.lock().take();
        if let Some(recorder) = self.recorder.upgrade() {
            recorder.session_ended(self.id);
        }

        info!(
            session = %self.id,
            ?reason,
            items = outcome.items.len(),
            duration_ms = outcome.items.total_duration().as_millis() as u64,
            "recording finished"
        );
        self.outcome.send_replace(Some(outcome));
    }
}

fn bare_gesture(source: EdgeSource) -> HotkeyGesture {
    match source {
        EdgeSource::Key(key) => HotkeyGesture::from_key(key, ModifierKeys::NONE),
        EdgeSource::Button(button) => HotkeyGesture::from_button(button, ModifierKeys::NONE),
    }
}

/// `true` when pressing `item` is part of performing `stop`.
fn is_part_of(stop: HotkeyGesture, item: &HotkeyGesture) -> bool {
    if let Some(key) = item.key() {
        return stop.involves_key(key);
    }
    if let Some(button) = item.mouse_button() {
        return stop.involves_button(button);
    }
    !item.modifiers().is_empty() && stop.modifiers().contains(item.modifiers())
}

/// Removes trailing presses that belong to the stop gesture, with their delays.
fn trim_stop_gesture(items: &mut SequenceList, stop: HotkeyGesture) {
    loop {
        let trailing_stop_press = matches!(
            items.last(),
            Some(SequenceItem::Hotkey { gesture, is_down: true }) if is_part_of(stop, gesture)
        );
        if !trailing_stop_press {
            break;
        }
        items.pop();
        if matches!(items.last(), Some(SequenceItem::Delay { .. })) {
            items.pop();
        }
    }
}

fn run_ticker(session: Weak<SessionInner>, period: Duration, stop: Receiver<()>) {
    let ticker = crossbeam_channel::tick(period);
    loop {
        crossbeam_channel::select! {
            recv(ticker) -> _ => {}
            recv(stop) -> _ => break,
        }
        let Some(session) = session.upgrade() else {
            break;
        };
        if let Some(reason) = session.tick() {
            session.finish(reason);
            break;
        }
    }
    debug!("recording ticker stopped");
}

struct SessionSubscriber {
    session: Weak<SessionInner>,
}

impl InputSubscriber for SessionSubscriber {
    fn name(&self) -> &str {
        "recording-session"
    }

    fn on_event(&self, event: &RawInputEvent) -> anyhow::Result<()> {
        if let Some(session) = self.session.upgrade() {
            session.on_event(event);
        }
        Ok(())
    }

    fn may_suppress(&self) -> bool {
        self.session
            .upgrade()
            .is_some_and(|s| s.stop_tracker.is_enabled())
    }
}

/// Handle to a running (or finished) recording.  Dropping it cancels the
/// recording if it is still running.
pub struct RecordingSession {
    inner: Arc<SessionInner>,
    outcome: watch::Receiver<Option<RecordingOutcome>>,
}

impl RecordingSession {
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Ends the recording, keeping what was recorded.
    pub fn stop(&self) {
        self.inner.finish(StopReason::Stopped);
    }

    /// Ends the recording with [`StopReason::Cancelled`].
    pub fn cancel(&self) {
        self.inner.finish(StopReason::Cancelled);
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.borrow().is_some()
    }

    /// The items recorded so far (or the final items once finished).
    pub fn snapshot(&self) -> SequenceList {
        if let Some(outcome) = self.outcome.borrow().as_ref() {
            return outcome.items.clone();
        }
        self.inner.state.lock().items.clone()
    }

    pub fn outcome(&self) -> Option<RecordingOutcome> {
        self.outcome.borrow().clone()
    }

    /// Waits until the session ends and returns its outcome.
    pub async fn wait(&self) -> RecordingOutcome {
        let mut outcome = self.outcome.clone();
        if let Ok(done) = outcome.wait_for(Option::is_some).await {
            if let Some(done) = done.as_ref() {
                return done.clone();
            }
        }
        // The sender lives in `inner`, which we hold; only reachable if it
        // was replaced, so report a cancelled empty recording.
        RecordingOutcome {
            session_id: self.inner.id,
            items: SequenceList::new(),
            reason: StopReason::Cancelled,
            elapsed: Duration::ZERO,
        }
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        self.inner.finish(StopReason::Cancelled);
    }
}

impl std::fmt::Debug for RecordingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingSession")
            .field("id", &self.inner.id)
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// Creates recording sessions, one at a time.
pub struct SequenceRecorder {
    capture: Weak<InputEventCapture>,
    focus: Arc<dyn WindowFocus>,
    options: Mutex<RecorderOptions>,
    state: watch::Sender<RecorderState>,
    active: Mutex<Option<Uuid>>,
    this: Weak<SequenceRecorder>,
}

impl SequenceRecorder {
    pub fn new(
        capture: Weak<InputEventCapture>,
        focus: Arc<dyn WindowFocus>,
        options: RecorderOptions,
    ) -> Arc<Self> {
        let (state, _) = watch::channel(RecorderState::Idle);
        Arc::new_cyclic(|this| Self {
            capture,
            focus,
            options: Mutex::new(options),
            state,
            active: Mutex::new(None),
            this: this.clone(),
        })
    }

    pub fn state(&self) -> RecorderState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<RecorderState> {
        self.state.subscribe()
    }

    pub fn is_recording(&self) -> bool {
        self.state() != RecorderState::Idle
    }

    pub fn options(&self) -> RecorderOptions {
        self.options.lock().clone()
    }

    /// Applies to sessions started afterwards.
    pub fn set_options(&self, options: RecorderOptions) {
        *self.options.lock() = options;
    }

    /// Editor helper: appends a full press of `gesture` held for the
    /// configured default key press duration.
    pub fn push_key_press(&self, list: &mut SequenceList, gesture: HotkeyGesture) {
        let hold = self.options.lock().default_key_press_duration;
        list.push_key_press(gesture, hold);
    }

    /// Starts a session.  Fails with [`RecorderError::InvalidModeTransition`]
    /// while another session is running.
    pub fn start_recording(&self, request: RecordingRequest) -> Result<RecordingSession, RecorderError> {
        let claimed = self.state.send_if_modified(|state| {
            if *state == RecorderState::Idle {
                *state = RecorderState::Starting;
                true
            } else {
                false
            }
        });
        if !claimed {
            return Err(RecorderError::InvalidModeTransition(self.state()));
        }

        match self.open_session(request) {
            Ok(session) => Ok(session),
            Err(e) => {
                warn!(error = %e, "failed to start recording");
                self.state.send_replace(RecorderState::Idle);
                Err(e)
            }
        }
    }

    fn open_session(&self, request: RecordingRequest) -> Result<RecordingSession, RecorderError> {
        let capture = self
            .capture
            .upgrade()
            .filter(|c| c.is_running())
            .ok_or(RecorderError::Capture(CaptureError::AlreadyStopped))?;
        let options = self.options.lock().clone();

        let restore = match request.target_window {
            Some(target) => {
                let guard = ForegroundRestore::capture(Arc::clone(&self.focus));
                if !self.focus.activate(target) {
                    return Err(RecorderError::TargetActivationFailed(target));
                }
                Some(guard)
            }
            None => None,
        };

        let stop_tracker = HotkeyTracker::new(
            "recorder-stop",
            TrackerOptions {
                mode: TrackerMode::Hold,
                suppress_key: true,
            },
            Arc::clone(&self.focus),
        );
        stop_tracker.set_gesture(options.stop_gesture);

        let id = Uuid::new_v4();
        let now = Instant::now();
        let (outcome_tx, outcome_rx) = watch::channel(None);
        let inner = Arc::new(SessionInner {
            id,
            recorder: self.this.clone(),
            limits: options.limits(),
            target: request.target_window,
            focus: Arc::clone(&self.focus),
            stop_tracker,
            capture: Arc::downgrade(&capture),
            state: Mutex::new(SessionState {
                phase: SessionPhase::Armed,
                items: SequenceList::new(),
                started: now,
                stopwatch: now,
                pressed: HashSet::new(),
                cursor: None,
                last_sample: None,
            }),
            subscription: Mutex::new(None),
            ticker_stop: Mutex::new(None),
            restore: Mutex::new(restore),
            outcome: outcome_tx,
            options,
        });

        let period = match inner.options.mouse_position_recording_type {
            MousePositionRecordingType::None => IDLE_TICK_PERIOD,
            _ => inner.options.mouse_position_recording_resolution,
        }
        .max(Duration::from_millis(1));
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
        let session = Arc::downgrade(&inner);
        thread::Builder::new()
            .name("hotkey-recorder-ticker".to_string())
            .spawn(move || run_ticker(session, period, stop_rx))
            .map_err(|e| CaptureError::ThreadSpawn(e.to_string()))?;
        *inner.ticker_stop.lock() = Some(stop_tx);

        *self.active.lock() = Some(id);
        self.state.send_replace(RecorderState::Armed);

        let subscriber = Arc::new(SessionSubscriber {
            session: Arc::downgrade(&inner),
        });
        *inner.subscription.lock() = Some(capture.subscribe(subscriber));

        info!(
            session = %id,
            target = ?request.target_window,
            stop_gesture = ?inner.options.stop_gesture.map(|g| g.to_string()),
            "recording started"
        );
        Ok(RecordingSession {
            inner,
            outcome: outcome_rx,
        })
    }

    fn publish_for(&self, session: Uuid, state: RecorderState) {
        if *self.active.lock() == Some(session) {
            self.state.send_replace(state);
        }
    }

    fn session_ended(&self, session: Uuid) {
        let mut active = self.active.lock();
        if *active == Some(session) {
            *active = None;
            self.state.send_replace(RecorderState::Idle);
        }
    }
}
