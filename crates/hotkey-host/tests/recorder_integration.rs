//! Integration tests for recording sessions against a target window.
//!
//! A `FakeWindowFocus` plays the desktop: the recorder activates the target,
//! the test switches windows behind its back, and the original foreground
//! window must come back when the session ends.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use hotkey_core::{Key, MouseButton, SequenceItem};
use hotkey_host::application::capture::{CaptureOptions, DeliveryMode, InputEventCapture};
use hotkey_host::application::sequence_recorder::{
    MousePositionRecordingType, RecorderOptions, RecorderState, RecordingRequest,
    SequenceRecorder, StopReason,
};
use hotkey_host::application::window_focus::{WindowFocus, WindowHandle};
use hotkey_host::infrastructure::input_capture::mock::MockInputSource;
use hotkey_host::infrastructure::input_capture::RawInputEvent;
use hotkey_host::infrastructure::window_focus::mock::FakeWindowFocus;

const EDITOR: WindowHandle = WindowHandle(0x10);
const TARGET: WindowHandle = WindowHandle(0x20);
const OTHER: WindowHandle = WindowHandle(0x30);

fn realtime_capture(source: &MockInputSource) -> Arc<InputEventCapture> {
    let options = CaptureOptions {
        delivery_mode: DeliveryMode::Realtime,
        ..CaptureOptions::default()
    };
    InputEventCapture::start(source, options).expect("mock install succeeds")
}

fn hotkey_items(items: &[SequenceItem]) -> Vec<(String, bool)> {
    items
        .iter()
        .filter_map(|item| match item {
            SequenceItem::Hotkey { gesture, is_down } => Some((gesture.to_string(), *is_down)),
            _ => None,
        })
        .collect()
}

// ── Target window ─────────────────────────────────────────────────────────────

#[test]
fn test_focus_loss_ends_session_and_restores_original_window() {
    // Arrange
    let source = MockInputSource::new();
    let capture = realtime_capture(&source);
    let focus = Arc::new(FakeWindowFocus::with_foreground(EDITOR));
    let recorder = SequenceRecorder::new(
        Arc::downgrade(&capture),
        focus.clone(),
        RecorderOptions::default(),
    );

    // Act
    let session = recorder
        .start_recording(RecordingRequest {
            target_window: Some(TARGET),
        })
        .expect("target can be activated");
    assert_eq!(focus.foreground_window(), Some(TARGET));

    source.inject_all([
        RawInputEvent::key_down(Key::A),
        RawInputEvent::key_up(Key::A),
    ]);
    focus.set_foreground(Some(OTHER));
    source.inject_event(RawInputEvent::key_down(Key::B));

    // Assert
    let outcome = session.outcome().expect("session ended on focus loss");
    assert_eq!(outcome.reason, StopReason::FocusLost);
    assert_eq!(
        hotkey_items(outcome.items.items()),
        vec![("A".to_string(), true), ("A".to_string(), false)]
    );
    assert_eq!(focus.activations(), vec![TARGET, EDITOR]);
    assert_eq!(focus.foreground_window(), Some(EDITOR));
    assert_eq!(recorder.state(), RecorderState::Idle);
    assert_eq!(capture.subscriber_count(), 0);
}

#[test]
fn test_explicit_stop_restores_original_window() {
    let source = MockInputSource::new();
    let capture = realtime_capture(&source);
    let focus = Arc::new(FakeWindowFocus::with_foreground(EDITOR));
    let recorder = SequenceRecorder::new(
        Arc::downgrade(&capture),
        focus.clone(),
        RecorderOptions::default(),
    );

    let session = recorder
        .start_recording(RecordingRequest {
            target_window: Some(TARGET),
        })
        .unwrap();
    source.inject_event(RawInputEvent::key_down(Key::Z));
    session.stop();

    let outcome = session.outcome().unwrap();
    assert_eq!(outcome.reason, StopReason::Stopped);
    assert_eq!(outcome.items.len(), 2);
    assert_eq!(focus.foreground_window(), Some(EDITOR));
}

#[test]
fn test_refused_target_leaves_recorder_idle() {
    let source = MockInputSource::new();
    let capture = realtime_capture(&source);
    let focus = Arc::new(FakeWindowFocus::with_foreground(EDITOR));
    focus.refuse(TARGET);
    let recorder = SequenceRecorder::new(
        Arc::downgrade(&capture),
        focus.clone(),
        RecorderOptions::default(),
    );

    let result = recorder.start_recording(RecordingRequest {
        target_window: Some(TARGET),
    });

    assert!(result.is_err());
    assert_eq!(recorder.state(), RecorderState::Idle);
    assert_eq!(focus.foreground_window(), Some(EDITOR));
    assert_eq!(capture.subscriber_count(), 0);
}

#[test]
fn test_focus_loss_ends_idle_session_without_input() {
    // Arrange
    let source = MockInputSource::new();
    let capture = realtime_capture(&source);
    let focus = Arc::new(FakeWindowFocus::with_foreground(EDITOR));
    let recorder = SequenceRecorder::new(
        Arc::downgrade(&capture),
        focus.clone(),
        RecorderOptions::default(),
    );
    let session = recorder
        .start_recording(RecordingRequest {
            target_window: Some(TARGET),
        })
        .unwrap();

    // Act – switch windows, then stay idle
    focus.set_foreground(Some(OTHER));
    let deadline = Instant::now() + Duration::from_secs(2);
    while !session.is_finished() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }

    // Assert
    let outcome = session.outcome().expect("ticker notices the focus loss");
    assert_eq!(outcome.reason, StopReason::FocusLost);
    assert_eq!(focus.foreground_window(), Some(EDITOR));
    assert_eq!(recorder.state(), RecorderState::Idle);
}

// ── Mouse position sampling ───────────────────────────────────────────────────

#[test]
fn test_relative_sampling_records_cursor_deltas() {
    // Arrange
    let source = MockInputSource::new();
    let capture = realtime_capture(&source);
    let recorder = SequenceRecorder::new(
        Arc::downgrade(&capture),
        Arc::new(FakeWindowFocus::new()),
        RecorderOptions {
            mouse_position_recording_resolution: Duration::from_millis(5),
            mouse_position_recording_type: MousePositionRecordingType::Relative,
            ..RecorderOptions::default()
        },
    );

    // Act – the click starts recording; its position becomes the origin
    let session = recorder.start_recording(RecordingRequest::default()).unwrap();
    source.inject_event(RawInputEvent::button_down(MouseButton::Left, 10, 10));
    thread::sleep(Duration::from_millis(80));
    source.inject_event(RawInputEvent::mouse_move(30, 50));
    thread::sleep(Duration::from_millis(80));
    session.stop();

    // Assert
    let outcome = session.outcome().unwrap();
    let moves: Vec<&SequenceItem> = outcome
        .items
        .iter()
        .filter(|i| matches!(i, SequenceItem::MousePosition { .. }))
        .collect();
    assert_eq!(
        moves,
        vec![&SequenceItem::MousePosition {
            x: 20,
            y: 40,
            is_relative: true,
        }]
    );
}
