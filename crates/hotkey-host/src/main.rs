//! Hotkey host entry point.
//!
//! Loads the configuration, installs the global input hooks and runs the
//! configured hotkeys and the macro recorder until Ctrl-C.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()               -- TOML from the platform config dir
//!  └─ HostRuntime::start()
//!       ├─ InputEventCapture      (hook thread + consumer thread)
//!       ├─ HotkeyTracker per [[hotkeys]] entry
//!       ├─ UserInputBlocker       (subscribed only while blocking)
//!       └─ SequenceRecorder       (start/stop recording hotkeys)
//! ```

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use hotkey_host::infrastructure::input_capture::system_input_source;
use hotkey_host::infrastructure::runtime::HostRuntime;
use hotkey_host::infrastructure::storage::config::{load_config, AppConfig};
use hotkey_host::infrastructure::window_focus::system_window_focus;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let loaded = load_config();
    let default_level = loaded
        .as_ref()
        .map(|c| c.general.log_level.clone())
        .unwrap_or_else(|_| "info".to_string());

    // Initialise structured logging.  Level is overridden by `RUST_LOG`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "hotkey host starting");

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "failed to load config; using defaults");
            AppConfig::default()
        }
    };

    let source = system_input_source();
    let runtime = match HostRuntime::start(&config, source.as_ref(), system_window_focus()) {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "global input hooks unavailable; hotkeys and recording are DISABLED");
            return Err(e.into());
        }
    };

    // Report activation changes of every configured hotkey.
    for hotkey in &runtime.hotkeys {
        let name = hotkey.name.clone();
        let mut active = hotkey.tracker.watch_active();
        tokio::spawn(async move {
            while active.changed().await.is_ok() {
                let is_active = *active.borrow_and_update();
                info!(hotkey = %name, active = is_active, "hotkey state");
            }
        });
    }

    let mut recorder_state = runtime.recorder.watch_state();
    tokio::spawn(async move {
        while recorder_state.changed().await.is_ok() {
            let state = *recorder_state.borrow_and_update();
            info!(?state, "recorder state");
        }
    });

    // ── Ctrl-C / SIGTERM handler ──────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            running_clone.store(false, Ordering::Relaxed);
        }
    });

    info!(
        hotkeys = runtime.hotkeys.len(),
        "hotkey host ready.  Press Ctrl-C to exit."
    );

    loop {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        if !running.load(Ordering::Relaxed) || !runtime.capture.is_running() {
            break;
        }
    }

    if let Some(outcome) = runtime.last_recording().await {
        info!(
            reason = ?outcome.reason,
            items = outcome.items.len(),
            "last recording discarded on exit"
        );
    }
    runtime.shutdown();
    info!("hotkey host stopped");
    Ok(())
}
