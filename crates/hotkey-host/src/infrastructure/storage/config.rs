//! TOML-based configuration persistence for the hotkey host.
//!
//! Reads and writes `AppConfig` to the platform-appropriate config file:
//! - Windows:  `%APPDATA%\HotkeyHost\config.toml`
//! - Linux:    `~/.config/hotkeyhost/config.toml`
//! - macOS:    `~/Library/Application Support/HotkeyHost/config.toml`
//!
//! Example:
//!
//! ```toml
//! [general]
//! log_level = "info"
//! delivery_mode = "queued"
//! suppression_timeout_ms = 150
//!
//! [[hotkeys]]
//! name = "freeze-mouse"
//! gesture = "Ctrl+Alt+M"
//! mode = "click"
//! suppress_key = true
//! block = "mouse"
//!
//! [recorder]
//! start_recording_hotkey = "Ctrl+F12"
//! stop_recording_hotkey = "F12"
//! mouse_position_recording_type = "relative"
//! ```
//!
//! # Serde default values
//!
//! Fields annotated with `#[serde(default = "some_fn")]` use the return value
//! of `some_fn()` when the field is absent from the TOML file.  This allows
//! the app to work correctly on first run (before a config file exists) and
//! when upgrading from an older config file that is missing newer fields.

use std::path::{Path, PathBuf};
use std::time::Duration;

use hotkey_core::HotkeyGesture;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::capture::{CaptureOptions, DeliveryMode, DEFAULT_SUPPRESSION_TIMEOUT};
use crate::application::hotkey_tracker::{TrackerMode, TrackerOptions};
use crate::application::input_blocker::BlockType;
use crate::application::sequence_recorder::{MousePositionRecordingType, RecorderOptions};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level application configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub hotkeys: Vec<HotkeyBinding>,
    #[serde(default)]
    pub recorder: RecorderConfig,
}

/// Process-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneralConfig {
    /// Schema version string – bump when breaking changes are introduced.
    #[serde(default = "default_version")]
    pub version: String,
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// `"queued"` (consumer thread) or `"realtime"` (hook thread).
    #[serde(default)]
    pub delivery_mode: DeliveryMode,
    /// Upper bound the hook waits for a suppression verdict.
    #[serde(default = "default_suppression_timeout_ms")]
    pub suppression_timeout_ms: u64,
}

/// One configured hotkey.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HotkeyBinding {
    /// Name used in logs.
    pub name: String,
    pub gesture: HotkeyGesture,
    #[serde(default)]
    pub mode: TrackerMode,
    /// Swallow the hotkey so the focused application never sees it.
    #[serde(default)]
    pub suppress_key: bool,
    /// Input blocked while the hotkey is active.
    #[serde(default)]
    pub block: BlockType,
}

/// Macro recorder settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecorderConfig {
    #[serde(default = "default_max_duration_ms")]
    pub max_duration_ms: u64,
    #[serde(default = "default_max_items_count")]
    pub max_items_count: usize,
    #[serde(default = "default_key_press_duration_ms")]
    pub default_key_press_duration_ms: u64,
    #[serde(default = "default_mouse_resolution_ms")]
    pub mouse_position_recording_resolution_ms: u64,
    #[serde(default)]
    pub mouse_position_recording_type: MousePositionRecordingType,
    /// Ends a recording.  `"None"` disables it.
    #[serde(default = "default_stop_hotkey")]
    pub stop_recording_hotkey: HotkeyGesture,
    /// Starts a recording.  `"None"` disables it.
    #[serde(default = "default_start_hotkey")]
    pub start_recording_hotkey: HotkeyGesture,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_version() -> String {
    "1.0".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_suppression_timeout_ms() -> u64 {
    DEFAULT_SUPPRESSION_TIMEOUT.as_millis() as u64
}
fn default_max_duration_ms() -> u64 {
    600_000
}
fn default_max_items_count() -> usize {
    10_000
}
fn default_key_press_duration_ms() -> u64 {
    50
}
fn default_mouse_resolution_ms() -> u64 {
    50
}
fn default_stop_hotkey() -> HotkeyGesture {
    HotkeyGesture::from_key(hotkey_core::Key::F12, hotkey_core::ModifierKeys::NONE)
}
fn default_start_hotkey() -> HotkeyGesture {
    HotkeyGesture::from_key(hotkey_core::Key::F12, hotkey_core::ModifierKeys::CONTROL)
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            log_level: default_log_level(),
            delivery_mode: DeliveryMode::default(),
            suppression_timeout_ms: default_suppression_timeout_ms(),
        }
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            max_duration_ms: default_max_duration_ms(),
            max_items_count: default_max_items_count(),
            default_key_press_duration_ms: default_key_press_duration_ms(),
            mouse_position_recording_resolution_ms: default_mouse_resolution_ms(),
            mouse_position_recording_type: MousePositionRecordingType::default(),
            stop_recording_hotkey: default_stop_hotkey(),
            start_recording_hotkey: default_start_hotkey(),
        }
    }
}

impl GeneralConfig {
    pub fn capture_options(&self) -> CaptureOptions {
        CaptureOptions {
            delivery_mode: self.delivery_mode,
            suppression_timeout: Duration::from_millis(self.suppression_timeout_ms),
        }
    }
}

impl HotkeyBinding {
    pub fn tracker_options(&self) -> TrackerOptions {
        TrackerOptions {
            mode: self.mode,
            suppress_key: self.suppress_key,
        }
    }
}

impl RecorderConfig {
    pub fn recorder_options(&self) -> RecorderOptions {
        RecorderOptions {
            max_duration: Duration::from_millis(self.max_duration_ms),
            max_items_count: self.max_items_count,
            default_key_press_duration: Duration::from_millis(self.default_key_press_duration_ms),
            mouse_position_recording_resolution: Duration::from_millis(
                self.mouse_position_recording_resolution_ms,
            ),
            mouse_position_recording_type: self.mouse_position_recording_type,
            stop_gesture: Some(self.stop_recording_hotkey).filter(|g| !g.is_empty()),
        }
    }

    pub fn start_gesture(&self) -> Option<HotkeyGesture> {
        Some(self.start_recording_hotkey).filter(|g| !g.is_empty())
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the config file.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads `AppConfig` from the platform config file, returning
/// `AppConfig::default()` if the file does not yet exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads `AppConfig` from `path`; a missing file yields the defaults.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let cfg: AppConfig = toml::from_str(&content)?;
            Ok(cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Persists `config` to the platform config file.
pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
    save_config_to(config, &config_file_path()?)
}

/// Persists `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Resolves the platform config base directory including the `HotkeyHost` subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        // %APPDATA% e.g. C:\Users\<user>\AppData\Roaming
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("HotkeyHost"))
    }

    #[cfg(target_os = "linux")]
    {
        // XDG_CONFIG_HOME or ~/.config
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("hotkeyhost"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("HotkeyHost")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_app_config_default_values() {
        // Arrange / Act
        let cfg = AppConfig::default();

        // Assert
        assert_eq!(cfg.general.log_level, "info");
        assert_eq!(cfg.general.delivery_mode, DeliveryMode::Queued);
        assert_eq!(cfg.general.suppression_timeout_ms, 150);
        assert!(cfg.hotkeys.is_empty());
        assert_eq!(cfg.recorder.stop_recording_hotkey.to_string(), "F12");
        assert_eq!(cfg.recorder.start_recording_hotkey.to_string(), "Ctrl+F12");
    }

    #[test]
    fn test_app_config_serializes_and_deserializes_round_trip() {
        // Arrange
        let mut cfg = AppConfig::default();
        cfg.general.delivery_mode = DeliveryMode::Realtime;
        cfg.hotkeys.push(HotkeyBinding {
            name: "freeze".to_string(),
            gesture: "Ctrl+Alt+M".parse().unwrap(),
            mode: TrackerMode::Hold,
            suppress_key: true,
            block: BlockType::Mouse,
        });
        cfg.recorder.mouse_position_recording_type = MousePositionRecordingType::Relative;

        // Act
        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let restored: AppConfig = toml::from_str(&toml_str).expect("deserialize");

        // Assert
        assert_eq!(cfg, restored);
    }

    #[test]
    fn test_deserialize_empty_toml_uses_defaults() {
        let cfg: AppConfig = toml::from_str("").expect("deserialize empty");
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_hotkey_binding_defaults() {
        // Arrange
        let toml_str = r#"
[[hotkeys]]
name = "toggle"
gesture = "Shift+F3"
"#;

        // Act
        let cfg: AppConfig = toml::from_str(toml_str).expect("deserialize");

        // Assert
        let binding = &cfg.hotkeys[0];
        assert_eq!(binding.mode, TrackerMode::Click);
        assert!(!binding.suppress_key);
        assert_eq!(binding.block, BlockType::None);
        assert_eq!(binding.gesture.to_string(), "Shift+F3");
    }

    #[test]
    fn test_invalid_gesture_is_a_parse_error() {
        let toml_str = r#"
[[hotkeys]]
name = "bad"
gesture = "Ctrl+Nope"
"#;
        let result: Result<AppConfig, toml::de::Error> = toml::from_str(toml_str);
        assert!(result.is_err());
    }

    #[test]
    fn test_recorder_none_hotkeys_disable_gestures() {
        let toml_str = r#"
[recorder]
stop_recording_hotkey = "None"
start_recording_hotkey = "None"
max_items_count = 20
"#;
        let cfg: AppConfig = toml::from_str(toml_str).expect("deserialize");
        let options = cfg.recorder.recorder_options();
        assert_eq!(options.stop_gesture, None);
        assert_eq!(cfg.recorder.start_gesture(), None);
        assert_eq!(options.max_items_count, 20);
        assert_eq!(options.max_duration, Duration::from_secs(600));
    }

    #[test]
    fn test_capture_options_from_general() {
        let general = GeneralConfig {
            suppression_timeout_ms: 80,
            ..GeneralConfig::default()
        };
        let options = general.capture_options();
        assert_eq!(options.suppression_timeout, Duration::from_millis(80));
        assert_eq!(options.delivery_mode, DeliveryMode::Queued);
    }

    #[test]
    fn test_load_config_from_missing_file_returns_default() {
        let path = std::env::temp_dir()
            .join(format!("hotkey_missing_{}", Uuid::new_v4()))
            .join("config.toml");
        let cfg = load_config_from(&path).expect("missing file is not an error");
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_save_and_load_config_round_trip_via_temp_dir() {
        // Arrange
        let dir = std::env::temp_dir().join(format!("hotkey_test_{}", Uuid::new_v4()));
        let path = dir.join("nested").join("config.toml");
        let mut cfg = AppConfig::default();
        cfg.general.log_level = "debug".to_string();
        cfg.recorder.max_items_count = 42;

        // Act
        save_config_to(&cfg, &path).expect("save");
        let loaded = load_config_from(&path).expect("load");

        // Assert
        assert_eq!(loaded, cfg);

        // Cleanup
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_config_from_malformed_file_is_parse_error() {
        let dir = std::env::temp_dir().join(format!("hotkey_bad_{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "[[[ not valid toml").unwrap();

        let result = load_config_from(&path);

        assert!(matches!(result, Err(ConfigError::Parse(_))));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_config_file_path_ends_with_config_toml() {
        if let Ok(path) = config_file_path() {
            assert!(
                path.ends_with("config.toml"),
                "config file must be named config.toml, got {path:?}"
            );
        }
    }
}
