use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::recorder::types::RecordingMode;

/// Recorder settings. Every field has a default so partial or older
/// config files still load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    pub mode: RecordingMode,
    pub audio_enabled: bool,
    /// Time between the preview and the screenshot, so the highlight shows.
    pub capture_delay_ms: u64,
    pub input_debounce_ms: u64,
    pub scroll_debounce_ms: u64,
    pub realtime_preview: bool,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            mode: RecordingMode::Screenshot,
            audio_enabled: false,
            capture_delay_ms: 300,
            input_debounce_ms: 1000,
            scroll_debounce_ms: 1000,
            realtime_preview: true,
        }
    }
}

impl RecorderConfig {
    pub fn capture_delay(&self) -> Duration {
        Duration::from_millis(self.capture_delay_ms)
    }

    pub fn input_debounce(&self) -> Duration {
        Duration::from_millis(self.input_debounce_ms)
    }

    pub fn scroll_debounce(&self) -> Duration {
        Duration::from_millis(self.scroll_debounce_ms)
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("guidecast").join("config.json"))
}

/// Loads the config from the default location, falling back to defaults.
pub fn load() -> RecorderConfig {
    config_path().map(|p| load_from(&p)).unwrap_or_default()
}

pub fn load_from(path: &Path) -> RecorderConfig {
    match std::fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable config");
            RecorderConfig::default()
        }),
        Err(_) => RecorderConfig::default(),
    }
}

pub fn save(config: &RecorderConfig) -> Result<(), crate::Error> {
    let path = config_path().ok_or(crate::Error::NoConfigDir)?;
    save_to(config, &path)
}

pub fn save_to(config: &RecorderConfig, path: &Path) -> Result<(), crate::Error> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, json)?;
    Ok(())
}
