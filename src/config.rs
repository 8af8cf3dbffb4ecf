//! Configuration management for the sentiment overlay.
//!
//! Loads configuration from TOML files and provides runtime defaults.

use crate::types::{Position, ScreenSize};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub analysis: AnalysisConfig,

    #[serde(default)]
    pub capture: CaptureConfig,

    #[serde(default)]
    pub overlay: OverlayConfig,

    #[serde(default)]
    pub relay: RelayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Whether capture runs at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Scoring endpoint receiving `POST {"text": ...}`
    #[serde(default = "default_endpoint_url")]
    pub endpoint_url: String,

    /// Per-request timeout
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Drop completions older than the last applied one
    #[serde(default = "default_true")]
    pub latest_wins: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            endpoint_url: default_endpoint_url(),
            timeout_ms: default_timeout_ms(),
            latest_wins: true,
        }
    }
}

impl AnalysisConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Screen width used when an event carries no size
    #[serde(default = "default_screen_width")]
    pub screen_width: u32,

    /// Screen height used when an event carries no size
    #[serde(default = "default_screen_height")]
    pub screen_height: u32,

    /// Minimum time between dispatched requests (0 disables throttling)
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,

    /// Skip requests whose text equals the previous request's
    #[serde(default)]
    pub skip_unchanged: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            screen_width: default_screen_width(),
            screen_height: default_screen_height(),
            min_interval_ms: default_min_interval_ms(),
            skip_unchanged: false,
        }
    }
}

impl CaptureConfig {
    pub fn screen(&self) -> ScreenSize {
        ScreenSize::new(self.screen_width, self.screen_height)
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayConfig {
    #[serde(default)]
    pub default_x: i32,

    #[serde(default = "default_overlay_y")]
    pub default_y: i32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            default_x: 0,
            default_y: default_overlay_y(),
        }
    }
}

impl OverlayConfig {
    pub fn default_position(&self) -> Position {
        Position::new(self.default_x, self.default_y)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Channel analysis results are published on
    #[serde(default = "default_channel")]
    pub channel: String,

    /// Payloads a listener may fall behind before the oldest are dropped
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            channel: default_channel(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_endpoint_url() -> String {
    "http://127.0.0.1:5000/analyze".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_screen_width() -> u32 {
    1080
}

fn default_screen_height() -> u32 {
    2340
}

fn default_min_interval_ms() -> u64 {
    250
}

fn default_overlay_y() -> i32 {
    100
}

fn default_channel() -> String {
    "TextAnalysisEvent".to_string()
}

fn default_queue_capacity() -> usize {
    64
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Self {
        Self::load_from_path(Self::default_config_path())
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: PathBuf) -> Self {
        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", path);
                    config
                }
                Err(e) => {
                    warn!("Failed to parse config file: {}, using defaults", e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("No config file found at {:?}, using defaults", path);
                Self::default()
            }
        }
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("screen-sentiment")
            .join("config.toml")
    }

    /// Save configuration to the default path
    pub fn save(&self) -> std::io::Result<()> {
        self.save_to_path(Self::default_config_path())
    }

    /// Save configuration to a specific path
    pub fn save_to_path(&self, path: PathBuf) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;

        std::fs::write(&path, contents)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.general.enabled);
        assert_eq!(config.analysis.endpoint_url, "http://127.0.0.1:5000/analyze");
        assert!(config.analysis.latest_wins);
        assert_eq!(config.capture.min_interval(), Duration::from_millis(250));
        assert_eq!(config.overlay.default_position(), Position::new(0, 100));
        assert_eq!(config.relay.channel, "TextAnalysisEvent");
        assert_eq!(config.relay.queue_capacity, 64);
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
[general]
log_level = "debug"

[analysis]
endpoint_url = "http://10.0.2.2:5000/analyze"
latest_wins = false

[capture]
min_interval_ms = 0
"#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert!(config.general.enabled);
        assert_eq!(config.analysis.endpoint_url, "http://10.0.2.2:5000/analyze");
        assert!(!config.analysis.latest_wins);
        assert_eq!(config.analysis.timeout_ms, 10_000);
        assert_eq!(config.capture.min_interval_ms, 0);
        assert_eq!(config.capture.screen(), ScreenSize::new(1080, 2340));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.overlay.default_x = 40;
        config.relay.channel = "Scores".to_string();
        config.save_to_path(path.clone()).unwrap();

        let loaded = Config::load_from_path(path);
        assert_eq!(loaded.overlay.default_x, 40);
        assert_eq!(loaded.relay.channel, "Scores");
    }

    #[test]
    fn test_unparsable_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[analysis\nendpoint_url = ").unwrap();

        let config = Config::load_from_path(path);
        assert_eq!(config.analysis.timeout_ms, 10_000);
    }
}
