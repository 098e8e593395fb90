use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct QrScanConfig {
    pub camera: CameraConfig,
    pub scanner: ScannerConfig,
    pub results: ResultsConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    /// Camera device index; omit to auto-select, preferring a rear-facing device
    pub index: Option<u32>,

    /// Requested capture resolution (width, height)
    #[serde(default = "default_camera_resolution")]
    pub resolution: (u32, u32),

    /// Maximum frames per second to request from the device
    #[serde(default = "default_camera_fps")]
    pub max_fps: u32,

    /// Prefer a rear/environment-facing device when auto-selecting
    #[serde(default = "default_prefer_rear_facing")]
    pub prefer_rear_facing: bool,
}

/// Which side drives the decode loop
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// The camera library invokes a per-frame decode callback
    Push,
    /// A polling task grabs buffered frames at a fixed minimum interval
    Pull,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ScannerConfig {
    /// Decode loop strategy
    #[serde(default = "default_scan_mode")]
    pub mode: ScanMode,

    /// Minimum milliseconds between decode attempts in pull mode
    #[serde(default = "default_scan_interval_ms")]
    pub scan_interval_ms: u64,

    /// Attempt every detected grid in a frame instead of stopping at the
    /// first decode failure
    #[serde(default = "default_try_harder")]
    pub try_harder: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ResultsConfig {
    /// Enable clipboard copy actions
    #[serde(default = "default_clipboard_enabled")]
    pub clipboard: bool,

    /// Maximum rows rendered at once; older rows scroll out of view
    #[serde(default = "default_max_visible_rows")]
    pub max_visible_rows: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Frame ring buffer capacity (number of frames)
    #[serde(default = "default_ring_buffer_capacity")]
    pub ring_buffer_capacity: usize,

    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

impl QrScanConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("qrscan.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default(
                "camera.resolution",
                vec![
                    default_camera_resolution().0,
                    default_camera_resolution().1,
                ],
            )?
            .set_default("camera.max_fps", default_camera_fps())?
            .set_default("camera.prefer_rear_facing", default_prefer_rear_facing())?
            .set_default("scanner.mode", "push")?
            .set_default("scanner.scan_interval_ms", default_scan_interval_ms())?
            .set_default("scanner.try_harder", default_try_harder())?
            .set_default("results.clipboard", default_clipboard_enabled())?
            .set_default(
                "results.max_visible_rows",
                default_max_visible_rows() as i64,
            )?
            .set_default(
                "system.ring_buffer_capacity",
                default_ring_buffer_capacity() as i64,
            )?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // Add environment variables with QRSCAN_ prefix
            .add_source(Environment::with_prefix("QRSCAN").separator("_"))
            .build()?;

        let config: QrScanConfig = settings.try_deserialize()?;

        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.resolution.0 == 0 || self.camera.resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Camera resolution must be greater than 0".to_string(),
            ));
        }

        if self.camera.max_fps == 0 {
            return Err(ConfigError::Message(
                "Camera max_fps must be greater than 0".to_string(),
            ));
        }

        if self.scanner.scan_interval_ms == 0 {
            return Err(ConfigError::Message(
                "Scanner scan_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.results.max_visible_rows == 0 {
            return Err(ConfigError::Message(
                "Results max_visible_rows must be greater than 0".to_string(),
            ));
        }

        if self.system.ring_buffer_capacity == 0 {
            return Err(ConfigError::Message(
                "Ring buffer capacity must be greater than 0".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for QrScanConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                index: None,
                resolution: default_camera_resolution(),
                max_fps: default_camera_fps(),
                prefer_rear_facing: default_prefer_rear_facing(),
            },
            scanner: ScannerConfig {
                mode: default_scan_mode(),
                scan_interval_ms: default_scan_interval_ms(),
                try_harder: default_try_harder(),
            },
            results: ResultsConfig {
                clipboard: default_clipboard_enabled(),
                max_visible_rows: default_max_visible_rows(),
            },
            system: SystemConfig {
                ring_buffer_capacity: default_ring_buffer_capacity(),
                event_bus_capacity: default_event_bus_capacity(),
            },
        }
    }
}

// Default value functions

fn default_camera_resolution() -> (u32, u32) {
    (640, 480)
}

fn default_camera_fps() -> u32 {
    30
}

fn default_prefer_rear_facing() -> bool {
    true
}

fn default_scan_mode() -> ScanMode {
    ScanMode::Push
}

fn default_scan_interval_ms() -> u64 {
    100
}

fn default_try_harder() -> bool {
    true
}

fn default_clipboard_enabled() -> bool {
    true
}

fn default_max_visible_rows() -> usize {
    20
}

fn default_ring_buffer_capacity() -> usize {
    30
}

fn default_event_bus_capacity() -> usize {
    100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = QrScanConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.camera.resolution, (640, 480));
        assert_eq!(config.scanner.mode, ScanMode::Push);
        assert_eq!(config.scanner.scan_interval_ms, 100);
        assert!(config.camera.index.is_none());
    }

    #[test]
    fn test_validate_rejects_zero_resolution() {
        let mut config = QrScanConfig::default();
        config.camera.resolution = (0, 480);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = QrScanConfig::default();
        config.scanner.scan_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = QrScanConfig::load_from_file("does-not-exist.toml").unwrap();
        assert_eq!(config.scanner.scan_interval_ms, 100);
        assert_eq!(config.system.ring_buffer_capacity, 30);
    }

    #[test]
    fn test_scan_mode_deserializes_lowercase() {
        let config: QrScanConfig = toml::from_str(
            r#"
            [camera]
            [scanner]
            mode = "pull"
            [results]
            [system]
            "#,
        )
        .unwrap();
        assert_eq!(config.scanner.mode, ScanMode::Pull);
    }
}
