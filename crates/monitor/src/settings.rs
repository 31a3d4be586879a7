//! Layered settings: optional file, then `DROWSY_*` environment variables

use std::path::Path;

use camera_capture::CameraConfig;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use config::builder::DefaultState;
use dms::DrowsinessConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::session::SessionConfig;
use crate::MonitorError;

/// Environment prefix, e.g. `DROWSY_DROWSINESS__MIN_INTERVAL_MS=500`
pub const ENV_PREFIX: &str = "DROWSY";

/// Log output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Everything the monitor binary needs to start a session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub drowsiness: DrowsinessConfig,
    pub session: SessionConfig,
    pub camera: CameraConfig,
    pub logging: LoggingConfig,
}

impl Settings {
    /// Load settings from an optional file and the environment
    ///
    /// The file format follows the extension (.toml / .json / .yaml).
    pub fn load(path: Option<&Path>) -> Result<Self, MonitorError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            debug!("Loading settings from {}", path.display());
            builder = builder.add_source(File::from(path));
        }
        Self::build(builder.add_source(Self::environment()))
    }

    /// Load settings from an in-memory document, ignoring the environment
    pub fn load_from_str(content: &str, format: FileFormat) -> Result<Self, MonitorError> {
        Self::build(Config::builder().add_source(File::from_str(content, format)))
    }

    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self, MonitorError> {
        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check cross-field constraints not expressible in the types
    pub fn validate(&self) -> Result<(), MonitorError> {
        self.drowsiness.validate()?;

        if self.session.frame_queue_capacity == 0 {
            return Err(MonitorError::InvalidSettings(
                "session.frame_queue_capacity must be at least 1".into(),
            ));
        }
        if self.camera.fps == 0 {
            return Err(MonitorError::InvalidSettings("camera.fps must be at least 1".into()));
        }
        if self.camera.pool_size == 0 {
            return Err(MonitorError::InvalidSettings(
                "camera.pool_size must be at least 1".into(),
            ));
        }
        self.camera
            .frame_len()
            .map_err(|e| MonitorError::InvalidSettings(format!("camera: {}", e)))?;
        Ok(())
    }
}
