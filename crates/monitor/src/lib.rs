//! Drowsiness Monitor
//!
//! Runs a monitoring session over a driver-facing camera: frames are gated,
//! classified by the landmark detector and fed to the latched alarm.

pub mod camera;
pub mod logging;
pub mod session;
pub mod settings;

pub use camera::{CameraStats, SyntheticCamera};
pub use logging::init_logging;
pub use session::{MonitorHandle, MonitorSession, SessionConfig, SessionStats};
pub use settings::{LoggingConfig, Settings};

use dms::DmsError;
use thiserror::Error;

/// Monitor error types
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Frame queue full, frame shed")]
    QueueFull,

    #[error("Monitoring session closed")]
    SessionClosed,

    #[error("Failed to load settings: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error(transparent)]
    Dms(#[from] DmsError),

    #[error("Logging initialisation failed: {0}")]
    Logging(String),
}
