//! Driver Monitoring System (DMS)
//!
//! Per-frame drowsiness analysis of a driver-facing camera:
//! - Frame gating (rate-limits classification work)
//! - Face landmark detection, consumed as an async capability
//! - Eye openness and head pose classification

pub mod analysis;
pub mod classifier;
pub mod config;
pub mod detector;
pub mod gate;

pub use analysis::{AnalysisResult, DrowsyCause, NO_FACE_DETECTED};
pub use classifier::{evaluate, LandmarkClassifier, MISSING_PROBABILITY};
pub use config::DrowsinessConfig;
pub use detector::{DetectorError, FaceDetector, FaceRecord, ScriptStep, ScriptedDetector};
pub use gate::{FrameGate, GateDecision};

use thiserror::Error;

/// DMS error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DmsError {
    #[error("Configuration error: {0}")]
    Config(String),
}
