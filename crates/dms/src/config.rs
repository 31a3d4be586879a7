//! DMS configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::DmsError;

/// Drowsiness classification configuration, fixed for a monitoring session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrowsinessConfig {
    /// Eye-open probability below which an eye counts as closed
    pub eye_closed_threshold: f32,

    /// Head yaw/pitch beyond which the head counts as tilted (degrees)
    pub head_tilt_threshold_deg: f32,

    /// Minimum spacing between classified frames (milliseconds)
    pub min_interval_ms: u64,
}

impl Default for DrowsinessConfig {
    fn default() -> Self {
        Self {
            eye_closed_threshold: 0.30,
            head_tilt_threshold_deg: 20.0,
            min_interval_ms: 1000,
        }
    }
}

impl DrowsinessConfig {
    /// Minimum spacing between classified frames
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    /// Reject thresholds that would make the classifier meaningless
    pub fn validate(&self) -> Result<(), DmsError> {
        if !(0.0..=1.0).contains(&self.eye_closed_threshold) {
            return Err(DmsError::Config(format!(
                "eye_closed_threshold must be within [0, 1], got {}",
                self.eye_closed_threshold
            )));
        }
        if !self.head_tilt_threshold_deg.is_finite() || self.head_tilt_threshold_deg < 0.0 {
            return Err(DmsError::Config(format!(
                "head_tilt_threshold_deg must be a non-negative angle, got {}",
                self.head_tilt_threshold_deg
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DrowsinessConfig::default();
        assert_eq!(config.eye_closed_threshold, 0.30);
        assert_eq!(config.head_tilt_threshold_deg, 20.0);
        assert_eq!(config.min_interval(), Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_thresholds() {
        let config = DrowsinessConfig {
            eye_closed_threshold: 1.5,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(DmsError::Config(_))));

        let config = DrowsinessConfig {
            head_tilt_threshold_deg: f32::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
