//! Camera Capture Library for Driver Monitoring
//!
//! Provides the frame types shared by the monitoring pipeline:
//! - `VideoFrame`: pixel payload, arrival timestamp and orientation hint
//! - `FramePool`: finite pool of frame slots handed out to the producer
//! - `FrameLease`: scoped ownership of one pooled frame, released on drop

pub mod frame;
pub mod pool;

pub use frame::{Orientation, VideoFrame};
pub use pool::{FrameLease, FramePool, FrameRelease};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Camera error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    #[error("Invalid format: {0}")]
    Format(String),

    #[error("Buffer allocation failed: all {0} frame slots are leased")]
    Buffer(usize),
}

/// Largest accepted capture width or height, in pixels
pub const MAX_FRAME_DIMENSION: u32 = 8192;

/// Cabin camera configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Capture width
    pub width: u32,
    /// Capture height
    pub height: u32,
    /// Producer frame rate
    pub fps: u32,
    /// Number of frame slots in the pool
    pub pool_size: usize,
    /// Sensor mounting orientation
    pub orientation: Orientation,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fps: 15,
            pool_size: 4,
            orientation: Orientation::Deg0,
        }
    }
}

impl CameraConfig {
    /// Interval between produced frames
    pub fn frame_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / self.fps.max(1) as f64)
    }

    /// RGB24 payload size of one frame
    ///
    /// Fails for empty frames, dimensions above `MAX_FRAME_DIMENSION`, or a
    /// size that does not fit in `usize`.
    pub fn frame_len(&self) -> Result<usize, CameraError> {
        if self.width == 0 || self.height == 0 {
            return Err(CameraError::Format(format!(
                "empty frame {}x{}",
                self.width, self.height
            )));
        }
        if self.width > MAX_FRAME_DIMENSION || self.height > MAX_FRAME_DIMENSION {
            return Err(CameraError::Format(format!(
                "frame {}x{} exceeds {} pixels per side",
                self.width, self.height, MAX_FRAME_DIMENSION
            )));
        }
        (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|pixels| pixels.checked_mul(3))
            .ok_or_else(|| {
                CameraError::Format(format!("frame {}x{} is too large", self.width, self.height))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_len() {
        assert_eq!(CameraConfig::default().frame_len(), Ok(640 * 480 * 3));

        let largest = CameraConfig {
            width: MAX_FRAME_DIMENSION,
            height: MAX_FRAME_DIMENSION,
            ..Default::default()
        };
        assert_eq!(largest.frame_len(), Ok(8192 * 8192 * 3));
    }

    #[test]
    fn test_frame_len_rejects_bad_dimensions() {
        for (width, height) in [(0, 480), (640, 0), (65536, 65536), (u32::MAX, 1)] {
            let config = CameraConfig {
                width,
                height,
                ..Default::default()
            };
            assert!(
                matches!(config.frame_len(), Err(CameraError::Format(_))),
                "{}x{} accepted",
                width,
                height
            );
        }
    }
}
