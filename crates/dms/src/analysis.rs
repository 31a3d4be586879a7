//! DMS analysis results

use serde::{Deserialize, Serialize};

/// Error text reported when the detector finds no face
pub const NO_FACE_DETECTED: &str = "no face detected";

/// Which drowsiness check fired, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrowsyCause {
    /// Both eyes below the closed threshold
    EyesClosed,
    /// Head turned beyond the tilt threshold
    HeadYaw,
    /// Head nodding beyond the tilt threshold
    HeadPitch,
}

/// Outcome of classifying one frame
///
/// Error results still carry a verdict: they are never drowsy and report no
/// metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Drowsiness verdict
    pub is_drowsy: bool,

    /// Left eye open probability as reported by the detector
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left_eye_open: Option<f32>,

    /// Right eye open probability as reported by the detector
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right_eye_open: Option<f32>,

    /// Head yaw in degrees
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head_yaw: Option<f32>,

    /// Head pitch in degrees
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head_pitch: Option<f32>,

    /// Check that produced a drowsy verdict
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<DrowsyCause>,

    /// Why no face metrics are available
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Arrival timestamp of the analysed frame (nanoseconds)
    pub frame_timestamp_ns: u64,
}

impl AnalysisResult {
    /// Result for a failed detector call
    pub fn failure(reason: impl Into<String>, frame_timestamp_ns: u64) -> Self {
        Self {
            error: Some(reason.into()),
            frame_timestamp_ns,
            ..Default::default()
        }
    }

    /// Result for a frame without any face
    pub fn no_face(frame_timestamp_ns: u64) -> Self {
        Self::failure(NO_FACE_DETECTED, frame_timestamp_ns)
    }

    /// Whether this result carries an error instead of face metrics
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_face_is_not_drowsy() {
        let result = AnalysisResult::no_face(42);
        assert!(!result.is_drowsy);
        assert!(result.is_error());
        assert_eq!(result.error.as_deref(), Some(NO_FACE_DETECTED));
        assert!(result.left_eye_open.is_none() && result.head_pitch.is_none());
        assert_eq!(result.frame_timestamp_ns, 42);
    }
}
