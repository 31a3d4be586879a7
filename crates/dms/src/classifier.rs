//! Landmark-based drowsiness classification

use std::sync::Arc;

use camera_capture::FrameLease;
use tracing::debug;

use crate::analysis::{AnalysisResult, DrowsyCause};
use crate::detector::{FaceDetector, FaceRecord};
use crate::DrowsinessConfig;

/// Stand-in for an absent eye-open probability
///
/// Below any valid threshold, so a missing eye always counts as closed.
pub const MISSING_PROBABILITY: f32 = -1.0;

fn probability_or_missing(probability: Option<f32>) -> f32 {
    probability
        .filter(|p| p.is_finite())
        .unwrap_or(MISSING_PROBABILITY)
}

/// An angle the detector could not measure counts as tilted
fn is_tilted(angle_deg: f32, threshold_deg: f32) -> bool {
    !angle_deg.is_finite() || angle_deg.abs() > threshold_deg
}

/// Drowsiness predicate over one face
///
/// Checks run in a fixed order and the first one that fires is returned:
/// both eyes closed, then head yaw, then head pitch.
pub fn evaluate(face: &FaceRecord, config: &DrowsinessConfig) -> Option<DrowsyCause> {
    let left = probability_or_missing(face.left_eye_open);
    let right = probability_or_missing(face.right_eye_open);

    if left < config.eye_closed_threshold && right < config.eye_closed_threshold {
        Some(DrowsyCause::EyesClosed)
    } else if is_tilted(face.head_yaw, config.head_tilt_threshold_deg) {
        Some(DrowsyCause::HeadYaw)
    } else if is_tilted(face.head_pitch, config.head_tilt_threshold_deg) {
        Some(DrowsyCause::HeadPitch)
    } else {
        None
    }
}

/// Turns detector output into drowsiness verdicts
pub struct LandmarkClassifier<D> {
    detector: Arc<D>,
    config: DrowsinessConfig,
}

impl<D> Clone for LandmarkClassifier<D> {
    fn clone(&self) -> Self {
        Self {
            detector: Arc::clone(&self.detector),
            config: self.config.clone(),
        }
    }
}

impl<D: FaceDetector> LandmarkClassifier<D> {
    pub fn new(detector: Arc<D>, config: DrowsinessConfig) -> Self {
        Self { detector, config }
    }

    /// Classify one frame
    ///
    /// Detector failures and empty detections become non-drowsy error results.
    /// The lease is released once the detector is done with the frame, on
    /// every branch.
    pub async fn classify(&self, lease: FrameLease) -> AnalysisResult {
        let timestamp_ns = lease.timestamp_ns();
        let sequence = lease.sequence();
        let detection = self.detector.detect(lease.frame()).await;
        drop(lease);

        let faces = match detection {
            Ok(faces) => faces,
            Err(e) => {
                debug!(sequence, error = %e, "detector failed");
                return AnalysisResult::failure(e.to_string(), timestamp_ns);
            }
        };

        match faces.first() {
            None => {
                debug!(sequence, "no face detected");
                AnalysisResult::no_face(timestamp_ns)
            }
            Some(face) => {
                if faces.len() > 1 {
                    debug!(sequence, faces = faces.len(), "multiple faces, using the first returned");
                }
                self.analyze(face, timestamp_ns)
            }
        }
    }

    /// Build the result for a detected face
    pub fn analyze(&self, face: &FaceRecord, frame_timestamp_ns: u64) -> AnalysisResult {
        let cause = evaluate(face, &self.config);
        if let Some(cause) = cause {
            debug!(
                ?cause,
                left_eye = ?face.left_eye_open,
                right_eye = ?face.right_eye_open,
                yaw = face.head_yaw,
                pitch = face.head_pitch,
                "drowsy verdict"
            );
        }

        AnalysisResult {
            is_drowsy: cause.is_some(),
            left_eye_open: face.left_eye_open,
            right_eye_open: face.right_eye_open,
            head_yaw: Some(face.head_yaw),
            head_pitch: Some(face.head_pitch),
            cause,
            error: None,
            frame_timestamp_ns,
        }
    }
}
