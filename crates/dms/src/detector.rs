//! Face landmark detection capability

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use camera_capture::VideoFrame;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{trace, warn};

/// Detector failure modes
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DetectorError {
    #[error("Detection failed: {0}")]
    Failed(String),
}

/// Landmarks reported for one face
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FaceRecord {
    /// Left eye open probability (0-1), if the detector produced one
    pub left_eye_open: Option<f32>,
    /// Right eye open probability (0-1), if the detector produced one
    pub right_eye_open: Option<f32>,
    /// Yaw (left-right rotation) in degrees
    pub head_yaw: f32,
    /// Pitch (up-down nod) in degrees
    pub head_pitch: f32,
}

impl FaceRecord {
    pub fn new(left_eye_open: Option<f32>, right_eye_open: Option<f32>, head_yaw: f32, head_pitch: f32) -> Self {
        Self {
            left_eye_open,
            right_eye_open,
            head_yaw,
            head_pitch,
        }
    }

    /// Face looking straight ahead with both eyes open
    pub fn alert() -> Self {
        Self::new(Some(0.95), Some(0.95), 0.0, 0.0)
    }

    /// Face with both eyes shut
    pub fn eyes_closed() -> Self {
        Self::new(Some(0.05), Some(0.05), 0.0, 0.0)
    }
}

/// Face landmark detector
///
/// Calls may complete on any worker and in any order relative to each other;
/// callers must not assume completions follow submission order. When several
/// faces are found they are returned in the detector's own order, which says
/// nothing about confidence or size.
pub trait FaceDetector: Send + Sync + 'static {
    fn detect(
        &self,
        frame: &VideoFrame,
    ) -> impl Future<Output = Result<Vec<FaceRecord>, DetectorError>> + Send;
}

/// One scripted detector response
#[derive(Debug, Clone)]
pub struct ScriptStep {
    pub response: Result<Vec<FaceRecord>, DetectorError>,
    pub latency: Duration,
}

impl ScriptStep {
    /// Respond with a single face
    pub fn face(face: FaceRecord) -> Self {
        Self {
            response: Ok(vec![face]),
            latency: Duration::ZERO,
        }
    }

    /// Respond with an empty face list
    pub fn no_face() -> Self {
        Self {
            response: Ok(Vec::new()),
            latency: Duration::ZERO,
        }
    }

    /// Respond with a detector failure
    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            response: Err(DetectorError::Failed(reason.into())),
            latency: Duration::ZERO,
        }
    }

    /// Delay the response by `latency`
    pub fn after(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

/// Deterministic detector replaying a fixed script, cycling when exhausted
///
/// Stands in for a real landmark model in the demo binary and in tests.
pub struct ScriptedDetector {
    script: Vec<ScriptStep>,
    cursor: AtomicUsize,
}

impl ScriptedDetector {
    pub fn new(script: Vec<ScriptStep>) -> Self {
        if script.is_empty() {
            warn!("Scripted detector created with an empty script; every frame will report no face");
        }
        Self {
            script,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Number of detect calls served so far
    pub fn calls(&self) -> usize {
        self.cursor.load(Ordering::Relaxed)
    }
}

impl FaceDetector for ScriptedDetector {
    async fn detect(&self, frame: &VideoFrame) -> Result<Vec<FaceRecord>, DetectorError> {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed);
        let Some(step) = self.script.get(index % self.script.len().max(1)) else {
            return Ok(Vec::new());
        };
        trace!(sequence = frame.sequence, step = index, "scripted detection");

        if !step.latency.is_zero() {
            tokio::time::sleep(step.latency).await;
        }
        step.response.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camera_capture::Orientation;

    fn frame() -> VideoFrame {
        VideoFrame::new(vec![0; 12], 2, 2, 0, 0, Orientation::Deg0)
    }

    #[tokio::test]
    async fn test_script_cycles() {
        let detector = ScriptedDetector::new(vec![
            ScriptStep::face(FaceRecord::alert()),
            ScriptStep::failure("model crashed"),
        ]);
        let f = frame();

        assert_eq!(detector.detect(&f).await.unwrap(), vec![FaceRecord::alert()]);
        assert_eq!(
            detector.detect(&f).await.unwrap_err(),
            DetectorError::Failed("model crashed".into())
        );
        assert_eq!(detector.detect(&f).await.unwrap(), vec![FaceRecord::alert()]);
        assert_eq!(detector.calls(), 3);
    }

    #[tokio::test]
    async fn test_empty_script_reports_no_face() {
        let detector = ScriptedDetector::new(Vec::new());
        assert!(detector.detect(&frame()).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_is_applied() {
        let detector = ScriptedDetector::new(vec![ScriptStep::no_face().after(Duration::from_millis(250))]);
        let started = tokio::time::Instant::now();
        detector.detect(&frame()).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(250));
    }
}
