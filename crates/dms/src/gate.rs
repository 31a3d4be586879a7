//! Frame rate gate

use std::time::Duration;

use camera_capture::VideoFrame;
use tracing::trace;

use crate::DrowsinessConfig;

/// Whether a frame should be classified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Process,
    Drop,
}

/// Caps how often frames are classified, independent of the camera rate
///
/// Frames closer than `min_interval` to the last admitted one are shed, never
/// queued. The gate only looks at timestamps; the caller keeps ownership of
/// the frame and must release dropped frames itself.
#[derive(Debug, Clone)]
pub struct FrameGate {
    min_interval_ns: u64,
    last_processed_ns: Option<u64>,
}

impl FrameGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval_ns: min_interval.as_nanos().min(u64::MAX as u128) as u64,
            last_processed_ns: None,
        }
    }

    pub fn from_config(config: &DrowsinessConfig) -> Self {
        Self::new(config.min_interval())
    }

    /// Decide whether `frame` is classified
    pub fn admit(&mut self, frame: &VideoFrame) -> GateDecision {
        self.admit_at(frame.timestamp_ns)
    }

    /// Decide on a frame that arrived at `timestamp_ns`
    ///
    /// The first frame is always admitted. A timestamp earlier than the last
    /// admitted one counts as zero elapsed time.
    pub fn admit_at(&mut self, timestamp_ns: u64) -> GateDecision {
        let admitted = match self.last_processed_ns {
            None => true,
            Some(last) => timestamp_ns.saturating_sub(last) >= self.min_interval_ns,
        };

        if admitted {
            self.last_processed_ns = Some(timestamp_ns);
            GateDecision::Process
        } else {
            trace!(timestamp_ns, "frame shed by gate");
            GateDecision::Drop
        }
    }

    /// Timestamp of the last admitted frame
    pub fn last_processed_ns(&self) -> Option<u64> {
        self.last_processed_ns
    }

    /// Forget the last admitted frame
    pub fn reset(&mut self) {
        self.last_processed_ns = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const MS: u64 = 1_000_000;

    #[test]
    fn test_first_frame_admitted() {
        let mut gate = FrameGate::new(Duration::from_millis(1000));
        assert_eq!(gate.admit_at(0), GateDecision::Process);
        assert_eq!(gate.last_processed_ns(), Some(0));
    }

    #[test]
    fn test_interval_scenario() {
        let mut gate = FrameGate::from_config(&DrowsinessConfig::default());
        assert_eq!(gate.admit_at(0), GateDecision::Process);
        assert_eq!(gate.admit_at(400 * MS), GateDecision::Drop);
        assert_eq!(gate.last_processed_ns(), Some(0));
        assert_eq!(gate.admit_at(1100 * MS), GateDecision::Process);
        assert_eq!(gate.last_processed_ns(), Some(1100 * MS));
    }

    #[test]
    fn test_exact_interval_is_admitted() {
        let mut gate = FrameGate::new(Duration::from_millis(1000));
        gate.admit_at(5 * MS);
        assert_eq!(gate.admit_at(1005 * MS), GateDecision::Process);
    }

    #[test]
    fn test_backwards_timestamp_dropped() {
        let mut gate = FrameGate::new(Duration::from_millis(100));
        gate.admit_at(500 * MS);
        assert_eq!(gate.admit_at(100 * MS), GateDecision::Drop);
        assert_eq!(gate.last_processed_ns(), Some(500 * MS));
    }

    #[test]
    fn test_reset() {
        let mut gate = FrameGate::new(Duration::from_millis(1000));
        gate.admit_at(0);
        gate.reset();
        assert_eq!(gate.admit_at(10 * MS), GateDecision::Process);
    }

    proptest! {
        #[test]
        fn prop_processed_frames_are_spaced(
            interval_ms in 0u64..2000,
            mut gaps in proptest::collection::vec(0u64..1500, 1..100),
        ) {
            let mut gate = FrameGate::new(Duration::from_millis(interval_ms));
            let mut now = 0u64;
            let mut processed: Vec<u64> = Vec::new();
            for gap in gaps.drain(..) {
                now += gap * MS;
                let before = gate.last_processed_ns();
                match gate.admit_at(now) {
                    GateDecision::Process => processed.push(now),
                    GateDecision::Drop => prop_assert_eq!(gate.last_processed_ns(), before),
                }
            }
            for pair in processed.windows(2) {
                prop_assert!(pair[1] - pair[0] >= interval_ms * MS);
            }
        }
    }
}
