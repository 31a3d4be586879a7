//! Synthetic cabin camera

use camera_capture::{CameraConfig, CameraError, FramePool};
use serde::Serialize;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::session::MonitorHandle;
use crate::MonitorError;

/// Producer-side counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CameraStats {
    /// Frames captured and offered to the session
    pub frames_produced: u64,
    /// Captures skipped because every pool slot was leased
    pub pool_exhausted: u64,
    /// Frames the session queue refused
    pub frames_shed: u64,
}

/// Produces blank frames at the configured rate from a bounded pool
///
/// Stands in for the cabin camera so the pipeline can run without hardware;
/// the detector decides what the "driver" is doing.
pub struct SyntheticCamera {
    config: CameraConfig,
    pool: FramePool,
}

impl SyntheticCamera {
    pub fn new(config: CameraConfig) -> Self {
        let pool = FramePool::new(config.pool_size);
        Self { config, pool }
    }

    pub fn pool(&self) -> &FramePool {
        &self.pool
    }

    /// Stream frames into `handle` until the session closes
    pub async fn run(self, handle: MonitorHandle) -> CameraStats {
        info!(
            width = self.config.width,
            height = self.config.height,
            fps = self.config.fps,
            "Synthetic camera streaming"
        );

        let frame_len = match self.config.frame_len() {
            Ok(len) => len,
            Err(e) => {
                error!(error = %e, "Synthetic camera cannot allocate frames");
                return CameraStats::default();
            }
        };
        let mut ticker = time::interval(self.config.frame_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let started = Instant::now();
        let mut stats = CameraStats::default();

        loop {
            ticker.tick().await;
            let timestamp_ns = started.elapsed().as_nanos() as u64;

            let lease = match self.pool.acquire(
                vec![0; frame_len],
                self.config.width,
                self.config.height,
                timestamp_ns,
                self.config.orientation,
            ) {
                Ok(lease) => lease,
                Err(CameraError::Buffer(slots)) => {
                    stats.pool_exhausted += 1;
                    warn!("All {} frame slots in use, skipping capture", slots);
                    continue;
                }
                Err(e) => {
                    warn!(error = %e, "capture failed");
                    continue;
                }
            };

            stats.frames_produced += 1;
            match handle.submit_frame(lease) {
                Ok(()) => {}
                Err(MonitorError::QueueFull) => stats.frames_shed += 1,
                Err(_) => break,
            }
        }

        debug!(?stats, "Synthetic camera stopped");
        stats
    }
}
