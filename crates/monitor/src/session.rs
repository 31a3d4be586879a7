//! Monitoring session actor

use std::sync::Arc;

use alerting::{AlarmState, AlarmStateMachine, AlertSink};
use camera_capture::FrameLease;
use dms::{AnalysisResult, DrowsinessConfig, FaceDetector, FrameGate, GateDecision, LandmarkClassifier};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::MonitorError;

/// Session plumbing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Frames buffered between the producer and the session before shedding
    pub frame_queue_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            frame_queue_capacity: 8,
        }
    }
}

/// Running counters of a session, also returned when it ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Frames that reached the session
    pub frames_received: u64,
    /// Frames handed to the classifier
    pub frames_admitted: u64,
    /// Frames shed by the gate or discarded at shutdown
    pub frames_dropped: u64,
    /// Classification results fed to the alarm
    pub results_applied: u64,
    /// Results discarded because a stop command overtook them
    pub stale_results: u64,
    /// Results carrying a detector error or no face
    pub analysis_errors: u64,
    /// Times the alarm was started
    pub alarms_started: u64,
    /// Classifications aborted at shutdown
    pub classifications_cancelled: u64,
    /// Current alarm bits
    pub alarm: AlarmState,
}

enum Control {
    StopAlert,
    StopSession,
}

/// Control surface and frame intake of a running session
#[derive(Clone)]
pub struct MonitorHandle {
    frames: mpsc::Sender<FrameLease>,
    control: mpsc::Sender<Control>,
    status: watch::Receiver<SessionStats>,
}

impl MonitorHandle {
    /// Hand a frame to the session without waiting
    ///
    /// When the queue is full or the session is gone the frame is released
    /// immediately and an error is returned.
    pub fn submit_frame(&self, lease: FrameLease) -> Result<(), MonitorError> {
        match self.frames.try_send(lease) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(lease)) => {
                debug!(sequence = lease.sequence(), "frame queue full, shedding frame");
                metrics::counter!("dms_frames_shed_total").increment(1);
                Err(MonitorError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(MonitorError::SessionClosed),
        }
    }

    /// Silence the alarm
    pub async fn stop_alert(&self) -> Result<(), MonitorError> {
        self.control
            .send(Control::StopAlert)
            .await
            .map_err(|_| MonitorError::SessionClosed)
    }

    /// End the session; in-flight classifications are cancelled
    pub async fn stop_session(&self) -> Result<(), MonitorError> {
        self.control
            .send(Control::StopSession)
            .await
            .map_err(|_| MonitorError::SessionClosed)
    }

    pub fn stats(&self) -> SessionStats {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStats> {
        self.status.clone()
    }

    /// Wait until the session stats satisfy `predicate`
    pub async fn wait_for(
        &self,
        mut predicate: impl FnMut(&SessionStats) -> bool,
    ) -> Result<SessionStats, MonitorError> {
        let mut status = self.status.clone();
        let stats = status
            .wait_for(|s| predicate(s))
            .await
            .map_err(|_| MonitorError::SessionClosed)?;
        Ok(*stats)
    }
}

/// Owns the gate, the alarm and the in-flight classifications of one session
///
/// All state lives in a single task. Classifications run in their own tasks and
/// report back in whatever order they finish. Each one carries the stop
/// generation it was started under; a stop command bumps the generation so
/// results from before the stop cannot re-trigger the alarm.
pub struct MonitorSession<D, S> {
    classifier: LandmarkClassifier<D>,
    gate: FrameGate,
    alarm: AlarmStateMachine<S>,
    frames: mpsc::Receiver<FrameLease>,
    control: mpsc::Receiver<Control>,
    status: watch::Sender<SessionStats>,
    in_flight: JoinSet<(u64, AnalysisResult)>,
    generation: u64,
    stats: SessionStats,
}

impl<D, S> MonitorSession<D, S>
where
    D: FaceDetector,
    S: AlertSink + 'static,
{
    /// Start a session on the current runtime
    pub fn spawn(
        config: DrowsinessConfig,
        session: &SessionConfig,
        detector: Arc<D>,
        sink: S,
    ) -> Result<(MonitorHandle, JoinHandle<SessionStats>), MonitorError> {
        config.validate()?;
        if session.frame_queue_capacity == 0 {
            return Err(MonitorError::InvalidSettings(
                "frame_queue_capacity must be at least 1".into(),
            ));
        }

        info!(
            eye_closed_threshold = config.eye_closed_threshold,
            head_tilt_threshold_deg = config.head_tilt_threshold_deg,
            min_interval_ms = config.min_interval_ms,
            "Starting monitoring session"
        );

        let (frame_tx, frame_rx) = mpsc::channel(session.frame_queue_capacity);
        let (control_tx, control_rx) = mpsc::channel(4);
        let (status_tx, status_rx) = watch::channel(SessionStats::default());

        let session = Self {
            gate: FrameGate::from_config(&config),
            classifier: LandmarkClassifier::new(detector, config),
            alarm: AlarmStateMachine::new(sink),
            frames: frame_rx,
            control: control_rx,
            status: status_tx,
            in_flight: JoinSet::new(),
            generation: 0,
            stats: SessionStats::default(),
        };

        let handle = MonitorHandle {
            frames: frame_tx,
            control: control_tx,
            status: status_rx,
        };

        Ok((handle, tokio::spawn(session.run())))
    }

    async fn run(mut self) -> SessionStats {
        loop {
            tokio::select! {
                biased;

                control = self.control.recv() => match control {
                    Some(Control::StopAlert) => self.stop_alert(),
                    Some(Control::StopSession) | None => break,
                },

                Some(joined) = self.in_flight.join_next(), if !self.in_flight.is_empty() => {
                    self.on_completion(joined);
                }

                frame = self.frames.recv() => match frame {
                    Some(lease) => self.on_frame(lease),
                    None => break,
                },
            }
            self.publish();
        }

        self.shutdown().await
    }

    fn on_frame(&mut self, lease: FrameLease) {
        self.stats.frames_received += 1;

        match self.gate.admit(lease.frame()) {
            GateDecision::Drop => {
                self.stats.frames_dropped += 1;
                metrics::counter!("dms_frames_dropped_total").increment(1);
                drop(lease);
            }
            GateDecision::Process => {
                self.stats.frames_admitted += 1;
                metrics::counter!("dms_frames_admitted_total").increment(1);
                debug!(sequence = lease.sequence(), "frame admitted");

                let classifier = self.classifier.clone();
                let generation = self.generation;
                self.in_flight
                    .spawn(async move { (generation, classifier.classify(lease).await) });
            }
        }
    }

    fn on_completion(&mut self, joined: Result<(u64, AnalysisResult), JoinError>) {
        let (generation, result) = match joined {
            Ok(done) => done,
            Err(e) => {
                warn!(error = %e, "classification task failed");
                return;
            }
        };

        if generation != self.generation {
            self.stats.stale_results += 1;
            debug!(
                frame_timestamp_ns = result.frame_timestamp_ns,
                "discarding result that predates the last stop"
            );
            return;
        }

        self.stats.results_applied += 1;
        if let Some(error) = &result.error {
            self.stats.analysis_errors += 1;
            metrics::counter!("dms_analysis_errors_total").increment(1);
            debug!(error = %error, "analysis without face metrics");
        }

        if self.alarm.on_result(&result) {
            self.stats.alarms_started += 1;
            metrics::counter!("dms_alarms_started_total").increment(1);
        }
    }

    fn stop_alert(&mut self) {
        self.generation += 1;
        self.alarm.on_stop_command();
    }

    fn publish(&mut self) {
        self.stats.alarm = self.alarm.state();
        self.status.send_replace(self.stats);
    }

    async fn shutdown(mut self) -> SessionStats {
        // Tasks that finished before the abort still join with their result
        self.in_flight.abort_all();
        while let Some(joined) = self.in_flight.join_next().await {
            match joined {
                Ok(_) => self.stats.stale_results += 1,
                Err(e) if e.is_cancelled() => self.stats.classifications_cancelled += 1,
                Err(e) => warn!(error = %e, "classification task failed"),
            }
        }

        self.frames.close();
        while let Ok(lease) = self.frames.try_recv() {
            self.stats.frames_dropped += 1;
            drop(lease);
        }

        self.alarm.on_shutdown();
        self.publish();

        info!(
            frames_received = self.stats.frames_received,
            frames_admitted = self.stats.frames_admitted,
            alarms_started = self.stats.alarms_started,
            "Monitoring session ended"
        );
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alerting::RecordingSink;
    use camera_capture::{FramePool, Orientation};
    use dms::{FaceRecord, ScriptStep, ScriptedDetector};

    fn spawn(
        script: Vec<ScriptStep>,
        capacity: usize,
    ) -> (MonitorHandle, JoinHandle<SessionStats>, RecordingSink) {
        let sink = RecordingSink::new();
        let (handle, task) = MonitorSession::spawn(
            DrowsinessConfig::default(),
            &SessionConfig {
                frame_queue_capacity: capacity,
            },
            Arc::new(ScriptedDetector::new(script)),
            sink.clone(),
        )
        .unwrap();
        (handle, task, sink)
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let result = MonitorSession::spawn(
            DrowsinessConfig::default(),
            &SessionConfig {
                frame_queue_capacity: 0,
            },
            Arc::new(ScriptedDetector::new(Vec::new())),
            RecordingSink::new(),
        );
        assert!(matches!(result, Err(MonitorError::InvalidSettings(_))));
    }

    #[test]
    fn test_rejects_invalid_thresholds() {
        let config = DrowsinessConfig {
            eye_closed_threshold: -0.1,
            ..Default::default()
        };
        let result = MonitorSession::spawn(
            config,
            &SessionConfig::default(),
            Arc::new(ScriptedDetector::new(Vec::new())),
            RecordingSink::new(),
        );
        assert!(matches!(result, Err(MonitorError::Dms(_))));
    }

    #[tokio::test]
    async fn test_full_queue_sheds_and_releases() {
        let pool = FramePool::new(8);
        let (handle, task, _sink) = spawn(vec![ScriptStep::face(FaceRecord::alert())], 1);

        // The session task has not run yet, so only one frame fits in the queue
        let mut shed = 0;
        for i in 0..3u64 {
            let lease = pool.acquire(vec![0; 12], 2, 2, i * 2_000_000_000, Orientation::Deg0).unwrap();
            if let Err(MonitorError::QueueFull) = handle.submit_frame(lease) {
                shed += 1;
            }
        }
        assert_eq!(shed, 2);
        assert_eq!(pool.outstanding(), 1);

        handle.wait_for(|s| s.results_applied == 1).await.unwrap();
        handle.stop_session().await.unwrap();
        let stats = task.await.unwrap();
        assert_eq!(stats.frames_received, 1);
        assert_eq!(pool.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_drains_queued_frames() {
        let pool = FramePool::new(8);
        let (handle, task, sink) = spawn(vec![ScriptStep::face(FaceRecord::eyes_closed())], 4);

        // Queued before the session task first runs; the stop is seen first
        for i in 0..3u64 {
            let lease = pool.acquire(vec![0; 12], 2, 2, i * 2_000_000_000, Orientation::Deg0).unwrap();
            handle.submit_frame(lease).unwrap();
        }
        assert_eq!(pool.outstanding(), 3);
        handle.stop_session().await.unwrap();

        let stats = task.await.unwrap();
        assert_eq!(stats.frames_received, 0);
        assert_eq!(stats.frames_admitted, 0);
        assert_eq!(stats.frames_dropped, 3);
        assert_eq!(stats.classifications_cancelled, 0);
        assert_eq!(sink.starts(), 0);
        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.released_total(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_does_not_count_finished_work_as_cancelled() {
        let latency = std::time::Duration::from_millis(100);
        let pool = FramePool::new(1);
        let (handle, task, _sink) = spawn(vec![ScriptStep::face(FaceRecord::alert()).after(latency)], 4);

        let lease = pool.acquire(vec![0; 12], 2, 2, 0, Orientation::Deg0).unwrap();
        handle.submit_frame(lease).unwrap();
        handle.wait_for(|s| s.frames_admitted == 1).await.unwrap();

        // The classification finishes as the stop is sent
        tokio::time::sleep(latency).await;
        handle.stop_session().await.unwrap();

        let stats = task.await.unwrap();
        assert_eq!(stats.classifications_cancelled, 0);
        assert_eq!(stats.results_applied + stats.stale_results, 1);
        assert_eq!(pool.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_submit_after_session_end() {
        let pool = FramePool::new(1);
        let (handle, task, sink) = spawn(Vec::new(), 4);
        handle.stop_session().await.unwrap();
        task.await.unwrap();

        let lease = pool.acquire(vec![0; 12], 2, 2, 0, Orientation::Deg0).unwrap();
        assert!(matches!(handle.submit_frame(lease), Err(MonitorError::SessionClosed)));
        assert_eq!(pool.outstanding(), 0);
        assert!(matches!(handle.stop_alert().await, Err(MonitorError::SessionClosed)));
        assert_eq!(sink.releases(), 1);
    }
}
