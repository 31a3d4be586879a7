//! Latched drowsiness alarm

use dms::AnalysisResult;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::sink::AlertSink;

/// Edge and latch bits of the alarm
///
/// `drowsy_edge` follows the verdict and only exists to detect rising edges.
/// `alarm_active` latches on a rising edge and is cleared only by a stop
/// command or shutdown, never by the driver looking alert again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmState {
    pub drowsy_edge: bool,
    pub alarm_active: bool,
}

/// Composite view of [`AlarmState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmPhase {
    /// Not drowsy, alarm silent
    Idle,
    /// Drowsy and alarm sounding
    Triggered,
    /// Driver looks alert again but the alarm keeps sounding
    ActiveButCalm,
    /// Drowsy edge seen while the alarm is silent
    Armed,
}

impl AlarmState {
    pub fn phase(&self) -> AlarmPhase {
        match (self.drowsy_edge, self.alarm_active) {
            (false, false) => AlarmPhase::Idle,
            (true, true) => AlarmPhase::Triggered,
            (false, true) => AlarmPhase::ActiveButCalm,
            (true, false) => AlarmPhase::Armed,
        }
    }
}

/// Drives an [`AlertSink`] from a stream of analysis results
///
/// A rising edge of the verdict starts the sink once. A rising edge while the
/// alarm is already sounding does not start it again.
pub struct AlarmStateMachine<S> {
    state: AlarmState,
    sink: S,
    starts: u64,
    shut_down: bool,
}

impl<S: AlertSink> AlarmStateMachine<S> {
    pub fn new(sink: S) -> Self {
        Self {
            state: AlarmState::default(),
            sink,
            starts: 0,
            shut_down: false,
        }
    }

    /// Feed one analysis result; returns true if the alarm was started
    pub fn on_result(&mut self, result: &AnalysisResult) -> bool {
        if self.shut_down {
            debug!("result ignored after shutdown");
            return false;
        }

        if !result.is_drowsy {
            self.state.drowsy_edge = false;
            return false;
        }

        if self.state.drowsy_edge {
            return false;
        }
        self.state.drowsy_edge = true;

        if self.state.alarm_active {
            debug!("rising edge while alarm already active");
            return false;
        }

        self.state.alarm_active = true;
        self.starts += 1;
        warn!(cause = ?result.cause, frame_timestamp_ns = result.frame_timestamp_ns, "Drowsiness alarm triggered");
        self.sink.start();
        true
    }

    /// Silence the alarm; a fresh rising edge is needed to trigger again
    pub fn on_stop_command(&mut self) {
        let was_active = self.state.alarm_active;
        self.state.alarm_active = false;
        self.state.drowsy_edge = false;
        self.sink.stop();
        if was_active {
            info!("Drowsiness alarm stopped");
        }
    }

    /// Stop the alarm and release the actuators; later results are ignored
    pub fn on_shutdown(&mut self) {
        self.on_stop_command();
        if !self.shut_down {
            self.shut_down = true;
            self.sink.release();
            info!("Alarm shut down after {} trigger(s)", self.starts);
        }
    }

    pub fn state(&self) -> AlarmState {
        self.state
    }

    pub fn phase(&self) -> AlarmPhase {
        self.state.phase()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Number of times the sink has been started
    pub fn start_count(&self) -> u64 {
        self.starts
    }
}
