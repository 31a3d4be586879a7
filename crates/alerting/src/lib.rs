//! Alerting System
//!
//! Decides when the drowsiness alarm starts and stops, and fans the decision
//! out to the actuators (sound, vibration, notification) behind `AlertSink`.

mod alarm;
mod sink;

pub use alarm::{AlarmPhase, AlarmState, AlarmStateMachine};
pub use sink::{AlertEvent, AlertSink, ChannelAlertSink, FanoutSink, RecordingSink, TracingAlertSink};
