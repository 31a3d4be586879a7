//! Alert sinks

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Physical alert actuation
///
/// Implementations must tolerate `start()` while already started and `stop()`
/// while already stopped.
pub trait AlertSink: Send {
    /// Engage the alert
    fn start(&mut self);

    /// Silence the alert
    fn stop(&mut self);

    /// Free actuator resources at session teardown
    fn release(&mut self) {}
}

impl<S: AlertSink + ?Sized> AlertSink for Box<S> {
    fn start(&mut self) {
        (**self).start()
    }

    fn stop(&mut self) {
        (**self).stop()
    }

    fn release(&mut self) {
        (**self).release()
    }
}

/// Alert lifecycle event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertEvent {
    Started,
    Stopped,
    Released,
}

/// Sink that reports alert transitions through the log
#[derive(Debug, Default)]
pub struct TracingAlertSink {
    engaged: bool,
}

impl TracingAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_engaged(&self) -> bool {
        self.engaged
    }
}

impl AlertSink for TracingAlertSink {
    fn start(&mut self) {
        if !self.engaged {
            self.engaged = true;
            warn!("DROWSINESS ALERT: wake up and take a break");
        }
    }

    fn stop(&mut self) {
        if self.engaged {
            self.engaged = false;
            info!("Drowsiness alert silenced");
        }
    }
}

/// Sink that publishes alert events to subscribers
///
/// Notification, sound and vibration layers subscribe and drive their own
/// hardware. Events are dropped when nobody is subscribed.
#[derive(Debug, Clone)]
pub struct ChannelAlertSink {
    sender: broadcast::Sender<AlertEvent>,
}

impl ChannelAlertSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AlertEvent> {
        self.sender.subscribe()
    }

    fn publish(&self, event: AlertEvent) {
        if self.sender.send(event).is_err() {
            debug!(?event, "alert event dropped: no subscribers");
        }
    }
}

impl AlertSink for ChannelAlertSink {
    fn start(&mut self) {
        self.publish(AlertEvent::Started);
    }

    fn stop(&mut self) {
        self.publish(AlertEvent::Stopped);
    }

    fn release(&mut self) {
        self.publish(AlertEvent::Released);
    }
}

/// Forwards every call to each inner sink in order
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn AlertSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl AlertSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl AlertSink for FanoutSink {
    fn start(&mut self) {
        self.sinks.iter_mut().for_each(|s| s.start());
    }

    fn stop(&mut self) {
        self.sinks.iter_mut().for_each(|s| s.stop());
    }

    fn release(&mut self) {
        self.sinks.iter_mut().for_each(|s| s.release());
    }
}

#[derive(Debug, Default)]
struct CallCounts {
    starts: AtomicUsize,
    stops: AtomicUsize,
    releases: AtomicUsize,
}

/// Sink that counts calls; clones share the same counters
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    counts: Arc<CallCounts>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starts(&self) -> usize {
        self.counts.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.counts.stops.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.counts.releases.load(Ordering::SeqCst)
    }
}

impl AlertSink for RecordingSink {
    fn start(&mut self) {
        self.counts.starts.fetch_add(1, Ordering::SeqCst);
    }

    fn stop(&mut self) {
        self.counts.stops.fetch_add(1, Ordering::SeqCst);
    }

    fn release(&mut self) {
        self.counts.releases.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_sink_tolerates_repeats() {
        let mut sink = TracingAlertSink::new();
        sink.stop();
        assert!(!sink.is_engaged());
        sink.start();
        sink.start();
        assert!(sink.is_engaged());
        sink.stop();
        sink.stop();
        assert!(!sink.is_engaged());
    }

    #[tokio::test]
    async fn test_channel_sink_publishes() {
        let mut sink = ChannelAlertSink::new(8);
        let mut rx = sink.subscribe();

        sink.start();
        sink.stop();
        sink.release();

        assert_eq!(rx.recv().await.unwrap(), AlertEvent::Started);
        assert_eq!(rx.recv().await.unwrap(), AlertEvent::Stopped);
        assert_eq!(rx.recv().await.unwrap(), AlertEvent::Released);
    }

    #[test]
    fn test_channel_sink_without_subscribers() {
        let mut sink = ChannelAlertSink::new(1);
        sink.start();
        sink.stop();
    }

    #[test]
    fn test_fanout_reaches_every_sink() {
        let first = RecordingSink::new();
        let second = RecordingSink::new();
        let mut fanout = FanoutSink::new().with(first.clone()).with(second.clone());
        assert_eq!(fanout.len(), 2);

        fanout.start();
        fanout.stop();
        fanout.release();

        for sink in [&first, &second] {
            assert_eq!((sink.starts(), sink.stops(), sink.releases()), (1, 1, 1));
        }
    }
}
