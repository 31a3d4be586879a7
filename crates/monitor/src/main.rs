//! Drowsiness Monitor - Main Entry Point
//!
//! Usage: `drowsiness-monitor [settings-file]`
//!
//! Type `stop` to silence the alarm and `quit` (or Ctrl-C) to end the session.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use alerting::{ChannelAlertSink, FanoutSink, TracingAlertSink};
use dms::{FaceRecord, ScriptStep, ScriptedDetector};
use monitor::{init_logging, MonitorSession, Settings, SyntheticCamera};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

/// A driver who nods off, recovers, looks down and leaves the frame
fn demo_script() -> Vec<ScriptStep> {
    let latency = Duration::from_millis(80);
    let nodding = FaceRecord::new(Some(0.7), Some(0.8), 2.0, 32.0);
    let half_visible = FaceRecord::new(None, Some(0.15), -5.0, 4.0);

    let mut script = Vec::new();
    script.extend((0..6).map(|_| ScriptStep::face(FaceRecord::alert()).after(latency)));
    script.extend((0..3).map(|_| ScriptStep::face(FaceRecord::eyes_closed()).after(latency)));
    script.extend((0..4).map(|_| ScriptStep::face(FaceRecord::alert()).after(latency)));
    script.extend((0..2).map(|_| ScriptStep::face(nodding.clone()).after(latency)));
    script.push(ScriptStep::face(half_visible).after(latency));
    script.extend((0..2).map(|_| ScriptStep::no_face().after(latency)));
    script.push(ScriptStep::failure("landmark model timed out").after(latency * 4));
    script
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings_path = std::env::args().nth(1).map(PathBuf::from);
    let settings = Settings::load(settings_path.as_deref())?;
    init_logging(&settings.logging)?;

    info!("=== Drowsiness Monitor v{} ===", env!("CARGO_PKG_VERSION"));

    let notifications = ChannelAlertSink::new(16);
    let mut alert_events = notifications.subscribe();
    let sink = FanoutSink::new()
        .with(TracingAlertSink::new())
        .with(notifications);

    let detector = Arc::new(ScriptedDetector::new(demo_script()));
    let (handle, session) = MonitorSession::spawn(
        settings.drowsiness.clone(),
        &settings.session,
        detector,
        sink,
    )?;

    let camera = SyntheticCamera::new(settings.camera.clone());
    let producer = tokio::spawn(camera.run(handle.clone()));

    tokio::spawn(async move {
        while let Ok(event) = alert_events.recv().await {
            info!(?event, "Alert event");
        }
    });

    let mut commands = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = commands.next_line(), if stdin_open => match line? {
                Some(line) => match line.trim() {
                    "stop" => handle.stop_alert().await?,
                    "quit" => break,
                    "" => {}
                    other => warn!("Unknown command '{}', expected 'stop' or 'quit'", other),
                },
                None => stdin_open = false,
            },
        }
    }

    info!("Shutting down...");
    handle.stop_session().await?;
    let stats = session.await?;
    let camera_stats = producer.await?;

    info!("Session: {}", serde_json::to_string(&stats)?);
    info!("Camera: {}", serde_json::to_string(&camera_stats)?);

    Ok(())
}
