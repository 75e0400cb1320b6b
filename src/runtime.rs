//! Async detection loop
//!
//! Runs a [`FocusSession`] on a fixed frame cadence inside a tokio task until
//! cancelled. Live metrics are published through a watch channel, so display
//! code observes the single authoritative engine instead of mirroring counters.
//!
//! Late frames are skipped rather than queued, and ticks never overlap.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::engine::LiveMetrics;
use crate::error::ComputeError;
use crate::report::{ReportOutcome, ReportRequester};
use crate::session::FocusSession;
use crate::types::{SessionEvent, SessionStats, Timestamp};

/// Roughly one display refresh
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Handle to a running detection loop
#[derive(Debug)]
pub struct DetectionLoop {
    cancel_token: CancellationToken,
    metrics: watch::Receiver<LiveMetrics>,
    handle: JoinHandle<FocusSession>,
}

impl DetectionLoop {
    /// Observe live metrics; a new value is published after every tick
    pub fn subscribe(&self) -> watch::Receiver<LiveMetrics> {
        self.metrics.clone()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Cancel the loop and take the session back for `stop`
    pub async fn shutdown(self) -> Result<FocusSession, ComputeError> {
        self.cancel_token.cancel();
        self.handle
            .await
            .map_err(|e| ComputeError::Detector(format!("detection loop failed: {e}")))
    }
}

/// Spawn the detection loop for an active session
pub fn spawn_detection_loop(session: FocusSession, frame_interval: Duration) -> DetectionLoop {
    let cancel_token = CancellationToken::new();
    let (tx, rx) = watch::channel(session.live_metrics(0));
    let handle = tokio::spawn(detection_loop(
        session,
        frame_interval,
        tx,
        cancel_token.clone(),
    ));

    DetectionLoop {
        cancel_token,
        metrics: rx,
        handle,
    }
}

async fn detection_loop(
    mut session: FocusSession,
    frame_interval: Duration,
    metrics: watch::Sender<LiveMetrics>,
    cancel_token: CancellationToken,
) -> FocusSession {
    let mut ticker = tokio::time::interval(frame_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let started = Instant::now();

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                log::info!("detection loop shutting down");
                break;
            }
            _ = ticker.tick() => {
                let now = session_millis(started);
                match session.tick(now) {
                    Ok(events) => {
                        log_events(&events);
                        metrics.send_replace(session.live_metrics(now));
                    }
                    Err(e) => {
                        log::warn!("detection loop stopping: {e}");
                        break;
                    }
                }
            }
        }
    }

    session
}

fn session_millis(started: Instant) -> Timestamp {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn log_events(events: &[SessionEvent]) {
    for event in events {
        match event {
            SessionEvent::Snapshot { snapshot } => {
                log::debug!(
                    "snapshot at {} ms (focus {}%)",
                    snapshot.timestamp,
                    snapshot.focus_score
                );
            }
            other => log::trace!("{other:?}"),
        }
    }
}

/// Run the summarizer on a blocking worker so session teardown never waits on it
pub fn spawn_report(
    requester: ReportRequester,
    stats: SessionStats,
) -> JoinHandle<Result<ReportOutcome, ComputeError>> {
    tokio::task::spawn_blocking(move || requester.request(&stats))
}
