//! Wall-clock driver — runs a [`Dashboard`] inside a tokio task.
//!
//! The task owns the dashboard outright. Render layers read snapshots from
//! a `watch` channel and send intents over `mpsc`; commands are applied
//! between timeline advances, so they never interleave with a callback.

use std::time::Duration;

use opsmanager_core::{MAX_TIME_SCALE, OpsError, Result, RuntimeConfig};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::dashboard::{Dashboard, DashboardSnapshot};
use crate::notify::NotificationId;

/// How wall-clock time maps onto the virtual timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuntimeOptions {
    /// Advance cadence.
    pub resolution: Duration,
    /// Virtual seconds per wall-clock second.
    pub time_scale: f64,
}

impl RuntimeOptions {
    /// Coerce values the driver cannot run with into ones it can.
    fn sanitized(self) -> Self {
        let mut out = self;
        if !(out.time_scale.is_finite() && out.time_scale > 0.0) {
            tracing::warn!("⚠️ Invalid time scale {}, falling back to x1", out.time_scale);
            out.time_scale = 1.0;
        } else if out.time_scale > MAX_TIME_SCALE {
            tracing::warn!("⚠️ Time scale x{} clamped to x{MAX_TIME_SCALE}", out.time_scale);
            out.time_scale = MAX_TIME_SCALE;
        }
        if out.resolution.is_zero() {
            let fallback = RuntimeConfig::default().resolution();
            tracing::warn!("⚠️ Zero resolution, using {fallback:?}");
            out.resolution = fallback;
        }
        out
    }
}

/// Virtual time reached after `elapsed` wall-clock time at `scale`.
/// `None` when the product does not fit in a `Duration`.
fn scaled(elapsed: Duration, scale: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(elapsed.as_secs_f64() * scale).ok()
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self::from(&RuntimeConfig::default())
    }
}

impl From<&RuntimeConfig> for RuntimeOptions {
    fn from(config: &RuntimeConfig) -> Self {
        Self {
            resolution: config.resolution(),
            time_scale: config.time_scale,
        }
    }
}

enum Command {
    TriggerAudit(oneshot::Sender<bool>),
    Dismiss(NotificationId, oneshot::Sender<bool>),
    Shutdown,
}

/// Render-layer side of a running dashboard.
pub struct DashboardHandle {
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<DashboardSnapshot>,
    task: JoinHandle<DashboardSnapshot>,
}

impl DashboardHandle {
    /// Reactive view; `changed()` resolves whenever state moves.
    pub fn subscribe(&self) -> watch::Receiver<DashboardSnapshot> {
        self.snapshots.clone()
    }

    /// Latest published state.
    pub fn snapshot(&self) -> DashboardSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Start a global audit. `Ok(false)` if one is already running.
    pub async fn trigger_audit(&self) -> Result<bool> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::TriggerAudit(tx))
            .map_err(|_| OpsError::Closed)?;
        rx.await.map_err(|_| OpsError::Closed)
    }

    /// Dismiss a notification before it expires.
    pub async fn dismiss(&self, id: NotificationId) -> Result<bool> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Dismiss(id, tx))
            .map_err(|_| OpsError::Closed)?;
        rx.await.map_err(|_| OpsError::Closed)
    }

    /// Stop the driver, tear the dashboard down and return its final state.
    pub async fn shutdown(self) -> Result<DashboardSnapshot> {
        // The task may already be gone; the join below still reports it.
        let _ = self.commands.send(Command::Shutdown);
        self.task.await.map_err(|e| {
            tracing::warn!("⚠️ Dashboard task ended abnormally: {e}");
            OpsError::Closed
        })
    }
}

/// Spawn the driver on the current tokio runtime.
pub fn spawn_dashboard(dashboard: Dashboard, options: RuntimeOptions) -> DashboardHandle {
    let options = options.sanitized();
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (snapshot_tx, snapshot_rx) = watch::channel(dashboard.snapshot());

    tracing::info!(
        "⏰ Dashboard driver started (resolution {:?}, x{})",
        options.resolution,
        options.time_scale
    );
    let task = tokio::spawn(drive(dashboard, options, command_rx, snapshot_tx));

    DashboardHandle {
        commands: command_tx,
        snapshots: snapshot_rx,
        task,
    }
}

async fn drive(
    mut dashboard: Dashboard,
    options: RuntimeOptions,
    mut commands: mpsc::UnboundedReceiver<Command>,
    snapshots: watch::Sender<DashboardSnapshot>,
) -> DashboardSnapshot {
    let started = Instant::now();
    let virtual_now = || scaled(started.elapsed(), options.time_scale);
    // Whole virtual second last published, so `elapsed_secs` keeps moving
    // between component ticks.
    let mut published_second = 0;

    let mut interval = tokio::time::interval(options.resolution);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let Some(now) = virtual_now() else {
                    tracing::error!("❌ Virtual clock overflowed, stopping driver");
                    break;
                };
                let fired = dashboard.advance_to(now);
                let second = dashboard.now().as_secs();
                if fired > 0 || second != published_second {
                    published_second = second;
                    snapshots.send_replace(dashboard.snapshot());
                }
            }
            command = commands.recv() => {
                let Some(command) = command else { break };
                let Some(now) = virtual_now() else {
                    tracing::error!("❌ Virtual clock overflowed, stopping driver");
                    break;
                };
                // Catch up first so the intent lands at the right instant.
                let mut changed = dashboard.advance_to(now) > 0;
                let (reply, outcome) = match command {
                    Command::TriggerAudit(reply) => (reply, dashboard.trigger_audit()),
                    Command::Dismiss(id, reply) => (reply, dashboard.dismiss_notification(id)),
                    Command::Shutdown => break,
                };
                changed |= outcome;
                if changed {
                    published_second = dashboard.now().as_secs();
                    snapshots.send_replace(dashboard.snapshot());
                }
                let _ = reply.send(outcome);
            }
        }
    }

    dashboard.close();
    let last = dashboard.snapshot();
    snapshots.send_replace(last.clone());
    tracing::info!("⏹️ Dashboard driver stopped at {:.1}s", last.elapsed_secs);
    last
}
