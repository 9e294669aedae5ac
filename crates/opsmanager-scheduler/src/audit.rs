//! Async Action Simulator — the "Global Audit" button.
//!
//! `Idle --trigger--> Busy --(duration)--> Idle`. Triggers while busy are
//! dropped; there is never more than one completion timer.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use opsmanager_core::AuditConfig;
use serde::{Deserialize, Serialize};

use crate::timeline::{TimerHandle, Timeline};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditPhase {
    #[default]
    Idle,
    Busy,
}

impl fmt::Display for AuditPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditPhase::Idle => write!(f, "idle"),
            AuditPhase::Busy => write!(f, "busy"),
        }
    }
}

#[derive(Debug, Default)]
struct AuditState {
    phase: AuditPhase,
    completion: Option<TimerHandle>,
    runs_completed: u64,
}

/// Simulated long-running audit with a fixed completion delay.
#[derive(Debug)]
pub struct AuditSimulator {
    state: AuditState,
    timeline: Timeline<AuditState>,
    duration: Duration,
    closed: bool,
}

impl AuditSimulator {
    pub fn new(config: &AuditConfig, anchor: DateTime<Utc>) -> Self {
        Self {
            state: AuditState::default(),
            timeline: Timeline::new(anchor),
            duration: config.duration(),
            closed: false,
        }
    }

    /// Start an audit. Returns `false` (and does nothing) if one is already
    /// running or the simulator has been closed.
    pub fn trigger(&mut self) -> bool {
        if self.closed {
            tracing::debug!("🔍 Audit trigger ignored: simulator closed");
            return false;
        }
        if self.state.phase == AuditPhase::Busy {
            tracing::debug!("🔍 Audit trigger ignored: already running");
            return false;
        }

        self.state.phase = AuditPhase::Busy;
        let handle = self.timeline.schedule_once(
            self.duration,
            |state: &mut AuditState, _: &mut Timeline<AuditState>| {
                state.phase = AuditPhase::Idle;
                state.completion = None;
                state.runs_completed += 1;
                tracing::info!("✅ Global audit #{} complete", state.runs_completed);
            },
        );
        self.state.completion = Some(handle);
        tracing::info!("🔍 Global audit started ({}s)", self.duration.as_secs_f64());
        true
    }

    pub fn advance_by(&mut self, delta: Duration) -> usize {
        self.timeline.advance_by(delta, &mut self.state)
    }

    pub fn advance_to(&mut self, target: Duration) -> usize {
        self.timeline.advance_to(target, &mut self.state)
    }

    pub fn now(&self) -> Duration {
        self.timeline.now()
    }

    /// Wall-clock instant of the simulator's virtual `now`.
    pub fn wall_clock(&self) -> DateTime<Utc> {
        self.timeline.wall_clock()
    }

    pub fn phase(&self) -> AuditPhase {
        self.state.phase
    }

    pub fn is_busy(&self) -> bool {
        self.state.phase == AuditPhase::Busy
    }

    pub fn runs_completed(&self) -> u64 {
        self.state.runs_completed
    }

    pub fn pending_timers(&self) -> usize {
        self.timeline.pending()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Cancel any pending completion. The phase is left as-is.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(handle) = self.state.completion.take() {
            self.timeline.cancel(handle);
            tracing::info!("📴 Audit simulator closed mid-run");
        }
    }
}

impl Drop for AuditSimulator {
    fn drop(&mut self) {
        self.close();
    }
}
