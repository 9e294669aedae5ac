//! Dashboard — the read/command surface the render layer talks to.
//!
//! Owns one of each component and keeps them on the same virtual instant.
//! `snapshot()` is the polling interface; the runtime driver builds the
//! reactive one on top of it.

use std::time::Duration;

use chrono::{DateTime, Utc};
use opsmanager_core::{Result, SentinelConfig};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::{AuditPhase, AuditSimulator};
use crate::notify::{Notification, NotificationEmitter, NotificationId};
use crate::random::{RandomSource, StdRandom};
use crate::stream::{EventStream, WorkflowEvent};

/// Owned copy of everything the render layer displays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub session: Uuid,
    pub elapsed_secs: f64,
    /// Newest first.
    pub events: Vec<WorkflowEvent>,
    pub notifications: Vec<Notification>,
    pub audit: AuditPhase,
    pub audits_completed: u64,
}

impl DashboardSnapshot {
    pub fn alert_count(&self) -> usize {
        self.notifications
            .iter()
            .filter(|n| n.kind == crate::notify::NotificationKind::Alert)
            .count()
    }
}

pub struct Dashboard {
    session: Uuid,
    now: Duration,
    stream: EventStream,
    notifications: NotificationEmitter,
    audit: AuditSimulator,
    closed: bool,
}

impl Dashboard {
    /// Build from config. Uses `runtime.seed` when set, otherwise entropy.
    pub fn new(config: &SentinelConfig) -> Result<Self> {
        let (stream_rng, notify_rng): (Box<dyn RandomSource>, Box<dyn RandomSource>) =
            match config.runtime.seed {
                Some(seed) => (
                    Box::new(StdRandom::seeded(seed)),
                    Box::new(StdRandom::seeded(seed.wrapping_add(1))),
                ),
                None => (
                    Box::new(StdRandom::from_entropy()),
                    Box::new(StdRandom::from_entropy()),
                ),
            };
        Self::with_random(config, Utc::now(), stream_rng, notify_rng)
    }

    /// Build with explicit randomness and wall-clock anchor.
    pub fn with_random(
        config: &SentinelConfig,
        anchor: DateTime<Utc>,
        stream_rng: Box<dyn RandomSource>,
        notify_rng: Box<dyn RandomSource>,
    ) -> Result<Self> {
        config.validate()?;
        let session = Uuid::new_v4();
        let stream = EventStream::new(&config.stream, stream_rng, anchor)?;
        let notifications = NotificationEmitter::new(&config.notifications, notify_rng, anchor)?;
        let audit = AuditSimulator::new(&config.audit, anchor);
        tracing::info!("🖥️ Dashboard session {session} started");

        Ok(Self {
            session,
            now: Duration::ZERO,
            stream,
            notifications,
            audit,
            closed: false,
        })
    }

    pub fn session(&self) -> Uuid {
        self.session
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    /// Advance every component by `delta`. Returns callbacks fired.
    pub fn advance_by(&mut self, delta: Duration) -> usize {
        self.advance_to(self.now + delta)
    }

    /// Advance every component to `target`. Returns callbacks fired.
    pub fn advance_to(&mut self, target: Duration) -> usize {
        if target <= self.now {
            return 0;
        }
        self.now = target;
        self.stream.advance_to(target)
            + self.notifications.advance_to(target)
            + self.audit.advance_to(target)
    }

    /// Forward the render layer's "Global Audit" intent.
    pub fn trigger_audit(&mut self) -> bool {
        self.audit.trigger()
    }

    pub fn dismiss_notification(&mut self, id: NotificationId) -> bool {
        self.notifications.dismiss(id)
    }

    pub fn events(&self) -> impl Iterator<Item = &WorkflowEvent> + '_ {
        self.stream.events().iter()
    }

    pub fn notifications(&self) -> impl Iterator<Item = &Notification> + '_ {
        self.notifications.active()
    }

    pub fn audit_phase(&self) -> AuditPhase {
        self.audit.phase()
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            session: self.session,
            elapsed_secs: self.now.as_secs_f64(),
            events: self.stream.events().iter().cloned().collect(),
            notifications: self.notifications.active().cloned().collect(),
            audit: self.audit.phase(),
            audits_completed: self.audit.runs_completed(),
        }
    }

    /// Live timers across all components.
    pub fn pending_timers(&self) -> usize {
        self.stream.pending_timers()
            + self.notifications.pending_timers()
            + self.audit.pending_timers()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Tear down every component. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.stream.close();
        self.notifications.close();
        self.audit.close();
        tracing::info!("🖥️ Dashboard session {} closed", self.session);
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::ScriptedRandom;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn forced() -> Dashboard {
        Dashboard::with_random(
            &SentinelConfig::default(),
            Utc::now(),
            Box::new(StdRandom::seeded(1)),
            Box::new(ScriptedRandom::constant(0.0)),
        )
        .unwrap()
    }

    #[test]
    fn test_components_share_the_timeline() {
        let mut dash = forced();
        dash.advance_by(secs(12));

        let snap = dash.snapshot();
        assert_eq!(snap.elapsed_secs, 12.0);
        assert_eq!(snap.events.len(), 3);
        assert_eq!(snap.notifications.len(), 1);
        assert_eq!(snap.audit, AuditPhase::Idle);
        assert_eq!(snap.alert_count(), 1);
    }

    #[test]
    fn test_trigger_audit_round_trip() {
        let mut dash = forced();
        dash.advance_by(secs(1));
        assert!(dash.trigger_audit());
        assert!(!dash.trigger_audit());
        assert_eq!(dash.audit_phase(), AuditPhase::Busy);

        dash.advance_by(secs(2));
        assert_eq!(dash.audit_phase(), AuditPhase::Idle);
        assert_eq!(dash.snapshot().audits_completed, 1);
    }

    #[test]
    fn test_dismiss_through_dashboard() {
        let mut dash = forced();
        dash.advance_by(secs(10));
        let id = dash.notifications().next().unwrap().id;
        assert!(dash.dismiss_notification(id));
        assert_eq!(dash.notifications().count(), 0);
    }

    #[test]
    fn test_close_freezes_state_and_drops_timers() {
        let mut dash = forced();
        dash.advance_by(secs(10));
        dash.trigger_audit();
        assert!(dash.pending_timers() >= 3);

        dash.close();
        assert_eq!(dash.pending_timers(), 0);
        let frozen = dash.snapshot();
        assert!(frozen.notifications.is_empty());

        assert_eq!(dash.advance_by(secs(10_000)), 0);
        let later = dash.snapshot();
        assert_eq!(later.events, frozen.events);
        assert!(later.notifications.is_empty());
        assert!(!dash.trigger_audit());

        dash.close();
        assert!(dash.is_closed());
    }

    #[test]
    fn test_seeded_dashboards_agree() {
        let mut config = SentinelConfig::default();
        config.runtime.seed = Some(99);
        let mut a = Dashboard::new(&config).unwrap();
        let mut b = Dashboard::new(&config).unwrap();
        a.advance_by(secs(120));
        b.advance_by(secs(120));

        let strip = |d: &Dashboard| -> Vec<(String, String, u32)> {
            d.events()
                .map(|e| (e.actor.clone(), e.action.clone(), e.latency_minutes))
                .collect()
        };
        assert_eq!(strip(&a), strip(&b));
        assert_ne!(a.session(), b.session());
    }

    #[test]
    fn test_components_share_the_anchor() {
        use chrono::TimeZone;
        let anchor = Utc.with_ymd_and_hms(2026, 2, 22, 14, 20, 0).unwrap();
        let mut dash = Dashboard::with_random(
            &SentinelConfig::default(),
            anchor,
            Box::new(StdRandom::seeded(1)),
            Box::new(ScriptedRandom::constant(0.0)),
        )
        .unwrap();
        dash.advance_by(secs(4));

        let event = dash.events().next().unwrap();
        assert_eq!(event.captured_at, anchor + chrono::Duration::seconds(4));
        assert_eq!(dash.audit.wall_clock(), event.captured_at);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = SentinelConfig::default();
        config.notifications.ttl_secs = 0;
        assert!(Dashboard::new(&config).is_err());
    }

    #[test]
    fn test_snapshot_serializes() {
        let mut dash = forced();
        dash.advance_by(secs(10));
        let json = serde_json::to_value(dash.snapshot()).unwrap();
        assert_eq!(json["audit"], "idle");
        assert_eq!(json["notifications"][0]["kind"], "alert");
        assert_eq!(json["events"].as_array().unwrap().len(), 2);
    }
}
