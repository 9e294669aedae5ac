//! Notification Emitter — transient "AI finding" toasts.
//!
//! Each tick rolls for a notification. A notification that gets through is
//! inserted into the active set together with its own expiry timer; the
//! emitter owns both, so closing it cancels every pending expiry.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use opsmanager_core::{NotificationConfig, Result};
use serde::{Deserialize, Serialize};

use crate::random::{self, RandomSource};
use crate::timeline::{TimerHandle, Timeline};

/// Findings the sentinel pretends to have discovered.
pub const FINDINGS: &[&str] = &[
    "AI detected a delay in Customer Support cycle.",
    "New automation opportunity found in Finance.",
    "Workflow drift detected in Engineering.",
    "SOP 'Monthly Closing' is reaching critical inefficiency.",
];

/// Monotonic notification identifier, unique per emitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(pub u64);

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Alert,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub text: String,
    pub kind: NotificationKind,
    /// Virtual time the notification was raised.
    pub raised_at: Duration,
}

struct Live {
    notification: Notification,
    expiry: TimerHandle,
}

struct EmitterState {
    active: BTreeMap<NotificationId, Live>,
    emit_probability: f64,
    alert_probability: f64,
    ttl: Duration,
    rng: Box<dyn RandomSource>,
    next_id: u64,
    emitted: u64,
}

impl EmitterState {
    fn roll(&mut self, now: Duration) -> Option<Notification> {
        if !random::chance(self.rng.as_mut(), self.emit_probability) {
            return None;
        }
        let text = random::pick(self.rng.as_mut(), FINDINGS);
        let kind = if random::chance(self.rng.as_mut(), self.alert_probability) {
            NotificationKind::Alert
        } else {
            NotificationKind::Info
        };
        let id = NotificationId(self.next_id);
        self.next_id += 1;
        self.emitted += 1;
        Some(Notification {
            id,
            text: text.to_string(),
            kind,
            raised_at: now,
        })
    }

    fn expire(&mut self, id: NotificationId) {
        if self.active.remove(&id).is_some() {
            tracing::debug!("🔕 Notification #{id} expired");
        }
    }
}

fn on_tick(state: &mut EmitterState, timeline: &mut Timeline<EmitterState>) {
    let Some(notification) = state.roll(timeline.now()) else {
        return;
    };
    let id = notification.id;
    let expiry = timeline.schedule_once(
        state.ttl,
        move |state: &mut EmitterState, _: &mut Timeline<EmitterState>| state.expire(id),
    );
    tracing::debug!(
        "🔔 Notification #{id} ({:?}): {}",
        notification.kind,
        notification.text
    );
    state.active.insert(
        id,
        Live {
            notification,
            expiry,
        },
    );
}

/// Periodic, probabilistic notification source with self-expiring entries.
pub struct NotificationEmitter {
    state: EmitterState,
    timeline: Timeline<EmitterState>,
    tick: Option<TimerHandle>,
}

impl NotificationEmitter {
    /// Create the emitter and start ticking.
    pub fn new(
        config: &NotificationConfig,
        rng: Box<dyn RandomSource>,
        anchor: DateTime<Utc>,
    ) -> Result<Self> {
        let mut timeline = Timeline::new(anchor);
        let tick = timeline.schedule(config.interval(), on_tick)?;

        tracing::info!(
            "🔔 Notification emitter started (every {}s, p={}, ttl {}s)",
            config.interval_secs,
            config.emit_probability,
            config.ttl_secs
        );

        Ok(Self {
            state: EmitterState {
                active: BTreeMap::new(),
                emit_probability: config.emit_probability,
                alert_probability: config.alert_probability,
                ttl: config.ttl(),
                rng,
                next_id: 1,
                emitted: 0,
            },
            timeline,
            tick: Some(tick),
        })
    }

    pub fn advance_by(&mut self, delta: Duration) -> usize {
        self.timeline.advance_by(delta, &mut self.state)
    }

    pub fn advance_to(&mut self, target: Duration) -> usize {
        self.timeline.advance_to(target, &mut self.state)
    }

    /// Live notifications. Ordered by id, but treat it as a set.
    pub fn active(&self) -> impl Iterator<Item = &Notification> + '_ {
        self.state.active.values().map(|live| &live.notification)
    }

    pub fn contains(&self, id: NotificationId) -> bool {
        self.state.active.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.state.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.active.is_empty()
    }

    /// Total notifications raised so far.
    pub fn emitted(&self) -> u64 {
        self.state.emitted
    }

    /// Remove a notification before its TTL runs out, cancelling its expiry.
    pub fn dismiss(&mut self, id: NotificationId) -> bool {
        match self.state.active.remove(&id) {
            Some(live) => {
                self.timeline.cancel(live.expiry);
                tracing::debug!("🔕 Notification #{id} dismissed");
                true
            }
            None => false,
        }
    }

    pub fn now(&self) -> Duration {
        self.timeline.now()
    }

    pub fn pending_timers(&self) -> usize {
        self.timeline.pending()
    }

    pub fn is_closed(&self) -> bool {
        self.tick.is_none()
    }

    /// Stop emitting, cancel every pending expiry and clear the active set.
    pub fn close(&mut self) {
        let Some(tick) = self.tick.take() else {
            return;
        };
        self.timeline.cancel(tick);
        let dropped = self.state.active.len();
        for live in std::mem::take(&mut self.state.active).into_values() {
            self.timeline.cancel(live.expiry);
        }
        tracing::info!("📴 Notification emitter stopped ({dropped} active dropped)");
    }
}

impl Drop for NotificationEmitter {
    fn drop(&mut self) {
        self.close();
    }
}
