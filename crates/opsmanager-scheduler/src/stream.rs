//! Event Stream Generator — the Stream Monitor's scrolling feed.
//!
//! Every tick synthesizes one [`WorkflowEvent`] from fixed corpora and
//! pushes it onto the front of a bounded buffer; the oldest entry falls off
//! the tail once the buffer is full.

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use opsmanager_core::{Result, StreamConfig};
use serde::{Deserialize, Serialize};

use crate::random::{self, RandomSource};
use crate::timeline::{TimerHandle, Timeline};

/// People (and the system) that show up in the feed.
pub const ACTORS: &[&str] = &["Alex M.", "Sarah K.", "John D.", "Emily W.", "System"];

/// Activities attributed to them.
pub const ACTIONS: &[&str] = &[
    "Data Entry",
    "Reviewing Pull Request",
    "Meeting",
    "Support Ticket",
    "Email Sync",
];

/// Monotonic event identifier, unique per generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventStatus {
    Healthy,
    Warning,
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventStatus::Healthy => write!(f, "Healthy"),
            EventStatus::Warning => write!(f, "Warning"),
        }
    }
}

/// One row of the feed. Immutable once generated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowEvent {
    pub id: EventId,
    /// Capture time as shown on screen (24h `HH:MM:SS`).
    pub timestamp: String,
    pub captured_at: DateTime<Utc>,
    pub actor: String,
    pub action: String,
    pub status: EventStatus,
    pub latency_minutes: u32,
}

impl WorkflowEvent {
    /// Latency as displayed, e.g. `45m`.
    pub fn latency_label(&self) -> String {
        format!("{}m", self.latency_minutes)
    }
}

/// State mutated by the generator's tick.
struct StreamState {
    buffer: VecDeque<WorkflowEvent>,
    capacity: usize,
    warning_probability: f64,
    max_latency_minutes: u32,
    rng: Box<dyn RandomSource>,
    next_id: u64,
    generated: u64,
}

impl StreamState {
    fn generate(&mut self, at: DateTime<Utc>) {
        // Draw order is fixed: actor, action, status, latency.
        let actor = random::pick(self.rng.as_mut(), ACTORS);
        let action = random::pick(self.rng.as_mut(), ACTIONS);
        let status = if random::chance(self.rng.as_mut(), self.warning_probability) {
            EventStatus::Warning
        } else {
            EventStatus::Healthy
        };
        let latency_minutes =
            random::index(self.rng.as_mut(), self.max_latency_minutes as usize + 1) as u32;

        let event = WorkflowEvent {
            id: EventId(self.next_id),
            timestamp: at.format("%H:%M:%S").to_string(),
            captured_at: at,
            actor: actor.to_string(),
            action: action.to_string(),
            status,
            latency_minutes,
        };
        self.next_id += 1;
        self.generated += 1;

        tracing::debug!(
            "📈 Event #{} {} / {} [{}] {}",
            event.id.0,
            event.actor,
            event.action,
            event.status,
            event.latency_label()
        );

        self.buffer.push_front(event);
        self.buffer.truncate(self.capacity);
    }
}

/// Periodic workflow event generator with a bounded, newest-first buffer.
pub struct EventStream {
    state: StreamState,
    timeline: Timeline<StreamState>,
    tick: Option<TimerHandle>,
}

impl EventStream {
    /// Create the generator and start ticking.
    pub fn new(
        config: &StreamConfig,
        rng: Box<dyn RandomSource>,
        anchor: DateTime<Utc>,
    ) -> Result<Self> {
        let mut timeline = Timeline::new(anchor);
        let tick = timeline.schedule(
            config.interval(),
            |state: &mut StreamState, timeline: &mut Timeline<StreamState>| {
                state.generate(timeline.wall_clock());
            },
        )?;

        tracing::info!(
            "📡 Event stream started (every {}s, keeping {})",
            config.interval_secs,
            config.capacity
        );

        Ok(Self {
            state: StreamState {
                buffer: VecDeque::with_capacity(config.capacity + 1),
                capacity: config.capacity,
                warning_probability: config.warning_probability,
                max_latency_minutes: config.max_latency_minutes,
                rng,
                next_id: 1,
                generated: 0,
            },
            timeline,
            tick: Some(tick),
        })
    }

    /// Advance virtual time, generating an event per elapsed tick.
    pub fn advance_by(&mut self, delta: Duration) -> usize {
        self.timeline.advance_by(delta, &mut self.state)
    }

    pub fn advance_to(&mut self, target: Duration) -> usize {
        self.timeline.advance_to(target, &mut self.state)
    }

    /// Current buffer, newest first.
    pub fn events(&self) -> &VecDeque<WorkflowEvent> {
        &self.state.buffer
    }

    pub fn len(&self) -> usize {
        self.state.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.buffer.is_empty()
    }

    /// Total events generated, including evicted ones.
    pub fn generated(&self) -> u64 {
        self.state.generated
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

    /// Stop generating. The buffer keeps its last contents.
    pub fn close(&mut self) {
        if let Some(tick) = self.tick.take() {
            self.timeline.cancel(tick);
            tracing::info!(
                "📴 Event stream stopped after {} events",
                self.state.generated
            );
        }
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.close();
    }
}
