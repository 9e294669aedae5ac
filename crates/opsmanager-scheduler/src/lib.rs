//! # OpsManager Scheduler
//!
//! Timer-driven state machines behind the dashboard's "live" panels.
//! Everything runs on a virtual clock, so tests drive time explicitly and
//! the runtime driver maps wall-clock time onto it.
//!
//! ## Architecture
//! ```text
//! Dashboard (one logical timeline)
//!   ├── EventStream:          every 4s → WorkflowEvent, newest 8 kept
//!   ├── NotificationEmitter:  every 10s → 30% chance of a finding, expires after 5s
//!   └── AuditSimulator:       trigger → Busy → Idle after 2s
//!
//! spawn_dashboard (tokio task)
//!   ├── interval tick → advance virtual time → watch::Sender<DashboardSnapshot>
//!   └── mpsc commands → trigger_audit / dismiss / shutdown
//! ```
//!
//! Each component owns its own [`Timeline`]; there is no global timer
//! registry. Tearing a component down cancels every timer it owns before
//! returning.

pub mod audit;
pub mod dashboard;
pub mod notify;
pub mod random;
pub mod runtime;
pub mod stream;
pub mod timeline;

pub use audit::{AuditPhase, AuditSimulator};
pub use dashboard::{Dashboard, DashboardSnapshot};
pub use notify::{Notification, NotificationEmitter, NotificationId, NotificationKind};
pub use random::{RandomSource, ScriptedRandom, StdRandom};
pub use runtime::{DashboardHandle, RuntimeOptions, spawn_dashboard};
pub use stream::{EventId, EventStatus, EventStream, WorkflowEvent};
pub use timeline::{TimerHandle, Timeline};
