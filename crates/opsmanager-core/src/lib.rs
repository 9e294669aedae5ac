//! # OpsManager Core
//!
//! Shared building blocks for the Sentinel crates: the error type and the
//! TOML configuration model that sizes every timer-driven component.

pub mod config;
pub mod error;

pub use config::{
    AuditConfig, MAX_TIME_SCALE, NotificationConfig, RuntimeConfig, SentinelConfig, StreamConfig,
};
pub use error::{OpsError, Result};
