//! Error type shared by all OpsManager crates.

/// Errors surfaced by configuration, scheduling, and the runtime driver.
#[derive(Debug, thiserror::Error)]
pub enum OpsError {
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid interval: {0}")]
    InvalidInterval(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("dashboard runtime is closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, OpsError>;
