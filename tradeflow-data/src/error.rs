use thiserror::Error;

/// Startup configuration failures. The only errors allowed to terminate the
/// process, and only before the run loops start.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing mandatory environment variable: {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// A single malformed trade frame. Logged and skipped by the receive loop,
/// never fatal.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed trade frame: {0}")]
    Frame(#[from] serde_json::Error),
}

/// Notification delivery failures. Logged by the report cycle; the next
/// scheduled cycle is unaffected.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid mailbox address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("failed to build email: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("smtp delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Remote store failures. Logged; the in-memory path is never blocked.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("corrupt trade row: {0}")]
    Corrupt(String),
}
