//! Error types for sequoia-core.

use thiserror::Error;

/// Error type for sequoia-core operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid tempo: {0}. Must be finite and positive")]
    InvalidTempo(f32),

    #[error("{what} {value} out of range (0..{bound})")]
    OutOfRange {
        what: &'static str,
        value: i64,
        bound: usize,
    },

    #[error("Invalid clock divide: {0}. Must be at least 1")]
    InvalidClockDivide(i32),

    #[error("Invalid loop range: first={first}, last={last}")]
    InvalidLoopRange { first: i32, last: i32 },

    #[error("Control queue full: {0}")]
    QueueFull(&'static str),

    #[error("Capacity exceeded: {what} (max {max})")]
    CapacityExceeded { what: &'static str, max: usize },

    #[error("Tick rate mismatch: session runs at {session} ticks per step, sequence at {sequence}")]
    TickRateMismatch { session: u32, sequence: u32 },

    #[error("Session engine is already active")]
    AlreadyActive,

    #[error("Engine does not belong to this session")]
    ForeignEngine,

    #[error("Unknown sequence: {0}")]
    UnknownSequence(String),

    #[error("Unknown port: {0}")]
    UnknownPort(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;
