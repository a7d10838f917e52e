use thiserror::Error;

/// Errors surfaced by share-of-voice calls.
#[derive(Error, Debug)]
pub enum SovError {
    #[error("window must be between 1 and 365 days, got {0}")]
    InvalidWindow(u32),

    #[error("history must cover between 1 and 52 weeks, got {0}")]
    InvalidWeeks(u32),

    #[error("client not found: {0}")]
    ClientNotFound(String),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Rejected topic thread state change.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransitionError {
    #[error("thread is already active")]
    AlreadyActive,

    #[error("thread is already closed")]
    AlreadyClosed,

    #[error("thread closed at {closed_at} is outside the reopen window")]
    OutsideReopenWindow { closed_at: chrono::DateTime<chrono::Utc> },
}

