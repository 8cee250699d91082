/*!
 * Error types for the Vemetric SDK.
 */

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A required payload field is missing. Nothing was sent or queued.
    #[error("vemetric: {0}")]
    Validation(&'static str),

    #[error("vemetric: invalid options: {0}")]
    Config(String),

    /// The async queue is full and the client drops instead of blocking.
    #[error("vemetric: queue is full, dropping request")]
    QueueFull,

    #[error("vemetric: operation cancelled")]
    Cancelled,

    #[error("vemetric: deadline exceeded")]
    DeadlineExceeded,

    /// The client is shutting down or already closed.
    #[error("vemetric: client is closed")]
    Closed,

    #[error("vemetric: failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("vemetric: request failed: {0}")]
    Network(String),

    #[error("vemetric: non-2xx status code: {0}")]
    BadStatus(u16),

    #[error("vemetric: failed to spawn thread: {0}")]
    Spawn(String),
}

impl Error {
    /// True for errors caused by the caller's `Context` firing.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Cancelled | Error::DeadlineExceeded)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
