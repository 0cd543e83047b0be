//! Error types for peermux

use thiserror::Error;

/// Core peermux errors
#[derive(Error, Debug)]
pub enum MuxError {
    /// The governing lifetime was canceled. Never a failure.
    #[error("Canceled")]
    Canceled,

    // Transport errors
    #[error("{op}: {message}")]
    Transport { op: &'static str, message: String },

    #[error("check status: unexpected status {status}")]
    Status { status: u16 },

    // Stream errors
    #[error("Record exceeds {limit} bytes")]
    RecordTooLong { limit: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Config errors
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

impl MuxError {
    /// Label a transport failure with the operation that produced it
    pub fn transport(op: &'static str, err: impl std::fmt::Display) -> Self {
        MuxError::Transport {
            op,
            message: err.to_string(),
        }
    }

    /// True when this error is the distinguishable cancellation outcome
    pub fn is_canceled(&self) -> bool {
        matches!(self, MuxError::Canceled)
    }
}

/// Result type for peermux operations
pub type MuxResult<T> = Result<T, MuxError>;
