//! Error types for relay.

use thiserror::Error;

use crate::exchange::SignalId;

pub type Result<T> = std::result::Result<T, RelayError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// No eligible buffer right now. The caller skips this copy for the cycle.
    #[error("No buffer available for signal {signal}")]
    Busy { signal: SignalId },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Only raised while renormalizing freshness tags; never returned by the accessors.
    #[error("Timed out locking buffer {buffer} of signal {signal}")]
    LockTimeout { signal: SignalId, buffer: usize },

    #[error("Unknown signal {signal}")]
    UnknownSignal { signal: SignalId },

    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("Offset {offset} does not name a buffer of signal {signal}")]
    InvalidOffset { signal: SignalId, offset: usize },

    #[error("No write in progress for signal {signal}")]
    NotClaimed { signal: SignalId },

    #[error("Reader census of buffer {buffer} of signal {signal} is already zero")]
    CensusUnderflow { signal: SignalId, buffer: usize },

    /// An exchange has at most one live `Producer`.
    #[error("Exchange already has a producer")]
    ProducerTaken,
}

impl RelayError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig { message: message.into() }
    }

    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest { reason: reason.into() }
    }

    /// `Busy` means "stale this cycle", not a fault.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy { .. })
    }
}
