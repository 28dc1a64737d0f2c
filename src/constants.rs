//! Relay constants
//!
//! Limits and defaults shared by configuration and the exchange core.

/// Upper bound on buffers per signal (the selector tracks tried buffers in a u64 mask)
pub const MAX_BUFFERS: usize = 64;

/// Default buffers per signal (triple buffering)
pub const DEFAULT_NUM_BUFFERS: usize = 3;

/// Default bound on a single lock acquisition during freshness renormalization
pub const DEFAULT_RENORMALIZE_TIMEOUT_MS: u64 = 10;

/// Default samples per buffer
pub const DEFAULT_SAMPLE_CAPACITY: usize = 1;
