//! Insights - Observability for relay.
//!
//! Tracing spans and log events for the exchange core. Zero-cost when disabled.
//!
//! # Usage
//!
//! ## Basic tracing (console output)
//! ```toml
//! relay = { version = "0.1", features = ["tracing"] }
//! ```
//! ```rust,ignore
//! tracing_subscriber::fmt::init();
//! ```
//!
//! ## Tracy profiler (real-time visualization)
//! ```toml
//! relay = { version = "0.1", features = ["tracy"] }
//! ```
//! ```rust,ignore
//! relay::init_tracy();
//! ```

use crate::exchange::{ Rebase, SignalId };

/// Initialize Tracy profiler (call once at startup)
#[cfg(feature = "tracy")]
pub fn init_tracy() {
    use tracing_subscriber::layer::SubscriberExt;
    if
        let Err(err) = tracing::subscriber::set_global_default(
            tracing_subscriber::registry().with(tracing_tracy::TracyLayer::default())
        )
    {
        tracing::warn!(%err, "tracy layer not installed");
    }
}

#[cfg(not(feature = "tracy"))]
pub fn init_tracy() {}

/// Record a publish (creates a span visible in Tracy)
#[cfg(feature = "tracing")]
#[inline]
pub fn record_publish(signal: SignalId, buffer: usize, freshness: u32) {
    let _span = tracing::trace_span!("publish", %signal, buffer, freshness).entered();
}

#[cfg(not(feature = "tracing"))]
#[inline(always)]
pub fn record_publish(_signal: SignalId, _buffer: usize, _freshness: u32) {}

/// Record a read or write that found no eligible buffer
#[cfg(feature = "tracing")]
#[inline]
pub fn record_busy(signal: SignalId, op: &'static str) {
    tracing::debug!(%signal, op, "no buffer available, skipping cycle");
}

#[cfg(not(feature = "tracing"))]
#[inline(always)]
pub fn record_busy(_signal: SignalId, _op: &'static str) {}

/// Record a freshness renormalization
#[cfg(feature = "tracing")]
pub fn record_renormalize(signal: SignalId, rebase: Rebase) {
    match rebase {
        Rebase::Shift { shift } => tracing::info!(%signal, shift, "freshness tags rebased"),
        Rebase::Compact { top } => tracing::info!(%signal, top, "freshness tags compacted"),
    }
}

#[cfg(not(feature = "tracing"))]
pub fn record_renormalize(_signal: SignalId, _rebase: Rebase) {}

/// Record a lock that could not be taken while renormalizing
#[cfg(feature = "tracing")]
pub fn record_lock_timeout(signal: SignalId, buffer: usize) {
    let err = crate::error::RelayError::LockTimeout { signal, buffer };
    tracing::warn!(%signal, buffer, "{}; buffer demoted to oldest", err);
}

#[cfg(not(feature = "tracing"))]
pub fn record_lock_timeout(_signal: SignalId, _buffer: usize) {}

/// Record a claimed write restarted by a write budget change
#[cfg(feature = "tracing")]
pub fn record_restarted_write(signal: SignalId, buffer: usize) {
    tracing::debug!(%signal, buffer, "write budget changed mid-write, claim carried into next state");
}

#[cfg(not(feature = "tracing"))]
pub fn record_restarted_write(_signal: SignalId, _buffer: usize) {}
