//! Latest-value signal exchange.
//!
//! - `SlotLock` - per-buffer try-lock / timed lock
//! - `ReaderCensus` - in-flight readers per buffer
//! - `FreshnessLedger` - newest-buffer tags with wraparound renormalization
//! - `WriteSession` - partial writes per publish
//! - `selector` - freshest buffer for reads, oldest unread buffer for writes
//! - `Exchange` - shared read side of the accessor API
//! - `Producer` - the single write side

pub mod slot_lock;
pub mod census;
pub mod buffer_slot;
pub mod freshness;
pub mod write_session;
pub mod selector;
pub mod storage;
pub mod signal;
pub mod plan;
pub mod guard;
pub mod producer;
pub mod snapshot;
pub mod accessor;

pub use slot_lock::{ LockTimeout, SlotLock };
pub use census::ReaderCensus;
pub use buffer_slot::BufferSlot;
pub use freshness::{ FreshnessLedger, PublishOutcome, Rebase, Renormalization };
pub use write_session::{ WriteSession, WriteState, WriteTicket };
pub use signal::{ Signal, WriteRelease };
pub use plan::{ CopyRange, StatePlan };
pub use guard::{ ReadGuard, WriteGuard };
pub use producer::Producer;
pub use snapshot::{ BufferSnapshot, SignalSnapshot };
pub use accessor::{ Exchange, ExchangeBuilder };

/// Handle of a signal inside an [`Exchange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SignalId(u32);

impl SignalId {
    pub const fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for SignalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_id_roundtrip() {
        let id = SignalId::from_index(7);
        assert_eq!(id.index(), 7);
        assert_eq!(id.to_string(), "#7");
    }
}
