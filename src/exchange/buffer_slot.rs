//! Per-buffer bookkeeping: slot lock, reader census and freshness tag.

use std::sync::atomic::{ AtomicU32, Ordering };

use crate::exchange::census::ReaderCensus;
use crate::exchange::slot_lock::SlotLock;

/// Cache-line aligned so consumers polling one buffer do not contend with
/// the producer publishing its neighbour.
#[repr(align(128))]
#[derive(Debug, Default)]
pub struct BufferSlot {
    pub(crate) lock: SlotLock,
    pub(crate) census: ReaderCensus,
    freshness: AtomicU32,
}

impl BufferSlot {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn freshness(&self) -> u32 {
        self.freshness.load(Ordering::Acquire)
    }

    /// Only the freshness ledger retags buffers.
    #[inline]
    pub(crate) fn set_freshness(&self, value: u32) {
        self.freshness.store(value, Ordering::Release);
    }

    #[inline]
    pub fn readers(&self) -> u32 {
        self.census.count()
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }
}
