//! Reader census: live count of readers copying out of one buffer.

use std::sync::atomic::{ AtomicU32, Ordering };

#[derive(Debug, Default)]
pub struct ReaderCensus(AtomicU32);

impl ReaderCensus {
    pub const fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    /// Register a reader. Called with the buffer's slot lock held.
    #[inline]
    pub fn enter(&self) -> u32 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Deregister a reader. Returns None (and leaves the count at zero) when
    /// there was no reader to remove.
    #[inline]
    pub fn leave(&self) -> Option<u32> {
        self.0
            .fetch_update(Ordering::Release, Ordering::Relaxed, |n| n.checked_sub(1))
            .ok()
            .map(|prev| prev - 1)
    }

    /// Current count. Acquire pairs with `leave` so finished reads happen-before reuse.
    #[inline]
    pub fn count(&self) -> u32 {
        self.0.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.count() == 0
    }
}
