//! Freshness ledger.
//!
//! Every publish tags the buffer with `++global`. Tags only rank buffers
//! against each other, so when `global` is about to overflow u32 the ledger
//! rebases every other buffer by the smallest tag in use (or, when that frees
//! nothing, compacts them to dense ranks) before handing out the next tag.
//! Relative order survives any number of wraparounds.

use std::sync::atomic::{ AtomicU32, Ordering };

use crate::constants::MAX_BUFFERS;
use crate::exchange::buffer_slot::BufferSlot;
use crate::exchange::slot_lock::LockTimeout;

/// How the other buffers were rebased before a wrapping publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rebase {
    /// Every tag (and the global counter) lowered by `shift`.
    Shift { shift: u32 },
    /// Tags replaced by their dense rank; the global counter set to the top rank.
    Compact { top: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Renormalization {
    pub rebase: Rebase,
    /// Buffers whose lock could not be taken in time. They were demoted to tag 0.
    pub timed_out: u64,
}

impl Renormalization {
    pub fn timed_out_buffers(&self) -> impl Iterator<Item = usize> + '_ {
        (0..MAX_BUFFERS).filter(move |i| self.timed_out & (1u64 << i) != 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishOutcome {
    pub freshness: u32,
    pub renormalized: Option<Renormalization>,
}

#[derive(Debug)]
pub struct FreshnessLedger {
    global: AtomicU32,
    timeout: LockTimeout,
}

impl FreshnessLedger {
    pub fn new(timeout: LockTimeout) -> Self {
        Self { global: AtomicU32::new(0), timeout }
    }

    pub fn global(&self) -> u32 {
        self.global.load(Ordering::Acquire)
    }

    pub fn timeout(&self) -> LockTimeout {
        self.timeout
    }

    /// Tag `slots[index]` as the newest buffer.
    ///
    /// The caller holds `slots[index].lock`; only the single producer publishes.
    pub fn publish(&self, slots: &[BufferSlot], index: usize) -> PublishOutcome {
        let mut current = self.global.load(Ordering::Relaxed);
        let mut renormalized = None;

        if current == u32::MAX {
            let renorm = self.renormalize(slots, index);
            current = self.global.load(Ordering::Relaxed);
            renormalized = Some(renorm);
        }

        let next = current + 1;
        slots[index].set_freshness(next);
        self.global.store(next, Ordering::Release);

        PublishOutcome { freshness: next, renormalized }
    }

    fn renormalize(&self, slots: &[BufferSlot], publishing: usize) -> Renormalization {
        let global = self.global.load(Ordering::Relaxed);
        let shift = slots
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != publishing)
            .map(|(_, slot)| slot.freshness())
            .min()
            .unwrap_or(global);

        if shift > 0 {
            let timed_out = self.retag(slots, publishing, |tag| tag - shift);
            self.global.store(global - shift, Ordering::Relaxed);
            return Renormalization { rebase: Rebase::Shift { shift }, timed_out };
        }

        // Some buffer still carries tag 0, so shifting frees nothing.
        let mut ranks: Vec<u32> = slots
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != publishing)
            .map(|(_, slot)| slot.freshness())
            .collect();
        ranks.sort_unstable();
        ranks.dedup();

        let timed_out = self.retag(slots, publishing, |tag| {
            ranks.binary_search(&tag).map_or(0, |rank| rank as u32)
        });
        let top = ranks.len().saturating_sub(1) as u32;
        self.global.store(top, Ordering::Relaxed);

        Renormalization { rebase: Rebase::Compact { top }, timed_out }
    }

    /// Rewrite every other buffer's tag under its slot lock.
    fn retag(&self, slots: &[BufferSlot], publishing: usize, f: impl Fn(u32) -> u32) -> u64 {
        let mut timed_out = 0u64;

        for (i, slot) in slots.iter().enumerate() {
            if i == publishing {
                continue;
            }
            if slot.lock.lock_timeout(self.timeout) {
                slot.set_freshness(f(slot.freshness()));
                // SAFETY: taken just above
                unsafe { slot.lock.unlock() };
            } else {
                // An un-rebased tag would rank as newest for the next 2^32 publishes.
                slot.set_freshness(0);
                timed_out |= 1u64 << i;
            }
        }

        timed_out
    }

    #[cfg(test)]
    pub(crate) fn force_global(&self, value: u32) {
        self.global.store(value, Ordering::Relaxed);
    }

    /// Raise every tag and the counter so that the counter reads `global`,
    /// keeping relative order. Each tag is rewritten under its slot lock.
    #[cfg(test)]
    pub(crate) fn lift_to(&self, slots: &[BufferSlot], global: u32) {
        let lift = global - self.global();
        for slot in slots {
            assert!(slot.lock.lock_timeout(LockTimeout::Infinite));
            slot.set_freshness(slot.freshness() + lift);
            // SAFETY: taken just above
            unsafe { slot.lock.unlock() };
        }
        self.global.store(global, Ordering::Release);
    }
}
