//! Write session tracker.
//!
//! One logical publish may be assembled from several partial copies (one per
//! byte range the producer writes in the current state). The tracker keeps
//! the claimed buffer across those copies and says when the last one lands.
//!
//! A claim survives a budget change: the buffer may already hold part of a
//! write, so it stays locked and the next state's writes finish it. Every
//! budget change starts a new generation, and grants from an older
//! generation no longer count toward the publish.

use std::sync::atomic::{ AtomicU32, AtomicUsize, Ordering };

const NO_CLAIM: usize = usize::MAX;

/// Write side of a signal. `Published` is transient and reported through
/// [`Completion::Publish`] instead of being stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteState {
    Idle,
    WriteClaimed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// More partial writes are expected for the claimed buffer.
    Pending { remaining: u32 },
    /// The claimed buffer is complete and must be published.
    Publish { index: usize },
}

/// One granted partial write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteTicket {
    pub index: usize,
    pub generation: u32,
}

/// Touched by the producer only; atomics keep the owning `Exchange` `Sync`.
#[derive(Debug)]
pub struct WriteSession {
    budget: AtomicU32,
    pending: AtomicU32,
    claimed: AtomicUsize,
    generation: AtomicU32,
    /// Partial writes handed out in this generation and not yet released.
    granted: AtomicU32,
}

impl WriteSession {
    pub fn new(budget: u32) -> Self {
        Self {
            budget: AtomicU32::new(budget),
            pending: AtomicU32::new(budget),
            claimed: AtomicUsize::new(NO_CLAIM),
            generation: AtomicU32::new(0),
            granted: AtomicU32::new(0),
        }
    }

    pub fn budget(&self) -> u32 {
        self.budget.load(Ordering::Acquire)
    }

    pub fn pending(&self) -> u32 {
        self.pending.load(Ordering::Acquire)
    }

    pub fn generation(&self) -> u32 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn claimed(&self) -> Option<usize> {
        match self.claimed.load(Ordering::Acquire) {
            NO_CLAIM => None,
            index => Some(index),
        }
    }

    pub fn state(&self) -> WriteState {
        if self.claimed().is_some() { WriteState::WriteClaimed } else { WriteState::Idle }
    }

    /// Install the budget for the next state. Returns the claimed buffer
    /// carried over unpublished, if any.
    pub fn set_budget(&self, budget: u32) -> Option<usize> {
        self.budget.store(budget, Ordering::Release);
        self.pending.store(budget, Ordering::Release);
        self.granted.store(0, Ordering::Release);
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.claimed()
    }

    /// Claim `index` for a new write and grant its first part.
    pub fn claim(&self, index: usize) -> WriteTicket {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel).wrapping_add(1);
        self.granted.store(1, Ordering::Release);
        self.claimed.store(index, Ordering::Release);
        WriteTicket { index, generation }
    }

    /// Grant another part of the write already claimed.
    pub fn grant(&self) -> Option<WriteTicket> {
        let index = self.claimed()?;
        self.granted.fetch_add(1, Ordering::AcqRel);
        Some(WriteTicket { index, generation: self.generation() })
    }

    /// Record one finished partial write.
    ///
    /// Returns None when `ticket` is not an outstanding grant of the current claim.
    pub fn complete(&self, ticket: WriteTicket) -> Option<Completion> {
        if self.claimed() != Some(ticket.index) || self.generation() != ticket.generation {
            return None;
        }
        self.granted
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .ok()?;

        let remaining = self.pending().saturating_sub(1);
        if remaining > 0 {
            self.pending.store(remaining, Ordering::Release);
            return Some(Completion::Pending { remaining });
        }

        self.pending.store(self.budget(), Ordering::Release);
        self.granted.store(0, Ordering::Release);
        self.claimed.store(NO_CLAIM, Ordering::Release);
        Some(Completion::Publish { index: ticket.index })
    }
}
