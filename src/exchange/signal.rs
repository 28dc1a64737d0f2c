//! One signal: N buffer slots over one storage region, a freshness ledger
//! and the producer's write session.

use crate::error::{ RelayError, Result };
use crate::exchange::buffer_slot::BufferSlot;
use crate::exchange::freshness::{ FreshnessLedger, PublishOutcome };
use crate::exchange::selector::{ select_for_read, select_for_write };
use crate::exchange::slot_lock::LockTimeout;
use crate::exchange::storage::Storage;
use crate::exchange::write_session::{ Completion, WriteSession, WriteState, WriteTicket };
use crate::exchange::SignalId;

/// Result of a `release_write`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteRelease {
    Pending { remaining: u32 },
    Published { index: usize, outcome: PublishOutcome },
}

#[derive(Debug)]
pub struct Signal {
    id: SignalId,
    name: String,
    sample_size: usize,
    sample_capacity: usize,
    byte_size: usize,
    slots: Box<[BufferSlot]>,
    storage: Storage,
    ledger: FreshnessLedger,
    session: WriteSession,
}

impl Signal {
    pub(crate) fn new(
        id: SignalId,
        name: String,
        sample_size: usize,
        sample_capacity: usize,
        num_buffers: usize,
        timeout: LockTimeout
    ) -> Result<Self> {
        let byte_size = sample_size * sample_capacity;
        let total = byte_size
            .checked_mul(num_buffers)
            .ok_or_else(|| RelayError::config(format!("Signal '{}' is too large", name)))?;

        let slots = (0..num_buffers).map(|_| BufferSlot::new()).collect::<Vec<_>>().into_boxed_slice();

        Ok(Self {
            id,
            name,
            sample_size,
            sample_capacity,
            byte_size,
            slots,
            storage: Storage::zeroed(total),
            ledger: FreshnessLedger::new(timeout),
            session: WriteSession::new(1),
        })
    }

    pub fn id(&self) -> SignalId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    pub fn sample_capacity(&self) -> usize {
        self.sample_capacity
    }

    /// Bytes per buffer.
    pub fn byte_size(&self) -> usize {
        self.byte_size
    }

    pub fn num_buffers(&self) -> usize {
        self.slots.len()
    }

    pub fn slots(&self) -> &[BufferSlot] {
        &self.slots
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn global_freshness(&self) -> u32 {
        self.ledger.global()
    }

    pub fn write_state(&self) -> WriteState {
        self.session.state()
    }

    pub fn write_budget(&self) -> u32 {
        self.session.budget()
    }

    pub fn pending_writes(&self) -> u32 {
        self.session.pending()
    }

    #[inline]
    pub fn offset_of(&self, index: usize) -> usize {
        index * self.byte_size
    }

    /// Buffer index named by `offset`, if it is the start of one of our buffers.
    pub fn index_of(&self, offset: usize) -> Result<usize> {
        let index = offset / self.byte_size;
        if offset % self.byte_size != 0 || index >= self.slots.len() {
            return Err(RelayError::InvalidOffset { signal: self.id, offset });
        }
        Ok(index)
    }

    pub(crate) fn check_samples(&self, samples: usize) -> Result<()> {
        if samples == 0 || samples > self.sample_capacity {
            return Err(
                RelayError::invalid_request(
                    format!(
                        "{} samples requested from signal '{}' (capacity {})",
                        samples,
                        self.name,
                        self.sample_capacity
                    )
                )
            );
        }
        Ok(())
    }

    pub(crate) fn acquire_for_read(&self) -> Result<usize> {
        select_for_read(&self.slots)
            .map(|index| self.offset_of(index))
            .ok_or(RelayError::Busy { signal: self.id })
    }

    pub(crate) fn release_read(&self, offset: usize) -> Result<usize> {
        let index = self.index_of(offset)?;
        self.slots[index].census
            .leave()
            .ok_or(RelayError::CensusUnderflow { signal: self.id, buffer: index })?;
        Ok(index)
    }

    /// Grant one partial write. Repeated grants before the publish name the
    /// same buffer.
    pub(crate) fn acquire_for_write(&self) -> Result<WriteTicket> {
        if self.session.budget() == 0 {
            return Err(
                RelayError::invalid_request(
                    format!("Signal '{}' has no write budget in this state", self.name)
                )
            );
        }
        if let Some(ticket) = self.session.grant() {
            return Ok(ticket);
        }

        let index = select_for_write(&self.slots).ok_or(RelayError::Busy { signal: self.id })?;
        Ok(self.session.claim(index))
    }

    /// Ticket for a release by offset, in the current generation.
    pub(crate) fn ticket_for(&self, offset: usize) -> Result<WriteTicket> {
        let index = self.index_of(offset)?;
        Ok(WriteTicket { index, generation: self.session.generation() })
    }

    pub(crate) fn release_write(&self, ticket: WriteTicket) -> Result<WriteRelease> {
        match self.session.complete(ticket) {
            Some(Completion::Pending { remaining }) => Ok(WriteRelease::Pending { remaining }),
            Some(Completion::Publish { index }) => {
                let outcome = self.ledger.publish(&self.slots, index);
                // SAFETY: held since `select_for_write` claimed this buffer
                unsafe { self.slots[index].lock.unlock() };
                Ok(WriteRelease::Published { index, outcome })
            }
            None => Err(RelayError::NotClaimed { signal: self.id }),
        }
    }

    /// Install the write budget for the next state. Returns the claimed
    /// buffer carried into it unpublished, if any. That buffer stays locked
    /// until a later state publishes it.
    pub(crate) fn set_write_budget(&self, budget: u32) -> Option<usize> {
        self.session.set_budget(budget)
    }

    #[cfg(test)]
    pub(crate) fn ledger(&self) -> &FreshnessLedger {
        &self.ledger
    }
}

impl Drop for Signal {
    fn drop(&mut self) {
        if let Some(index) = self.session.claimed() {
            // SAFETY: a claimed buffer's lock is held by the write session
            unsafe { self.slots[index].lock.unlock() };
        }
    }
}
