//! RAII guards for the acquire/copy/release cycle.
//!
//! A guard holds one acquired buffer of one signal and releases it on drop,
//! so a copy engine that bails out early cannot leak a reader or a claim.

use crate::error::{ RelayError, Result };
use crate::exchange::producer::Producer;
use crate::exchange::signal::Signal;
use crate::exchange::write_session::WriteTicket;
use crate::exchange::{ Exchange, SignalId };

/// Read access to the freshest buffer of a signal.
pub struct ReadGuard<'a> {
    exchange: &'a Exchange,
    signal: &'a Signal,
    offset: usize,
    samples: usize,
}

impl<'a> ReadGuard<'a> {
    pub(crate) fn new(exchange: &'a Exchange, signal: &'a Signal, offset: usize, samples: usize) -> Self {
        Self { exchange, signal, offset, samples }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn buffer_index(&self) -> usize {
        self.offset / self.signal.byte_size()
    }

    /// The whole buffer. Writers stay away while this guard is alive.
    pub fn bytes(&self) -> &[u8] {
        // SAFETY: our census entry keeps the writer from selecting this buffer
        unsafe { self.signal.storage().slice(self.offset, self.signal.byte_size()) }
    }

    pub fn copy_to(&self, dst: &mut [u8]) -> usize {
        let bytes = self.bytes();
        let len = dst.len().min(bytes.len());
        dst[..len].copy_from_slice(&bytes[..len]);
        len
    }
}

impl<'a> Drop for ReadGuard<'a> {
    fn drop(&mut self) {
        let released = self.exchange.release_read(self.signal.id(), self.offset, self.samples);
        debug_assert!(released.is_ok(), "release_read failed: {:?}", released);
    }
}

/// One partial write into the claimed buffer of a signal. Dropping it
/// completes the part; the last part of the write budget publishes.
///
/// Borrows the [`Producer`] mutably, so at most one partial write is open.
pub struct WriteGuard<'a> {
    producer: &'a mut Producer,
    id: SignalId,
    ticket: WriteTicket,
    samples: usize,
}

impl<'a> WriteGuard<'a> {
    pub(crate) fn new(producer: &'a mut Producer, id: SignalId, ticket: WriteTicket, samples: usize) -> Self {
        Self { producer, id, ticket, samples }
    }

    fn signal(&self) -> &Signal {
        self.producer.exchange().signal_at(self.id)
    }

    pub fn offset(&self) -> usize {
        self.signal().offset_of(self.ticket.index)
    }

    pub fn buffer_index(&self) -> usize {
        self.ticket.index
    }

    /// Copy `src` to byte `at` of the claimed buffer.
    pub fn copy_from(&self, at: usize, src: &[u8]) -> Result<()> {
        let signal = self.signal();
        let fits = at.checked_add(src.len()).is_some_and(|end| end <= signal.byte_size());
        if !fits {
            return Err(
                RelayError::invalid_request(
                    format!(
                        "write of {} bytes at {} exceeds buffer of {} bytes",
                        src.len(),
                        at,
                        signal.byte_size()
                    )
                )
            );
        }
        // SAFETY: the write session holds this buffer's slot lock, it had no
        // readers when claimed, and this guard is the only open write
        unsafe { signal.storage().write(self.offset() + at, src) };
        Ok(())
    }
}

impl<'a> Drop for WriteGuard<'a> {
    fn drop(&mut self) {
        let released = self.producer.complete(self.id, self.ticket, self.samples);
        debug_assert!(released.is_ok(), "release_write failed: {:?}", released);
    }
}
