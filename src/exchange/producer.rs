//! Producer handle: the only way to write into an exchange.
//!
//! An exchange hands out one `Producer` at a time. Every write-side
//! operation takes `&mut self`, so claims, budget changes and partial
//! copies are serialized by the borrow checker.

use std::sync::Arc;

use bytemuck::Pod;

use crate::error::{ RelayError, Result };
use crate::exchange::guard::WriteGuard;
use crate::exchange::plan::StatePlan;
use crate::exchange::signal::WriteRelease;
use crate::exchange::write_session::WriteTicket;
use crate::exchange::{ Exchange, SignalId };
use crate::insights;

/// Write side of an [`Exchange`]. Not `Clone`; dropping it lets the
/// exchange hand out a new one.
#[derive(Debug)]
pub struct Producer {
    exchange: Arc<Exchange>,
}

impl Producer {
    pub(crate) fn new(exchange: Arc<Exchange>) -> Self {
        Self { exchange }
    }

    pub fn exchange(&self) -> &Arc<Exchange> {
        &self.exchange
    }

    /// Offset of the buffer to write this cycle. Repeated calls before the
    /// write budget is used up return the same offset.
    pub fn acquire_for_write(&mut self, id: SignalId, requested_samples: usize) -> Result<usize> {
        let ticket = self.claim(id, requested_samples)?;
        Ok(self.exchange.signal(id)?.offset_of(ticket.index))
    }

    /// Complete one partial write; the last one of the budget publishes.
    pub fn release_write(&mut self, id: SignalId, offset: usize, samples: usize) -> Result<WriteRelease> {
        let signal = self.exchange.signal(id)?;
        signal.check_samples(samples)?;
        let ticket = signal.ticket_for(offset)?;
        self.complete(id, ticket, samples)
    }

    pub(crate) fn claim(&mut self, id: SignalId, requested_samples: usize) -> Result<WriteTicket> {
        let signal = self.exchange.signal(id)?;
        signal.check_samples(requested_samples)?;

        signal.acquire_for_write().map_err(|err| {
            if err.is_busy() {
                self.exchange.metrics().record_write_busy();
                insights::record_busy(id, "write");
            }
            err
        })
    }

    pub(crate) fn complete(&mut self, id: SignalId, ticket: WriteTicket, samples: usize) -> Result<WriteRelease> {
        let signal = self.exchange.signal(id)?;
        let release = signal.release_write(ticket)?;
        let metrics = self.exchange.metrics();
        metrics.record_write((samples * signal.sample_size()) as u64);

        if let WriteRelease::Published { index, outcome } = release {
            metrics.record_publish();
            insights::record_publish(id, index, outcome.freshness);

            if let Some(renorm) = outcome.renormalized {
                metrics.record_renormalization(renorm.timed_out.count_ones() as u64);
                insights::record_renormalize(id, renorm.rebase);
                for buffer in renorm.timed_out_buffers() {
                    insights::record_lock_timeout(id, buffer);
                }
            }
        }

        Ok(release)
    }

    // ------------------------------------------------------------------
    // Write budget hook
    // ------------------------------------------------------------------

    /// Set how many partial writes make up one publish of `id`.
    ///
    /// A write still in progress keeps its buffer, which the writes of the
    /// new budget then complete and publish.
    pub fn set_write_budget(&mut self, id: SignalId, budget: u32) -> Result<()> {
        let signal = self.exchange.signal(id)?;
        if let Some(buffer) = signal.set_write_budget(budget) {
            self.exchange.metrics().record_restarted_write();
            insights::record_restarted_write(id, buffer);
        }
        Ok(())
    }

    /// Install the write budgets of the next control-loop state. Signals the
    /// plan does not write get a zero budget.
    pub fn begin_state(&mut self, plan: &StatePlan) -> Result<()> {
        for range in plan.ranges() {
            let signal = self.exchange.signal(range.signal)?;
            let fits = range.offset
                .checked_add(range.len)
                .is_some_and(|end| range.len > 0 && end <= signal.byte_size());
            if !fits {
                return Err(
                    RelayError::invalid_request(
                        format!(
                            "copy range {}+{} outside signal '{}' ({} bytes)",
                            range.offset,
                            range.len,
                            signal.name(),
                            signal.byte_size()
                        )
                    )
                );
            }
        }

        let budgets = plan.write_budgets();
        let ids: Vec<SignalId> = self.exchange.signal_ids().collect();
        for id in ids {
            let budget = budgets.get(&id).copied().unwrap_or(0);
            self.set_write_budget(id, budget)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Guards and typed access
    // ------------------------------------------------------------------

    /// One partial write covering the whole sample capacity of `id`.
    pub fn write(&mut self, id: SignalId) -> Result<WriteGuard<'_>> {
        let samples = self.exchange.signal(id)?.sample_capacity();
        let ticket = self.claim(id, samples)?;
        Ok(WriteGuard::new(self, id, ticket, samples))
    }

    /// Write and publish `value` as a single-range write.
    pub fn publish_value<T: Pod>(&mut self, id: SignalId, value: &T) -> Result<()> {
        let signal = self.exchange.signal(id)?;
        if signal.write_budget() != 1 {
            return Err(
                RelayError::invalid_request(
                    format!(
                        "publish_value needs a write budget of 1, signal '{}' has {}",
                        signal.name(),
                        signal.write_budget()
                    )
                )
            );
        }
        let size = std::mem::size_of::<T>();
        if size > signal.byte_size() {
            return Err(
                RelayError::invalid_request(
                    format!("{} byte value does not fit a {} byte buffer", size, signal.byte_size())
                )
            );
        }
        let guard = self.write(id)?;
        guard.copy_from(0, bytemuck::bytes_of(value))?;
        Ok(())
    }
}

impl Drop for Producer {
    fn drop(&mut self) {
        self.exchange.release_producer();
    }
}
