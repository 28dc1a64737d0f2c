//! The exchange: an arena of signals and the read side of the accessor API.
//!
//! Per cycle the copy engine does, for every signal and copy range:
//! `acquire_for_*` → copy bytes at the returned offset → `release_*`.
//! Reads go through the shared `Exchange`; writes go through its single
//! [`Producer`], which also takes `begin_state` before each state so the
//! write session knows how many partial writes make one publish.

use std::sync::atomic::{ AtomicBool, Ordering };
use std::sync::Arc;

use bytemuck::Pod;

use crate::config::{ ExchangeConfig, SignalConfig };
use crate::error::{ RelayError, Result };
use crate::exchange::guard::ReadGuard;
use crate::exchange::producer::Producer;
use crate::exchange::signal::Signal;
use crate::exchange::snapshot::{ BufferSnapshot, SignalSnapshot };
use crate::exchange::write_session::WriteState;
use crate::exchange::SignalId;
use crate::insights;
use crate::metrics::Metrics;

/// Signal exchange shared by one producer and any number of consumers
/// (wrap it in an `Arc`).
#[derive(Debug)]
pub struct Exchange {
    config: ExchangeConfig,
    signals: Box<[Signal]>,
    metrics: Metrics,
    producer_taken: AtomicBool,
}

impl Exchange {
    pub fn builder(config: ExchangeConfig) -> ExchangeBuilder {
        ExchangeBuilder::new(config)
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    pub fn signal(&self, id: SignalId) -> Result<&Signal> {
        self.signals.get(id.index()).ok_or(RelayError::UnknownSignal { signal: id })
    }

    pub fn signal_id(&self, name: &str) -> Option<SignalId> {
        self.signals
            .iter()
            .find(|s| s.name() == name)
            .map(|s| s.id())
    }

    pub fn signal_ids(&self) -> impl Iterator<Item = SignalId> + '_ {
        self.signals.iter().map(|s| s.id())
    }

    /// For ids already validated against this exchange.
    pub(crate) fn signal_at(&self, id: SignalId) -> &Signal {
        &self.signals[id.index()]
    }

    /// Take the write side. Fails with `ProducerTaken` while another
    /// `Producer` of this exchange is alive.
    pub fn producer(self: &Arc<Self>) -> Result<Producer> {
        self.producer_taken
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| RelayError::ProducerTaken)?;
        Ok(Producer::new(Arc::clone(self)))
    }

    pub(crate) fn release_producer(&self) {
        self.producer_taken.store(false, Ordering::Release);
    }

    // ------------------------------------------------------------------
    // Accessor API
    // ------------------------------------------------------------------

    /// Offset of the freshest readable buffer. The buffer stays protected
    /// from the writer until `release_read`.
    pub fn acquire_for_read(&self, id: SignalId, requested_samples: usize) -> Result<usize> {
        let signal = self.signal(id)?;
        signal.check_samples(requested_samples)?;

        signal.acquire_for_read().map_err(|err| {
            self.metrics.record_read_busy();
            insights::record_busy(id, "read");
            err
        })
    }

    pub fn release_read(&self, id: SignalId, offset: usize, samples: usize) -> Result<()> {
        let signal = self.signal(id)?;
        signal.check_samples(samples)?;
        signal.release_read(offset)?;
        self.metrics.record_read((samples * signal.sample_size()) as u64);
        Ok(())
    }

    pub fn write_state(&self, id: SignalId) -> Result<WriteState> {
        Ok(self.signal(id)?.write_state())
    }

    // ------------------------------------------------------------------
    // Guards and typed access
    // ------------------------------------------------------------------

    pub fn read(&self, id: SignalId) -> Result<ReadGuard<'_>> {
        let signal = self.signal(id)?;
        let samples = signal.sample_capacity();
        let offset = self.acquire_for_read(id, samples)?;
        Ok(ReadGuard::new(self, signal, offset, samples))
    }

    /// Freshest published value, read from the start of the buffer.
    pub fn latest_value<T: Pod>(&self, id: SignalId) -> Result<T> {
        let guard = self.read(id)?;
        let size = std::mem::size_of::<T>();
        let bytes = guard.bytes();
        if bytes.len() < size {
            return Err(
                RelayError::invalid_request(
                    format!("{} byte value does not fit a {} byte buffer", size, bytes.len())
                )
            );
        }
        Ok(bytemuck::pod_read_unaligned(&bytes[..size]))
    }

    pub fn snapshot(&self, id: SignalId) -> Result<SignalSnapshot> {
        let signal = self.signal(id)?;
        let buffers = signal
            .slots()
            .iter()
            .enumerate()
            .map(|(index, slot)| BufferSnapshot {
                index,
                offset: signal.offset_of(index),
                freshness: slot.freshness(),
                readers: slot.readers(),
                locked: slot.is_locked(),
            })
            .collect();

        Ok(SignalSnapshot {
            signal: id,
            global_freshness: signal.global_freshness(),
            write_state: signal.write_state(),
            write_budget: signal.write_budget(),
            pending_writes: signal.pending_writes(),
            buffers,
        })
    }
}

/// Registers signals, then allocates every buffer once in `build`.
pub struct ExchangeBuilder {
    config: ExchangeConfig,
    signals: Vec<SignalConfig>,
}

impl ExchangeBuilder {
    pub fn new(config: ExchangeConfig) -> Self {
        Self { config, signals: Vec::new() }
    }

    /// Register a signal and return its handle.
    pub fn add_signal(&mut self, signal: SignalConfig) -> Result<SignalId> {
        if self.signals.iter().any(|s| s.name == signal.name) {
            return Err(RelayError::config(format!("Duplicate signal '{}'", signal.name)));
        }
        let id = SignalId::from_index(self.signals.len());
        self.signals.push(signal);
        Ok(id)
    }

    /// Register a one-sample signal of `sample_size` bytes.
    pub fn signal(&mut self, name: impl Into<String>, sample_size: usize) -> Result<SignalId> {
        self.add_signal(SignalConfig::new(name, sample_size)?)
    }

    pub fn build(self) -> Result<Exchange> {
        let ExchangeBuilder { config, signals } = self;

        let signals = signals
            .into_iter()
            .enumerate()
            .map(|(i, s)| {
                let buffers = s.resolved_buffers(&config);
                let byte_size = s.byte_size()?;
                debug_assert_eq!(byte_size, s.sample_size * s.sample_capacity);
                Signal::new(
                    SignalId::from_index(i),
                    s.name,
                    s.sample_size,
                    s.sample_capacity,
                    buffers,
                    config.renormalize_timeout
                )
            })
            .collect::<Result<Vec<_>>>()?
            .into_boxed_slice();

        Ok(Exchange { config, signals, metrics: Metrics::new(), producer_taken: AtomicBool::new(false) })
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::plan::StatePlan;
    use crate::exchange::signal::WriteRelease;
    use crate::exchange::slot_lock::LockTimeout;
    use std::sync::atomic::AtomicU64;
    use std::thread;

    fn counter_exchange(buffers: usize) -> (Arc<Exchange>, Producer, SignalId) {
        let mut builder = Exchange::builder(ExchangeConfig::new(buffers).unwrap());
        let id = builder.signal("counter", 4).unwrap();
        let exchange = Arc::new(builder.build().unwrap());
        let producer = exchange.producer().unwrap();
        (exchange, producer, id)
    }

    #[test]
    fn test_builder_registers_signals() {
        let mut builder = Exchange::builder(ExchangeConfig::default());
        let a = builder.signal("a", 4).unwrap();
        let b = builder
            .add_signal(SignalConfig::new("b", 8).unwrap().with_buffers(5).unwrap())
            .unwrap();
        assert!(builder.signal("a", 2).is_err());
        let exchange = builder.build().unwrap();

        assert_eq!(exchange.len(), 2);
        assert_eq!(exchange.signal_id("b"), Some(b));
        assert_eq!(exchange.signal(a).unwrap().num_buffers(), 3);
        assert_eq!(exchange.signal(b).unwrap().num_buffers(), 5);
        assert_eq!(exchange.signal(b).unwrap().storage().len(), 40);
        assert!(matches!(
            exchange.signal(SignalId::from_index(9)),
            Err(RelayError::UnknownSignal { .. })
        ));
    }

    #[test]
    fn test_single_producer_at_a_time() {
        let (exchange, producer, _) = counter_exchange(3);
        assert_eq!(exchange.producer().unwrap_err(), RelayError::ProducerTaken);

        drop(producer);
        let again = exchange.producer();
        assert!(again.is_ok());
        assert_eq!(exchange.producer().unwrap_err(), RelayError::ProducerTaken);
    }

    #[test]
    fn test_producer_handoff_between_threads() {
        let (exchange, mut producer, id) = counter_exchange(3);
        producer.publish_value(id, &1u32).unwrap();

        let handle = thread::spawn(move || {
            producer.publish_value(id, &2u32).unwrap();
            producer
        });
        let producer = handle.join().unwrap();
        assert_eq!(exchange.latest_value::<u32>(id).unwrap(), 2);
        assert!(Arc::ptr_eq(producer.exchange(), &exchange));
    }

    #[test]
    fn test_sample_count_is_validated() {
        let (exchange, mut producer, id) = counter_exchange(3);
        assert!(matches!(exchange.acquire_for_read(id, 0), Err(RelayError::InvalidRequest { .. })));
        assert!(matches!(producer.acquire_for_write(id, 2), Err(RelayError::InvalidRequest { .. })));
    }

    #[test]
    fn test_single_buffer_contention() {
        let (exchange, mut producer, id) = counter_exchange(1);

        let rd = exchange.acquire_for_read(id, 1).unwrap();
        assert!(producer.acquire_for_write(id, 1).unwrap_err().is_busy());
        assert!(producer.acquire_for_write(id, 1).unwrap_err().is_busy());

        exchange.release_read(id, rd, 1).unwrap();
        let wr = producer.acquire_for_write(id, 1).unwrap();

        // Reader is locked out while the write is in progress.
        assert!(exchange.acquire_for_read(id, 1).unwrap_err().is_busy());
        producer.release_write(id, wr, 1).unwrap();
        let rd = exchange.acquire_for_read(id, 1).unwrap();
        exchange.release_read(id, rd, 1).unwrap();

        let m = exchange.metrics().snapshot();
        assert_eq!(m.write_busy, 2);
        assert_eq!(m.read_busy, 1);
        assert_eq!(m.publishes, 1);
    }

    #[test]
    fn test_partial_write_atomicity() {
        let (exchange, mut producer, id) = counter_exchange(3);
        producer.publish_value(id, &7u32).unwrap();
        producer
            .begin_state(&StatePlan::new().with_range(id, 0, 2).with_range(id, 2, 2).with_range(id, 0, 4))
            .unwrap();

        let new_bytes = 99u32.to_ne_bytes();
        for part in 0..3 {
            let guard = producer.write(id).unwrap();
            guard.copy_from(0, &new_bytes).unwrap();
            let before_release = exchange.latest_value::<u32>(id).unwrap();
            assert_eq!(before_release, 7, "part {}", part);
            drop(guard);

            let value = exchange.latest_value::<u32>(id).unwrap();
            if part < 2 {
                assert_eq!(value, 7);
                assert_eq!(exchange.write_state(id).unwrap(), WriteState::WriteClaimed);
            } else {
                assert_eq!(value, 99);
                assert_eq!(exchange.write_state(id).unwrap(), WriteState::Idle);
            }
        }
    }

    #[test]
    fn test_repeated_acquire_returns_claimed_offset() {
        let (_exchange, mut producer, id) = counter_exchange(3);
        producer.set_write_budget(id, 2).unwrap();

        let first = producer.acquire_for_write(id, 1).unwrap();
        let again = producer.acquire_for_write(id, 1).unwrap();
        assert_eq!(first, again);
        assert_eq!(producer.release_write(id, first, 1).unwrap(), WriteRelease::Pending { remaining: 1 });
        assert!(matches!(producer.release_write(id, first, 1).unwrap(), WriteRelease::Published { .. }));
        // Both grants used up.
        assert!(matches!(producer.release_write(id, first, 1), Err(RelayError::NotClaimed { .. })));
    }

    #[test]
    fn test_begin_state_zeroes_unplanned_signals() {
        let mut builder = Exchange::builder(ExchangeConfig::default());
        let a = builder.signal("a", 4).unwrap();
        let b = builder.signal("b", 4).unwrap();
        let exchange = Arc::new(builder.build().unwrap());
        let mut producer = exchange.producer().unwrap();

        producer.begin_state(&StatePlan::new().with_signal(a, 4)).unwrap();
        assert_eq!(exchange.signal(a).unwrap().write_budget(), 1);
        assert_eq!(exchange.signal(b).unwrap().write_budget(), 0);
        assert!(matches!(producer.acquire_for_write(b, 1), Err(RelayError::InvalidRequest { .. })));
    }

    #[test]
    fn test_begin_state_rejects_out_of_range_copies() {
        let (exchange, mut producer, id) = counter_exchange(3);
        let err = producer.begin_state(&StatePlan::new().with_range(id, 2, 4)).unwrap_err();
        assert!(matches!(err, RelayError::InvalidRequest { .. }));
        assert_eq!(exchange.signal(id).unwrap().write_budget(), 1);
    }

    #[test]
    fn test_budget_change_never_exposes_partial_write() {
        let (exchange, mut producer, id) = counter_exchange(1);
        producer.publish_value(id, &7u32).unwrap();

        producer.set_write_budget(id, 2).unwrap();
        let guard = producer.write(id).unwrap();
        guard.copy_from(0, &99u32.to_ne_bytes()).unwrap();
        drop(guard);

        // State ends after one of two parts.
        producer.set_write_budget(id, 1).unwrap();
        assert_eq!(exchange.metrics().snapshot().restarted_writes, 1);
        assert_eq!(exchange.write_state(id).unwrap(), WriteState::WriteClaimed);
        assert!(exchange.latest_value::<u32>(id).unwrap_err().is_busy());

        // The next state's write completes the carried buffer.
        producer.publish_value(id, &8u32).unwrap();
        assert_eq!(exchange.latest_value::<u32>(id).unwrap(), 8);
        assert!(exchange.snapshot(id).unwrap().buffers.iter().all(|b| !b.locked));
    }

    #[test]
    fn test_budget_change_keeps_older_buffers_readable() {
        let (exchange, mut producer, id) = counter_exchange(3);
        producer.publish_value(id, &7u32).unwrap();

        producer.set_write_budget(id, 2).unwrap();
        let off = producer.acquire_for_write(id, 1).unwrap();
        producer.release_write(id, off, 1).unwrap();
        producer.set_write_budget(id, 1).unwrap();

        // A release granted before the change does not count toward the new budget.
        assert!(matches!(producer.release_write(id, off, 1), Err(RelayError::NotClaimed { .. })));
        assert_eq!(exchange.latest_value::<u32>(id).unwrap(), 7);

        assert_eq!(producer.acquire_for_write(id, 1).unwrap(), off);
        assert!(matches!(producer.release_write(id, off, 1).unwrap(), WriteRelease::Published { .. }));
        assert_eq!(exchange.snapshot(id).unwrap().global_freshness, 2);
    }

    #[test]
    fn test_wraparound_keeps_read_order() {
        let config = ExchangeConfig::new(3).unwrap().with_renormalize_timeout(LockTimeout::Infinite);
        let mut builder = Exchange::builder(config);
        let id = builder.signal("counter", 4).unwrap();
        let exchange = Arc::new(builder.build().unwrap());
        let mut producer = exchange.producer().unwrap();

        let signal = exchange.signal(id).unwrap();
        let tags = [0x100, 0x200, 0xff00_0000];
        for (slot, tag) in signal.slots().iter().zip(tags) {
            slot.set_freshness(tag);
        }
        signal.ledger().force_global(u32::MAX);

        // Write lands in the oldest buffer (index 0, tag 0x100) and wraps the counter.
        let before = exchange.acquire_for_read(id, 1).unwrap();
        exchange.release_read(id, before, 1).unwrap();
        assert_eq!(before, signal.offset_of(2));

        let wr = producer.acquire_for_write(id, 1).unwrap();
        assert_eq!(wr, signal.offset_of(0));
        producer.release_write(id, wr, 1).unwrap();

        let snap = exchange.snapshot(id).unwrap();
        let f: Vec<u32> = snap.buffers.iter().map(|b| b.freshness).collect();
        assert!(f[1] < f[2] && f[2] < f[0], "tags after wrap: {:?}", f);
        assert_eq!(snap.global_freshness, f[0]);
        assert_eq!(exchange.metrics().snapshot().renormalizations, 1);

        let rd = exchange.acquire_for_read(id, 1).unwrap();
        assert_eq!(rd, signal.offset_of(0));
        exchange.release_read(id, rd, 1).unwrap();

        // Next write reuses the oldest: buffer 1.
        let wr = producer.acquire_for_write(id, 1).unwrap();
        assert_eq!(wr, signal.offset_of(1));
        producer.release_write(id, wr, 1).unwrap();
    }

    #[test]
    fn test_wraparound_under_concurrent_readers() {
        const WORDS: usize = 4;
        const WRAPS: u64 = 25;
        const PER_WRAP: u64 = 16;

        let config = ExchangeConfig::new(3).unwrap().with_renormalize_timeout(LockTimeout::Millis(200));
        let mut builder = Exchange::builder(config);
        let id = builder
            .add_signal(SignalConfig::new("counter", 8).unwrap().with_sample_capacity(WORDS).unwrap())
            .unwrap();
        let exchange = Arc::new(builder.build().unwrap());
        let mut producer = exchange.producer().unwrap();

        let running = Arc::new(AtomicBool::new(true));
        let published = Arc::new(AtomicU64::new(0));
        let errors = Arc::new(AtomicU64::new(0));

        let readers: Vec<_> = (0..3)
            .map(|_| {
                let exchange = exchange.clone();
                let running = running.clone();
                let published = published.clone();
                let errors = errors.clone();
                thread::spawn(move || {
                    let mut reads = 0u64;
                    while running.load(Ordering::Relaxed) {
                        let Ok(guard) = exchange.read(id) else {
                            continue;
                        };
                        let words: Vec<u64> = guard
                            .bytes()
                            .chunks_exact(8)
                            .map(|c| u64::from_ne_bytes(c.try_into().unwrap()))
                            .collect();
                        drop(guard);

                        let ceiling = published.load(Ordering::Acquire);
                        if words.iter().any(|w| *w != words[0]) || words[0] > ceiling + 1 {
                            errors.fetch_add(1, Ordering::Relaxed);
                            eprintln!("bad read {:?} (published {})", words, ceiling);
                        }
                        reads += 1;
                    }
                    reads
                })
            })
            .collect();

        let mut value = 0u64;
        for _ in 0..WRAPS {
            let signal = exchange.signal(id).unwrap();
            signal.ledger().lift_to(signal.slots(), u32::MAX - 4);

            for _ in 0..PER_WRAP {
                value += 1;
                let mut bytes = [0u8; WORDS * 8];
                for chunk in bytes.chunks_exact_mut(8) {
                    chunk.copy_from_slice(&value.to_ne_bytes());
                }
                loop {
                    match producer.write(id) {
                        Ok(guard) => {
                            guard.copy_from(0, &bytes).unwrap();
                            break;
                        }
                        Err(err) => {
                            assert!(err.is_busy(), "unexpected write error: {}", err);
                            std::hint::spin_loop();
                        }
                    }
                }
                published.store(value, Ordering::Release);
            }
        }

        running.store(false, Ordering::Relaxed);
        let reads: u64 = readers.into_iter().map(|h| h.join().unwrap()).sum();

        assert_eq!(errors.load(Ordering::Relaxed), 0);
        assert!(reads > 0);
        assert_eq!(exchange.metrics().snapshot().renormalizations, WRAPS);
        assert_eq!(exchange.latest_value::<u64>(id).unwrap(), value);
        assert_eq!(exchange.snapshot(id).unwrap().total_readers(), 0);
    }

    #[test]
    fn test_publish_value_requires_single_range_budget() {
        let (_exchange, mut producer, id) = counter_exchange(3);
        producer.set_write_budget(id, 2).unwrap();
        assert!(matches!(producer.publish_value(id, &1u32), Err(RelayError::InvalidRequest { .. })));
    }

    #[test]
    fn test_publish_value_rejects_oversized_type() {
        let (exchange, mut producer, id) = counter_exchange(3);
        assert!(matches!(producer.publish_value(id, &1u64), Err(RelayError::InvalidRequest { .. })));
        assert_eq!(exchange.metrics().snapshot().publishes, 0);
        assert_eq!(exchange.write_state(id).unwrap(), WriteState::Idle);
    }

    #[test]
    fn test_latest_value_rejects_oversized_type() {
        let (exchange, _producer, id) = counter_exchange(3);
        assert!(matches!(exchange.latest_value::<u64>(id), Err(RelayError::InvalidRequest { .. })));
        // The failed read still released its census entry.
        assert!(exchange.snapshot(id).unwrap().buffers.iter().all(|b| b.readers == 0));
    }
}
