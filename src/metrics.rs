//! Metrics for relay exchanges.
//!
//! Lightweight counters for observability

use std::sync::atomic::{ AtomicU64, Ordering };

/// Per-exchange counters
pub struct Metrics {
    pub reads: AtomicU64,
    pub writes: AtomicU64,
    pub publishes: AtomicU64,
    pub bytes_read: AtomicU64,
    pub bytes_written: AtomicU64,
    pub read_busy: AtomicU64,
    pub write_busy: AtomicU64,
    pub renormalizations: AtomicU64,
    pub lock_timeouts: AtomicU64,
    pub restarted_writes: AtomicU64,
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            publishes: AtomicU64::new(0),
            bytes_read: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            read_busy: AtomicU64::new(0),
            write_busy: AtomicU64::new(0),
            renormalizations: AtomicU64::new(0),
            lock_timeouts: AtomicU64::new(0),
            restarted_writes: AtomicU64::new(0),
        }
    }

    /// A completed read copy.
    #[inline]
    pub fn record_read(&self, bytes: u64) {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
    }

    /// A completed partial write copy.
    #[inline]
    pub fn record_write(&self, bytes: u64) {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_publish(&self) {
        self.publishes.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_read_busy(&self) {
        self.read_busy.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_write_busy(&self) {
        self.write_busy.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_renormalization(&self, timeouts: u64) {
        self.renormalizations.fetch_add(1, Ordering::Relaxed);
        self.lock_timeouts.fetch_add(timeouts, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_restarted_write(&self) {
        self.restarted_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            publishes: self.publishes.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            read_busy: self.read_busy.load(Ordering::Relaxed),
            write_busy: self.write_busy.load(Ordering::Relaxed),
            renormalizations: self.renormalizations.load(Ordering::Relaxed),
            lock_timeouts: self.lock_timeouts.load(Ordering::Relaxed),
            restarted_writes: self.restarted_writes.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.reads.store(0, Ordering::Relaxed);
        self.writes.store(0, Ordering::Relaxed);
        self.publishes.store(0, Ordering::Relaxed);
        self.bytes_read.store(0, Ordering::Relaxed);
        self.bytes_written.store(0, Ordering::Relaxed);
        self.read_busy.store(0, Ordering::Relaxed);
        self.write_busy.store(0, Ordering::Relaxed);
        self.renormalizations.store(0, Ordering::Relaxed);
        self.lock_timeouts.store(0, Ordering::Relaxed);
        self.restarted_writes.store(0, Ordering::Relaxed);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Metrics({})", self.snapshot())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub reads: u64,
    pub writes: u64,
    pub publishes: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub read_busy: u64,
    pub write_busy: u64,
    pub renormalizations: u64,
    pub lock_timeouts: u64,
    pub restarted_writes: u64,
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "rd={} wr={} pub={} bytes_rd={} bytes_wr={} rd_busy={} wr_busy={} renorm={} timeouts={} restarted={}",
            self.reads,
            self.writes,
            self.publishes,
            self.bytes_read,
            self.bytes_written,
            self.read_busy,
            self.write_busy,
            self.renormalizations,
            self.lock_timeouts,
            self.restarted_writes
        )
    }
}
