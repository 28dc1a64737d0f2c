//! Producer copy plan for one control-loop state.
//!
//! The state-transition driver describes which byte ranges the producer will
//! write in the upcoming state; the exchange turns that into per-signal write
//! budgets (one partial write per range) before the state starts.

use std::collections::BTreeMap;

use crate::exchange::SignalId;

/// One producer copy: `len` bytes at `offset` inside a buffer of `signal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyRange {
    pub signal: SignalId,
    pub offset: usize,
    pub len: usize,
}

#[derive(Debug, Clone, Default)]
pub struct StatePlan {
    ranges: Vec<CopyRange>,
}

impl StatePlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_range(mut self, signal: SignalId, offset: usize, len: usize) -> Self {
        self.push(signal, offset, len);
        self
    }

    /// Whole-buffer write of `signal`.
    pub fn with_signal(self, signal: SignalId, byte_size: usize) -> Self {
        self.with_range(signal, 0, byte_size)
    }

    pub fn push(&mut self, signal: SignalId, offset: usize, len: usize) {
        self.ranges.push(CopyRange { signal, offset, len });
    }

    pub fn ranges(&self) -> &[CopyRange] {
        &self.ranges
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Number of copies per written signal.
    pub fn write_budgets(&self) -> BTreeMap<SignalId, u32> {
        let mut budgets = BTreeMap::new();
        for range in &self.ranges {
            *budgets.entry(range.signal).or_insert(0u32) += 1;
        }
        budgets
    }
}
