//! Point-in-time view of a signal's buffers, for diagnostics.
//!
//! Fields are loaded one by one without locking, so a snapshot taken while
//! producer and consumers run is only approximately consistent.

use crate::exchange::write_session::WriteState;
use crate::exchange::SignalId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferSnapshot {
    pub index: usize,
    pub offset: usize,
    pub freshness: u32,
    pub readers: u32,
    pub locked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalSnapshot {
    pub signal: SignalId,
    pub global_freshness: u32,
    pub write_state: WriteState,
    pub write_budget: u32,
    pub pending_writes: u32,
    pub buffers: Vec<BufferSnapshot>,
}

impl SignalSnapshot {
    /// Buffer a reader would pick if nothing were locked.
    pub fn freshest(&self) -> Option<&BufferSnapshot> {
        self.buffers.iter().rev().max_by_key(|b| b.freshness)
    }

    pub fn total_readers(&self) -> u32 {
        self.buffers.iter().map(|b| b.readers).sum()
    }
}

impl std::fmt::Display for SignalSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} global={} state={:?} [", self.signal, self.global_freshness, self.write_state)?;
        for (i, b) in self.buffers.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}:{}/{}{}", b.index, b.freshness, b.readers, if b.locked { "L" } else { "" })?;
        }
        write!(f, "]")
    }
}
