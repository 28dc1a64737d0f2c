//! Buffer selection.
//!
//! Readers take the freshest buffer they can lock, writers the oldest buffer
//! nobody is reading. Each walk visits every buffer at most once, tracked in
//! a u64 mask, so both are bounded by N try-locks and never wait.

use crate::exchange::buffer_slot::BufferSlot;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TriedMask(u64);

impl TriedMask {
    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        self.0 & (1u64 << index) != 0
    }

    #[inline]
    pub fn insert(&mut self, index: usize) {
        self.0 |= 1u64 << index;
    }
}

/// Untried buffer with the highest tag; ties go to the lowest index.
fn freshest_untried(slots: &[BufferSlot], tried: TriedMask) -> Option<usize> {
    let mut best: Option<(usize, u32)> = None;
    for (i, slot) in slots.iter().enumerate() {
        if tried.contains(i) {
            continue;
        }
        let tag = slot.freshness();
        match best {
            Some((_, best_tag)) if tag <= best_tag => {}
            _ => best = Some((i, tag)),
        }
    }
    best.map(|(i, _)| i)
}

/// Untried buffer with the lowest tag; ties go to the lowest index.
fn oldest_untried(slots: &[BufferSlot], tried: TriedMask) -> Option<usize> {
    let mut best: Option<(usize, u32)> = None;
    for (i, slot) in slots.iter().enumerate() {
        if tried.contains(i) {
            continue;
        }
        let tag = slot.freshness();
        match best {
            Some((_, best_tag)) if tag >= best_tag => {}
            _ => best = Some((i, tag)),
        }
    }
    best.map(|(i, _)| i)
}

/// Pick a buffer to read and register the reader in its census.
///
/// The slot lock is held only around the census increment; the copy itself
/// is protected by the census keeping writers away.
pub fn select_for_read(slots: &[BufferSlot]) -> Option<usize> {
    let mut tried = TriedMask::default();

    for _ in 0..slots.len() {
        let index = freshest_untried(slots, tried)?;
        tried.insert(index);

        let slot = &slots[index];
        if !slot.lock.try_lock() {
            continue;
        }
        slot.census.enter();
        // SAFETY: taken just above
        unsafe { slot.lock.unlock() };
        return Some(index);
    }

    None
}

/// Pick a buffer to overwrite. On success its slot lock stays held until
/// the write is published or the signal is dropped.
pub fn select_for_write(slots: &[BufferSlot]) -> Option<usize> {
    let mut tried = TriedMask::default();

    for _ in 0..slots.len() {
        let index = oldest_untried(slots, tried)?;
        tried.insert(index);

        let slot = &slots[index];
        if !slot.lock.try_lock() {
            continue;
        }
        if !slot.census.is_idle() {
            // SAFETY: taken just above
            unsafe { slot.lock.unlock() };
            continue;
        }
        return Some(index);
    }

    None
}
