//! Per-buffer slot lock.
//!
//! A raw mutex rather than a guard-based one: the producer takes the lock in
//! `acquire_for_write` and gives it back in `release_write`, possibly several
//! calls later.

use std::time::Duration;

use parking_lot::lock_api::{ RawMutex as _, RawMutexTimed as _ };
use parking_lot::RawMutex;

/// Bound on a blocking lock acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockTimeout {
    /// Wait until the lock is free.
    Infinite,
    /// Give up after this many milliseconds.
    Millis(u64),
}

impl LockTimeout {
    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Self::Infinite => None,
            Self::Millis(ms) => Some(Duration::from_millis(*ms)),
        }
    }
}

pub struct SlotLock {
    raw: RawMutex,
}

impl SlotLock {
    pub const fn new() -> Self {
        Self { raw: RawMutex::INIT }
    }

    /// Non-blocking acquire.
    #[inline]
    pub fn try_lock(&self) -> bool {
        self.raw.try_lock()
    }

    /// Blocking acquire bounded by `timeout`. Returns false on timeout.
    pub fn lock_timeout(&self, timeout: LockTimeout) -> bool {
        match timeout.as_duration() {
            None => {
                self.raw.lock();
                true
            }
            Some(duration) => self.raw.try_lock_for(duration),
        }
    }

    /// # Safety: the lock must be held, by this or any other context
    #[inline]
    pub unsafe fn unlock(&self) {
        self.raw.unlock();
    }

    pub fn is_locked(&self) -> bool {
        self.raw.is_locked()
    }
}

impl Default for SlotLock {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SlotLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotLock").field("locked", &self.is_locked()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_try_lock_is_exclusive() {
        let lock = SlotLock::new();
        assert!(lock.try_lock());
        assert!(lock.is_locked());
        assert!(!lock.try_lock());
        unsafe { lock.unlock() };
        assert!(!lock.is_locked());
        assert!(lock.try_lock());
        unsafe { lock.unlock() };
    }

    #[test]
    fn test_lock_timeout_expires() {
        let lock = SlotLock::new();
        assert!(lock.try_lock());

        let start = Instant::now();
        assert!(!lock.lock_timeout(LockTimeout::Millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));

        unsafe { lock.unlock() };
        assert!(lock.lock_timeout(LockTimeout::Millis(20)));
        unsafe { lock.unlock() };
    }

    #[test]
    fn test_unlock_from_other_thread() {
        let lock = Arc::new(SlotLock::new());
        assert!(lock.try_lock());

        let remote = lock.clone();
        thread::spawn(move || unsafe { remote.unlock() }).join().unwrap();

        assert!(lock.lock_timeout(LockTimeout::Infinite));
        unsafe { lock.unlock() };
    }

    #[test]
    fn test_timeout_durations() {
        assert_eq!(LockTimeout::Infinite.as_duration(), None);
        assert_eq!(LockTimeout::Millis(5).as_duration(), Some(Duration::from_millis(5)));
    }
}
