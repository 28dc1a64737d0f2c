//! Backing memory for a signal's N buffers, allocated once.

use std::cell::UnsafeCell;

pub struct Storage {
    bytes: Box<[UnsafeCell<u8>]>,
}

// SAFETY: concurrent access is arbitrated by the slot locks and reader census:
// a buffer is written only by the producer holding its lock with no readers.
unsafe impl Sync for Storage {}
unsafe impl Send for Storage {}

impl Storage {
    pub fn zeroed(len: usize) -> Self {
        let bytes = (0..len).map(|_| UnsafeCell::new(0u8)).collect::<Vec<_>>().into_boxed_slice();
        Self { bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Base address for copy engines that translate offsets themselves.
    pub fn base_ptr(&self) -> *mut u8 {
        UnsafeCell::raw_get(self.bytes.as_ptr())
    }

    /// # Safety: `offset..offset + len` in bounds; no concurrent writer of that range
    pub unsafe fn slice(&self, offset: usize, len: usize) -> &[u8] {
        debug_assert!(offset + len <= self.len());
        std::slice::from_raw_parts(self.base_ptr().add(offset), len)
    }

    /// # Safety: `offset..offset + src.len()` in bounds; caller has exclusive write access
    pub unsafe fn write(&self, offset: usize, src: &[u8]) {
        debug_assert!(offset + src.len() <= self.len());
        std::ptr::copy_nonoverlapping(src.as_ptr(), self.base_ptr().add(offset), src.len());
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage").field("len", &self.len()).finish()
    }
}
