//! Fixed-size staging buffer shared with the host.
//!
//! The host writes source text into linear memory at
//! [`ScratchBuffer::as_mut_ptr`] and then asks the runtime to run `len`
//! bytes of it. Every read is bounds-checked against the capacity.

use std::cell::UnsafeCell;

use thiserror::Error;

pub const SCRATCH_SIZE: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScratchError {
    #[error("scratch buffer overflow: {len} bytes exceeds capacity {capacity}")]
    Overflow { len: usize, capacity: usize },
}

pub struct ScratchBuffer(UnsafeCell<[u8; SCRATCH_SIZE]>);

// SAFETY: the embedding is single-threaded; the host only writes between calls.
unsafe impl Sync for ScratchBuffer {}

/// The buffer exposed through `wpy_warehouse_addr`.
pub static WAREHOUSE: ScratchBuffer = ScratchBuffer::new();

impl ScratchBuffer {
    pub const fn new() -> Self {
        Self(UnsafeCell::new([0; SCRATCH_SIZE]))
    }

    pub const fn capacity(&self) -> usize {
        SCRATCH_SIZE
    }

    pub fn as_mut_ptr(&self) -> *mut u8 {
        self.0.get().cast()
    }

    fn check(&self, len: usize) -> Result<(), ScratchError> {
        if len > SCRATCH_SIZE {
            return Err(ScratchError::Overflow { len, capacity: SCRATCH_SIZE });
        }
        Ok(())
    }

    /// Stage `bytes`, as the host would.
    pub fn write(&self, bytes: &[u8]) -> Result<(), ScratchError> {
        self.check(bytes.len())?;
        // SAFETY: single-threaded, and no reference into the buffer outlives a call
        unsafe { (&mut *self.0.get())[..bytes.len()].copy_from_slice(bytes) };
        Ok(())
    }

    /// Copy the first `len` staged bytes out as source text.
    ///
    /// Text stops early at a NUL byte; invalid UTF-8 is replaced.
    pub fn read_source(&self, len: usize) -> Result<String, ScratchError> {
        self.check(len)?;
        // SAFETY: as in `write`
        let bytes = unsafe { &(&*self.0.get())[..len] };
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(len);
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }
}

impl Default for ScratchBuffer {
    fn default() -> Self {
        Self::new()
    }
}
