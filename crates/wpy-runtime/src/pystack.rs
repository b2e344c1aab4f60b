//! Auxiliary interpreter stack.
//!
//! A fixed-capacity region of value-sized slots. Interpreter frames are
//! carved from it in strict LIFO order so frame storage never touches the
//! garbage-collected heap. The used prefix is scanned as a GC root.

use thiserror::Error;

use crate::memory::{MemoryRegion, RegionError};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PyStackError {
    #[error("pystack exhausted")]
    Exhausted { requested: usize, available: usize },
    #[error(transparent)]
    Region(#[from] RegionError),
}

/// Handle to a frame allocated on the pystack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PyFrame {
    pub(crate) offset: usize,
    pub(crate) len: usize,
}

impl PyFrame {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

pub struct PyStack {
    region: MemoryRegion,
    cur: usize,
}

impl PyStack {
    pub fn new(slots: usize) -> Result<Self, PyStackError> {
        Ok(Self { region: MemoryRegion::acquire_words(slots)?, cur: 0 })
    }

    pub fn capacity(&self) -> usize {
        self.region.len_words()
    }

    /// Slots in use.
    pub fn used(&self) -> usize {
        self.cur
    }

    /// Reserve `n` zeroed slots on top of the stack.
    pub fn alloc(&mut self, n: usize) -> Result<PyFrame, PyStackError> {
        let available = self.capacity() - self.cur;
        if n > available {
            return Err(PyStackError::Exhausted { requested: n, available });
        }
        let offset = self.cur;
        self.cur += n;
        self.region.words_mut()[offset..self.cur].fill(0);
        Ok(PyFrame { offset, len: n })
    }

    /// Release `frame` and everything allocated after it.
    pub fn free(&mut self, frame: PyFrame) {
        crate::wpy_assert!(frame.offset + frame.len <= self.cur);
        self.cur = self.cur.min(frame.offset);
    }

    pub fn slots(&self, frame: PyFrame) -> &[usize] {
        &self.region.words()[frame.offset..frame.offset + frame.len]
    }

    pub fn slots_mut(&mut self, frame: PyFrame) -> &mut [usize] {
        &mut self.region.words_mut()[frame.offset..frame.offset + frame.len]
    }

    /// The used prefix, for root scanning.
    pub fn live(&self) -> &[usize] {
        &self.region.words()[..self.cur]
    }
}
