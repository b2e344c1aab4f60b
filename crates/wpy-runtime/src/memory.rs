//! Memory region provider.
//!
//! Regions are acquired once at boot and held for the process lifetime. They
//! are word-aligned so conservative root scanning can treat any word as a
//! potential heap reference.

use thiserror::Error;

pub const WORD_BYTES: usize = core::mem::size_of::<usize>();

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegionError {
    #[error("host allocator cannot provide {requested} bytes")]
    OutOfMemory { requested: usize },
    #[error("region of {requested} bytes is smaller than one word")]
    TooSmall { requested: usize },
}

/// A contiguous, word-aligned range of zeroed memory.
pub struct MemoryRegion {
    words: Box<[usize]>,
}

impl MemoryRegion {
    /// Acquire `bytes` (rounded down to whole words) from the host allocator.
    pub fn acquire(bytes: usize) -> Result<Self, RegionError> {
        Self::acquire_words(bytes / WORD_BYTES).map_err(|e| match e {
            RegionError::OutOfMemory { .. } => RegionError::OutOfMemory { requested: bytes },
            RegionError::TooSmall { .. } => RegionError::TooSmall { requested: bytes },
        })
    }

    /// Acquire `count` words from the host allocator.
    pub fn acquire_words(count: usize) -> Result<Self, RegionError> {
        if count == 0 {
            return Err(RegionError::TooSmall { requested: 0 });
        }
        let mut words: Vec<usize> = Vec::new();
        words
            .try_reserve_exact(count)
            .map_err(|_| RegionError::OutOfMemory { requested: count * WORD_BYTES })?;
        words.resize(count, 0);
        Ok(Self { words: words.into_boxed_slice() })
    }

    /// Address of the first byte.
    #[inline]
    pub fn base(&self) -> usize {
        self.words.as_ptr() as usize
    }

    #[inline]
    pub fn len_bytes(&self) -> usize {
        self.words.len() * WORD_BYTES
    }

    #[inline]
    pub fn len_words(&self) -> usize {
        self.words.len()
    }

    /// Whether `addr` falls inside the region.
    #[inline]
    pub fn contains(&self, addr: usize) -> bool {
        addr >= self.base() && addr < self.base() + self.len_bytes()
    }

    #[inline]
    pub fn words(&self) -> &[usize] {
        &self.words
    }

    #[inline]
    pub fn words_mut(&mut self) -> &mut [usize] {
        &mut self.words
    }
}

impl std::fmt::Debug for MemoryRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRegion")
            .field("base", &format_args!("{:#x}", self.base()))
            .field("length", &self.len_bytes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_rounds_to_words() {
        let region = MemoryRegion::acquire(WORD_BYTES * 10 + 3).unwrap();
        assert_eq!(region.len_words(), 10);
        assert_eq!(region.len_bytes(), WORD_BYTES * 10);
        assert_eq!(region.base() % WORD_BYTES, 0);
        assert!(region.words().iter().all(|&w| w == 0));
    }

    #[test]
    fn test_contains() {
        let region = MemoryRegion::acquire_words(4).unwrap();
        assert!(region.contains(region.base()));
        assert!(region.contains(region.base() + 4 * WORD_BYTES - 1));
        assert!(!region.contains(region.base() + 4 * WORD_BYTES));
        assert!(!region.contains(0));
    }

    #[test]
    fn test_too_small() {
        assert_eq!(
            MemoryRegion::acquire(WORD_BYTES - 1).unwrap_err(),
            RegionError::TooSmall { requested: WORD_BYTES - 1 }
        );
    }

    #[test]
    fn test_unsatisfiable_request() {
        let err = MemoryRegion::acquire_words(usize::MAX / WORD_BYTES).unwrap_err();
        assert!(matches!(err, RegionError::OutOfMemory { .. }));
    }
}
