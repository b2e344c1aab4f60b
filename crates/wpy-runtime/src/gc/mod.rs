//! Garbage-collected heap.
//!
//! A non-moving mark/sweep allocator over a single [`MemoryRegion`]. The
//! region is divided into fixed-size blocks; an allocation table with one
//! entry per block records whether the block is free, the head of an
//! allocation, a continuation (tail) of one, or a head marked during a
//! collection.
//!
//! Marking is conservative: any word handed to [`GcHeap::collect_root`] that
//! points into an allocation keeps that allocation alive, and every word
//! inside a live allocation is scanned the same way. The heap never
//! interprets object layouts.
//!
//! Root enumeration is driven from outside through [`collect::gc_collect`].

pub mod collect;

use std::num::NonZeroUsize;

use thiserror::Error;
use tracing::debug;

use crate::memory::{MemoryRegion, WORD_BYTES};
use crate::wpy_assert;

/// Words per allocation block.
pub const WORDS_PER_BLOCK: usize = 4;
/// Bytes per allocation block.
pub const BYTES_PER_BLOCK: usize = WORDS_PER_BLOCK * WORD_BYTES;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HeapError {
    #[error("heap used before init")]
    NotInitialized,
    #[error("heap already initialized")]
    AlreadyInitialized,
    #[error("memory allocation failed, allocating {requested} bytes")]
    Exhausted { requested: usize },
    #[error("zero-sized allocation")]
    ZeroSized,
}

/// Allocation flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocFlags(u32);

impl AllocFlags {
    pub const NONE: AllocFlags = AllocFlags(0);
    /// The allocation owns resources that must be released when it is swept.
    pub const HAS_FINALISER: AllocFlags = AllocFlags(1);

    pub const fn from_bits(bits: u32) -> Self {
        AllocFlags(bits & Self::HAS_FINALISER.0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: AllocFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Reference to the head of a live heap allocation (its address).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GcRef(NonZeroUsize);

impl GcRef {
    #[inline]
    pub fn addr(self) -> usize {
        self.0.get()
    }

    #[inline]
    pub fn as_ptr(self) -> *mut u8 {
        self.0.get() as *mut u8
    }

    #[inline]
    pub(crate) fn from_addr(addr: usize) -> Option<GcRef> {
        NonZeroUsize::new(addr).map(GcRef)
    }
}

/// Heap statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcInfo {
    /// Pool size in bytes.
    pub total: usize,
    /// Bytes in allocated blocks.
    pub used: usize,
    /// Bytes in free blocks.
    pub free: usize,
    /// Longest run of free blocks.
    pub max_free_blocks: usize,
    /// Completed collection cycles.
    pub collections: u64,
    /// Swept allocations that carried [`AllocFlags::HAS_FINALISER`].
    pub finalisable_swept: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    Free,
    Head,
    Tail,
    /// Head reached during the current collection.
    Mark,
}

struct Pool {
    region: MemoryRegion,
    table: Vec<Block>,
    finaliser: Vec<bool>,
    /// Lowest block index that may be free.
    last_free: usize,
}

impl Pool {
    #[inline]
    fn block_addr(&self, block: usize) -> usize {
        self.region.base() + block * BYTES_PER_BLOCK
    }

    /// Block index of the allocation head at `addr`, if `addr` is one.
    #[inline]
    fn head_block(&self, addr: usize) -> Option<usize> {
        if !self.region.contains(addr) {
            return None;
        }
        let off = addr - self.region.base();
        if off % BYTES_PER_BLOCK != 0 {
            return None;
        }
        let block = off / BYTES_PER_BLOCK;
        match self.table.get(block)? {
            Block::Head | Block::Mark => Some(block),
            _ => None,
        }
    }

    /// Head block of the allocation containing `addr`, interior pointers included.
    fn owner_block(&self, addr: usize) -> Option<usize> {
        if !self.region.contains(addr) {
            return None;
        }
        let mut block = (addr - self.region.base()) / BYTES_PER_BLOCK;
        loop {
            match self.table.get(block)? {
                Block::Head | Block::Mark => return Some(block),
                Block::Free => return None,
                Block::Tail => block = block.checked_sub(1)?,
            }
        }
    }

    /// Number of blocks in the allocation starting at `head`.
    fn extent(&self, head: usize) -> usize {
        let mut n = 1;
        while head + n < self.table.len() && self.table[head + n] == Block::Tail {
            n += 1;
        }
        n
    }
}

/// The garbage-collected heap.
///
/// Created empty; [`GcHeap::init`] hands it the region it manages. Every
/// allocation attempted before that fails with [`HeapError::NotInitialized`].
pub struct GcHeap {
    pool: Option<Pool>,
    /// Heads marked but not yet scanned.
    mark_stack: Vec<usize>,
    collecting: bool,
    collections: u64,
    finalisable_swept: u64,
}

impl GcHeap {
    pub fn new() -> Self {
        Self {
            pool: None,
            mark_stack: Vec::new(),
            collecting: false,
            collections: 0,
            finalisable_swept: 0,
        }
    }

    /// Take ownership of `region` as the allocation pool.
    pub fn init(&mut self, region: MemoryRegion) -> Result<(), HeapError> {
        if self.pool.is_some() {
            return Err(HeapError::AlreadyInitialized);
        }
        let blocks = region.len_words() / WORDS_PER_BLOCK;
        debug!(base = format_args!("{:#x}", region.base()), blocks, "gc heap initialized");
        self.pool = Some(Pool {
            region,
            table: vec![Block::Free; blocks],
            finaliser: vec![false; blocks],
            last_free: 0,
        });
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.pool.is_some()
    }

    /// First address of the pool, 0 before init. Blocks are laid out from here.
    pub fn base(&self) -> usize {
        self.pool.as_ref().map_or(0, |p| p.region.base())
    }

    /// Allocate `n_bytes` of zeroed memory.
    ///
    /// Never collects; callers that can enumerate roots retry after a
    /// collection on [`HeapError::Exhausted`].
    pub fn alloc(&mut self, n_bytes: usize, flags: AllocFlags) -> Result<GcRef, HeapError> {
        let pool = self.pool.as_mut().ok_or(HeapError::NotInitialized)?;
        if n_bytes == 0 {
            return Err(HeapError::ZeroSized);
        }
        let n_blocks = (n_bytes + BYTES_PER_BLOCK - 1) / BYTES_PER_BLOCK;

        // first fit, starting from the lowest possibly-free block
        let mut run = 0;
        let mut start = None;
        for i in pool.last_free..pool.table.len() {
            if pool.table[i] == Block::Free {
                run += 1;
                if run == n_blocks {
                    start = Some(i + 1 - n_blocks);
                    break;
                }
            } else {
                run = 0;
            }
        }
        let start = start.ok_or(HeapError::Exhausted { requested: n_bytes })?;
        let end = start + n_blocks;

        if start == pool.last_free {
            pool.last_free = end;
        }
        pool.table[start] = Block::Head;
        for b in &mut pool.table[start + 1..end] {
            *b = Block::Tail;
        }
        pool.finaliser[start] = flags.contains(AllocFlags::HAS_FINALISER);
        pool.region.words_mut()[start * WORDS_PER_BLOCK..end * WORDS_PER_BLOCK].fill(0);

        // a head allocated mid-collection must survive the sweep
        if self.collecting {
            pool.table[start] = Block::Mark;
        }

        GcRef::from_addr(pool.block_addr(start)).ok_or(HeapError::Exhausted { requested: n_bytes })
    }

    /// Release an allocation immediately.
    pub fn free(&mut self, r: GcRef) {
        let Some(pool) = self.pool.as_mut() else { return };
        let Some(head) = pool.head_block(r.addr()) else { return };
        let n = pool.extent(head);
        for b in &mut pool.table[head..head + n] {
            *b = Block::Free;
        }
        pool.finaliser[head] = false;
        pool.last_free = pool.last_free.min(head);
    }

    /// Whether `addr` is the head of a live allocation.
    pub fn is_live(&self, addr: usize) -> bool {
        self.pool.as_ref().and_then(|p| p.head_block(addr)).is_some()
    }

    /// Size in bytes of the allocation at `r`.
    pub fn alloc_size(&self, r: GcRef) -> usize {
        self.words(r).len() * WORD_BYTES
    }

    /// Words of the allocation at `r`.
    ///
    /// A reference that is not a live allocation head means the object graph
    /// is corrupt; that takes the fatal path.
    pub fn words(&self, r: GcRef) -> &[usize] {
        let (start, end) = self.word_range(r);
        match &self.pool {
            Some(pool) => &pool.region.words()[start..end],
            None => crate::fatal::fatal_error("heap access before init"),
        }
    }

    pub fn words_mut(&mut self, r: GcRef) -> &mut [usize] {
        let (start, end) = self.word_range(r);
        match &mut self.pool {
            Some(pool) => &mut pool.region.words_mut()[start..end],
            None => crate::fatal::fatal_error("heap access before init"),
        }
    }

    fn word_range(&self, r: GcRef) -> (usize, usize) {
        let Some(pool) = &self.pool else {
            crate::fatal::fatal_error("heap access before init");
        };
        let Some(head) = pool.head_block(r.addr()) else {
            crate::fatal::fatal_error(&format!("invalid heap reference {:#x}", r.addr()));
        };
        let n = pool.extent(head);
        (head * WORDS_PER_BLOCK, (head + n) * WORDS_PER_BLOCK)
    }

    // =========================================================================
    // Collection
    // =========================================================================

    /// Begin a collection cycle.
    pub fn collect_start(&mut self) {
        wpy_assert!(!self.collecting);
        self.collecting = true;
        self.mark_stack.clear();
    }

    /// Conservatively mark everything reachable from `words`.
    pub fn collect_root(&mut self, words: &[usize]) {
        if self.pool.is_none() {
            return;
        }
        for &w in words {
            self.mark_word(w);
        }
        self.drain_mark_stack();
    }

    /// Sweep unmarked allocations and end the cycle.
    pub fn collect_end(&mut self) {
        let Some(pool) = self.pool.as_mut() else {
            self.collecting = false;
            return;
        };
        let mut freeing = false;
        let mut freed = 0usize;
        for i in 0..pool.table.len() {
            match pool.table[i] {
                Block::Head => {
                    freeing = true;
                    freed += 1;
                    if pool.finaliser[i] {
                        pool.finaliser[i] = false;
                        self.finalisable_swept += 1;
                    }
                    pool.table[i] = Block::Free;
                }
                Block::Tail if freeing => pool.table[i] = Block::Free,
                Block::Tail => {}
                Block::Mark => {
                    freeing = false;
                    pool.table[i] = Block::Head;
                }
                Block::Free => freeing = false,
            }
        }
        pool.last_free = 0;
        self.collecting = false;
        self.collections += 1;
        debug!(freed, collections = self.collections, "gc sweep finished");
    }

    fn mark_word(&mut self, w: usize) {
        let Some(pool) = self.pool.as_mut() else { return };
        if let Some(block) = pool.owner_block(w) {
            if pool.table[block] == Block::Head {
                pool.table[block] = Block::Mark;
                self.mark_stack.push(block);
            }
        }
    }

    fn drain_mark_stack(&mut self) {
        while let Some(head) = self.mark_stack.pop() {
            let (start, end) = match &self.pool {
                Some(pool) => {
                    let n = pool.extent(head);
                    (head * WORDS_PER_BLOCK, (head + n) * WORDS_PER_BLOCK)
                }
                None => return,
            };
            for i in start..end {
                let w = match &self.pool {
                    Some(pool) => pool.region.words()[i],
                    None => return,
                };
                self.mark_word(w);
            }
        }
    }

    pub fn info(&self) -> GcInfo {
        let mut info = GcInfo {
            collections: self.collections,
            finalisable_swept: self.finalisable_swept,
            ..GcInfo::default()
        };
        let Some(pool) = &self.pool else { return info };
        info.total = pool.table.len() * BYTES_PER_BLOCK;
        let mut run = 0;
        for b in &pool.table {
            if *b == Block::Free {
                info.free += BYTES_PER_BLOCK;
                run += 1;
                info.max_free_blocks = info.max_free_blocks.max(run);
            } else {
                info.used += BYTES_PER_BLOCK;
                run = 0;
            }
        }
        info
    }
}

impl Default for GcHeap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heap(blocks: usize) -> GcHeap {
        let mut heap = GcHeap::new();
        heap.init(MemoryRegion::acquire_words(blocks * WORDS_PER_BLOCK).unwrap()).unwrap();
        heap
    }

    #[test]
    fn test_alloc_before_init_fails() {
        let mut heap = GcHeap::new();
        assert_eq!(heap.alloc(16, AllocFlags::NONE), Err(HeapError::NotInitialized));
        assert!(!heap.is_initialized());
        assert_eq!(heap.info().total, 0);
    }

    #[test]
    fn test_init_twice_rejected() {
        let mut heap = heap(4);
        let region = MemoryRegion::acquire_words(8).unwrap();
        assert_eq!(heap.init(region), Err(HeapError::AlreadyInitialized));
    }

    #[test]
    fn test_alloc_is_zeroed_and_block_aligned() {
        let mut heap = heap(8);
        let a = heap.alloc(1, AllocFlags::NONE).unwrap();
        heap.words_mut(a)[0] = 0xdead;
        heap.free(a);
        let b = heap.alloc(BYTES_PER_BLOCK + 1, AllocFlags::NONE).unwrap();
        assert_eq!(a, b);
        assert_eq!(heap.alloc_size(b), 2 * BYTES_PER_BLOCK);
        assert!(heap.words(b).iter().all(|&w| w == 0));
        assert_eq!((b.addr() - heap.base()) % BYTES_PER_BLOCK, 0);
        let c = heap.alloc(1, AllocFlags::NONE).unwrap();
        assert_eq!(c.addr() - heap.base(), 2 * BYTES_PER_BLOCK);
    }

    #[test]
    fn test_zero_sized() {
        let mut heap = heap(2);
        assert_eq!(heap.alloc(0, AllocFlags::NONE), Err(HeapError::ZeroSized));
    }

    #[test]
    fn test_exhaustion() {
        let mut heap = heap(4);
        heap.alloc(3 * BYTES_PER_BLOCK, AllocFlags::NONE).unwrap();
        assert_eq!(
            heap.alloc(2 * BYTES_PER_BLOCK, AllocFlags::NONE),
            Err(HeapError::Exhausted { requested: 2 * BYTES_PER_BLOCK })
        );
        assert!(heap.alloc(BYTES_PER_BLOCK, AllocFlags::NONE).is_ok());
    }

    #[test]
    fn test_collect_keeps_reachable_frees_rest() {
        let mut heap = heap(16);
        let root = heap.alloc(BYTES_PER_BLOCK, AllocFlags::NONE).unwrap();
        let child = heap.alloc(2 * BYTES_PER_BLOCK, AllocFlags::NONE).unwrap();
        let grandchild = heap.alloc(BYTES_PER_BLOCK, AllocFlags::NONE).unwrap();
        let garbage = heap.alloc(BYTES_PER_BLOCK, AllocFlags::HAS_FINALISER).unwrap();
        heap.words_mut(root)[1] = child.addr();
        // reference from the last word of a multi-block allocation
        heap.words_mut(child)[2 * WORDS_PER_BLOCK - 1] = grandchild.addr();

        heap.collect_start();
        heap.collect_root(&[root.addr()]);
        heap.collect_end();

        assert!(heap.is_live(root.addr()));
        assert!(heap.is_live(child.addr()));
        assert!(heap.is_live(grandchild.addr()));
        assert!(!heap.is_live(garbage.addr()));
        let info = heap.info();
        assert_eq!(info.collections, 1);
        assert_eq!(info.finalisable_swept, 1);
        assert_eq!(info.used, 4 * BYTES_PER_BLOCK);
    }

    #[test]
    fn test_interior_pointer_keeps_allocation() {
        let mut heap = heap(8);
        let a = heap.alloc(2 * BYTES_PER_BLOCK, AllocFlags::NONE).unwrap();
        let b = heap.alloc(BYTES_PER_BLOCK, AllocFlags::NONE).unwrap();
        heap.collect_start();
        heap.collect_root(&[a.addr() + BYTES_PER_BLOCK + 3]);
        heap.collect_end();
        assert!(heap.is_live(a.addr()));
        assert!(!heap.is_live(b.addr()));
    }

    #[test]
    fn test_foreign_words_ignored() {
        let mut heap = heap(8);
        let a = heap.alloc(BYTES_PER_BLOCK, AllocFlags::NONE).unwrap();
        let base = a.addr();
        heap.collect_start();
        heap.collect_root(&[0, 1, usize::MAX, base + 4 * BYTES_PER_BLOCK]);
        heap.collect_end();
        assert!(!heap.is_live(base));
    }

    #[test]
    fn test_cycles_terminate() {
        let mut heap = heap(8);
        let a = heap.alloc(BYTES_PER_BLOCK, AllocFlags::NONE).unwrap();
        let b = heap.alloc(BYTES_PER_BLOCK, AllocFlags::NONE).unwrap();
        heap.words_mut(a)[0] = b.addr();
        heap.words_mut(b)[0] = a.addr();
        heap.collect_start();
        heap.collect_root(&[a.addr()]);
        heap.collect_end();
        assert!(heap.is_live(a.addr()) && heap.is_live(b.addr()));
    }

    #[test]
    fn test_info_tracks_free_runs() {
        let mut heap = heap(8);
        let a = heap.alloc(BYTES_PER_BLOCK, AllocFlags::NONE).unwrap();
        let _b = heap.alloc(BYTES_PER_BLOCK, AllocFlags::NONE).unwrap();
        heap.free(a);
        let info = heap.info();
        assert_eq!(info.total, 8 * BYTES_PER_BLOCK);
        assert_eq!(info.used, BYTES_PER_BLOCK);
        assert_eq!(info.max_free_blocks, 6);
    }
}
