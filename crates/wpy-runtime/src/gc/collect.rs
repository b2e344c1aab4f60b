//! Collection trigger.
//!
//! Roots are enumerated in a fixed order: the runtime's own root pointers
//! (inside `collect_start`), the native call stack from the current stack
//! pointer up to the recorded top, then a snapshot of callee-saved
//! registers, then the sweep.

use crate::memory::WORD_BYTES;

/// Receives roots during a collection cycle.
pub trait Collector {
    /// Begin a cycle and mark the runtime's registered roots.
    fn collect_start(&mut self);
    /// Conservatively mark a range of candidate words.
    fn collect_root(&mut self, words: &[usize]);
    /// Sweep and finish the cycle.
    fn collect_end(&mut self);
}

/// Source of machine-level roots.
pub trait RootScanner {
    /// Feed every word of the live native stack to `sink`.
    fn scan_stack(&self, sink: &mut dyn FnMut(&[usize]));
    /// Callee-saved registers that may hold the only copy of a reference.
    fn registers(&self) -> Registers;
}

/// Run one full collection.
pub fn gc_collect<C: Collector + ?Sized, S: RootScanner + ?Sized>(collector: &mut C, scanner: &S) {
    collector.collect_start();
    scanner.scan_stack(&mut |words| collector.collect_root(words));
    let regs = scanner.registers();
    collector.collect_root(regs.as_slice());
    collector.collect_end();
}

/// Snapshot of callee-saved registers.
#[derive(Debug, Clone, Copy, Default)]
pub struct Registers {
    words: [usize; Registers::CAPACITY],
    len: usize,
}

impl Registers {
    pub const CAPACITY: usize = 16;

    pub fn push(&mut self, w: usize) {
        if self.len < Self::CAPACITY {
            self.words[self.len] = w;
            self.len += 1;
        }
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.words[..self.len]
    }
}

/// Capture callee-saved registers on the current target.
pub trait RegisterSnapshot {
    fn snapshot() -> Registers;
}

/// Register capture for the build target.
pub struct HostRegisters;

#[cfg(target_arch = "x86_64")]
impl RegisterSnapshot for HostRegisters {
    #[inline(never)]
    fn snapshot() -> Registers {
        let mut regs = Registers::default();
        let (rbx, rbp, r12, r13, r14, r15): (usize, usize, usize, usize, usize, usize);
        // rbx and rbp are reserved by the compiler and read through scratch
        // registers; one block keeps those away from r12-r15.
        // SAFETY: plain register reads with no memory or flag effects.
        unsafe {
            core::arch::asm!(
                "mov {rbx}, rbx",
                "mov {rbp}, rbp",
                rbx = out(reg) rbx,
                rbp = out(reg) rbp,
                out("r12") r12,
                out("r13") r13,
                out("r14") r14,
                out("r15") r15,
                options(nomem, nostack, preserves_flags),
            );
        }
        for w in [rbx, rbp, r12, r13, r14, r15] {
            regs.push(w);
        }
        regs
    }
}

#[cfg(target_arch = "aarch64")]
impl RegisterSnapshot for HostRegisters {
    #[inline(never)]
    fn snapshot() -> Registers {
        let mut regs = Registers::default();
        let (x19, x20, x21, x22, x23, x24, x25, x26, x27, x28): (
            usize,
            usize,
            usize,
            usize,
            usize,
            usize,
            usize,
            usize,
            usize,
            usize,
        );
        // x19 is reserved by the compiler and read through a scratch register.
        // SAFETY: plain register reads with no memory or flag effects.
        unsafe {
            core::arch::asm!(
                "mov {x19}, x19",
                x19 = out(reg) x19,
                out("x20") x20,
                out("x21") x21,
                out("x22") x22,
                out("x23") x23,
                out("x24") x24,
                out("x25") x25,
                out("x26") x26,
                out("x27") x27,
                out("x28") x28,
                options(nomem, nostack, preserves_flags),
            );
        }
        for w in [x19, x20, x21, x22, x23, x24, x25, x26, x27, x28] {
            regs.push(w);
        }
        regs
    }
}

// wasm32 locals live outside linear memory and cannot be read. Native code
// keeps intermediates reachable with `Runtime::with_temp_root` or frame slots.
#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
impl RegisterSnapshot for HostRegisters {
    fn snapshot() -> Registers {
        Registers::default()
    }
}

/// The native call stack between the current stack pointer and `top`.
pub struct NativeStack {
    top: usize,
}

impl NativeStack {
    /// `top` is the highest stack address to scan (the recorded stack top).
    pub fn new(top: usize) -> Self {
        Self { top }
    }
}

/// Scan chunk size in words.
const SCAN_CHUNK: usize = 64;

impl RootScanner for NativeStack {
    #[inline(never)]
    fn scan_stack(&self, sink: &mut dyn FnMut(&[usize])) {
        let marker = 0usize;
        let sp = core::ptr::addr_of!(marker) as usize;
        let sp = sp & !(WORD_BYTES - 1);
        if self.top <= sp {
            return;
        }
        let mut chunk = [0usize; SCAN_CHUNK];
        let mut addr = sp;
        while addr < self.top {
            let n = ((self.top - addr) / WORD_BYTES).min(SCAN_CHUNK);
            if n == 0 {
                break;
            }
            for (i, slot) in chunk.iter_mut().take(n).enumerate() {
                // SAFETY: [sp, top) is this thread's live stack, word aligned.
                *slot = unsafe { core::ptr::read_volatile((addr + i * WORD_BYTES) as *const usize) };
            }
            sink(&chunk[..n]);
            addr += n * WORD_BYTES;
        }
    }

    fn registers(&self) -> Registers {
        HostRegisters::snapshot()
    }
}
