//! Runtime context and bootstrap.
//!
//! [`Runtime::boot`] brings the memory subsystem and global interpreter state
//! up in a fixed order; the returned context is then handed by `&mut` to the
//! harness, the frontend and every object operation. There is exactly one per
//! embedding and it is never torn down.

use tracing::{debug, info, warn};

use crate::builtins;
use crate::config::RuntimeConfig;
use crate::fatal::{fatal_error, nlr_jump_fail};
use crate::gc::collect::{self, Collector, NativeStack};
use crate::gc::{AllocFlags, GcHeap, GcInfo, GcRef, HeapError};
use crate::memory::{MemoryRegion, WORD_BYTES};
use crate::obj::{dict, exc, header, header_kind, ExcType, ObjKind, PyResult, Raised, Value};
use crate::output::Output;
use crate::pystack::{PyFrame, PyStack};
use crate::qstr::{Qstr, QstrPool};
use crate::stackctrl::StackCtrl;
use crate::vfs::{NoVfs, Vfs};

/// Heap references the collector always treats as live.
#[derive(Debug, Clone, Copy)]
struct RootPointers {
    builtins: Value,
    builtin_modules: Value,
    loaded_modules: Value,
    main_globals: Value,
    emergency_memory_error: Value,
    active_exception: Value,
}

impl RootPointers {
    const fn empty() -> Self {
        Self {
            builtins: Value::NULL,
            builtin_modules: Value::NULL,
            loaded_modules: Value::NULL,
            main_globals: Value::NULL,
            emergency_memory_error: Value::NULL,
            active_exception: Value::NULL,
        }
    }

    fn words(&self) -> [usize; 6] {
        [
            self.builtins.raw(),
            self.builtin_modules.raw(),
            self.loaded_modules.raw(),
            self.main_globals.raw(),
            self.emergency_memory_error.raw(),
            self.active_exception.raw(),
        ]
    }
}

/// Interpreter frame storage.
///
/// Lives on the pystack when one is configured, otherwise in a heap object
/// that stays rooted until the frame is freed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    Stack(PyFrame),
    Heap(GcRef),
}

pub struct Runtime {
    config: RuntimeConfig,
    heap: GcHeap,
    pystack: Option<PyStack>,
    qstrs: QstrPool,
    roots: RootPointers,
    heap_frames: Vec<GcRef>,
    temp_roots: Vec<usize>,
    vfs: Vfs,
    stack: StackCtrl,
    out: Output,
}

impl Runtime {
    /// Bring up the heap, pystack, global state and filesystem.
    ///
    /// Failures here have no capture boundary and end on the fatal path.
    pub fn boot(config: RuntimeConfig, out: Output) -> Runtime {
        info!(heap_size = config.heap_size, pystack_slots = config.pystack_slots, "booting runtime");

        let region = match MemoryRegion::acquire(config.heap_size) {
            Ok(region) => region,
            Err(e) => fatal_error(&format!("cannot allocate heap: {}", e)),
        };
        let mut heap = GcHeap::new();
        if let Err(e) = heap.init(region) {
            fatal_error(&e.to_string());
        }

        let pystack = if cfg!(feature = "pystack") {
            match PyStack::new(config.pystack_slots) {
                Ok(ps) => Some(ps),
                Err(e) => fatal_error(&format!("cannot allocate pystack: {}", e)),
            }
        } else {
            None
        };

        let limit = config.stack_limit;
        let mut rt = Runtime {
            stack: StackCtrl::unset(limit),
            config,
            heap,
            pystack,
            qstrs: QstrPool::new(),
            roots: RootPointers::empty(),
            heap_frames: Vec::new(),
            temp_roots: Vec::new(),
            vfs: Vfs::Degraded(NoVfs),
            out,
        };
        // boot-time collections must see the locals of the frames below
        rt.stack.init();

        rt.roots.emergency_memory_error = match exc::new_static(&mut rt.heap, ExcType::MemoryError) {
            Ok(v) => v,
            Err(_) => fatal_error("out of memory during boot"),
        };
        if rt.init_globals().is_err() {
            nlr_jump_fail("boot");
        }

        #[cfg(feature = "vfs")]
        {
            match Vfs::rooted(Box::new(crate::vfs::HostFs::new())) {
                Ok(vfs) => rt.vfs = vfs,
                Err(e) => fatal_error(&format!("cannot mount root filesystem: {}", e)),
            }
        }

        rt.stack_ctrl_init();
        rt.set_stack_limit(limit);
        debug!(info = ?rt.heap.info(), "runtime ready");
        rt
    }

    fn init_globals(&mut self) -> PyResult<()> {
        self.roots.builtins = dict::new(self, 64)?;
        self.roots.builtin_modules = dict::new(self, 4)?;
        self.roots.loaded_modules = dict::new(self, 4)?;
        self.roots.main_globals = dict::new(self, 8)?;
        let name = self.intern("__name__");
        let main = Value::qstr(self.intern("__main__"));
        let globals = self.roots.main_globals;
        dict::store(self, globals, name, main)?;
        builtins::populate(self)
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn out(&self) -> &Output {
        &self.out
    }

    // =========================================================================
    // Heap
    // =========================================================================

    /// Allocate from the heap, collecting once on exhaustion.
    ///
    /// A second failure raises the pre-allocated `MemoryError`.
    pub fn gc_alloc(&mut self, n_bytes: usize, flags: AllocFlags) -> PyResult<GcRef> {
        match self.heap.alloc(n_bytes, flags) {
            Ok(r) => return Ok(r),
            Err(HeapError::Exhausted { .. }) => {}
            Err(e) => fatal_error(&e.to_string()),
        }
        self.gc_collect();
        match self.heap.alloc(n_bytes, flags) {
            Ok(r) => Ok(r),
            Err(e) => {
                warn!(error = %e, "allocation failed after collection");
                let emergency = self.roots.emergency_memory_error;
                exc::clear_location(self, emergency);
                Err(self.raise(emergency))
            }
        }
    }

    /// Run `f` with `v` registered as a root.
    ///
    /// Native code holding a fresh object across another allocation must go
    /// through here: on wasm32 Rust locals live outside linear memory and the
    /// stack scan never sees them.
    pub fn with_temp_root<T>(&mut self, v: Value, f: impl FnOnce(&mut Runtime) -> T) -> T {
        self.temp_roots.push(v.raw());
        let depth = self.temp_roots.len();
        let out = f(self);
        self.temp_roots.truncate(depth - 1);
        out
    }

    /// Run a full collection.
    #[inline(never)]
    pub fn gc_collect(&mut self) {
        let scanner = NativeStack::new(self.stack.top());
        collect::gc_collect(self, &scanner);
        debug!(info = ?self.heap.info(), "collection finished");
    }

    pub fn gc_info(&self) -> GcInfo {
        self.heap.info()
    }

    pub fn heap(&self) -> &GcHeap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut GcHeap {
        &mut self.heap
    }

    pub fn obj_words(&self, r: GcRef) -> &[usize] {
        self.heap.words(r)
    }

    pub fn obj_words_mut(&mut self, r: GcRef) -> &mut [usize] {
        self.heap.words_mut(r)
    }

    /// Kind of the heap object `v` points to.
    pub fn obj_kind(&self, v: Value) -> Option<ObjKind> {
        let r = v.as_obj()?;
        header_kind(self.heap.words(r)[0])
    }

    // =========================================================================
    // Symbols
    // =========================================================================

    pub fn intern(&mut self, s: &str) -> Qstr {
        self.qstrs.intern(s)
    }

    pub fn lookup_qstr(&self, s: &str) -> Option<Qstr> {
        self.qstrs.get(s)
    }

    pub fn qstr_str(&self, q: Qstr) -> &str {
        self.qstrs.str(q)
    }

    // =========================================================================
    // Frames
    // =========================================================================

    /// Allocate a zeroed frame of `n` slots. Pystack exhaustion is fatal.
    pub fn frame_alloc(&mut self, n: usize) -> PyResult<Frame> {
        if let Some(ps) = self.pystack.as_mut() {
            return match ps.alloc(n) {
                Ok(f) => Ok(Frame::Stack(f)),
                Err(e) => fatal_error(&e.to_string()),
            };
        }
        let r = self.gc_alloc((n + 1) * WORD_BYTES, AllocFlags::NONE)?;
        self.heap.words_mut(r)[0] = header(ObjKind::Frame, n);
        self.heap_frames.push(r);
        Ok(Frame::Heap(r))
    }

    /// Release `frame` and every frame allocated after it.
    pub fn frame_free(&mut self, frame: Frame) {
        match frame {
            Frame::Stack(f) => {
                if let Some(ps) = self.pystack.as_mut() {
                    ps.free(f);
                }
            }
            Frame::Heap(r) => {
                if let Some(pos) = self.heap_frames.iter().rposition(|&x| x == r) {
                    self.heap_frames.truncate(pos);
                }
            }
        }
    }

    pub fn frame_get(&self, frame: Frame, i: usize) -> Value {
        match frame {
            Frame::Stack(f) => self.pystack.as_ref().map_or(Value::NULL, |ps| Value::from_raw(ps.slots(f)[i])),
            Frame::Heap(r) => Value::from_raw(self.heap.words(r)[1 + i]),
        }
    }

    pub fn frame_set(&mut self, frame: Frame, i: usize, v: Value) {
        match frame {
            Frame::Stack(f) => {
                if let Some(ps) = self.pystack.as_mut() {
                    ps.slots_mut(f)[i] = v.raw();
                }
            }
            Frame::Heap(r) => self.heap.words_mut(r)[1 + i] = v.raw(),
        }
    }

    /// Pystack slots in use, 0 without a pystack.
    pub fn pystack_used(&self) -> usize {
        self.pystack.as_ref().map_or(0, PyStack::used)
    }

    // =========================================================================
    // Exceptions
    // =========================================================================

    /// Start propagating `exc`.
    pub fn raise(&mut self, exc: Value) -> Raised {
        self.roots.active_exception = exc;
        Raised(exc)
    }

    /// Raise `ty` with a single string argument.
    pub fn raise_msg(&mut self, ty: ExcType, msg: &str) -> Raised {
        match exc::new_with_msg(self, ty, msg) {
            Ok(v) => self.raise(v),
            Err(raised) => raised,
        }
    }

    /// Raise `ty` with no arguments.
    pub fn raise_type(&mut self, ty: ExcType) -> Raised {
        match exc::new(self, ty, &[]) {
            Ok(v) => self.raise(v),
            Err(raised) => raised,
        }
    }

    /// Raise `OSError(errno)`.
    pub fn raise_os_error(&mut self, errno: i32) -> Raised {
        let arg = Value::small_int(errno as isize).unwrap_or(Value::NONE);
        match exc::new(self, ExcType::OSError, &[arg]) {
            Ok(v) => self.raise(v),
            Err(raised) => raised,
        }
    }

    pub fn active_exception(&self) -> Option<Value> {
        let v = self.roots.active_exception;
        (!v.is_null()).then_some(v)
    }

    pub fn clear_active_exception(&mut self) {
        self.roots.active_exception = Value::NULL;
    }

    // =========================================================================
    // Namespaces
    // =========================================================================

    pub fn builtins(&self) -> Value {
        self.roots.builtins
    }

    pub fn builtin_modules(&self) -> Value {
        self.roots.builtin_modules
    }

    pub fn loaded_modules(&self) -> Value {
        self.roots.loaded_modules
    }

    pub fn main_globals(&self) -> Value {
        self.roots.main_globals
    }

    // =========================================================================
    // Filesystem
    // =========================================================================

    pub fn vfs(&self) -> &Vfs {
        &self.vfs
    }

    pub fn vfs_mut(&mut self) -> &mut Vfs {
        &mut self.vfs
    }

    // =========================================================================
    // Native stack
    // =========================================================================

    /// Record the caller's stack position as the top for root scanning and
    /// depth checks.
    #[inline(always)]
    pub fn stack_ctrl_init(&mut self) {
        self.stack.init();
    }

    /// Move the recorded top up to the caller's stack position if the caller
    /// sits above it.
    #[inline(always)]
    pub fn stack_ctrl_widen(&mut self) {
        let sp = crate::stackctrl::current_sp();
        if sp > self.stack.top() {
            self.stack.init_at(sp);
        }
    }

    pub fn set_stack_limit(&mut self, limit: usize) {
        self.stack.set_limit(limit);
    }

    pub fn stack_ctrl(&self) -> &StackCtrl {
        &self.stack
    }

    /// Raise `RuntimeError` when native stack use is over the limit.
    #[inline(always)]
    pub fn stack_check(&mut self) -> PyResult<()> {
        if self.stack.exceeded() {
            return Err(self.raise_msg(ExcType::RuntimeError, "maximum recursion depth exceeded"));
        }
        Ok(())
    }
}

impl Collector for Runtime {
    fn collect_start(&mut self) {
        self.heap.collect_start();
        self.heap.collect_root(&self.roots.words());
        if let Some(ps) = &self.pystack {
            self.heap.collect_root(ps.live());
        }
        let frames: Vec<usize> = self.heap_frames.iter().map(|r| r.addr()).collect();
        self.heap.collect_root(&frames);
        self.heap.collect_root(&self.temp_roots);
    }

    fn collect_root(&mut self, words: &[usize]) {
        self.heap.collect_root(words);
    }

    fn collect_end(&mut self) {
        self.heap.collect_end();
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.config)
            .field("heap", &self.heap.info())
            .field("pystack_used", &self.pystack_used())
            .field("vfs", &self.vfs)
            .finish()
    }
}
