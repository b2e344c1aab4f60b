//! Native stack depth control.
//!
//! Records the stack top at startup and compares later stack positions
//! against a byte limit so deep recursion raises `RuntimeError` before the
//! host stack overflows.

/// Smallest accepted limit.
pub const MIN_STACK_LIMIT: usize = 1024;

#[derive(Debug, Clone, Copy)]
pub struct StackCtrl {
    top: usize,
    limit: usize,
}

impl StackCtrl {
    /// A controller that has not recorded a stack top yet.
    pub const fn unset(limit: usize) -> Self {
        Self { top: 0, limit }
    }

    /// Record the current stack position as the top.
    ///
    /// Must be called from the outermost frame that will host interpretation.
    #[inline(always)]
    pub fn init(&mut self) {
        self.top = current_sp();
    }

    /// Record an explicit stack top.
    pub fn init_at(&mut self, top: usize) {
        self.top = top;
    }

    pub fn top(&self) -> usize {
        self.top
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn set_limit(&mut self, limit: usize) {
        if limit < MIN_STACK_LIMIT {
            crate::fatal::fatal_error(&format!("stack limit {} below minimum {}", limit, MIN_STACK_LIMIT));
        }
        self.limit = limit;
    }

    /// Bytes of native stack used below the recorded top.
    #[inline(always)]
    pub fn usage(&self) -> usize {
        if self.top == 0 {
            return 0;
        }
        self.top.saturating_sub(current_sp())
    }

    /// Whether the current depth exceeds the limit.
    #[inline(always)]
    pub fn exceeded(&self) -> bool {
        self.usage() > self.limit
    }
}

/// Approximate current stack pointer.
#[inline(always)]
pub fn current_sp() -> usize {
    let marker = 0u8;
    core::hint::black_box(core::ptr::addr_of!(marker)) as usize
}
