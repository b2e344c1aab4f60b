//! Runtime configuration.

use tracing::warn;

/// Default managed heap size: 1 MiB.
pub const DEFAULT_HEAP_SIZE: usize = 1024 * 1024;

/// Default pystack capacity, in value-sized slots.
pub const DEFAULT_PYSTACK_SLOTS: usize = 1024;

/// Synthetic source name for text handed to the harness.
pub const DEFAULT_SOURCE_NAME: &str = "<stdin>";

/// Default native stack-depth limit: 40000 bytes per 32 bits of pointer width.
pub const fn default_stack_limit() -> usize {
    40000 * (core::mem::size_of::<usize>() / 4)
}

/// Boot-time configuration for a [`Runtime`](crate::Runtime).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Bytes requested from the host allocator for the managed heap.
    pub heap_size: usize,
    /// Capacity of the auxiliary pystack in slots (ignored without the `pystack` feature).
    pub pystack_slots: usize,
    /// Native stack bytes the interpreter may use before raising `RuntimeError`.
    pub stack_limit: usize,
    /// Source name attached to code compiled by [`do_str`](crate::do_str).
    pub source_name: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            heap_size: DEFAULT_HEAP_SIZE,
            pystack_slots: DEFAULT_PYSTACK_SLOTS,
            stack_limit: default_stack_limit(),
            source_name: DEFAULT_SOURCE_NAME.to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Defaults overridden by `WPY_HEAP_SIZE`, `WPY_PYSTACK_SLOTS` and `WPY_STACK_LIMIT`.
    ///
    /// Malformed values are reported and ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(v) = env_usize("WPY_HEAP_SIZE") {
            config.heap_size = v;
        }
        if let Some(v) = env_usize("WPY_PYSTACK_SLOTS") {
            config.pystack_slots = v;
        }
        if let Some(v) = env_usize("WPY_STACK_LIMIT") {
            config.stack_limit = v;
        }
        config
    }

    pub fn with_heap_size(mut self, heap_size: usize) -> Self {
        self.heap_size = heap_size;
        self
    }

    pub fn with_pystack_slots(mut self, slots: usize) -> Self {
        self.pystack_slots = slots;
        self
    }

    pub fn with_stack_limit(mut self, limit: usize) -> Self {
        self.stack_limit = limit;
        self
    }
}

fn env_usize(name: &str) -> Option<usize> {
    let raw = std::env::var(name).ok()?;
    match parse_size(&raw) {
        Some(v) => Some(v),
        None => {
            warn!(var = name, value = %raw, "ignoring malformed size");
            None
        }
    }
}

/// Parse a byte count with an optional `k`/`m` suffix (binary multiples).
pub fn parse_size(raw: &str) -> Option<usize> {
    let raw = raw.trim();
    let (digits, mult) = match raw.as_bytes().last()? {
        b'k' | b'K' => (&raw[..raw.len() - 1], 1024),
        b'm' | b'M' => (&raw[..raw.len() - 1], 1024 * 1024),
        _ => (raw, 1),
    };
    digits.parse::<usize>().ok()?.checked_mul(mult)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.heap_size, 1048576);
        assert_eq!(config.pystack_slots, 1024);
        assert_eq!(config.source_name, "<stdin>");
        #[cfg(target_pointer_width = "64")]
        assert_eq!(config.stack_limit, 80000);
        #[cfg(target_pointer_width = "32")]
        assert_eq!(config.stack_limit, 40000);
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("4096"), Some(4096));
        assert_eq!(parse_size("64k"), Some(65536));
        assert_eq!(parse_size("2M"), Some(2 * 1024 * 1024));
        assert_eq!(parse_size(" 12 "), Some(12));
        assert_eq!(parse_size(""), None);
        assert_eq!(parse_size("lots"), None);
        assert_eq!(parse_size("k"), None);
    }
}
