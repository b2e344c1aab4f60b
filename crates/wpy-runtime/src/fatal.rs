//! Fatal path.
//!
//! Entered when a runtime invariant is broken and continuing is unsafe: an
//! exception escaped with no capture boundary, an internal consistency check
//! failed, or a component detected an unrecoverable state (out of memory at
//! boot, pystack exhaustion, scratch buffer overflow).
//!
//! The message goes to the diagnostic stream and the process is aborted. No
//! unwinding happens, no destructors run, and nothing touches the interpreter
//! or the heap again.

use std::io::Write;
use std::sync::Once;

/// Print `msg` to stderr and abort the process.
#[cold]
pub fn fatal_error(msg: &str) -> ! {
    let mut stderr = std::io::stderr().lock();
    let _ = writeln!(stderr, "fatal error: {}", msg);
    let _ = stderr.flush();
    std::process::abort()
}

/// An exception reached the embedding boundary with no capture boundary around it.
#[cold]
pub fn nlr_jump_fail(context: &str) -> ! {
    fatal_error(&format!("nlr_jump_fail: uncaught exception during {}", context))
}

/// A compiled-in consistency check failed.
#[cold]
pub fn assert_failed(expr: &str, file: &str, line: u32) -> ! {
    let mut stderr = std::io::stderr().lock();
    let _ = writeln!(stderr, "Assertion '{}' failed, at file {}:{}", expr, file, line);
    drop(stderr);
    fatal_error("Assertion failed")
}

/// Route Rust panics to the fatal path.
///
/// Installed by embedding entry points only; library code and tests keep the
/// default hook. Later calls are no-ops.
pub fn install_panic_hook() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        std::panic::set_hook(Box::new(|info| {
            let msg = info
                .payload()
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| info.payload().downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panic".to_string());
            match info.location() {
                Some(loc) => assert_failed(&msg, loc.file(), loc.line()),
                None => fatal_error(&msg),
            }
        }));
    });
}

/// Internal consistency check, compiled in with the `assertions` feature.
///
/// Failure takes the fatal path rather than panicking.
#[macro_export]
macro_rules! wpy_assert {
    ($cond:expr) => {
        #[cfg(feature = "assertions")]
        {
            if !$cond {
                $crate::fatal::assert_failed(stringify!($cond), file!(), line!());
            }
        }
    };
}
