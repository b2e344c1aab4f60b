//! The process-wide runtime instance.
//!
//! The C-ABI exports and the `wpy` binary share one [`Host`] kept in a
//! thread-local slot. It is created once by [`boot`] and never torn down.

use std::cell::RefCell;

use tracing::{debug, warn};
use wpy_lang::Interpreter;
use wpy_runtime::fatal::fatal_error;
use wpy_runtime::{do_str, AllocFlags, ExitStatus, GcRef, InputKind, Output, Repl, ReplEvent, Runtime, RuntimeConfig};

pub struct Host {
    pub rt: Runtime,
    pub interp: Interpreter,
    pub repl: Option<Repl>,
}

thread_local! {
    static HOST: RefCell<Option<Host>> = const { RefCell::new(None) };
}

/// Boot the runtime with `config`, writing to the process streams.
///
/// A second call keeps the running instance.
pub fn boot(config: RuntimeConfig) {
    boot_with_output(config, Output::std());
}

pub fn boot_with_output(config: RuntimeConfig, out: Output) {
    HOST.with(|slot| {
        let mut slot = slot.borrow_mut();
        if slot.is_some() {
            warn!("runtime already booted, ignoring");
            return;
        }
        let rt = Runtime::boot(config, out);
        *slot = Some(Host { rt, interp: Interpreter::new(), repl: None });
    });
}

pub fn is_booted() -> bool {
    HOST.with(|slot| slot.borrow().is_some())
}

/// Run `f` on the booted host, or `None` before boot.
pub fn try_with_host<R>(f: impl FnOnce(&mut Host) -> R) -> Option<R> {
    HOST.with(|slot| slot.borrow_mut().as_mut().map(f))
}

/// Run `f` on the booted host. Using the runtime before boot is fatal.
pub fn with_host<R>(f: impl FnOnce(&mut Host) -> R) -> R {
    match try_with_host(f) {
        Some(r) => r,
        None => fatal_error("runtime used before boot"),
    }
}

/// Compile and run `source` through the harness.
pub fn run(source: &str, kind: InputKind) -> ExitStatus {
    with_host(|h| do_str(&mut h.rt, &mut h.interp, source, kind))
}

/// Raw heap allocation for the host. `None` before boot or when the heap
/// stays full after a collection.
pub fn alloc(n_bytes: usize, flags: AllocFlags) -> Option<GcRef> {
    try_with_host(|h| match h.rt.gc_alloc(n_bytes, flags) {
        Ok(r) => Some(r),
        Err(_) => {
            debug!(n_bytes, "host allocation failed");
            h.rt.clear_active_exception();
            None
        }
    })
    .flatten()
}

/// Print the banner and arm the event REPL.
pub fn init_repl() {
    with_host(|h| h.repl = Some(Repl::init(&mut h.rt)));
}

/// Feed one byte to the REPL. Fatal if the REPL was never initialised.
pub fn repl_char(c: u8) -> ReplEvent {
    with_host(|h| {
        let Some(repl) = h.repl.as_mut() else {
            fatal_error("repl used before init");
        };
        repl.process_char(&mut h.rt, &mut h.interp, c)
    })
}
