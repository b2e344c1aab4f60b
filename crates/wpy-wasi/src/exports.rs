//! C-ABI entry points for the WASI host.
//!
//! All exports operate on the singleton in [`crate::host`]. Status values
//! are in `0..=255` unless noted otherwise.

use std::ffi::{c_char, CStr};
use std::ptr;

use wpy_runtime::fatal::{self, fatal_error};
use wpy_runtime::{AllocFlags, InputKind, ReplEvent, RuntimeConfig};

use crate::host;
use crate::scratch::WAREHOUSE;

/// Bit set in [`wpy_repl_process_char`]'s result when the session ended.
pub const REPL_EXIT: i32 = 0x100;

/// Boot with the default 1 MiB heap and 1024-slot pystack. Always returns 0.
#[no_mangle]
pub extern "C" fn wpy_main() -> i32 {
    fatal::install_panic_hook();
    host::boot(RuntimeConfig::default());
    0
}

/// Boot with an explicit heap size in bytes.
#[no_mangle]
pub extern "C" fn wpy_init(heap_size: i32) {
    fatal::install_panic_hook();
    let Ok(heap_size) = usize::try_from(heap_size) else {
        fatal_error(&format!("invalid heap size {}", heap_size));
    };
    host::boot(RuntimeConfig::default().with_heap_size(heap_size));
}

fn input_kind(kind: i32) -> InputKind {
    match InputKind::try_from(kind) {
        Ok(kind) => kind,
        Err(_) => fatal_error(&format!("invalid input kind {}", kind)),
    }
}

/// Compile and run a NUL-terminated source string.
///
/// # Safety
/// `src` must point to a NUL-terminated string that stays valid for the
/// duration of the call.
#[no_mangle]
pub unsafe extern "C" fn wpy_do_str(src: *const c_char, kind: i32) -> i32 {
    if src.is_null() {
        fatal_error("null source pointer");
    }
    let kind = input_kind(kind);
    let source = CStr::from_ptr(src).to_string_lossy().into_owned();
    host::run(&source, kind).code()
}

/// Allocate `n_bytes` from the managed heap. Null before boot or when the
/// heap is exhausted. The block is only kept alive by references the
/// collector can see.
#[no_mangle]
pub extern "C" fn wpy_alloc(n_bytes: usize, flags: u32) -> *mut u8 {
    match host::alloc(n_bytes, AllocFlags::from_bits(flags)) {
        Some(r) => r.as_ptr(),
        None => ptr::null_mut(),
    }
}

/// Address of the scratch buffer the host stages source text in.
#[no_mangle]
pub extern "C" fn wpy_warehouse_addr() -> *mut u8 {
    WAREHOUSE.as_mut_ptr()
}

/// Run the first `len` bytes staged in the scratch buffer.
#[no_mangle]
pub extern "C" fn wpy_do_warehouse(len: i32, kind: i32) -> i32 {
    let kind = input_kind(kind);
    let source = usize::try_from(len)
        .map_err(|_| format!("invalid scratch length {}", len))
        .and_then(|len| WAREHOUSE.read_source(len).map_err(|e| e.to_string()));
    match source {
        Ok(source) => host::run(&source, kind).code(),
        Err(msg) => fatal_error(&msg),
    }
}

/// Print the REPL banner and first prompt.
#[no_mangle]
pub extern "C" fn wpy_init_repl() {
    host::init_repl();
}

/// Feed one input byte to the REPL.
///
/// Returns 0 while the session continues, or [`REPL_EXIT`] with the exit
/// status in the low byte once it ends.
#[no_mangle]
pub extern "C" fn wpy_repl_process_char(c: i32) -> i32 {
    let Ok(c) = u8::try_from(c) else {
        return 0;
    };
    match host::repl_char(c) {
        ReplEvent::Continue => 0,
        ReplEvent::Exit(status) => REPL_EXIT | status.code(),
    }
}
