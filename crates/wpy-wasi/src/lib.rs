//! WASI embedding of the wpy runtime.
//!
//! Built as a `cdylib`, this crate exports the C-ABI entry points a WASI
//! host drives: boot, run-script, raw allocation, the scratch ("warehouse")
//! buffer and the event REPL. The same singleton backs the `wpy` binary.

pub mod exports;
pub mod host;
pub mod scratch;

pub use scratch::{ScratchBuffer, ScratchError, SCRATCH_SIZE};
