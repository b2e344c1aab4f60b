//! wpy runtime core.
//!
//! Host-side lifecycle of an embedded, garbage-collected Python-like runtime:
//! - memory regions and the mark/sweep heap living in them
//! - the auxiliary pystack for interpreter frames
//! - the object model shared by every frontend (values, strings, exceptions, dicts)
//! - the virtual filesystem mount table
//! - the bootstrapper ([`Runtime::boot`]) and the script execution harness ([`exec`])
//! - the fatal path taken when runtime invariants are broken
//!
//! # Features
//! - `pystack` (default): interpreter frames live in a fixed-capacity auxiliary stack
//! - `vfs` (default): host pass-through filesystem mounted at `/`
//! - `assertions`: internal consistency checks, failures go to the fatal path

pub mod fatal;

pub mod builtins;
pub mod config;
pub mod exec;
pub mod gc;
pub mod memory;
pub mod obj;
pub mod output;
pub mod pystack;
pub mod qstr;
pub mod repl;
pub mod runtime;
pub mod stackctrl;
pub mod vfs;

pub use config::RuntimeConfig;
pub use exec::{do_str, ExitStatus, Frontend, InputKind, Outcome};
pub use gc::{AllocFlags, GcHeap, GcInfo, GcRef, HeapError};
pub use obj::{ExcType, PyResult, Raised, Value};
pub use output::Output;
pub use qstr::Qstr;
pub use repl::{Repl, ReplEvent};
pub use runtime::{Frame, Runtime};
