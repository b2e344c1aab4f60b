//! Reference frontend for the wpy runtime.
//!
//! A small statement language (assignment, expressions, calls, attribute
//! access, `raise`, `import`, `pass`) compiled to a stack bytecode and run on
//! the runtime's frames and heap. [`Interpreter`] implements
//! [`wpy_runtime::Frontend`], so it plugs straight into
//! [`wpy_runtime::do_str`] and the event REPL.

pub mod ast;
pub mod compile;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod vm;

pub use compile::{Code, Op};
pub use error::CompileError;
pub use vm::Interpreter;
