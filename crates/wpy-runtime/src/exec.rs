//! Script execution harness.
//!
//! [`do_str`] compiles one unit of source through a [`Frontend`], runs it,
//! and turns whatever happened into a process exit status. It is the only
//! capture boundary: every exception raised while compiling or running ends
//! here, is classified once, and never propagates further.

use num_enum::TryFromPrimitive;
use tracing::debug;

use crate::obj::{exc, ExcType, PyResult, Raised, Value};
use crate::qstr::Qstr;
use crate::runtime::Runtime;

/// How source text is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(i32)]
pub enum InputKind {
    /// One interactive input; a non-`None` expression result is echoed.
    SingleExpression = 0,
    /// A file of statements.
    Statements = 1,
}

/// Compile-and-run contract implemented by language frontends.
pub trait Frontend {
    type Code;

    /// Lex, parse and compile `source` into a zero-argument callable.
    fn compile(&mut self, rt: &mut Runtime, source: &str, source_name: Qstr, kind: InputKind) -> PyResult<Self::Code>;

    /// Run compiled code with no arguments.
    fn call0(&mut self, rt: &mut Runtime, code: &Self::Code) -> PyResult<Value>;
}

/// What a single run ended with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// `SystemExit` (or a subclass) with its value, if one was given.
    ExitRequested(Option<Value>),
    UncaughtError(Value),
}

/// Process exit status in `0..=255`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExitStatus(pub u8);

impl ExitStatus {
    pub const SUCCESS: ExitStatus = ExitStatus(0);
    pub const FAILURE: ExitStatus = ExitStatus(1);

    pub fn code(self) -> i32 {
        self.0 as i32
    }
}

/// Compile and run `source` under the configured source name.
pub fn execute<F: Frontend + ?Sized>(rt: &mut Runtime, frontend: &mut F, source: &str, kind: InputKind) -> Outcome {
    let name = rt.config().source_name.clone();
    let name = rt.intern(&name);
    execute_named(rt, frontend, source, name, kind)
}

/// As [`execute`] with an explicit source name.
#[inline(never)]
pub fn execute_named<F: Frontend + ?Sized>(
    rt: &mut Runtime,
    frontend: &mut F,
    source: &str,
    source_name: Qstr,
    kind: InputKind,
) -> Outcome {
    // frames below this one hold heap references during the run
    rt.stack_ctrl_widen();

    let result = run(rt, frontend, source, source_name, kind);
    let outcome = match result {
        Ok(_) => Outcome::Success,
        Err(Raised(e)) if exc::matches(rt, e, ExcType::SystemExit) => Outcome::ExitRequested(exc::value(rt, e)),
        Err(Raised(e)) => Outcome::UncaughtError(e),
    };
    debug!(?outcome, "execution finished");
    outcome
}

#[inline(never)]
fn run<F: Frontend + ?Sized>(
    rt: &mut Runtime,
    frontend: &mut F,
    source: &str,
    source_name: Qstr,
    kind: InputKind,
) -> PyResult<Value> {
    let code = frontend.compile(rt, source, source_name, kind)?;
    frontend.call0(rt, &code)
}

/// Exit status for `outcome`, with no side effects.
pub fn exit_status(rt: &Runtime, outcome: &Outcome) -> ExitStatus {
    match *outcome {
        Outcome::Success => ExitStatus::SUCCESS,
        Outcome::ExitRequested(None) => ExitStatus::SUCCESS,
        Outcome::ExitRequested(Some(v)) if v.is_none() => ExitStatus::SUCCESS,
        Outcome::ExitRequested(Some(v)) => match v.as_int_like() {
            Some(n) => ExitStatus((n & 0xff) as u8),
            None => {
                debug!(value = %crate::obj::ops::repr_of(rt, v), "non-integer exit value");
                ExitStatus::FAILURE
            }
        },
        Outcome::UncaughtError(_) => ExitStatus::FAILURE,
    }
}

/// Write the traceback of an uncaught error to the diagnostic stream.
pub fn report(rt: &Runtime, outcome: &Outcome) {
    if let Outcome::UncaughtError(e) = *outcome {
        let text = exc::format_traceback(rt, e);
        rt.out().write_err(&text);
    }
}

/// Run one unit of source and map the result to an exit status.
///
/// Uncaught errors are reported on the diagnostic stream. Never re-raises.
pub fn do_str<F: Frontend + ?Sized>(rt: &mut Runtime, frontend: &mut F, source: &str, kind: InputKind) -> ExitStatus {
    let outcome = execute(rt, frontend, source, kind);
    report(rt, &outcome);
    let status = exit_status(rt, &outcome);
    rt.clear_active_exception();
    status
}
