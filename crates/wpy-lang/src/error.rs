use thiserror::Error;
use wpy_runtime::obj::exc;
use wpy_runtime::{ExcType, Qstr, Raised, Runtime};

/// Failure to turn source text into code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("{msg} (line {line})")]
    Syntax { msg: String, line: usize },
    #[error("small int overflow (line {line})")]
    Overflow { line: usize },
    #[error("maximum recursion depth exceeded")]
    RecursionDepth,
}

impl CompileError {
    pub fn syntax(line: usize) -> Self {
        CompileError::Syntax { msg: "invalid syntax".to_string(), line }
    }

    pub fn line(&self) -> Option<usize> {
        match self {
            CompileError::Syntax { line, .. } | CompileError::Overflow { line } => Some(*line),
            CompileError::RecursionDepth => None,
        }
    }

    /// Raise the matching exception, located at the offending line.
    pub fn raise(&self, rt: &mut Runtime, source_name: Qstr) -> Raised {
        let raised = match self {
            CompileError::Syntax { msg, .. } => rt.raise_msg(ExcType::SyntaxError, msg),
            CompileError::Overflow { .. } => rt.raise_msg(ExcType::OverflowError, "small int overflow"),
            CompileError::RecursionDepth => rt.raise_msg(ExcType::RuntimeError, "maximum recursion depth exceeded"),
        };
        if let Some(line) = self.line() {
            exc::set_location(rt, raised.0, source_name, line);
        }
        raised
    }
}
