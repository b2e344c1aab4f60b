//! Event-driven REPL.
//!
//! The host feeds one input byte at a time; a completed line is run through
//! the harness as a single interactive input. Line editing is limited to
//! backspace, and echo is left to the host terminal.

use tracing::debug;

use crate::exec::{self, ExitStatus, Frontend, InputKind, Outcome};
use crate::runtime::Runtime;

const CHAR_CTRL_C: u8 = 0x03;
const CHAR_CTRL_D: u8 = 0x04;
const CHAR_BS: u8 = 0x08;
const CHAR_DEL: u8 = 0x7f;

pub const PROMPT: &str = ">>> ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplEvent {
    Continue,
    /// The session ended, with this status.
    Exit(ExitStatus),
}

#[derive(Debug, Default)]
pub struct Repl {
    line: Vec<u8>,
}

impl Repl {
    /// Print the banner and first prompt.
    pub fn init(rt: &mut Runtime) -> Repl {
        let banner = format!("wpy {} on wasi\nType \"Ctrl-D\" on an empty line to exit.\n", env!("CARGO_PKG_VERSION"));
        rt.out().write(&banner);
        rt.out().write(PROMPT);
        Repl::default()
    }

    /// Feed one input byte.
    pub fn process_char<F: Frontend + ?Sized>(&mut self, rt: &mut Runtime, frontend: &mut F, c: u8) -> ReplEvent {
        match c {
            CHAR_CTRL_C => {
                self.line.clear();
                rt.out().write("\nKeyboardInterrupt\n");
                rt.out().write(PROMPT);
                ReplEvent::Continue
            }
            CHAR_CTRL_D if self.line.is_empty() => {
                rt.out().write("\n");
                ReplEvent::Exit(ExitStatus::SUCCESS)
            }
            CHAR_CTRL_D => ReplEvent::Continue,
            CHAR_BS | CHAR_DEL => {
                // continuation bytes first, then the lead byte
                while self.line.pop().map_or(false, |b| b & 0xc0 == 0x80) {}
                ReplEvent::Continue
            }
            b'\r' | b'\n' => self.finish_line(rt, frontend),
            c => {
                self.line.push(c);
                ReplEvent::Continue
            }
        }
    }

    fn finish_line<F: Frontend + ?Sized>(&mut self, rt: &mut Runtime, frontend: &mut F) -> ReplEvent {
        let line = String::from_utf8_lossy(&std::mem::take(&mut self.line)).into_owned();
        if line.trim().is_empty() {
            rt.out().write(PROMPT);
            return ReplEvent::Continue;
        }
        debug!(line = %line, "repl input");
        let outcome = exec::execute(rt, frontend, &line, InputKind::SingleExpression);
        exec::report(rt, &outcome);
        let status = exec::exit_status(rt, &outcome);
        rt.clear_active_exception();
        if let Outcome::ExitRequested(_) = outcome {
            return ReplEvent::Exit(status);
        }
        rt.out().write(PROMPT);
        ReplEvent::Continue
    }
}
