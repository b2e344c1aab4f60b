//! Output sinks.
//!
//! `print` writes to the stdout sink; tracebacks and other diagnostics go to
//! the stderr sink. Embedders pick the process streams or in-memory capture.

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

#[derive(Clone)]
pub struct Output {
    stdout: Rc<RefCell<dyn Write>>,
    stderr: Rc<RefCell<dyn Write>>,
}

impl Output {
    /// Bind to the process stdout and stderr.
    pub fn std() -> Self {
        Self {
            stdout: Rc::new(RefCell::new(std::io::stdout())),
            stderr: Rc::new(RefCell::new(std::io::stderr())),
        }
    }

    /// In-memory sinks, readable through the returned [`Captured`].
    pub fn capture() -> (Self, Captured) {
        let stdout = Rc::new(RefCell::new(Vec::new()));
        let stderr = Rc::new(RefCell::new(Vec::new()));
        let captured = Captured { stdout: stdout.clone(), stderr: stderr.clone() };
        (Self { stdout, stderr }, captured)
    }

    /// Write to the stdout sink.
    pub fn write(&self, s: &str) {
        let mut w = self.stdout.borrow_mut();
        let _ = w.write_all(s.as_bytes());
        let _ = w.flush();
    }

    /// Write to the diagnostic sink.
    pub fn write_err(&self, s: &str) {
        let mut w = self.stderr.borrow_mut();
        let _ = w.write_all(s.as_bytes());
        let _ = w.flush();
    }
}

impl std::fmt::Debug for Output {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Output")
    }
}

/// Buffers behind [`Output::capture`].
#[derive(Clone)]
pub struct Captured {
    stdout: Rc<RefCell<Vec<u8>>>,
    stderr: Rc<RefCell<Vec<u8>>>,
}

impl Captured {
    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.stdout.borrow()).into_owned()
    }

    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.stderr.borrow()).into_owned()
    }

    /// Take all captured output and clear both buffers.
    pub fn take(&self) -> (String, String) {
        let out = std::mem::take(&mut *self.stdout.borrow_mut());
        let err = std::mem::take(&mut *self.stderr.borrow_mut());
        (String::from_utf8_lossy(&out).into_owned(), String::from_utf8_lossy(&err).into_owned())
    }
}
