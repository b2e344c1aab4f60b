use std::io::Write;
use std::process::{Command, Output, Stdio};

use pretty_assertions::assert_eq;

fn wpy() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_wpy"));
    cmd.env_remove("WPY_LOG")
        .env_remove("WPY_HEAP_SIZE")
        .env_remove("WPY_PYSTACK_SLOTS")
        .env_remove("WPY_STACK_LIMIT");
    cmd
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

#[test]
fn test_command_exit_status() {
    let out = wpy().args(["-c", "print('hi')\nraise SystemExit(42)"]).output().unwrap();
    assert_eq!(out.status.code(), Some(42));
    assert_eq!(stdout(&out), "hi\n");

    let out = wpy().args(["-c", "raise ValueError('x')"]).output().unwrap();
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).ends_with("ValueError: x\n"));
}

#[test]
fn test_script_file_and_import() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("helper.py"), "value = 20 + 1\n").unwrap();
    std::fs::write(dir.path().join("main.py"), "import helper\nprint(helper.value * 2)\nnope\n").unwrap();

    let out = wpy().current_dir(dir.path()).arg("main.py").output().unwrap();
    assert_eq!(stdout(&out), "42\n");
    assert_eq!(out.status.code(), Some(1));
    assert_eq!(
        stderr(&out),
        "Traceback (most recent call last):\n  File \"main.py\", line 3, in <module>\nNameError: name 'nope' isn't defined\n"
    );
}

#[test]
fn test_missing_script() {
    let dir = tempfile::tempdir().unwrap();
    let out = wpy().arg(dir.path().join("absent.py")).output().unwrap();
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("can't open file"));
}

#[test]
fn test_repl_over_stdin() {
    let mut child = wpy().stdin(Stdio::piped()).stdout(Stdio::piped()).spawn().unwrap();
    child.stdin.take().unwrap().write_all(b"x = 5\nx * 2\nraise SystemExit(x)\n").unwrap();
    let out = child.wait_with_output().unwrap();
    assert_eq!(out.status.code(), Some(5));
    assert!(stdout(&out).ends_with(">>> >>> 10\n>>> "));
}

#[cfg(all(feature = "pystack", feature = "vfs"))]
#[test]
fn test_pystack_exhaustion_is_fatal() {
    // the module frame needs more slots than the pystack holds
    let dir = tempfile::tempdir().unwrap();
    let args = vec!["1"; 1100].join(", ");
    std::fs::write(dir.path().join("wide.py"), format!("print({})\n", args)).unwrap();

    let src = "print('before')\nimport wide\nprint('after')";
    let out = wpy().current_dir(dir.path()).args(["-c", src]).output().unwrap();
    assert!(!out.status.success());
    // abort, not an interpreter exit status
    assert_ne!(out.status.code(), Some(1));
    assert_eq!(stdout(&out), "before\n");
    assert!(stderr(&out).contains("fatal error: pystack exhausted"));
    assert!(!stderr(&out).contains("Traceback"));
}

#[test]
fn test_heap_too_small_for_boot() {
    let out = wpy().args(["--heap-size", "256", "-c", "print('unreached')"]).output().unwrap();
    assert!(!out.status.success());
    assert_eq!(stdout(&out), "");
    assert!(stderr(&out).contains("fatal error"));
}
