//! Fatal routes abort the process, so each one runs in a child copy of this
//! test binary selected through `WPY_FATAL_ROUTE`.

use std::process::{Command, Output};

use wpy_runtime::fatal;

const ROUTE: &str = "WPY_FATAL_ROUTE";

/// Entry point for the child: does nothing unless a route is selected.
#[test]
fn fatal_route_child() {
    let Ok(route) = std::env::var(ROUTE) else { return };
    match route.as_str() {
        "panic" => {
            fatal::install_panic_hook();
            panic!("mark stack overflow");
        }
        "assert" => fatal::assert_failed("used <= total", "gc.rs", 12),
        "nlr" => fatal::nlr_jump_fail("boot"),
        "pystack-free" => {
            let mut ps = wpy_runtime::pystack::PyStack::new(8).unwrap();
            let a = ps.alloc(2).unwrap();
            let b = ps.alloc(2).unwrap();
            ps.free(a);
            ps.free(b);
        }
        other => panic!("unknown route {}", other),
    }
    println!("survived");
}

fn run_route(route: &str) -> Output {
    Command::new(std::env::current_exe().unwrap())
        .args(["fatal_route_child", "--exact", "--nocapture", "--test-threads=1"])
        .env(ROUTE, route)
        .output()
        .unwrap()
}

fn assert_aborted(out: &Output) {
    assert!(!out.status.success());
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        assert_eq!(out.status.signal(), Some(6), "expected SIGABRT, got {:?}", out.status);
    }
    assert!(!String::from_utf8_lossy(&out.stdout).contains("survived"));
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

#[test]
fn test_panic_hook_takes_fatal_path() {
    let out = run_route("panic");
    assert_aborted(&out);
    let err = stderr(&out);
    assert!(err.contains("Assertion 'mark stack overflow' failed, at file"), "{}", err);
    assert!(err.contains("fatal error: Assertion failed\n"), "{}", err);
}

#[test]
fn test_assert_failed_reports_location() {
    let out = run_route("assert");
    assert_aborted(&out);
    let err = stderr(&out);
    assert!(err.contains("Assertion 'used <= total' failed, at file gc.rs:12\n"), "{}", err);
    assert!(err.contains("fatal error: Assertion failed\n"), "{}", err);
}

#[test]
fn test_uncaught_exception_at_boundary() {
    let out = run_route("nlr");
    assert_aborted(&out);
    assert!(stderr(&out).contains("fatal error: nlr_jump_fail: uncaught exception during boot\n"));
}

#[cfg(feature = "assertions")]
#[test]
fn test_consistency_check_failure_is_fatal() {
    let out = run_route("pystack-free");
    assert_aborted(&out);
    let err = stderr(&out);
    assert!(err.contains("Assertion 'frame.offset + frame.len <= self.cur' failed, at file"), "{}", err);
    assert!(err.contains("fatal error: Assertion failed\n"), "{}", err);
}

#[cfg(not(feature = "assertions"))]
#[test]
fn test_consistency_checks_compiled_out() {
    let out = run_route("pystack-free");
    assert!(out.status.success(), "{}", stderr(&out));
    assert!(String::from_utf8_lossy(&out.stdout).contains("survived"));
}
