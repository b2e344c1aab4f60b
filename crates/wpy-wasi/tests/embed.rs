//! Panics after an embedding entry point has booted the runtime must take
//! the fatal path. Each case runs in a child copy of this test binary.

use std::process::{Command, Output};

use wpy_wasi::exports::{wpy_init, wpy_main};

const ENTRY: &str = "WPY_EMBED_ENTRY";

#[test]
fn embed_entry_child() {
    let Ok(entry) = std::env::var(ENTRY) else { return };
    match entry.as_str() {
        "main" => assert_eq!(wpy_main(), 0),
        "init" => wpy_init(64 * 1024),
        other => unreachable!("unknown entry {}", other),
    }
    panic!("host callback failed");
}

fn run_entry(entry: &str) -> Output {
    Command::new(std::env::current_exe().unwrap())
        .args(["embed_entry_child", "--exact", "--nocapture", "--test-threads=1"])
        .env(ENTRY, entry)
        .env_remove("WPY_LOG")
        .output()
        .unwrap()
}

fn assert_fatal_panic(out: &Output) {
    assert!(!out.status.success());
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        assert_eq!(out.status.signal(), Some(6), "expected SIGABRT, got {:?}", out.status);
    }
    let err = String::from_utf8_lossy(&out.stderr);
    assert!(err.contains("Assertion 'host callback failed' failed, at file"), "{}", err);
    assert!(err.contains("fatal error: Assertion failed\n"), "{}", err);
}

#[test]
fn test_wpy_main_routes_panics_to_fatal() {
    assert_fatal_panic(&run_entry("main"));
}

#[test]
fn test_wpy_init_routes_panics_to_fatal() {
    assert_fatal_panic(&run_entry("init"));
}
