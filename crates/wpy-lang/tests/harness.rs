use pretty_assertions::assert_eq;
use wpy_lang::Interpreter;
use wpy_runtime::output::Captured;
use wpy_runtime::vfs::{MemoryFs, NoVfs, Vfs};
use wpy_runtime::{do_str, ExitStatus, InputKind, Output, Runtime, RuntimeConfig};

fn boot() -> (Runtime, Interpreter, Captured) {
    let (out, cap) = Output::capture();
    let rt = Runtime::boot(RuntimeConfig::default().with_heap_size(64 * 1024), out);
    (rt, Interpreter::new(), cap)
}

fn run(rt: &mut Runtime, interp: &mut Interpreter, src: &str) -> u8 {
    do_str(rt, interp, src, InputKind::Statements).0
}

fn traceback(line: usize, last: &str) -> String {
    format!("Traceback (most recent call last):\n  File \"<stdin>\", line {}, in <module>\n{}\n", line, last)
}

#[test]
fn test_exit_statuses() {
    let cases = [
        ("", 0),
        ("pass", 0),
        ("raise SystemExit", 0),
        ("raise SystemExit(None)", 0),
        ("raise SystemExit(42)", 42),
        ("raise SystemExit(300)", 44),
        ("raise SystemExit(-1)", 255),
        ("raise SystemExit(True)", 1),
        ("raise SystemExit('abc')", 1),
        ("raise ValueError('x')", 1),
    ];
    for (src, want) in cases {
        let (mut rt, mut interp, _) = boot();
        assert_eq!(run(&mut rt, &mut interp, src), want, "{}", src);
    }
}

#[test]
fn test_exit_is_silent() {
    let (mut rt, mut interp, cap) = boot();
    assert_eq!(run(&mut rt, &mut interp, "print('bye')\nraise SystemExit(3)\nprint('unreached')"), 3);
    assert_eq!(cap.stdout(), "bye\n");
    assert_eq!(cap.stderr(), "");
}

#[test]
fn test_uncaught_error_reported_once() {
    let (mut rt, mut interp, cap) = boot();
    assert_eq!(run(&mut rt, &mut interp, "x = 1\nraise ValueError('x')"), 1);
    assert_eq!(cap.stderr(), traceback(2, "ValueError: x"));
}

#[test]
fn test_error_while_building_exit_value() {
    let (mut rt, mut interp, cap) = boot();
    assert_eq!(run(&mut rt, &mut interp, "raise SystemExit(int('x'))"), 1);
    assert_eq!(
        cap.stderr(),
        traceback(1, "ValueError: invalid syntax for integer with base 10: 'x'")
    );
    assert_eq!(rt.active_exception(), None);
}

#[test]
fn test_compile_errors() {
    let (mut rt, mut interp, cap) = boot();
    assert_eq!(run(&mut rt, &mut interp, "x = 1\ny = (2"), 1);
    assert_eq!(cap.take().1, traceback(2, "SyntaxError: invalid syntax"));
    assert_eq!(run(&mut rt, &mut interp, "x = 123456789012345678901234567890"), 1);
    assert_eq!(cap.take().1, traceback(1, "OverflowError: small int overflow"));
}

#[test]
fn test_runtime_errors() {
    let (mut rt, mut interp, cap) = boot();
    let cases = [
        ("undefined", "NameError: name 'undefined' isn't defined"),
        ("1 // 0", "ZeroDivisionError: divide by zero"),
        ("raise 5", "TypeError: exceptions must derive from BaseException"),
        ("raise", "RuntimeError: no active exception to reraise"),
        ("len(1, 2)", "TypeError: function takes 1 positional arguments but 2 were given"),
        ("None.x", "AttributeError: 'NoneType' object has no attribute 'x'"),
        ("import nothere", "ImportError: no module named 'nothere'"),
    ];
    for (src, want) in cases {
        assert_eq!(run(&mut rt, &mut interp, src), 1, "{}", src);
        assert_eq!(cap.take().1, traceback(1, want));
    }
}

#[test]
fn test_namespace_persists_between_runs() {
    let (mut rt, mut interp, cap) = boot();
    assert_eq!(run(&mut rt, &mut interp, "greeting = 'hel' + 'lo'\nn = 6 * 7"), 0);
    assert_eq!(run(&mut rt, &mut interp, "print(greeting, n, n % 5 == 2, -n)"), 0);
    assert_eq!(cap.stdout(), "hello 42 True -42\n");
}

#[test]
fn test_single_expression_echoes() {
    let (mut rt, mut interp, cap) = boot();
    let status = do_str(&mut rt, &mut interp, "x = 'a'; x * 3; None; 1 + 1", InputKind::SingleExpression);
    assert_eq!(status, ExitStatus::SUCCESS);
    assert_eq!(cap.stdout(), "'aaa'\n2\n");
}

#[test]
fn test_gc_module() {
    let (mut rt, mut interp, cap) = boot();
    let src = "import gc\nkeep = str(1) + str(2)\ngc.collect()\nprint(keep, gc.mem_free() > 0, gc.mem_alloc() > 0)";
    assert_eq!(run(&mut rt, &mut interp, src), 0);
    assert_eq!(cap.stdout(), "12 True True\n");
    assert!(rt.gc_info().collections >= 1);
}

#[test]
fn test_memory_error_recovers() {
    let (mut rt, mut interp, cap) = boot();
    assert_eq!(run(&mut rt, &mut interp, "x = 'a' * 30000\ny = x + x"), 1);
    assert_eq!(cap.take().1, traceback(2, "MemoryError"));
    assert_eq!(run(&mut rt, &mut interp, "x = None\nprint('ok')"), 0);
    assert_eq!(cap.stdout(), "ok\n");
}

#[test]
fn test_deep_nesting_raises() {
    let (mut rt, mut interp, cap) = boot();
    let src = format!("x = {}1{}", "(".repeat(50_000), ")".repeat(50_000));
    assert_eq!(run(&mut rt, &mut interp, &src), 1);
    assert!(cap.stderr().ends_with("RuntimeError: maximum recursion depth exceeded\n"));
    assert_eq!(run(&mut rt, &mut interp, "print('still alive')"), 0);
}

#[test]
fn test_import_from_vfs() {
    let (mut rt, mut interp, cap) = boot();
    let fs = MemoryFs::new()
        .with_file("helper.py", "print('loading')\nanswer = 40 + 2\n")
        .with_file("data.txt", "payload");
    *rt.vfs_mut() = Vfs::rooted(Box::new(fs)).unwrap();

    assert_eq!(run(&mut rt, &mut interp, "import helper\nimport helper\nprint(helper.answer)"), 0);
    // the module body runs once
    assert_eq!(cap.take().0, "loading\n42\n");

    assert_eq!(run(&mut rt, &mut interp, "print(open('data.txt').read())"), 0);
    assert_eq!(cap.take().0, "payload\n");

    assert_eq!(run(&mut rt, &mut interp, "open('/missing.txt')"), 1);
    assert!(cap.take().1.ends_with("OSError: [Errno 2] ENOENT\n"));
}

#[test]
fn test_failed_import_is_retried() {
    let (mut rt, mut interp, cap) = boot();
    let fs = MemoryFs::new().with_file("broken.py", "print('attempt')\nraise ValueError('bad module')\n");
    *rt.vfs_mut() = Vfs::rooted(Box::new(fs)).unwrap();

    assert_eq!(run(&mut rt, &mut interp, "import broken"), 1);
    let (stdout, stderr) = cap.take();
    assert_eq!(stdout, "attempt\n");
    assert_eq!(
        stderr,
        "Traceback (most recent call last):\n  File \"broken.py\", line 2, in <module>\nValueError: bad module\n"
    );
    // the failed module was not left registered, so its body runs again
    assert_eq!(run(&mut rt, &mut interp, "import broken"), 1);
    assert_eq!(cap.stdout(), "attempt\n");
}

#[test]
fn test_self_import_terminates() {
    let (mut rt, mut interp, cap) = boot();
    let fs = MemoryFs::new().with_file("selfref.py", "import selfref\nvalue = 1\n");
    *rt.vfs_mut() = Vfs::rooted(Box::new(fs)).unwrap();
    assert_eq!(run(&mut rt, &mut interp, "import selfref\nprint(selfref.value)"), 0);
    assert_eq!(cap.stdout(), "1\n");
}

#[test]
fn test_degraded_vfs() {
    let (mut rt, mut interp, cap) = boot();
    *rt.vfs_mut() = Vfs::Degraded(NoVfs);
    assert_eq!(run(&mut rt, &mut interp, "print(open('anything'))"), 0);
    assert_eq!(cap.take().0, "None\n");
    assert_eq!(run(&mut rt, &mut interp, "import os"), 1);
    assert!(cap.stderr().ends_with("ImportError: no module named 'os'\n"));
}
