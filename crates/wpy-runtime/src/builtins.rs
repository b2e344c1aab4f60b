//! Builtin functions and the `gc` module.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use tracing::debug;

use crate::obj::{dict, exc, module, ops, string, ExcType, PyResult, Value};
use crate::runtime::Runtime;
use crate::vfs::PathResolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum BuiltinFn {
    Print,
    Int,
    Str,
    Repr,
    Len,
    Open,
    GcCollect,
    GcMemFree,
    GcMemAlloc,
}

impl BuiltinFn {
    pub fn name(self) -> &'static str {
        match self {
            BuiltinFn::Print => "print",
            BuiltinFn::Int => "int",
            BuiltinFn::Str => "str",
            BuiltinFn::Repr => "repr",
            BuiltinFn::Len => "len",
            BuiltinFn::Open => "open",
            BuiltinFn::GcCollect => "collect",
            BuiltinFn::GcMemFree => "mem_free",
            BuiltinFn::GcMemAlloc => "mem_alloc",
        }
    }
}

const GLOBAL_FNS: [BuiltinFn; 6] =
    [BuiltinFn::Print, BuiltinFn::Int, BuiltinFn::Str, BuiltinFn::Repr, BuiltinFn::Len, BuiltinFn::Open];

const GC_FNS: [BuiltinFn; 3] = [BuiltinFn::GcCollect, BuiltinFn::GcMemFree, BuiltinFn::GcMemAlloc];

/// Fill the builtins namespace and register builtin modules.
pub(crate) fn populate(rt: &mut Runtime) -> PyResult<()> {
    let builtins = rt.builtins();
    for f in GLOBAL_FNS {
        let name = rt.intern(f.name());
        dict::store(rt, builtins, name, Value::builtin(f))?;
    }
    for ty in ExcType::ALL {
        let name = rt.intern(ty.name());
        dict::store(rt, builtins, name, Value::exc_type(ty))?;
    }

    let gc_name = rt.intern("gc");
    let gc = module::new_module(rt, gc_name)?;
    let modules = rt.builtin_modules();
    rt.with_temp_root(gc, |rt| dict::store(rt, modules, gc_name, gc))?;
    if let Some(globals) = module::module_globals(rt, gc) {
        for f in GC_FNS {
            let name = rt.intern(f.name());
            dict::store(rt, globals, name, Value::builtin(f))?;
        }
    }
    debug!(count = GLOBAL_FNS.len() + ExcType::ALL.len(), "builtins registered");
    Ok(())
}

fn expect_args(rt: &mut Runtime, args: &[Value], min: usize, max: usize) -> PyResult<()> {
    if args.len() < min || args.len() > max {
        return Err(ops::arg_count_error(rt, max, args.len()));
    }
    Ok(())
}

pub fn call(rt: &mut Runtime, f: BuiltinFn, args: &[Value]) -> PyResult<Value> {
    match f {
        BuiltinFn::Print => {
            let parts: Vec<String> = args.iter().map(|&a| ops::str_of(rt, a)).collect();
            let mut line = parts.join(" ");
            line.push('\n');
            rt.out().write(&line);
            Ok(Value::NONE)
        }
        BuiltinFn::Int => {
            expect_args(rt, args, 0, 1)?;
            match args.first() {
                None => Ok(Value::small_int(0).unwrap_or(Value::NONE)),
                Some(&v) => int(rt, v),
            }
        }
        BuiltinFn::Str => {
            expect_args(rt, args, 0, 1)?;
            match args.first() {
                None => string::new(rt, ""),
                Some(&v) if string::is_str(rt, v) => Ok(v),
                Some(&v) => {
                    let s = ops::str_of(rt, v);
                    string::new(rt, &s)
                }
            }
        }
        BuiltinFn::Repr => {
            expect_args(rt, args, 1, 1)?;
            let s = ops::repr_of(rt, args[0]);
            string::new(rt, &s)
        }
        BuiltinFn::Len => {
            expect_args(rt, args, 1, 1)?;
            let v = args[0];
            let n = if let Some(s) = string::view(rt, v) {
                s.chars().count()
            } else if dict::is_dict(rt, v) {
                dict::len(rt, v)
            } else {
                let msg = format!("object of type '{}' has no len()", ops::type_name(rt, v));
                return Err(rt.raise_msg(ExcType::TypeError, &msg));
            };
            ops::int_value(rt, n as i128)
        }
        BuiltinFn::Open => {
            expect_args(rt, args, 1, 1)?;
            open(rt, args[0])
        }
        BuiltinFn::GcCollect => {
            expect_args(rt, args, 0, 0)?;
            rt.gc_collect();
            Ok(Value::NONE)
        }
        BuiltinFn::GcMemFree => {
            expect_args(rt, args, 0, 0)?;
            let free = rt.gc_info().free;
            ops::int_value(rt, free as i128)
        }
        BuiltinFn::GcMemAlloc => {
            expect_args(rt, args, 0, 0)?;
            let used = rt.gc_info().used;
            ops::int_value(rt, used as i128)
        }
    }
}

fn int(rt: &mut Runtime, v: Value) -> PyResult<Value> {
    if let Some(n) = v.as_int_like() {
        return ops::int_value(rt, n as i128);
    }
    let Some(s) = string::view(rt, v) else {
        let msg = format!("can't convert {} to int", ops::type_name(rt, v));
        return Err(rt.raise_msg(ExcType::TypeError, &msg));
    };
    let s = s.to_string();
    match parse_int(&s) {
        Some(n) => ops::int_value(rt, n),
        None => {
            let msg = format!("invalid syntax for integer with base 10: {}", string::repr(&s));
            Err(rt.raise_msg(ExcType::ValueError, &msg))
        }
    }
}

/// Decimal literal with optional sign, surrounding whitespace and `_`
/// separators between digits.
fn parse_int(s: &str) -> Option<i128> {
    let s = s.trim();
    let (neg, digits) = match s.as_bytes().first()? {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };
    if digits.is_empty() || digits.starts_with('_') || digits.ends_with('_') || digits.contains("__") {
        return None;
    }
    let mut n: i128 = 0;
    for c in digits.chars().filter(|&c| c != '_') {
        let d = c.to_digit(10)? as i128;
        // saturate; anything past the small-int range overflows later
        n = n.saturating_mul(10).saturating_add(d);
    }
    Some(if neg { -n } else { n })
}

fn open(rt: &mut Runtime, path: Value) -> PyResult<Value> {
    let Some(p) = string::view(rt, path) else {
        let msg = format!("expected str for path, got '{}'", ops::type_name(rt, path));
        return Err(rt.raise_msg(ExcType::TypeError, &msg));
    };
    let p = p.to_string();
    match rt.vfs().open(&p) {
        Ok(Some(contents)) => module::new_file(rt, &contents),
        Ok(None) => Ok(Value::NONE),
        Err(e) => {
            debug!(path = %p, error = %e, "open failed");
            Err(rt.raise_os_error(e.errno()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{Captured, Output};
    use crate::vfs::{MemoryFs, NoVfs, Vfs};
    use crate::RuntimeConfig;

    fn boot() -> (Runtime, Captured) {
        let (out, cap) = Output::capture();
        (Runtime::boot(RuntimeConfig::default().with_heap_size(32 * 1024), out), cap)
    }

    fn s(rt: &mut Runtime, text: &str) -> Value {
        string::new(rt, text).unwrap()
    }

    #[test]
    fn test_print_joins_with_spaces() {
        let (mut rt, cap) = boot();
        let a = s(&mut rt, "a");
        call(&mut rt, BuiltinFn::Print, &[a, Value::small_int(1).unwrap(), Value::NONE]).unwrap();
        call(&mut rt, BuiltinFn::Print, &[]).unwrap();
        assert_eq!(cap.stdout(), "a 1 None\n\n");
    }

    #[test]
    fn test_int_parsing() {
        assert_eq!(parse_int(" 42 "), Some(42));
        assert_eq!(parse_int("-1_000"), Some(-1000));
        assert_eq!(parse_int("+7"), Some(7));
        assert_eq!(parse_int("x"), None);
        assert_eq!(parse_int("1__0"), None);
        assert_eq!(parse_int(""), None);

        let (mut rt, _) = boot();
        let bad = s(&mut rt, "x");
        let err = call(&mut rt, BuiltinFn::Int, &[bad]).unwrap_err();
        assert_eq!(exc::describe(&rt, err.0), "ValueError: invalid syntax for integer with base 10: 'x'");
        let huge = s(&mut rt, "99999999999999999999999999");
        let err = call(&mut rt, BuiltinFn::Int, &[huge]).unwrap_err();
        assert_eq!(exc::exc_type(&rt, err.0), Some(ExcType::OverflowError));
    }

    #[test]
    fn test_len_and_arity() {
        let (mut rt, _) = boot();
        let v = s(&mut rt, "héllo");
        assert_eq!(call(&mut rt, BuiltinFn::Len, &[v]).unwrap(), Value::small_int(5).unwrap());
        let err = call(&mut rt, BuiltinFn::Len, &[]).unwrap_err();
        assert_eq!(
            exc::describe(&rt, err.0),
            "TypeError: function takes 1 positional arguments but 0 were given"
        );
        let err = call(&mut rt, BuiltinFn::Len, &[Value::NONE]).unwrap_err();
        assert_eq!(exc::describe(&rt, err.0), "TypeError: object of type 'NoneType' has no len()");
    }

    #[test]
    fn test_open_through_vfs() {
        let (mut rt, _) = boot();
        *rt.vfs_mut() = Vfs::rooted(Box::new(MemoryFs::new().with_file("data.txt", "payload"))).unwrap();
        let path = s(&mut rt, "/data.txt");
        let f = call(&mut rt, BuiltinFn::Open, &[path]).unwrap();
        let read = rt.intern("read");
        let method = ops::load_attr(&mut rt, f, read).unwrap();
        let text = ops::call(&mut rt, method, &[]).unwrap();
        assert_eq!(string::view(&rt, text), Some("payload"));

        let missing = s(&mut rt, "/missing.txt");
        let err = call(&mut rt, BuiltinFn::Open, &[missing]).unwrap_err();
        assert_eq!(exc::describe(&rt, err.0), "OSError: [Errno 2] ENOENT");
    }

    #[test]
    fn test_open_degraded_returns_none() {
        let (mut rt, _) = boot();
        *rt.vfs_mut() = Vfs::Degraded(NoVfs);
        let path = s(&mut rt, "/etc/hostname");
        assert_eq!(call(&mut rt, BuiltinFn::Open, &[path]).unwrap(), Value::NONE);
        assert_eq!(rt.active_exception(), None);
    }

    #[test]
    fn test_gc_stats() {
        let (mut rt, _) = boot();
        let free = call(&mut rt, BuiltinFn::GcMemFree, &[]).unwrap().as_small_int().unwrap();
        let used = call(&mut rt, BuiltinFn::GcMemAlloc, &[]).unwrap().as_small_int().unwrap();
        assert_eq!((free + used) as usize, rt.gc_info().total);
        assert_eq!(call(&mut rt, BuiltinFn::GcCollect, &[]).unwrap(), Value::NONE);
        assert!(rt.gc_info().collections >= 1);
    }
}
