//! Operations on values: formatting, arithmetic, attributes and calls.

use crate::builtins;
use crate::qstr::Qstr;
use crate::runtime::Runtime;

use super::{dict, exc, module, string, ExcType, ObjKind, PyResult, Raised, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    FloorDiv,
    Mod,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl BinaryOp {
    pub fn dunder(self) -> &'static str {
        match self {
            BinaryOp::Add => "__add__",
            BinaryOp::Sub => "__sub__",
            BinaryOp::Mul => "__mul__",
            BinaryOp::FloorDiv => "__floordiv__",
            BinaryOp::Mod => "__mod__",
            BinaryOp::Eq => "__eq__",
            BinaryOp::NotEq => "__ne__",
            BinaryOp::Lt => "__lt__",
            BinaryOp::LtEq => "__le__",
            BinaryOp::Gt => "__gt__",
            BinaryOp::GtEq => "__ge__",
        }
    }
}

pub fn type_name(rt: &Runtime, v: Value) -> &'static str {
    if v.as_small_int().is_some() {
        return "int";
    }
    if v.as_bool().is_some() {
        return "bool";
    }
    if v.is_none() {
        return "NoneType";
    }
    if v.as_qstr().is_some() {
        return "str";
    }
    if v.as_builtin().is_some() {
        return "function";
    }
    if v.as_exc_type().is_some() {
        return "type";
    }
    match rt.obj_kind(v) {
        Some(ObjKind::Str) => "str",
        Some(ObjKind::Exception) => exc::exc_type(rt, v).map_or("BaseException", ExcType::name),
        Some(ObjKind::Dict) => "dict",
        Some(ObjKind::Module) => "module",
        Some(ObjKind::File) => "TextIOWrapper",
        Some(ObjKind::BoundMethod) => "bound_method",
        _ => "object",
    }
}

/// `str(v)`
pub fn str_of(rt: &Runtime, v: Value) -> String {
    if let Some(s) = string::view(rt, v) {
        return s.to_string();
    }
    if exc::is_exception(rt, v) {
        return exc::message(rt, v);
    }
    repr_of(rt, v)
}

/// `repr(v)`
pub fn repr_of(rt: &Runtime, v: Value) -> String {
    if let Some(n) = v.as_small_int() {
        return n.to_string();
    }
    if let Some(b) = v.as_bool() {
        return if b { "True" } else { "False" }.to_string();
    }
    if v.is_none() {
        return "None".to_string();
    }
    if let Some(s) = string::view(rt, v) {
        return string::repr(s);
    }
    if let Some(f) = v.as_builtin() {
        return format!("<function {}>", f.name());
    }
    if let Some(t) = v.as_exc_type() {
        return format!("<class '{}'>", t.name());
    }
    if exc::is_exception(rt, v) {
        let name = type_name(rt, v);
        let args: Vec<String> = exc::args(rt, v).into_iter().map(|a| repr_of(rt, a)).collect();
        return format!("{}({})", name, args.join(", "));
    }
    if let Some(name) = module::module_name(rt, v) {
        return format!("<module '{}'>", rt.qstr_str(name));
    }
    format!("<{} object at {:#x}>", type_name(rt, v), v.raw())
}

pub fn truthy(rt: &Runtime, v: Value) -> bool {
    if let Some(n) = v.as_int_like() {
        return n != 0;
    }
    if v.is_none() {
        return false;
    }
    if let Some(s) = string::view(rt, v) {
        return !s.is_empty();
    }
    if dict::is_dict(rt, v) {
        return dict::len(rt, v) != 0;
    }
    true
}

/// Value equality: numeric for ints and bools, by contents for strings,
/// identity otherwise.
pub fn equals(rt: &Runtime, a: Value, b: Value) -> bool {
    if let (Some(x), Some(y)) = (a.as_int_like(), b.as_int_like()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (string::view(rt, a), string::view(rt, b)) {
        return x == y;
    }
    a == b
}

pub fn int_value(rt: &mut Runtime, n: i128) -> PyResult<Value> {
    isize::try_from(n)
        .ok()
        .and_then(Value::small_int)
        .ok_or_else(|| rt.raise_msg(ExcType::OverflowError, "small int overflow"))
}

pub fn binary_op(rt: &mut Runtime, op: BinaryOp, a: Value, b: Value) -> PyResult<Value> {
    match op {
        BinaryOp::Eq => return Ok(Value::bool(equals(rt, a, b))),
        BinaryOp::NotEq => return Ok(Value::bool(!equals(rt, a, b))),
        _ => {}
    }

    if let (Some(x), Some(y)) = (a.as_int_like(), b.as_int_like()) {
        let (x, y) = (x as i128, y as i128);
        return match op {
            BinaryOp::Add => int_value(rt, x + y),
            BinaryOp::Sub => int_value(rt, x - y),
            BinaryOp::Mul => int_value(rt, x * y),
            BinaryOp::FloorDiv | BinaryOp::Mod if y == 0 => {
                Err(rt.raise_msg(ExcType::ZeroDivisionError, "divide by zero"))
            }
            BinaryOp::FloorDiv => int_value(rt, x.div_euclid(y) - if y < 0 && x.rem_euclid(y) != 0 { 1 } else { 0 }),
            BinaryOp::Mod => {
                let r = x.rem_euclid(y);
                int_value(rt, if y < 0 && r != 0 { r + y } else { r })
            }
            BinaryOp::Lt => Ok(Value::bool(x < y)),
            BinaryOp::LtEq => Ok(Value::bool(x <= y)),
            BinaryOp::Gt => Ok(Value::bool(x > y)),
            BinaryOp::GtEq => Ok(Value::bool(x >= y)),
            BinaryOp::Eq => Ok(Value::bool(x == y)),
            BinaryOp::NotEq => Ok(Value::bool(x != y)),
        };
    }

    if let (Some(x), Some(y)) = (string::view(rt, a), string::view(rt, b)) {
        match op {
            BinaryOp::Add => {
                let joined = format!("{}{}", x, y);
                return string::new(rt, &joined);
            }
            BinaryOp::Lt => return Ok(Value::bool(x < y)),
            BinaryOp::LtEq => return Ok(Value::bool(x <= y)),
            BinaryOp::Gt => return Ok(Value::bool(x > y)),
            BinaryOp::GtEq => return Ok(Value::bool(x >= y)),
            _ => {}
        }
    }

    if op == BinaryOp::Mul {
        let repeated = match (string::view(rt, a), b.as_int_like(), a.as_int_like(), string::view(rt, b)) {
            (Some(s), Some(n), _, _) | (_, _, Some(n), Some(s)) => Some((s.to_string(), n.max(0) as usize)),
            _ => None,
        };
        if let Some((s, n)) = repeated {
            if s.len().checked_mul(n).map_or(true, |total| total > rt.config().heap_size) {
                return Err(rt.raise_type(ExcType::MemoryError));
            }
            return string::new(rt, &s.repeat(n));
        }
    }

    let msg = format!("unsupported types for {}: '{}', '{}'", op.dunder(), type_name(rt, a), type_name(rt, b));
    Err(rt.raise_msg(ExcType::TypeError, &msg))
}

pub fn unary_neg(rt: &mut Runtime, v: Value) -> PyResult<Value> {
    match v.as_int_like() {
        Some(n) => int_value(rt, -(n as i128)),
        None => {
            let msg = format!("unsupported type for __neg__: '{}'", type_name(rt, v));
            Err(rt.raise_msg(ExcType::TypeError, &msg))
        }
    }
}

pub fn load_attr(rt: &mut Runtime, obj: Value, attr: Qstr) -> PyResult<Value> {
    if let Some(globals) = module::module_globals(rt, obj) {
        if let Some(v) = dict::lookup(rt, globals, attr) {
            return Ok(v);
        }
    }
    if module::is_file(rt, obj) && rt.qstr_str(attr) == "read" {
        return module::new_bound_method(rt, obj, attr);
    }
    let msg = format!("'{}' object has no attribute '{}'", type_name(rt, obj), rt.qstr_str(attr));
    Err(rt.raise_msg(ExcType::AttributeError, &msg))
}

/// Call `f` with positional `args`.
///
/// `args` may be a copy; the caller keeps the originals rooted for the
/// duration of the call.
pub fn call(rt: &mut Runtime, f: Value, args: &[Value]) -> PyResult<Value> {
    if let Some(b) = f.as_builtin() {
        return builtins::call(rt, b, args);
    }
    if let Some(ty) = f.as_exc_type() {
        return exc::new(rt, ty, args);
    }
    if let Some((this, _method)) = module::bound_method_parts(rt, f) {
        if !args.is_empty() {
            return Err(arg_count_error(rt, 0, args.len()));
        }
        return module::file_read(rt, this);
    }
    let msg = format!("'{}' object isn't callable", type_name(rt, f));
    Err(rt.raise_msg(ExcType::TypeError, &msg))
}

pub fn arg_count_error(rt: &mut Runtime, expected: usize, given: usize) -> Raised {
    let msg = format!("function takes {} positional arguments but {} were given", expected, given);
    rt.raise_msg(ExcType::TypeError, &msg)
}
