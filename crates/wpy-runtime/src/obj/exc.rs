//! Exception instances.
//!
//! Layout: `[header(len = nargs), type, line, file, args...]`. `line` and
//! `file` stay null until the exception leaves the frame that raised it.

use crate::gc::{AllocFlags, GcHeap, HeapError};
use crate::memory::WORD_BYTES;
use crate::qstr::Qstr;
use crate::runtime::Runtime;

use super::{header, header_len, ops, string, ExcType, ObjKind, PyResult, Value};

const TYPE: usize = 1;
const LINE: usize = 2;
const FILE: usize = 3;
const ARGS: usize = 4;

pub fn new(rt: &mut Runtime, ty: ExcType, args: &[Value]) -> PyResult<Value> {
    let r = rt.gc_alloc((ARGS + args.len()) * WORD_BYTES, AllocFlags::NONE)?;
    let words = rt.obj_words_mut(r);
    words[0] = header(ObjKind::Exception, args.len());
    words[TYPE] = Value::exc_type(ty).raw();
    for (slot, arg) in words[ARGS..].iter_mut().zip(args) {
        *slot = arg.raw();
    }
    Ok(Value::from_obj(r))
}

/// Allocate an argument-less instance straight from the heap, without
/// collecting. Used for the instance raised when the heap is full.
pub(crate) fn new_static(heap: &mut GcHeap, ty: ExcType) -> Result<Value, HeapError> {
    let r = heap.alloc(ARGS * WORD_BYTES, AllocFlags::NONE)?;
    let words = heap.words_mut(r);
    words[0] = header(ObjKind::Exception, 0);
    words[TYPE] = Value::exc_type(ty).raw();
    Ok(Value::from_obj(r))
}

pub fn new_with_msg(rt: &mut Runtime, ty: ExcType, msg: &str) -> PyResult<Value> {
    let msg = string::new(rt, msg)?;
    rt.with_temp_root(msg, |rt| new(rt, ty, &[msg]))
}

pub fn is_exception(rt: &Runtime, v: Value) -> bool {
    rt.obj_kind(v) == Some(ObjKind::Exception)
}

pub fn exc_type(rt: &Runtime, v: Value) -> Option<ExcType> {
    if !is_exception(rt, v) {
        return None;
    }
    Value::from_raw(rt.obj_words(v.as_obj()?)[TYPE]).as_exc_type()
}

/// Whether `v` is an instance of `ty` or one of its subclasses.
pub fn matches(rt: &Runtime, v: Value, ty: ExcType) -> bool {
    exc_type(rt, v).map_or(false, |t| t.is_subclass_of(ty))
}

pub fn args(rt: &Runtime, v: Value) -> Vec<Value> {
    let Some(r) = v.as_obj().filter(|_| is_exception(rt, v)) else {
        return Vec::new();
    };
    let words = rt.obj_words(r);
    let n = header_len(words[0]);
    words[ARGS..ARGS + n].iter().map(|&w| Value::from_raw(w)).collect()
}

/// First argument, if any.
pub fn value(rt: &Runtime, v: Value) -> Option<Value> {
    args(rt, v).first().copied()
}

/// Attach the raising location unless one is already recorded.
pub fn set_location(rt: &mut Runtime, v: Value, file: Qstr, line: usize) {
    let Some(r) = v.as_obj().filter(|_| is_exception(rt, v)) else {
        return;
    };
    let line = Value::small_int(line as isize).unwrap_or(Value::NONE);
    let words = rt.obj_words_mut(r);
    if words[LINE] == 0 {
        words[LINE] = line.raw();
        words[FILE] = Value::qstr(file).raw();
    }
}

/// Forget the recorded location so a reused instance can be raised afresh.
pub(crate) fn clear_location(rt: &mut Runtime, v: Value) {
    if let Some(r) = v.as_obj().filter(|_| is_exception(rt, v)) {
        let words = rt.obj_words_mut(r);
        words[LINE] = 0;
        words[FILE] = 0;
    }
}

pub fn location(rt: &Runtime, v: Value) -> Option<(Qstr, usize)> {
    let r = v.as_obj().filter(|_| is_exception(rt, v))?;
    let words = rt.obj_words(r);
    let line = Value::from_raw(words[LINE]).as_small_int()?;
    let file = Value::from_raw(words[FILE]).as_qstr()?;
    Some((file, line as usize))
}

/// Text after `Type: ` in a report.
pub fn message(rt: &Runtime, v: Value) -> String {
    let args = args(rt, v);
    match args.as_slice() {
        [] => String::new(),
        [errno] if exc_type(rt, v) == Some(ExcType::OSError) && errno.as_small_int().is_some() => {
            let n = errno.as_small_int().unwrap_or(0);
            match errno_name(n) {
                Some(name) => format!("[Errno {}] {}", n, name),
                None => n.to_string(),
            }
        }
        [arg] => ops::str_of(rt, *arg),
        _ => {
            let parts: Vec<String> = args.iter().map(|a| ops::repr_of(rt, *a)).collect();
            format!("({})", parts.join(", "))
        }
    }
}

/// `Type` or `Type: message`.
pub fn describe(rt: &Runtime, v: Value) -> String {
    let name = exc_type(rt, v).map_or("BaseException", ExcType::name);
    let msg = message(rt, v);
    if msg.is_empty() {
        name.to_string()
    } else {
        format!("{}: {}", name, msg)
    }
}

/// Full report as printed for an uncaught exception.
pub fn format_traceback(rt: &Runtime, v: Value) -> String {
    let mut out = String::from("Traceback (most recent call last):\n");
    if let Some((file, line)) = location(rt, v) {
        out.push_str(&format!("  File \"{}\", line {}, in <module>\n", rt.qstr_str(file), line));
    }
    out.push_str(&describe(rt, v));
    out.push('\n');
    out
}

fn errno_name(n: isize) -> Option<&'static str> {
    Some(match n {
        1 => "EPERM",
        2 => "ENOENT",
        5 => "EIO",
        9 => "EBADF",
        11 => "EAGAIN",
        12 => "ENOMEM",
        13 => "EACCES",
        17 => "EEXIST",
        19 => "ENODEV",
        20 => "ENOTDIR",
        21 => "EISDIR",
        22 => "EINVAL",
        _ => return None,
    })
}
