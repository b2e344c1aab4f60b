//! Modules, file objects and bound methods.

use crate::gc::AllocFlags;
use crate::memory::WORD_BYTES;
use crate::qstr::Qstr;
use crate::runtime::Runtime;

use super::{dict, header, string, ObjKind, PyResult, Value};

/// `[header, name, globals]`
pub fn new_module(rt: &mut Runtime, name: Qstr) -> PyResult<Value> {
    let globals = dict::new(rt, 8)?;
    let r = rt.with_temp_root(globals, |rt| {
        let dunder = rt.intern("__name__");
        dict::store(rt, globals, dunder, Value::qstr(name))?;
        rt.gc_alloc(3 * WORD_BYTES, AllocFlags::NONE)
    })?;
    let words = rt.obj_words_mut(r);
    words[0] = header(ObjKind::Module, 0);
    words[1] = Value::qstr(name).raw();
    words[2] = globals.raw();
    Ok(Value::from_obj(r))
}

pub fn is_module(rt: &Runtime, v: Value) -> bool {
    rt.obj_kind(v) == Some(ObjKind::Module)
}

pub fn module_globals(rt: &Runtime, m: Value) -> Option<Value> {
    let r = m.as_obj().filter(|_| is_module(rt, m))?;
    Some(Value::from_raw(rt.obj_words(r)[2]))
}

pub fn module_name(rt: &Runtime, m: Value) -> Option<Qstr> {
    let r = m.as_obj().filter(|_| is_module(rt, m))?;
    Value::from_raw(rt.obj_words(r)[1]).as_qstr()
}

/// `[header, contents, position]`. Holds the whole file read at open time.
pub fn new_file(rt: &mut Runtime, contents: &str) -> PyResult<Value> {
    let contents = string::new(rt, contents)?;
    let r = rt.with_temp_root(contents, |rt| rt.gc_alloc(3 * WORD_BYTES, AllocFlags::HAS_FINALISER))?;
    let words = rt.obj_words_mut(r);
    words[0] = header(ObjKind::File, 0);
    words[1] = contents.raw();
    words[2] = Value::small_int(0).map_or(0, Value::raw);
    Ok(Value::from_obj(r))
}

pub fn is_file(rt: &Runtime, v: Value) -> bool {
    rt.obj_kind(v) == Some(ObjKind::File)
}

/// Remaining contents; the file is at EOF afterwards.
pub fn file_read(rt: &mut Runtime, f: Value) -> PyResult<Value> {
    let Some(r) = f.as_obj().filter(|_| is_file(rt, f)) else {
        return Err(rt.raise_msg(super::ExcType::TypeError, "expected a file"));
    };
    let words = rt.obj_words(r);
    let contents = Value::from_raw(words[1]);
    let pos = Value::from_raw(words[2]).as_small_int().unwrap_or(0) as usize;
    let full = string::view(rt, contents).unwrap_or("");
    if pos == 0 {
        let len = full.len();
        rt.obj_words_mut(r)[2] = Value::small_int(len as isize).map_or(0, Value::raw);
        return Ok(contents);
    }
    let rest = full.get(pos..).unwrap_or("").to_string();
    let out = string::new(rt, &rest)?;
    let end = pos + rest.len();
    rt.obj_words_mut(r)[2] = Value::small_int(end as isize).map_or(0, Value::raw);
    Ok(out)
}

/// `[header, self, method name]`
pub fn new_bound_method(rt: &mut Runtime, this: Value, method: Qstr) -> PyResult<Value> {
    let r = rt.gc_alloc(3 * WORD_BYTES, AllocFlags::NONE)?;
    let words = rt.obj_words_mut(r);
    words[0] = header(ObjKind::BoundMethod, 0);
    words[1] = this.raw();
    words[2] = Value::qstr(method).raw();
    Ok(Value::from_obj(r))
}

pub fn bound_method_parts(rt: &Runtime, v: Value) -> Option<(Value, Qstr)> {
    let r = v.as_obj().filter(|_| rt.obj_kind(v) == Some(ObjKind::BoundMethod))?;
    let words = rt.obj_words(r);
    Some((Value::from_raw(words[1]), Value::from_raw(words[2]).as_qstr()?))
}
