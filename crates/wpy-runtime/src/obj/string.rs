//! Strings.
//!
//! Literals are interned and stored as immediates; strings built at run time
//! live on the heap as `[header(len = bytes), utf-8 bytes...]`.

use crate::gc::AllocFlags;
use crate::memory::WORD_BYTES;
use crate::runtime::Runtime;

use super::{header, header_len, ObjKind, PyResult, Value};

pub fn new(rt: &mut Runtime, s: &str) -> PyResult<Value> {
    let r = rt.gc_alloc(WORD_BYTES + s.len(), AllocFlags::NONE)?;
    let words = rt.obj_words_mut(r);
    words[0] = header(ObjKind::Str, s.len());
    // SAFETY: the payload words are plain memory owned by this allocation and
    // hold at least `s.len()` bytes; u8 has no alignment requirement.
    let payload = unsafe { std::slice::from_raw_parts_mut(words[1..].as_mut_ptr() as *mut u8, s.len()) };
    payload.copy_from_slice(s.as_bytes());
    Ok(Value::from_obj(r))
}

/// Contents of a string value, interned or heap.
pub fn view(rt: &Runtime, v: Value) -> Option<&str> {
    if let Some(q) = v.as_qstr() {
        return Some(rt.qstr_str(q));
    }
    if rt.obj_kind(v)? != ObjKind::Str {
        return None;
    }
    let words = rt.obj_words(v.as_obj()?);
    let len = header_len(words[0]);
    // SAFETY: written by `new` from a valid `&str` of `len` bytes.
    let bytes = unsafe { std::slice::from_raw_parts(words[1..].as_ptr() as *const u8, len) };
    std::str::from_utf8(bytes).ok()
}

pub fn is_str(rt: &Runtime, v: Value) -> bool {
    v.as_qstr().is_some() || rt.obj_kind(v) == Some(ObjKind::Str)
}

/// Quoted form, preferring single quotes.
pub fn repr(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Output, RuntimeConfig};

    #[test]
    fn test_heap_and_interned_views() {
        let mut rt = Runtime::boot(RuntimeConfig::default().with_heap_size(16 * 1024), Output::capture().0);
        let heap = new(&mut rt, "héllo wörld, long enough to span blocks").unwrap();
        assert!(heap.as_obj().is_some());
        assert_eq!(view(&rt, heap), Some("héllo wörld, long enough to span blocks"));
        let q = Value::qstr(rt.intern("abc"));
        assert_eq!(view(&rt, q), Some("abc"));
        assert!(is_str(&rt, q) && is_str(&rt, heap));
        assert!(!is_str(&rt, Value::NONE));
        let empty = new(&mut rt, "").unwrap();
        assert_eq!(view(&rt, empty), Some(""));
    }

    #[test]
    fn test_repr_quoting() {
        assert_eq!(repr("x"), "'x'");
        assert_eq!(repr("it's"), "\"it's\"");
        assert_eq!(repr("a'b\"c"), "'a\\'b\"c'");
        assert_eq!(repr("tab\there\n"), "'tab\\there\\n'");
    }
}
