//! Namespace dictionaries keyed by interned names.
//!
//! A dict is `[header(len = used), table]`; the table is a separate object
//! `[header(len = 2 * cap), key0, value0, ...]` probed linearly. Keys are
//! qstr values, an all-zero key slot is empty. The table doubles once it is
//! three quarters full.

use crate::gc::{AllocFlags, GcRef};
use crate::memory::WORD_BYTES;
use crate::qstr::Qstr;
use crate::runtime::Runtime;

use super::{header, header_len, ObjKind, PyResult, Value};

const TABLE: usize = 1;
const MIN_CAP: usize = 4;

fn alloc_table(rt: &mut Runtime, cap: usize) -> PyResult<GcRef> {
    let r = rt.gc_alloc((1 + 2 * cap) * WORD_BYTES, AllocFlags::NONE)?;
    rt.obj_words_mut(r)[0] = header(ObjKind::Table, 2 * cap);
    Ok(r)
}

/// New empty dict with room for about `cap` entries.
pub fn new(rt: &mut Runtime, cap: usize) -> PyResult<Value> {
    let cap = cap.max(MIN_CAP).next_power_of_two();
    let table = alloc_table(rt, cap)?;
    let r = rt.with_temp_root(Value::from_obj(table), |rt| rt.gc_alloc(2 * WORD_BYTES, AllocFlags::NONE))?;
    let words = rt.obj_words_mut(r);
    words[0] = header(ObjKind::Dict, 0);
    words[TABLE] = table.addr();
    Ok(Value::from_obj(r))
}

pub fn is_dict(rt: &Runtime, v: Value) -> bool {
    rt.obj_kind(v) == Some(ObjKind::Dict)
}

/// Number of entries.
pub fn len(rt: &Runtime, dict: Value) -> usize {
    dict.as_obj().map_or(0, |r| header_len(rt.obj_words(r)[0]))
}

fn table(rt: &Runtime, dict: Value) -> Option<GcRef> {
    let r = dict.as_obj().filter(|_| is_dict(rt, dict))?;
    Value::from_raw(rt.obj_words(r)[TABLE]).as_obj()
}

/// Key/value slots of a table, without the block padding after them.
fn slots(words: &[usize]) -> &[usize] {
    &words[1..1 + header_len(words[0])]
}

fn slots_mut(words: &mut [usize]) -> &mut [usize] {
    let n = header_len(words[0]);
    &mut words[1..1 + n]
}

/// Slot index holding `key`, or the empty slot where it would go.
fn probe(slots: &[usize], key: Value) -> usize {
    let cap = slots.len() / 2;
    let mut i = hash(key) & (cap - 1);
    loop {
        let k = slots[2 * i];
        if k == 0 || k == key.raw() {
            return i;
        }
        i = (i + 1) & (cap - 1);
    }
}

#[inline]
fn hash(key: Value) -> usize {
    (key.raw() >> 3).wrapping_mul(0x9e37_79b9)
}

pub fn lookup(rt: &Runtime, dict: Value, key: Qstr) -> Option<Value> {
    let t = table(rt, dict)?;
    let slots = slots(rt.obj_words(t));
    let key = Value::qstr(key);
    let i = probe(slots, key);
    (slots[2 * i] != 0).then(|| Value::from_raw(slots[2 * i + 1]))
}

pub fn store(rt: &mut Runtime, dict: Value, key: Qstr, value: Value) -> PyResult<()> {
    let Some(d) = dict.as_obj().filter(|_| is_dict(rt, dict)) else {
        crate::fatal::fatal_error("store into non-dict");
    };
    let Some(mut t) = table(rt, dict) else {
        crate::fatal::fatal_error("dict without table");
    };
    let key = Value::qstr(key);
    let used = header_len(rt.obj_words(d)[0]);
    let cap = header_len(rt.obj_words(t)[0]) / 2;

    let i = probe(slots(rt.obj_words(t)), key);
    if rt.obj_words(t)[1 + 2 * i] != 0 {
        rt.obj_words_mut(t)[2 + 2 * i] = value.raw();
        return Ok(());
    }

    if (used + 1) * 4 > cap * 3 {
        t = grow(rt, d, t, cap * 2)?;
    }
    let slots = slots_mut(rt.obj_words_mut(t));
    let i = probe(slots, key);
    slots[2 * i] = key.raw();
    slots[2 * i + 1] = value.raw();
    rt.obj_words_mut(d)[0] = header(ObjKind::Dict, used + 1);
    Ok(())
}

/// Delete `key`, returning whether it was present.
///
/// Entries after the hole are shifted back so probe chains stay unbroken.
pub fn remove(rt: &mut Runtime, dict: Value, key: Qstr) -> bool {
    let Some(d) = dict.as_obj().filter(|_| is_dict(rt, dict)) else {
        return false;
    };
    let Some(t) = table(rt, dict) else {
        return false;
    };
    let key = Value::qstr(key);
    let used = header_len(rt.obj_words(d)[0]);
    let slots = slots_mut(rt.obj_words_mut(t));
    let mask = slots.len() / 2 - 1;
    let mut hole = probe(slots, key);
    if slots[2 * hole] == 0 {
        return false;
    }
    slots[2 * hole] = 0;
    slots[2 * hole + 1] = 0;

    let mut j = (hole + 1) & mask;
    while slots[2 * j] != 0 {
        let home = hash(Value::from_raw(slots[2 * j])) & mask;
        // the entry at j may fill the hole unless its home lies in (hole, j]
        if (j.wrapping_sub(home) & mask) >= (j.wrapping_sub(hole) & mask) {
            slots[2 * hole] = slots[2 * j];
            slots[2 * hole + 1] = slots[2 * j + 1];
            slots[2 * j] = 0;
            slots[2 * j + 1] = 0;
            hole = j;
        }
        j = (j + 1) & mask;
    }
    rt.obj_words_mut(d)[0] = header(ObjKind::Dict, used - 1);
    true
}

fn grow(rt: &mut Runtime, d: GcRef, old: GcRef, cap: usize) -> PyResult<GcRef> {
    let new_table = alloc_table(rt, cap)?;
    let entries: Vec<(usize, usize)> = slots(rt.obj_words(old))
        .chunks_exact(2)
        .filter(|kv| kv[0] != 0)
        .map(|kv| (kv[0], kv[1]))
        .collect();
    let slots = slots_mut(rt.obj_words_mut(new_table));
    for (k, v) in entries {
        let i = probe(slots, Value::from_raw(k));
        slots[2 * i] = k;
        slots[2 * i + 1] = v;
    }
    rt.obj_words_mut(d)[TABLE] = new_table.addr();
    rt.heap_mut().free(old);
    Ok(new_table)
}
