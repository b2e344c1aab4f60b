//! Object model.
//!
//! A [`Value`] is one machine word. Immediates carry their payload in the
//! word itself; everything else is a pointer to a heap object whose first
//! word is a header (`kind | len << 8`).
//!
//! Tag layout (low bits):
//! - `xx1`: small int, `n << 1 | 1`
//! - `010`: interned string, `qstr << 3 | 0b010`
//! - `110`: special, `payload << 5 | sub << 3 | 0b110` (constants, builtin
//!   functions, exception types)
//! - `000`: heap pointer (never zero)

pub mod dict;
pub mod exc;
pub mod module;
pub mod ops;
pub mod string;

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::builtins::BuiltinFn;
use crate::gc::GcRef;
use crate::qstr::Qstr;

const TAG_QSTR: usize = 0b010;
const TAG_SPECIAL: usize = 0b110;
const TAG_MASK: usize = 0b111;

const SUB_CONST: usize = 0;
const SUB_BUILTIN: usize = 1;
const SUB_EXC_TYPE: usize = 2;

/// An exception value propagating towards the nearest capture boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Raised(pub Value);

pub type PyResult<T> = Result<T, Raised>;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Value(usize);

impl Value {
    /// Empty slot marker; never visible to scripts.
    pub const NULL: Value = Value(0);
    pub const NONE: Value = Value::special(SUB_CONST, 0);
    pub const FALSE: Value = Value::special(SUB_CONST, 1);
    pub const TRUE: Value = Value::special(SUB_CONST, 2);

    pub const SMALL_INT_MIN: isize = isize::MIN >> 1;
    pub const SMALL_INT_MAX: isize = isize::MAX >> 1;

    const fn special(sub: usize, payload: usize) -> Value {
        Value((payload << 5) | (sub << 3) | TAG_SPECIAL)
    }

    #[inline]
    pub fn raw(self) -> usize {
        self.0
    }

    #[inline]
    pub fn from_raw(raw: usize) -> Value {
        Value(raw)
    }

    /// `None` if `n` does not fit the small-int range.
    #[inline]
    pub fn small_int(n: isize) -> Option<Value> {
        if (Self::SMALL_INT_MIN..=Self::SMALL_INT_MAX).contains(&n) {
            Some(Value(((n << 1) | 1) as usize))
        } else {
            None
        }
    }

    #[inline]
    pub fn as_small_int(self) -> Option<isize> {
        if self.0 & 1 == 1 {
            Some((self.0 as isize) >> 1)
        } else {
            None
        }
    }

    #[inline]
    pub fn bool(b: bool) -> Value {
        if b {
            Value::TRUE
        } else {
            Value::FALSE
        }
    }

    pub fn as_bool(self) -> Option<bool> {
        match self {
            Value::TRUE => Some(true),
            Value::FALSE => Some(false),
            _ => None,
        }
    }

    /// Integer value of a small int or bool.
    pub fn as_int_like(self) -> Option<isize> {
        self.as_small_int().or_else(|| self.as_bool().map(isize::from))
    }

    #[inline]
    pub fn qstr(q: Qstr) -> Value {
        Value((q.index() << 3) | TAG_QSTR)
    }

    #[inline]
    pub fn as_qstr(self) -> Option<Qstr> {
        if self.0 & TAG_MASK == TAG_QSTR {
            Qstr::from_index(self.0 >> 3)
        } else {
            None
        }
    }

    pub fn builtin(f: BuiltinFn) -> Value {
        Value::special(SUB_BUILTIN, u8::from(f) as usize)
    }

    pub fn as_builtin(self) -> Option<BuiltinFn> {
        self.special_payload(SUB_BUILTIN).and_then(|p| BuiltinFn::try_from(p).ok())
    }

    pub fn exc_type(t: ExcType) -> Value {
        Value::special(SUB_EXC_TYPE, u8::from(t) as usize)
    }

    pub fn as_exc_type(self) -> Option<ExcType> {
        self.special_payload(SUB_EXC_TYPE).and_then(|p| ExcType::try_from(p).ok())
    }

    fn special_payload(self, sub: usize) -> Option<u8> {
        if self.0 & TAG_MASK == TAG_SPECIAL && (self.0 >> 3) & 0b11 == sub {
            u8::try_from(self.0 >> 5).ok()
        } else {
            None
        }
    }

    #[inline]
    pub fn from_obj(r: GcRef) -> Value {
        Value(r.addr())
    }

    /// The heap object this value points to.
    #[inline]
    pub fn as_obj(self) -> Option<GcRef> {
        if self.0 & TAG_MASK == 0 {
            GcRef::from_addr(self.0)
        } else {
            None
        }
    }

    #[inline]
    pub fn is_none(self) -> bool {
        self == Value::NONE
    }

    #[inline]
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(n) = self.as_small_int() {
            write!(f, "Int({})", n)
        } else if let Some(q) = self.as_qstr() {
            write!(f, "Qstr({})", q.index())
        } else if let Some(b) = self.as_bool() {
            write!(f, "{}", if b { "True" } else { "False" })
        } else if self.is_none() {
            f.write_str("None")
        } else if let Some(b) = self.as_builtin() {
            write!(f, "Builtin({:?})", b)
        } else if let Some(t) = self.as_exc_type() {
            write!(f, "Type({:?})", t)
        } else if self.is_null() {
            f.write_str("Null")
        } else {
            write!(f, "Obj({:#x})", self.0)
        }
    }
}

/// Heap object kinds, stored in the low byte of the header word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum ObjKind {
    Str = 1,
    Exception = 2,
    Dict = 3,
    Table = 4,
    Module = 5,
    File = 6,
    BoundMethod = 7,
    Frame = 8,
}

#[inline]
pub(crate) fn header(kind: ObjKind, len: usize) -> usize {
    u8::from(kind) as usize | (len << 8)
}

#[inline]
pub(crate) fn header_len(word: usize) -> usize {
    word >> 8
}

#[inline]
pub(crate) fn header_kind(word: usize) -> Option<ObjKind> {
    ObjKind::try_from((word & 0xff) as u8).ok()
}

/// Builtin exception hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum ExcType {
    BaseException,
    SystemExit,
    KeyboardInterrupt,
    Exception,
    ValueError,
    TypeError,
    NameError,
    RuntimeError,
    MemoryError,
    OSError,
    ZeroDivisionError,
    OverflowError,
    ImportError,
    AttributeError,
    SyntaxError,
}

impl ExcType {
    pub const ALL: [ExcType; 15] = [
        ExcType::BaseException,
        ExcType::SystemExit,
        ExcType::KeyboardInterrupt,
        ExcType::Exception,
        ExcType::ValueError,
        ExcType::TypeError,
        ExcType::NameError,
        ExcType::RuntimeError,
        ExcType::MemoryError,
        ExcType::OSError,
        ExcType::ZeroDivisionError,
        ExcType::OverflowError,
        ExcType::ImportError,
        ExcType::AttributeError,
        ExcType::SyntaxError,
    ];

    pub fn base(self) -> Option<ExcType> {
        match self {
            ExcType::BaseException => None,
            ExcType::SystemExit | ExcType::KeyboardInterrupt | ExcType::Exception => Some(ExcType::BaseException),
            _ => Some(ExcType::Exception),
        }
    }

    pub fn is_subclass_of(self, other: ExcType) -> bool {
        let mut t = Some(self);
        while let Some(cur) = t {
            if cur == other {
                return true;
            }
            t = cur.base();
        }
        false
    }

    pub fn name(self) -> &'static str {
        match self {
            ExcType::BaseException => "BaseException",
            ExcType::SystemExit => "SystemExit",
            ExcType::KeyboardInterrupt => "KeyboardInterrupt",
            ExcType::Exception => "Exception",
            ExcType::ValueError => "ValueError",
            ExcType::TypeError => "TypeError",
            ExcType::NameError => "NameError",
            ExcType::RuntimeError => "RuntimeError",
            ExcType::MemoryError => "MemoryError",
            ExcType::OSError => "OSError",
            ExcType::ZeroDivisionError => "ZeroDivisionError",
            ExcType::OverflowError => "OverflowError",
            ExcType::ImportError => "ImportError",
            ExcType::AttributeError => "AttributeError",
            ExcType::SyntaxError => "SyntaxError",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_int_range() {
        assert_eq!(Value::small_int(-5).unwrap().as_small_int(), Some(-5));
        assert_eq!(Value::small_int(Value::SMALL_INT_MAX).unwrap().as_small_int(), Some(Value::SMALL_INT_MAX));
        assert_eq!(Value::small_int(Value::SMALL_INT_MAX + 1), None);
        assert_eq!(Value::small_int(Value::SMALL_INT_MIN - 1), None);
    }

    #[test]
    fn test_tags_are_disjoint() {
        let int = Value::small_int(3).unwrap();
        let exc = Value::exc_type(ExcType::ValueError);
        let f = Value::builtin(BuiltinFn::Print);
        assert_eq!(int.as_obj(), None);
        assert_eq!(Value::NONE.as_small_int(), None);
        assert_eq!(Value::NONE.as_exc_type(), None);
        assert_eq!(exc.as_exc_type(), Some(ExcType::ValueError));
        assert_eq!(exc.as_builtin(), None);
        assert_eq!(f.as_builtin(), Some(BuiltinFn::Print));
        assert_eq!(Value::TRUE.as_int_like(), Some(1));
        assert_eq!(Value::NULL.as_obj(), None);
    }

    #[test]
    fn test_exception_hierarchy() {
        assert!(ExcType::SystemExit.is_subclass_of(ExcType::BaseException));
        assert!(!ExcType::SystemExit.is_subclass_of(ExcType::Exception));
        assert!(ExcType::ValueError.is_subclass_of(ExcType::Exception));
        assert!(ExcType::OSError.is_subclass_of(ExcType::OSError));
        assert!(!ExcType::Exception.is_subclass_of(ExcType::ValueError));
    }

    #[test]
    fn test_header_roundtrip() {
        let h = header(ObjKind::Dict, 7);
        assert_eq!(header_kind(h), Some(ObjKind::Dict));
        assert_eq!(header_len(h), 7);
    }
}
