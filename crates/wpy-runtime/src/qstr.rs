//! Interned strings.

use string_interner::{DefaultStringInterner, DefaultSymbol, Symbol};

/// Handle to an interned string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Qstr(DefaultSymbol);

impl Qstr {
    #[inline]
    pub fn index(self) -> usize {
        self.0.to_usize()
    }

    #[inline]
    pub fn from_index(index: usize) -> Option<Qstr> {
        DefaultSymbol::try_from_usize(index).map(Qstr)
    }
}

pub struct QstrPool {
    interner: DefaultStringInterner,
}

impl QstrPool {
    pub fn new() -> Self {
        Self { interner: DefaultStringInterner::default() }
    }

    pub fn intern(&mut self, s: &str) -> Qstr {
        Qstr(self.interner.get_or_intern(s))
    }

    pub fn get(&self, s: &str) -> Option<Qstr> {
        self.interner.get(s).map(Qstr)
    }

    pub fn str(&self, q: Qstr) -> &str {
        self.interner.resolve(q.0).unwrap_or("?")
    }

    pub fn len(&self) -> usize {
        self.interner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interner.is_empty()
    }
}

impl Default for QstrPool {
    fn default() -> Self {
        Self::new()
    }
}
