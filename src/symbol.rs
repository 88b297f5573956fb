//! String interning shared by the type store, the AST store and the symbol table.
//!
//! Names are interned once per translation unit into a bump arena so that
//! every downstream comparison (record member lookup, scope binding, IR
//! symbol naming) is a cheap integer compare instead of a string compare.

use bumpalo::Bump;
use hashbrown::HashMap;

/// An interned name. Two symbols compare equal iff their underlying strings
/// are equal; interning does not happen automatically on `PartialEq`, callers
/// always go through [`Interner::intern`] to get a `Symbol`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(u32);

impl Symbol {
  /// Returns this symbol's dense index, for use as a key into a
  /// `Vec`/`Box<[_]>`-backed side table (see [`init_dense_symbol_map`]).
  #[must_use] pub fn into_usize(self) -> usize { self.0 as usize }
}

impl std::fmt::Debug for Symbol {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "Symbol({})", self.0)
  }
}

/// Arena-backed string interner. Every interned name is copied once into
/// `arena`, which must outlive the interner; `Symbol`s are stable dense
/// indices, valid for the lifetime of the owning translation unit.
pub struct Interner<'bump> {
  arena: &'bump Bump,
  strings: Vec<&'bump str>,
  map: HashMap<&'bump str, Symbol>,
}

impl<'bump> Interner<'bump> {
  /// Create an interner that allocates names out of `arena`.
  #[must_use] pub fn new(arena: &'bump Bump) -> Self {
    Self { arena, strings: Vec::new(), map: HashMap::new() }
  }

  /// Intern `s`, returning a stable [`Symbol`]. Repeated calls with the same
  /// string content return the same symbol.
  pub fn intern(&mut self, s: &str) -> Symbol {
    if let Some(&sym) = self.map.get(s) { return sym; }
    let owned: &'bump str = self.arena.alloc_str(s);
    let sym = Symbol(u32::try_from(self.strings.len()).expect("too many interned symbols"));
    self.strings.push(owned);
    self.map.insert(owned, sym);
    sym
  }

  /// Resolve a symbol back to its text.
  #[must_use] pub fn resolve(&self, sym: Symbol) -> &'bump str { self.strings[sym.into_usize()] }
}

/// Build a dense `Symbol -> T` lookup table out of a small list of
/// `(symbol, value)` pairs, sized to the largest symbol index observed.
/// Used by keyword/primitive tables where most indices are unused.
#[must_use] pub fn init_dense_symbol_map<T: Copy>(pairs: &[(Symbol, T)]) -> Box<[Option<T>]> {
  let len = pairs.iter().map(|(s, _)| s.into_usize() + 1).max().unwrap_or(0);
  let mut out = vec![None; len].into_boxed_slice();
  for &(s, v) in pairs { out[s.into_usize()] = Some(v); }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn interning_dedupes() {
    let arena = Bump::new();
    let mut i = Interner::new(&arena);
    let a = i.intern("foo");
    let b = i.intern("foo");
    let c = i.intern("bar");
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(i.resolve(a), "foo");
    assert_eq!(i.resolve(c), "bar");
  }

  #[test]
  fn dense_map_round_trips() {
    let arena = Bump::new();
    let mut i = Interner::new(&arena);
    let a = i.intern("a");
    let b = i.intern("b");
    let map = init_dense_symbol_map(&[(a, 1u32), (b, 2u32)]);
    assert_eq!(map[a.into_usize()], Some(1));
    assert_eq!(map[b.into_usize()], Some(2));
  }
}
