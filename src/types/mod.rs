//! Type interner & arenas (spec component C1).
//!
//! Types are stored by value in a single append-only [`TypeStore`], indexed
//! by the opaque [`TypeH`] handle. Record members and function parameters
//! are likewise appended to their own arenas and referenced by
//! [`HandleRange`] so a `Struct`/`Function` type is `Copy`.

pub mod ast;

use crate::handle::{define_handle, HandleRange};
use crate::symbol::Symbol;

define_handle!(
  /// Handle into [`TypeStore`]. Stable for the lifetime of the translation unit.
  TypeH
);
define_handle!(
  /// Handle into [`TypeStore::members`].
  MemberH
);
define_handle!(
  /// Handle into [`TypeStore::params`].
  ParamH
);

/// A range of struct/union members, `[start, end)` into [`TypeStore::members`].
pub type MemberRange = HandleRange<MemberH>;
/// A range of function parameters, `[start, end)` into [`TypeStore::params`].
pub type ParamRange = HandleRange<ParamH>;

/// One field of a `struct`/`union`, laid out at a concrete byte offset
/// within its parent record.
#[derive(Clone, Copy, Debug)]
pub struct Member {
  /// Field name.
  pub name: Symbol,
  /// Field type.
  pub ty: TypeH,
  /// Byte offset from the start of the record (always `0` for union members).
  pub offset: u64,
}

/// One formal parameter of a function type.
#[derive(Clone, Copy, Debug)]
pub struct Param {
  /// Parameter name, if the declarator named it.
  pub name: Option<Symbol>,
  /// Parameter type.
  pub ty: TypeH,
}

/// The shape of a type, independent of its computed size/alignment.
///
/// Integer kinds carry an `unsigned` flag rather than being separate
/// variants (`Int | UInt` in the spec's literal-typing rule becomes
/// `Int { unsigned }` here) so rank-based promotion logic has one thing to
/// switch on.
#[derive(Clone, Debug)]
pub enum TypeKind {
  /// `void`.
  Void,
  /// `_Bool`.
  Bool,
  /// `char`.
  Char { unsigned: bool },
  /// `short`.
  Short { unsigned: bool },
  /// `int`.
  Int { unsigned: bool },
  /// `long`/`long long`.
  Long { unsigned: bool },
  /// `float`.
  Float,
  /// `double`.
  Double,
  /// `enum <name> { ... }`; enumerators carry their constant value.
  Enum { name: Option<Symbol>, values: Box<[(Symbol, i64)]> },
  /// `struct <name> { ... }`.
  Struct { name: Option<Symbol>, members: MemberRange },
  /// `union <name> { ... }`.
  Union { name: Option<Symbol>, members: MemberRange },
  /// `T*`.
  Pointer { pointee: TypeH },
  /// `T[N]`; `count == 0` means "incomplete, pending initializer-driven completion" (spec I1).
  Array { elem: TypeH, count: u64 },
  /// `R(T1, ..., Tn[, ...])`.
  Function { ret: TypeH, params: ParamRange, varargs: bool, name: Option<Symbol> },
  /// `typeof(expr)`, resolved in place by the typeof resolver (C4) before
  /// any consumer reads `size`/`align` (spec I2).
  Typeof { expr: ast::ExprH },
}

#[derive(Clone, Debug)]
struct TypeData {
  kind: TypeKind,
  size: u64,
  align: u64,
}

/// The construction and query surface for C1: every type in a translation
/// unit is created through one of these constructors and referenced
/// thereafter by [`TypeH`].
#[derive(Default)]
pub struct TypeStore {
  types: Vec<TypeData>,
  members: Vec<Member>,
  params: Vec<Param>,
}

/// A borrowed view of one type's shape and computed layout.
#[derive(Clone, Copy, Debug)]
pub struct TypeRef<'a> {
  /// The type's shape.
  pub kind: &'a TypeKind,
  /// Size in bytes. Zero for incomplete types (spec I1).
  pub size: u64,
  /// Alignment in bytes.
  pub align: u64,
}

fn align_up(off: u64, align: u64) -> u64 {
  if align <= 1 { off } else { num::Integer::div_ceil(&off, &align) * align }
}

impl TypeStore {
  /// Create a store pre-populated with the scalar base types only; records,
  /// pointers, arrays and functions are created on demand.
  #[must_use] pub fn new() -> Self { Self::default() }

  fn push(&mut self, kind: TypeKind, size: u64, align: u64) -> TypeH {
    let h = TypeH::from_usize(self.types.len());
    self.types.push(TypeData { kind, size, align });
    h
  }

  /// `void`.
  pub fn void(&mut self) -> TypeH { self.push(TypeKind::Void, 0, 1) }
  /// `_Bool`.
  pub fn bool_(&mut self) -> TypeH { self.push(TypeKind::Bool, 1, 1) }
  /// `char`/`unsigned char`.
  pub fn char_(&mut self, unsigned: bool) -> TypeH { self.push(TypeKind::Char { unsigned }, 1, 1) }
  /// `short`/`unsigned short`.
  pub fn short(&mut self, unsigned: bool) -> TypeH { self.push(TypeKind::Short { unsigned }, 2, 2) }
  /// `int`/`unsigned int`.
  pub fn int(&mut self, unsigned: bool) -> TypeH { self.push(TypeKind::Int { unsigned }, 4, 4) }
  /// `long`/`unsigned long`.
  pub fn long(&mut self, unsigned: bool) -> TypeH { self.push(TypeKind::Long { unsigned }, 8, 8) }
  /// `float`.
  pub fn float(&mut self) -> TypeH { self.push(TypeKind::Float, 4, 4) }
  /// `double`.
  pub fn double(&mut self) -> TypeH { self.push(TypeKind::Double, 8, 8) }

  /// `enum <name> { a = v0, b = v1, ... }`.
  pub fn new_enum(&mut self, name: Option<Symbol>, values: Box<[(Symbol, i64)]>) -> TypeH {
    self.push(TypeKind::Enum { name, values }, 4, 4)
  }

  /// `T*`.
  pub fn new_pointer(&mut self, pointee: TypeH) -> TypeH {
    self.push(TypeKind::Pointer { pointee }, 8, 8)
  }

  /// `T[count]`. `count == 0` creates an incomplete array, to be completed
  /// later from an initializer (spec §4.6/C6). Fatal (spec §4.1) if `count >
  /// 0` and `elem` is itself incomplete, since that would make the new
  /// array's size unknowable.
  pub fn new_array(&mut self, elem: TypeH, count: u64) -> TypeH {
    let elem_size = self.get(elem).size;
    assert!(!(count > 0 && elem_size == 0),
      "new_array: element type is incomplete (size 0) with a positive count");
    let elem_align = self.get(elem).align;
    self.push(TypeKind::Array { elem, count }, elem_size * count, elem_align)
  }

  /// `R(params...)`, optionally variadic.
  pub fn new_func(&mut self, ret: TypeH, params: &[Param], varargs: bool, name: Option<Symbol>) -> TypeH {
    let range = self.push_params(params);
    self.push(TypeKind::Function { ret, params: range, varargs, name }, 0, 1)
  }

  /// Append `members` to the member arena and lay them out as a `struct`
  /// (sequential, padded fields) or `union` (all fields at offset 0) based
  /// on `is_union`.
  fn new_record(&mut self, name: Option<Symbol>, fields: &[(Symbol, TypeH)], is_union: bool) -> TypeH {
    let start = self.members.len();
    let mut offset = 0u64;
    let mut max_align = 1u64;
    for &(fname, fty) in fields {
      let tr = self.get(fty);
      let (fsize, falign) = (tr.size, tr.align.max(1));
      max_align = max_align.max(falign);
      let foff = if is_union { 0 } else { align_up(offset, falign) };
      self.members.push(Member { name: fname, ty: fty, offset: foff });
      if !is_union { offset = foff + fsize; } else { offset = offset.max(fsize); }
    }
    let range = MemberRange::new(start, self.members.len());
    let size = align_up(offset, max_align);
    let kind = if is_union { TypeKind::Union { name, members: range } } else { TypeKind::Struct { name, members: range } };
    self.push(kind, size, max_align)
  }

  /// `struct <name> { fields... }`.
  pub fn new_struct(&mut self, name: Option<Symbol>, fields: &[(Symbol, TypeH)]) -> TypeH {
    self.new_record(name, fields, false)
  }
  /// `union <name> { fields... }`.
  pub fn new_union(&mut self, name: Option<Symbol>, fields: &[(Symbol, TypeH)]) -> TypeH {
    self.new_record(name, fields, true)
  }

  /// `typeof(expr)`, unresolved. Size/align are `0` until the typeof
  /// resolver (C4) overwrites this entry in place.
  pub fn new_typeof(&mut self, expr: ast::ExprH) -> TypeH {
    self.push(TypeKind::Typeof { expr }, 0, 0)
  }

  fn push_params(&mut self, params: &[Param]) -> ParamRange {
    let start = self.params.len();
    self.params.extend_from_slice(params);
    ParamRange::new(start, self.params.len())
  }

  /// Borrow one type's shape and layout.
  #[must_use] pub fn get(&self, h: TypeH) -> TypeRef<'_> {
    let d = &self.types[h.into_usize()];
    TypeRef { kind: &d.kind, size: d.size, align: d.align }
  }

  /// Members of a `Struct`/`Union` type's member range.
  #[must_use] pub fn members(&self, range: MemberRange) -> &[Member] { &self.members[range.as_usize_range()] }
  /// Parameters of a `Function` type's parameter range.
  #[must_use] pub fn params(&self, range: ParamRange) -> &[Param] { &self.params[range.as_usize_range()] }

  /// Overwrite `h`'s entry in place with `replacement`'s shape and layout.
  /// Used exclusively by the typeof resolver (C4) to erase a `Typeof` node
  /// once its source expression has been checked (spec I2).
  pub(crate) fn overwrite(&mut self, h: TypeH, replacement: TypeH) {
    self.types[h.into_usize()] = self.types[replacement.into_usize()].clone();
  }

  /// Set a previously-incomplete array's element count and recompute its
  /// size, used by the statement checker (C6) when an initializer or string
  /// literal determines the length of `T[]`.
  pub(crate) fn complete_array(&mut self, h: TypeH, count: u64) {
    let TypeData { kind, .. } = &self.types[h.into_usize()];
    let TypeKind::Array { elem, .. } = *kind else { panic!("complete_array: not an array type") };
    let elem_size = self.get(elem).size;
    let d = &mut self.types[h.into_usize()];
    d.kind = TypeKind::Array { elem, count };
    d.size = elem_size * count;
  }

  /// Structural equality (spec I3): recursive on kind and payload, not identity.
  #[must_use] pub fn equal(&self, a: TypeH, b: TypeH) -> bool {
    if a == b { return true; }
    use TypeKind::*;
    match (&self.get(a).kind, &self.get(b).kind) {
      (Void, Void) | (Bool, Bool) | (Float, Float) | (Double, Double) => true,
      (Char { unsigned: u1 }, Char { unsigned: u2 })
      | (Short { unsigned: u1 }, Short { unsigned: u2 })
      | (Int { unsigned: u1 }, Int { unsigned: u2 })
      | (Long { unsigned: u1 }, Long { unsigned: u2 }) => u1 == u2,
      (Pointer { pointee: p1 }, Pointer { pointee: p2 }) => self.equal(*p1, *p2),
      (Array { elem: e1, count: c1 }, Array { elem: e2, count: c2 }) => c1 == c2 && self.equal(*e1, *e2),
      (Enum { name: n1, values: v1 }, Enum { name: n2, values: v2 }) => n1 == n2 && v1 == v2,
      (Struct { name: n1, members: m1 }, Struct { name: n2, members: m2 })
      | (Union { name: n1, members: m1 }, Union { name: n2, members: m2 }) => {
        n1 == n2 && self.members_equal(*m1, *m2)
      }
      (Function { ret: r1, params: p1, varargs: v1, .. }, Function { ret: r2, params: p2, varargs: v2, .. }) => {
        v1 == v2 && self.equal(*r1, *r2) && self.params_equal(*p1, *p2)
      }
      _ => false,
    }
  }

  fn members_equal(&self, a: MemberRange, b: MemberRange) -> bool {
    let (ma, mb) = (self.members(a), self.members(b));
    ma.len() == mb.len() && ma.iter().zip(mb).all(|(x, y)| x.name == y.name && self.equal(x.ty, y.ty))
  }

  fn params_equal(&self, a: ParamRange, b: ParamRange) -> bool {
    let (pa, pb) = (self.params(a), self.params(b));
    pa.len() == pb.len() && pa.iter().zip(pb).all(|(x, y)| self.equal(x.ty, y.ty))
  }

  /// Usual arithmetic conversions: the type produced by applying a binary
  /// arithmetic/comparison operator to `a` and `b`. If either is `double`,
  /// the result is `double`; else if either is `float`, the result is
  /// `float`; else both are promoted to at least `int` and the wider rank
  /// wins, with unsigned preferred at equal rank (spec C1, §4.1).
  /// Non-arithmetic inputs are returned unchanged (`a`), matching the
  /// "otherwise unchanged" clause.
  #[must_use] pub fn common(&mut self, a: TypeH, b: TypeH) -> TypeH {
    if self.equal(a, b) { return a; }
    let (ka, kb) = (self.get(a).kind.clone(), self.get(b).kind.clone());
    if matches!(ka, TypeKind::Double) || matches!(kb, TypeKind::Double) { return self.double(); }
    if matches!(ka, TypeKind::Float) || matches!(kb, TypeKind::Float) { return self.float(); }
    let Some(ia) = int_info(&ka) else { return a };
    let Some(ib) = int_info(&kb) else { return a };
    let (ra, ua) = promote(ia);
    let (rb, ub) = promote(ib);
    let rank = ra.max(rb);
    let unsigned = (ra == rank && ua) || (rb == rank && ub);
    if rank <= 4 { self.int(unsigned) } else { self.long(unsigned) }
  }

  /// Render a type back into C-like spelling, as `sema.c`'s
  /// `type_as_string` does for error messages ("Could not implicitly
  /// convert type %s into %s").
  #[must_use] pub fn display(&self, h: TypeH) -> String {
    let mut s = String::new();
    self.write_type(h, &mut s);
    s
  }

  fn write_type(&self, h: TypeH, out: &mut String) {
    use std::fmt::Write as _;
    match &self.get(h).kind {
      TypeKind::Void => out.push_str("void"),
      TypeKind::Bool => out.push_str("_Bool"),
      TypeKind::Char { unsigned } => out.push_str(if *unsigned { "unsigned char" } else { "char" }),
      TypeKind::Short { unsigned } => out.push_str(if *unsigned { "unsigned short" } else { "short" }),
      TypeKind::Int { unsigned } => out.push_str(if *unsigned { "unsigned int" } else { "int" }),
      TypeKind::Long { unsigned } => out.push_str(if *unsigned { "unsigned long" } else { "long" }),
      TypeKind::Float => out.push_str("float"),
      TypeKind::Double => out.push_str("double"),
      TypeKind::Enum { .. } => out.push_str("enum __unnamed__"),
      TypeKind::Union { .. } => out.push_str("union __unnamed__"),
      TypeKind::Struct { .. } => out.push_str("struct __unnamed__"),
      TypeKind::Pointer { pointee } => { self.write_type(*pointee, out); out.push('*'); }
      TypeKind::Array { elem, count } => { self.write_type(*elem, out); let _ = write!(out, "[{count}]"); }
      TypeKind::Function { ret, params, .. } => {
        self.write_type(*ret, out);
        out.push('(');
        for (i, p) in self.params(*params).iter().enumerate() {
          if i > 0 { out.push(','); }
          self.write_type(p.ty, out);
        }
        out.push(')');
      }
      TypeKind::Typeof { .. } => out.push_str("typeof(???)"),
    }
  }
}

/// `rank` (position in `Bool..=Long`, 1-indexed) and `unsigned` for an
/// integer-family kind; `None` for non-integer kinds.
pub(crate) fn int_info(k: &TypeKind) -> Option<(u8, bool)> {
  Some(match *k {
    TypeKind::Bool => (1, false),
    TypeKind::Char { unsigned } => (2, unsigned),
    TypeKind::Short { unsigned } => (3, unsigned),
    TypeKind::Int { unsigned } => (4, unsigned),
    TypeKind::Long { unsigned } => (5, unsigned),
    _ => return None,
  })
}

/// Integer promotion: anything narrower than `int` becomes a signed `int`.
fn promote((rank, unsigned): (u8, bool)) -> (u8, bool) {
  if rank < 4 { (4, false) } else { (rank, unsigned) }
}

/// Is `k` one of the "scalar" kinds the spec treats conditions/operands as
/// needing to be (`Bool..Function` inclusive, matching `sema.c`'s
/// `is_scalar_type`, which — faithfully to the source — is a looser check
/// than ISO C's definition of scalar type).
#[must_use] pub fn is_scalar(k: &TypeKind) -> bool {
  !matches!(k, TypeKind::Void | TypeKind::Typeof { .. })
}

/// Is `k` an arithmetic type (`Bool..Double`)?
#[must_use] pub fn is_arithmetic(k: &TypeKind) -> bool {
  int_info(k).is_some() || matches!(k, TypeKind::Float | TypeKind::Double)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn scalar_layout() {
    let mut ts = TypeStore::new();
    let i = ts.int(false);
    assert_eq!(ts.get(i).size, 4);
    assert_eq!(ts.get(i).align, 4);
    let p = ts.new_pointer(i);
    assert_eq!(ts.get(p).size, 8);
  }

  #[test]
  fn struct_layout_pads_to_alignment() {
    let arena = bumpalo::Bump::new();
    let mut intern = crate::symbol::Interner::new(&arena);
    let (a, b) = (intern.intern("a"), intern.intern("b"));
    let mut ts = TypeStore::new();
    let c = ts.char_(false);
    let i = ts.int(false);
    let s = ts.new_struct(None, &[(a, c), (b, i)]);
    let tr = ts.get(s);
    assert_eq!(tr.size, 8); // char at 0, pad to 4, int at 4, total 8
    assert_eq!(tr.align, 4);
    let TypeKind::Struct { members, .. } = tr.kind else { panic!() };
    let mem = ts.members(*members);
    assert_eq!(mem[0].offset, 0);
    assert_eq!(mem[1].offset, 4);
  }

  #[test]
  fn union_layout_overlaps() {
    let arena = bumpalo::Bump::new();
    let mut intern = crate::symbol::Interner::new(&arena);
    let (a, b) = (intern.intern("a"), intern.intern("b"));
    let mut ts = TypeStore::new();
    let c = ts.char_(false);
    let i = ts.int(false);
    let u = ts.new_union(None, &[(a, c), (b, i)]);
    let tr = ts.get(u);
    assert_eq!(tr.size, 4);
    assert_eq!(tr.align, 4);
  }

  #[test]
  #[should_panic(expected = "incomplete")]
  fn array_of_incomplete_element_is_fatal() {
    let mut ts = TypeStore::new();
    let e = ts.new_typeof(ast::ExprH::from_usize(0));
    let _ = ts.new_array(e, 3);
  }

  #[test]
  fn common_type_is_commutative_and_prefers_unsigned() {
    let mut ts = TypeStore::new();
    let i = ts.int(false);
    let u = ts.int(true);
    let l = ts.long(false);
    let c1 = ts.common(i, u);
    let c2 = ts.common(u, i);
    assert!(ts.equal(c1, c2));
    assert!(matches!(ts.get(c1).kind, TypeKind::Int { unsigned: true }));
    let c3 = ts.common(i, l);
    assert!(matches!(ts.get(c3).kind, TypeKind::Long { unsigned: false }));
  }

  #[test]
  fn structural_equality_ignores_identity() {
    let mut ts = TypeStore::new();
    let i1 = ts.int(false);
    let i2 = ts.int(false);
    assert_ne!(i1, i2);
    assert!(ts.equal(i1, i2));
    let p1 = ts.new_pointer(i1);
    let p2 = ts.new_pointer(i2);
    assert!(ts.equal(p1, p2));
  }
}
