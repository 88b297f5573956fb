//! IR symbol kinds (part of spec component C9). Grounded on the
//! `TB_Symbol`/`TB_External`/`TB_Global`/`TB_Function` family in
//! `tb_internal.h`: every symbol carries a tag, a name, a linkage, and is
//! reachable from its module's per-tag list once registered.

use crate::handle::define_handle;
use crate::types::TypeH;

/// Visibility discipline of an IR symbol (spec glossary "Linkage").
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Linkage {
  /// Exported, visible to other translation units.
  Public,
  /// Translation-unit-local (`static`, or a mangled `inline` duplicate).
  Private,
  /// Unresolved reference, to be satisfied by the linker.
  External,
}

/// The three kinds of symbol a module tracks, matching `TB_SymbolTag`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SymbolTag {
  Function,
  Global,
  External,
}

/// Number of [`SymbolTag`] variants; sizes the module's per-tag arrays.
pub const SYMBOL_TAG_COUNT: usize = 3;

impl SymbolTag {
  pub(crate) fn index(self) -> usize {
    match self {
      SymbolTag::Function => 0,
      SymbolTag::Global => 1,
      SymbolTag::External => 2,
    }
  }
}

define_handle!(FunctionH);

/// A handle into one worker's shard of a pool (spec.md: "typed pools, one
/// per worker"). Unlike [`FunctionH`], globals and externals are allocated
/// from per-worker pools, so locating one needs both the worker index and
/// the slot within it.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct GlobalH {
  pub(crate) worker: u32,
  pub(crate) slot: u32,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct ExternalH {
  pub(crate) worker: u32,
  pub(crate) slot: u32,
}

/// A reference to any registered symbol, used for relocations (an
/// initializer that points at another symbol) and for the per-tag chains.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum SymbolId {
  Function(FunctionH),
  Global(GlobalH),
  External(ExternalH),
}

impl SymbolId {
  pub(crate) fn tag(self) -> SymbolTag {
    match self {
      SymbolId::Function(_) => SymbolTag::Function,
      SymbolId::Global(_) => SymbolTag::Global,
      SymbolId::External(_) => SymbolTag::External,
    }
  }
}

/// A constant-initializer entry, laid out by `eval_initializer_objects`
/// (spec.md §4.5 / SPEC_FULL supplemented feature 4), mirroring `TB_InitObj`.
#[derive(Clone, Debug)]
pub enum InitObject {
  /// Raw bytes at `offset` within the global's storage.
  Region { offset: u64, bytes: Vec<u8> },
  /// A relocation: the pointer-sized slot at `offset` holds the address of
  /// `target`. Only top-level symbol references may appear here (spec.md
  /// §4.5: "each leaf must be a literal or a symbol reference").
  Reloc { offset: u64, target: SymbolId },
}

pub struct FunctionRecord {
  pub name: String,
  pub linkage: Linkage,
  /// The IR prototype: a `TypeKind::Function` handle in the shared
  /// `TypeStore`, with an implicit pointer parameter already prepended if
  /// the C return type was an aggregate.
  pub proto: TypeH,
  /// The `FuncDecl` statement this symbol was lowered from.
  pub body: crate::types::ast::StmtH,
}

pub struct GlobalRecord {
  pub name: String,
  pub linkage: Linkage,
  pub ty: TypeH,
  pub size: u64,
  pub align: u64,
  pub objects: Vec<InitObject>,
}

pub struct ExternalRecord {
  pub name: String,
  pub linkage: Linkage,
  pub ty: TypeH,
}
