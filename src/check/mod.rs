//! The checker: C4 (typeof resolution), C5 (expression checking), C6
//! (statement checking) and C7 (top-level lowering) all operate as methods
//! on one [`Checker`], since each needs the same borrowed view of the
//! translation unit being checked. Splitting them into separate `impl`
//! blocks across `expr.rs`/`stmt.rs`/`toplevel.rs` (and `typeof_resolver.rs`
//! at the crate root) keeps each pass's rules grounded in its own file while
//! sharing one context the way the teacher threads a `Compiler<C>` context
//! through its lowering passes.

pub mod expr;
pub mod stmt;
pub mod toplevel;

use std::collections::HashSet;

use crate::diag::DiagnosticSink;
use crate::ir::module::Module;
use crate::symbol::Interner;
use crate::symtab::SymbolTable;
use crate::types::ast::AstStore;
use crate::types::{TypeH, TypeStore};

/// The one configuration knob this crate exposes (spec §4.3/§9): whether
/// implicit dereference through a pointer on the left of `.` is an error
/// (`pedantic = true`) or a silently accepted extension.
#[derive(Clone, Copy, Debug, Default)]
pub struct CheckerOptions {
  pub pedantic: bool,
}

/// The enclosing function's signature, needed while checking `Return` and
/// `Param` nodes inside its body.
struct FuncCtx {
  return_type: TypeH,
  params: Vec<TypeH>,
}

/// Borrowed context shared by every checking pass over one translation unit.
pub struct Checker<'a> {
  pub(crate) ts: &'a mut TypeStore,
  pub(crate) ast: &'a mut AstStore,
  pub(crate) symtab: &'a SymbolTable,
  pub(crate) diag: &'a DiagnosticSink,
  pub(crate) module: &'a Module,
  pub(crate) opts: CheckerOptions,
  pub(crate) builtin_externs: &'a HashSet<String>,
  /// Resolves the `Symbol`s the parser interned back to their text, needed
  /// only by C7 (IR symbol names, inline-mangled names, the `_`-prefixed
  /// builtin-extern lookup). C4–C6 never need a name, only identity.
  pub(crate) interner: &'a Interner<'a>,
  current_func: Option<FuncCtx>,
}

impl<'a> Checker<'a> {
  /// Borrow everything a checking pass needs for one translation unit.
  #[must_use]
  pub fn new(
    ts: &'a mut TypeStore,
    ast: &'a mut AstStore,
    symtab: &'a SymbolTable,
    diag: &'a DiagnosticSink,
    module: &'a Module,
    opts: CheckerOptions,
    builtin_externs: &'a HashSet<String>,
    interner: &'a Interner<'a>,
  ) -> Self {
    Self { ts, ast, symtab, diag, module, opts, builtin_externs, interner, current_func: None }
  }
}
