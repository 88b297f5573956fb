//! Typeof resolver (spec component C4): lazily resolves `typeof(expr)`
//! embedded anywhere in a type tree by running the expression checker (C5)
//! on its source expression and overwriting the `Typeof` node in place.
//! Grounded on `try_resolve_typeof` in `sema.c`.

use crate::check::Checker;
use crate::types::{MemberRange, ParamRange, TypeH, TypeKind};

enum Children {
  None,
  One(TypeH),
  Members(MemberRange),
  Function(TypeH, ParamRange),
}

impl Checker<'_> {
  /// Resolve every `Typeof` reachable from `t` (spec I2: must run before any
  /// consumer reads `size`/`align`). Idempotent: a fully-resolved type tree
  /// is a no-op.
  pub fn resolve_typeof(&mut self, t: TypeH) {
    let expr = match self.ts.get(t).kind { TypeKind::Typeof { expr } => Some(*expr), _ => None };
    if let Some(expr) = expr {
      let resolved = self.check_expr(expr);
      self.ts.overwrite(t, resolved);
      // The replacement came from a type that's already fully resolved
      // (it's itself the product of checking an expression), so there is
      // nothing further to descend into.
      return;
    }
    self.resolve_children(t);
  }

  fn resolve_children(&mut self, t: TypeH) {
    let step = match self.ts.get(t).kind {
      TypeKind::Pointer { pointee } => Children::One(*pointee),
      TypeKind::Array { elem, .. } => Children::One(*elem),
      TypeKind::Struct { members, .. } | TypeKind::Union { members, .. } => Children::Members(*members),
      TypeKind::Function { ret, params, .. } => Children::Function(*ret, *params),
      _ => Children::None,
    };
    match step {
      Children::None => {}
      Children::One(child) => self.resolve_typeof(child),
      Children::Members(range) => {
        let members = self.ts.members(range).to_vec();
        for m in members { self.resolve_typeof(m.ty); }
      }
      Children::Function(ret, params) => {
        self.resolve_typeof(ret);
        let params = self.ts.params(params).to_vec();
        for p in params { self.resolve_typeof(p.ty); }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use crate::check::{Checker, CheckerOptions};
  use crate::diag::{DiagnosticSink, SourceLoc};
  use crate::ir::module::Module;
  use crate::symtab::SymbolTable;
  use crate::types::ast::{AstStore, ExprKind, IntSuffix};
  use crate::types::TypeStore;
  use std::collections::HashSet;

  #[test]
  fn resolves_typeof_of_an_int_literal() {
    let mut ts = TypeStore::new();
    let mut ast = AstStore::new();
    let symtab = SymbolTable::new();
    let diag = DiagnosticSink::new();
    let module = Module::new(1);
    let builtins = HashSet::new();
    let bump = bumpalo::Bump::new();
    let intern = crate::symbol::Interner::new(&bump);
    let mut checker = Checker::new(&mut ts, &mut ast, &symtab, &diag, &module, CheckerOptions::default(), &builtins, &intern);

    let lit = checker.ast.push_expr(ExprKind::Int { value: 5, suffix: IntSuffix::L }, SourceLoc(0));
    let typeof_ty = checker.ts.new_typeof(lit);
    checker.resolve_typeof(typeof_ty);

    assert!(matches!(checker.ts.get(typeof_ty).kind, crate::types::TypeKind::Long { unsigned: false }));
    assert_eq!(checker.ts.get(typeof_ty).size, 8);
  }

  #[test]
  fn resolves_typeof_nested_in_pointer() {
    let mut ts = TypeStore::new();
    let mut ast = AstStore::new();
    let symtab = SymbolTable::new();
    let diag = DiagnosticSink::new();
    let module = Module::new(1);
    let builtins = HashSet::new();
    let bump = bumpalo::Bump::new();
    let intern = crate::symbol::Interner::new(&bump);
    let mut checker = Checker::new(&mut ts, &mut ast, &symtab, &diag, &module, CheckerOptions::default(), &builtins, &intern);

    let lit = checker.ast.push_expr(ExprKind::Int { value: 1, suffix: IntSuffix::None }, SourceLoc(0));
    let typeof_ty = checker.ts.new_typeof(lit);
    let ptr_ty = checker.ts.new_pointer(typeof_ty);
    checker.resolve_typeof(ptr_ty);

    let crate::types::TypeKind::Pointer { pointee } = checker.ts.get(ptr_ty).kind else { panic!() };
    assert!(matches!(checker.ts.get(*pointee).kind, crate::types::TypeKind::Int { unsigned: false }));
  }
}
