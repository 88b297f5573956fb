//! Top-level checker & IR lowering (spec component C7): for each top-level
//! statement, builds the corresponding IR symbol and (for a function)
//! drives C6 over its body. Grounded directly on `sema_check` in `sema.c`;
//! the constant-initializer evaluator is the SPEC_FULL-supplemented
//! `count_max_tb_init_objects`/`eval_initializer_objects` pair, collapsed
//! here into a single pass since `Vec` grows on demand (the original's
//! sizing pass exists only because its initializer array has fixed
//! capacity) — noted in `DESIGN.md`.

use hashbrown::HashMap;

use crate::diag::{Severity, SourceLoc};
use crate::ir::symbol::{Linkage, SymbolId};
use crate::types::ast::{Decl, DeclAttrs, ExprH, ExprKind, StmtH, StmtKind};
use crate::types::{Param, TypeH, TypeKind};

use super::{Checker, FuncCtx};

/// Maps a top-level `StmtH` to the IR symbol C7 registered for it, so a
/// later declaration's constant initializer can take a relocation against
/// an earlier one (`eval_initializer_objects`: "each leaf must be a literal
/// or a symbol reference").
type Registry = HashMap<StmtH, SymbolId>;

impl Checker<'_> {
  /// Lower every top-level statement into the IR module, in source order
  /// (spec §5: "within a translation unit, statements are checked in
  /// source order"). `worker` selects which per-worker pool globals and
  /// externals are allocated from.
  pub fn check_top_level(&mut self, worker: usize) {
    let stmts = self.ast.top_level_stmts().to_vec();
    let mut registry = Registry::new();
    for s in stmts {
      self.check_top_level_stmt(s, worker, &mut registry);
    }
  }

  fn check_top_level_stmt(&mut self, s: StmtH, worker: usize, registry: &mut Registry) {
    let loc = self.ast.stmt(s).loc;
    match self.ast.stmt(s).op.clone() {
      StmtKind::FuncDecl { decl, body } => self.check_function_decl(s, loc, decl, body, registry),
      StmtKind::GlobalDecl(decl) => self.check_global_or_extern_decl(s, loc, decl, worker, registry),
      other => unreachable!("check_top_level_stmt: not a top-level declaration kind: {other:?}"),
    }
  }

  fn check_function_decl(&mut self, s: StmtH, loc: SourceLoc, decl: Decl, body: StmtH, registry: &mut Registry) {
    let name = self.interner.resolve(decl.name).to_string();

    if decl.attrs.contains(DeclAttrs::STATIC) && decl.attrs.contains(DeclAttrs::EXTERN) {
      self.diag.report(Severity::Error, loc, format!("function '{name}' cannot be both static and extern"));
      return;
    }
    if (decl.attrs.contains(DeclAttrs::STATIC) || decl.attrs.contains(DeclAttrs::INLINE))
      && !decl.attrs.contains(DeclAttrs::USED)
    {
      // Post-reachability (C8) decided this body is unreferenced.
      return;
    }

    self.resolve_typeof(decl.ty);
    let TypeKind::Function { ret, params, varargs, .. } = self.ts.get(decl.ty).kind.clone() else {
      panic!("check_function_decl: declaration type is not a function (parser invariant violated)");
    };

    let is_aggregate_return = matches!(self.ts.get(ret).kind, TypeKind::Struct { .. } | TypeKind::Union { .. });
    let c_params: Vec<Param> = self.ts.params(params).to_vec();

    let mut ir_params: Vec<Param> = Vec::with_capacity(c_params.len() + usize::from(is_aggregate_return));
    if is_aggregate_return {
      let implicit = self.ts.new_pointer(ret);
      ir_params.push(Param { name: None, ty: implicit });
    }
    ir_params.extend(c_params.iter().copied());
    let proto = self.ts.new_func(ret, &ir_params, varargs, Some(decl.name));

    let (linkage, ir_name) = if decl.attrs.contains(DeclAttrs::INLINE) {
      // Mangled so duplicate inline definitions across translation units
      // never collide (spec §4.5).
      (Linkage::Private, format!("{name}@{}", s.into_usize()))
    } else if decl.attrs.contains(DeclAttrs::STATIC) {
      (Linkage::Private, name)
    } else {
      (Linkage::Public, name)
    };

    let func_id = self.module.register_function(ir_name, linkage, proto, body);
    registry.insert(s, SymbolId::Function(func_id));

    self.current_func = Some(FuncCtx { return_type: ret, params: c_params.iter().map(|p| p.ty).collect() });
    self.check_stmt(body);
    self.current_func = None;
  }

  fn check_global_or_extern_decl(&mut self, s: StmtH, loc: SourceLoc, decl: Decl, worker: usize, registry: &mut Registry) {
    if !decl.attrs.contains(DeclAttrs::USED) { return; }

    let name = self.interner.resolve(decl.name).to_string();
    if decl.attrs.contains(DeclAttrs::STATIC) && decl.attrs.contains(DeclAttrs::EXTERN) {
      self.diag.report(Severity::Error, loc, format!("global declaration '{name}' cannot be both static and extern"));
      return;
    }

    self.resolve_typeof(decl.ty);
    let is_function_type = matches!(self.ts.get(decl.ty).kind, TypeKind::Function { .. });

    if decl.attrs.contains(DeclAttrs::EXTERN) || is_function_type {
      if name.starts_with('_') && self.builtin_externs.contains(&name) {
        // Recognized builtin: leave the slot empty (spec §4.5).
        return;
      }
      let ext = self.module.register_external(worker, name, Linkage::External, decl.ty);
      registry.insert(s, SymbolId::External(ext));
      return;
    }

    let ty_ref = self.ts.get(decl.ty);
    let (size, align) = (ty_ref.size, ty_ref.align);
    if align == 0 {
      self.diag.report(Severity::Error, loc, format!("internal error: declaration '{name}' has zero alignment"));
    }

    let mut objects = Vec::new();
    if let Some(initial) = decl.initial {
      if matches!(&self.ast.expr(initial).op, ExprKind::Initializer { .. }) {
        let ExprKind::Initializer { nodes, .. } = self.ast.expr(initial).op.clone() else { unreachable!() };
        let (arena, top_count) = self.ast.init_nodes(nodes);
        let arena = arena.to_vec();
        self.eval_init_siblings(decl.ty, &arena, top_count, 0, &mut objects, registry);
      }
    }

    let linkage = if decl.attrs.contains(DeclAttrs::STATIC) { Linkage::Private } else { Linkage::Public };
    let g = self.module.register_global(worker, name, linkage, decl.ty, size, align, objects);
    registry.insert(s, SymbolId::Global(g));
  }

  /// Lay out `count` flattened initializer siblings of type `ty` starting at
  /// `base_offset`, appending `RegionInit`/`RelocInit` records to `objects`.
  /// Mirrors `walk_initializer_for_sema`'s traversal shape but computes byte
  /// offsets instead of merely visiting leaves.
  fn eval_init_siblings(
    &mut self,
    ty: TypeH,
    nodes: &[crate::types::ast::InitNode],
    count: usize,
    base_offset: u64,
    objects: &mut Vec<crate::ir::symbol::InitObject>,
    registry: &Registry,
  ) -> usize {
    let mut pos = 0;
    for index in 0..count {
      let node = nodes[pos];
      let (child_ty, child_offset) = self.init_child_slot(ty, index, base_offset);
      if node.kids_count == 0 {
        let leaf = node.expr.expect("leaf init node must carry an expression");
        self.eval_init_leaf(child_ty, child_offset, leaf, objects, registry);
        pos += 1;
      } else {
        pos += 1 + self.eval_init_siblings(child_ty, &nodes[pos + 1..], node.kids_count as usize, child_offset, objects, registry);
      }
    }
    pos
  }

  /// The type and absolute byte offset of the `index`-th immediate child of
  /// an aggregate being initialized (struct member / array element); falls
  /// back to `(ty, base_offset)` for a brace-wrapped scalar.
  fn init_child_slot(&self, ty: TypeH, index: usize, base_offset: u64) -> (TypeH, u64) {
    match self.ts.get(ty).kind {
      TypeKind::Struct { members, .. } | TypeKind::Union { members, .. } => {
        let m = self.ts.members(*members)[index];
        (m.ty, base_offset + m.offset)
      }
      TypeKind::Array { elem, .. } => {
        let elem = *elem;
        let stride = self.ts.get(elem).size;
        (elem, base_offset + stride * index as u64)
      }
      _ => (ty, base_offset),
    }
  }

  fn eval_init_leaf(&mut self, ty: TypeH, offset: u64, e: ExprH, objects: &mut Vec<crate::ir::symbol::InitObject>, registry: &Registry) {
    use crate::ir::symbol::InitObject;
    let loc = self.ast.expr(e).loc;
    match self.ast.expr(e).op.clone() {
      ExprKind::Symbol { stmt, .. } => match registry.get(&stmt).copied() {
        Some(target) => objects.push(InitObject::Reloc { offset, target }),
        None => self.diag.report(Severity::Error, loc, "relocation target has no registered IR symbol"),
      },
      ExprKind::Int { .. } | ExprKind::Char(_) | ExprKind::Enum(_) | ExprKind::Float32(_) | ExprKind::Float64(_) => {
        objects.push(InitObject::Region { offset, bytes: self.literal_bytes(ty, e) });
      }
      ExprKind::Str { bytes, wide } if matches!(self.ts.get(ty).kind, TypeKind::Array { .. }) => {
        objects.push(InitObject::Region { offset, bytes: string_literal_bytes(self.ts.get(ty).size as usize, &bytes, wide) });
      }
      ExprKind::Str { .. } => self.diag.report(Severity::Error, loc,
        "a string literal initializing a pointer-typed element would need an anonymous string constant, which this front end does not synthesize"),
      _ => self.diag.report(Severity::Error, loc, "initializer element is not a constant expression"),
    }
  }

  /// Little-endian byte representation of a literal, truncated to `ty`'s size.
  fn literal_bytes(&self, ty: TypeH, e: ExprH) -> Vec<u8> {
    let size = self.ts.get(ty).size as usize;
    let raw: [u8; 8] = match self.ast.expr(e).op {
      ExprKind::Int { value, .. } => value.to_le_bytes(),
      ExprKind::Char(c) => u64::from(c).to_le_bytes(),
      ExprKind::Enum(v) => (v as u64).to_le_bytes(),
      ExprKind::Float32(f) => {
        let mut b = [0u8; 8];
        b[..4].copy_from_slice(&f.to_le_bytes());
        b
      }
      ExprKind::Float64(f) => f.to_le_bytes(),
      _ => unreachable!("literal_bytes called on a non-literal expression"),
    };
    raw[..size.min(8)].to_vec()
  }
}

/// Pack a string literal's bytes (widened to `u16` per character if `wide`)
/// plus a null terminator, truncated or zero-padded to `size` (an array
/// leaf's declared element size).
fn string_literal_bytes(size: usize, bytes: &[u8], wide: bool) -> Vec<u8> {
  let mut out = Vec::with_capacity(size);
  if wide {
    for &b in bytes { out.extend_from_slice(&u16::from(b).to_le_bytes()); }
    out.extend_from_slice(&0u16.to_le_bytes());
  } else {
    out.extend_from_slice(bytes);
    out.push(0);
  }
  out.resize(size, 0);
  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::check::CheckerOptions;
  use crate::diag::DiagnosticSink;
  use crate::ir::symbol::SymbolTag;
  use crate::symtab::SymbolTable;
  use crate::types::ast::{AstStore, Decl, InitTree};
  use crate::types::TypeStore;
  use std::collections::HashSet;

  #[test]
  fn static_global_with_scalar_initializer_lowers_to_a_region() {
    let mut ts = TypeStore::new();
    let mut ast = AstStore::new();
    let symtab = SymbolTable::new();
    let diag = DiagnosticSink::new();
    let module = crate::ir::module::Module::new(1);
    let builtins = HashSet::new();
    let bump = bumpalo::Bump::new();
    let mut intern = crate::symbol::Interner::new(&bump);
    let name = intern.intern("counter");
    let mut checker = Checker::new(&mut ts, &mut ast, &symtab, &diag, &module, CheckerOptions::default(), &builtins, &intern);

    let int_ty = checker.ts.int(false);
    let lit = checker.ast.push_expr(ExprKind::Int { value: 7, suffix: crate::types::ast::IntSuffix::None }, SourceLoc(0));
    let init_range = checker.ast.push_init_tree(&[InitTree::Leaf(lit)]);
    let initializer = checker.ast.push_expr(ExprKind::Initializer { ty: int_ty, nodes: init_range }, SourceLoc(0));
    let decl = Decl { name, ty: int_ty, initial: Some(initializer), attrs: DeclAttrs::STATIC | DeclAttrs::USED };
    let stmt = checker.ast.push_stmt(StmtKind::GlobalDecl(decl), SourceLoc(0));
    checker.ast.push_top_level(stmt);

    checker.check_top_level(0);

    assert!(!diag.has_errors());
    assert_eq!(checker.module.symbol_count(SymbolTag::Global), 1);
    let id = checker.module.global_ids()[0];
    checker.module.with_global(id, |g| {
      assert_eq!(g.linkage, Linkage::Private);
      assert_eq!(g.objects.len(), 1);
      assert!(matches!(&g.objects[0], crate::ir::symbol::InitObject::Region { bytes, .. } if bytes == &7u32.to_le_bytes()));
    });
  }

  #[test]
  fn unused_static_function_is_skipped() {
    let mut ts = TypeStore::new();
    let mut ast = AstStore::new();
    let symtab = SymbolTable::new();
    let diag = DiagnosticSink::new();
    let module = crate::ir::module::Module::new(1);
    let builtins = HashSet::new();
    let bump = bumpalo::Bump::new();
    let mut intern = crate::symbol::Interner::new(&bump);
    let name = intern.intern("dead");
    let mut checker = Checker::new(&mut ts, &mut ast, &symtab, &diag, &module, CheckerOptions::default(), &builtins, &intern);

    let ret = checker.ts.void();
    let func_ty = checker.ts.new_func(ret, &[], false, None);
    let body = checker.ast.push_stmt(StmtKind::Compound { kids: Box::new([]), first_symbol: None }, SourceLoc(0));
    let decl = Decl { name, ty: func_ty, initial: None, attrs: DeclAttrs::STATIC };
    let stmt = checker.ast.push_stmt(StmtKind::FuncDecl { decl, body }, SourceLoc(0));
    checker.ast.push_top_level(stmt);

    checker.check_top_level(0);

    assert_eq!(checker.module.symbol_count(SymbolTag::Function), 0);
  }

  #[test]
  fn suppressed_builtin_extern_registers_nothing() {
    let mut ts = TypeStore::new();
    let mut ast = AstStore::new();
    let symtab = SymbolTable::new();
    let diag = DiagnosticSink::new();
    let module = crate::ir::module::Module::new(1);
    let mut builtins = HashSet::new();
    builtins.insert("_builtin_memcpy".to_string());
    let bump = bumpalo::Bump::new();
    let mut intern = crate::symbol::Interner::new(&bump);
    let name = intern.intern("_builtin_memcpy");
    let mut checker = Checker::new(&mut ts, &mut ast, &symtab, &diag, &module, CheckerOptions::default(), &builtins, &intern);

    let ret = checker.ts.void();
    let func_ty = checker.ts.new_func(ret, &[], false, None);
    let decl = Decl { name, ty: func_ty, initial: None, attrs: DeclAttrs::EXTERN | DeclAttrs::USED };
    let stmt = checker.ast.push_stmt(StmtKind::GlobalDecl(decl), SourceLoc(0));
    checker.ast.push_top_level(stmt);

    checker.check_top_level(0);

    assert_eq!(checker.module.symbol_count(SymbolTag::External), 0);
  }
}
