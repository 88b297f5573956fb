//! Reachability pass (spec component C8): mark-and-sweep over top-level
//! declarations, starting from every `is_root` decl and following the
//! parser-supplied symbol-reference chains embedded in function bodies.
//! Grounded on `sema_mark_children`/`sema_remove_unused` in `sema.c`; C7
//! (top-level lowering) consults the resulting `is_used` flags to decide
//! which bodies to skip.

use std::collections::VecDeque;

use crate::types::ast::{AstStore, DeclAttrs, ExprKind, StmtData, StmtH, StmtKind};

fn decl_attrs(stmt: &StmtData) -> Option<DeclAttrs> {
  match &stmt.op {
    StmtKind::Decl(d) | StmtKind::GlobalDecl(d) => Some(d.attrs),
    StmtKind::FuncDecl { decl, .. } => Some(decl.attrs),
    _ => None,
  }
}

fn decl_attrs_mut(stmt: &mut StmtData) -> Option<&mut DeclAttrs> {
  match &mut stmt.op {
    StmtKind::Decl(d) | StmtKind::GlobalDecl(d) => Some(&mut d.attrs),
    StmtKind::FuncDecl { decl, .. } => Some(&mut decl.attrs),
    _ => None,
  }
}

/// Mark `target` used if it isn't already, enqueuing it for a body walk if
/// it's a function (`sema_mark_children`).
fn mark(ast: &mut AstStore, queue: &mut VecDeque<StmtH>, target: StmtH) {
  let Some(attrs) = decl_attrs(ast.stmt(target)) else { return };
  if attrs.contains(DeclAttrs::USED) { return; }
  decl_attrs_mut(ast.stmt_mut(target)).expect("just checked Some above").insert(DeclAttrs::USED);
  if matches!(ast.stmt(target).op, StmtKind::FuncDecl { .. }) {
    queue.push_back(target);
  }
}

/// Walk one function's symbol-reference chain, marking every referenced
/// declaration and enqueuing any referenced function for its own walk.
fn mark_body_references(ast: &mut AstStore, queue: &mut VecDeque<StmtH>, func: StmtH) {
  let body = match &ast.stmt(func).op {
    StmtKind::FuncDecl { body, .. } => *body,
    _ => unreachable!("mark only enqueues FuncDecl statements"),
  };
  let mut sym = match &ast.stmt(body).op {
    StmtKind::Compound { first_symbol, .. } => *first_symbol,
    _ => None,
  };
  while let Some(e) = sym {
    let (target, next) = match &ast.expr(e).op {
      ExprKind::Symbol { stmt, next_symbol_in_chain } => (*stmt, *next_symbol_in_chain),
      // The chain is parser-built and only ever links symbol references.
      _ => break,
    };
    mark(ast, queue, target);
    sym = next;
  }
}

/// Run the reachability pass over every top-level statement (spec §4.6).
/// After this call, C7 may skip the body of any declaration whose
/// `is_used` attribute is still unset.
pub fn mark_reachable(ast: &mut AstStore) {
  let top_level: Vec<StmtH> = ast.top_level_stmts().to_vec();
  let mut queue: VecDeque<StmtH> = VecDeque::new();

  for s in top_level {
    let is_root = decl_attrs(ast.stmt(s)).is_some_and(|a| a.contains(DeclAttrs::ROOT));
    if !is_root { continue; }
    decl_attrs_mut(ast.stmt_mut(s)).expect("is_root implies a Decl/GlobalDecl/FuncDecl").insert(DeclAttrs::USED);
    if matches!(ast.stmt(s).op, StmtKind::FuncDecl { .. }) {
      queue.push_back(s);
    }
  }

  while let Some(func) = queue.pop_front() {
    mark_body_references(ast, &mut queue, func);
  }
}
