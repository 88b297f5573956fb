//! Expression checker (spec component C5): `check_expr(h) -> TypeH`. Sets
//! `expr.ty`, may set `expr.cast_type`, may rewrite `expr.op` in place.
//! Never allocates a new statement. Grounded directly on `sema_expr` in
//! `sema.c`; every rule below cites the case it replaces, and deviations
//! from the original's literal C behavior (favoring the checker's own
//! stated canonicalization/visit-every-node rules where the two disagree)
//! are called out in `DESIGN.md`.

use crate::diag::Severity;
use crate::types::ast::{BinOp, ExprH, ExprKind, IntSuffix};
use crate::types::{int_info, is_arithmetic, TypeH, TypeKind};

use super::Checker;

impl Checker<'_> {
  /// Check `h`, returning its value type. The single entry point C4, C6 and
  /// C7 all call into.
  pub fn check_expr(&mut self, h: ExprH) -> TypeH {
    let loc = self.ast.expr(h).loc;
    let op = self.ast.expr(h).op.clone();
    let ty = match op {
      ExprKind::Int { value, suffix } => self.check_int_literal(h, value, suffix),
      ExprKind::Float32(_) => self.ts.float(),
      ExprKind::Float64(_) => self.ts.double(),
      ExprKind::Char(_) => self.ts.char_(false),
      ExprKind::Enum(_) => self.ts.int(false),
      ExprKind::Str { bytes, wide } => {
        let elem = if wide { self.ts.short(false) } else { self.ts.char_(false) };
        self.ts.new_array(elem, bytes.len() as u64 + 1)
      }
      ExprKind::SizeofExpr(inner) => {
        let src = self.check_expr(inner);
        let size = self.ts.get(src).size;
        self.rewrite_to_int(h, size, IntSuffix::Ull)
      }
      ExprKind::AlignofExpr(inner) => {
        let src = self.check_expr(inner);
        let align = self.ts.get(src).align;
        self.rewrite_to_int(h, align, IntSuffix::Ull)
      }
      ExprKind::SizeofType(t) => {
        self.resolve_typeof(t);
        let size = self.ts.get(t).size;
        self.rewrite_to_int(h, size, IntSuffix::None)
      }
      ExprKind::AlignofType(t) => {
        self.resolve_typeof(t);
        let align = self.ts.get(t).align;
        self.rewrite_to_int(h, align, IntSuffix::None)
      }
      ExprKind::Initializer { ty, nodes } => {
        self.resolve_typeof(ty);
        let (arena, top_count) = self.ast.init_nodes(nodes);
        let arena = arena.to_vec();
        let mut leaves = Vec::new();
        crate::types::ast::walk_init_nodes(&arena, top_count, &mut |e| leaves.push(e));
        for leaf in leaves { self.check_expr(leaf); }
        ty
      }
      ExprKind::LogicalNot(inner) => { self.check_expr(inner); self.ts.bool_() }
      ExprKind::Negate(inner) | ExprKind::BitNot(inner)
      | ExprKind::PreInc(inner) | ExprKind::PreDec(inner)
      | ExprKind::PostInc(inner) | ExprKind::PostDec(inner) => self.check_expr(inner),
      ExprKind::Addr(inner) => { let t = self.check_expr(inner); self.ts.new_pointer(t) }
      ExprKind::Symbol { stmt, .. } => self.check_symbol(h, stmt),
      ExprKind::Param { index } => self.check_param(index),
      ExprKind::Cast { ty, src } => {
        self.resolve_typeof(ty);
        self.check_expr(src);
        self.ast.expr_mut(src).cast_type = Some(ty);
        ty
      }
      ExprKind::Subscript { base, index } => self.check_subscript(h, base, index),
      ExprKind::Deref(inner) => self.check_deref(loc, inner),
      ExprKind::Call { target, args } => self.check_call(loc, target, &args),
      ExprKind::Ternary { cond, then, else_ } => self.check_ternary(loc, cond, then, else_),
      ExprKind::Comma { left, right } => { self.check_expr(left); self.check_expr(right) }
      ExprKind::Dot { base, name, .. } => self.check_dot(h, loc, base, name),
      ExprKind::Arrow { base, name, .. } => self.check_arrow(h, loc, base, name),
      ExprKind::Logical { left, right, .. } => self.check_logical(left, right),
      ExprKind::Binary { op, left, right } => self.check_binary(h, loc, op, left, right),
      ExprKind::Compare { left, right, .. } => self.check_compare(left, right),
      ExprKind::Assign { left, right, .. } => self.check_assign(left, right),
    };
    self.ast.expr_mut(h).ty = Some(ty);
    ty
  }

  fn rewrite_to_int(&mut self, h: ExprH, value: u64, suffix: IntSuffix) -> TypeH {
    self.ast.expr_mut(h).op = ExprKind::Int { value, suffix };
    self.ts.long(true)
  }

  fn check_int_literal(&mut self, h: ExprH, value: u64, suffix: IntSuffix) -> TypeH {
    let loc = self.ast.expr(h).loc;
    match suffix {
      IntSuffix::None => {
        if value > u64::from(u32::MAX) {
          self.diag.report(Severity::Error, loc, "could not represent integer literal as int");
        }
        self.ts.int(false)
      }
      IntSuffix::U => {
        if value > u64::from(u32::MAX) {
          self.diag.report(Severity::Error, loc, "could not represent integer literal as unsigned int");
        }
        self.ts.int(true)
      }
      IntSuffix::L | IntSuffix::Ll => self.ts.long(false),
      IntSuffix::Ul | IntSuffix::Ull => self.ts.long(true),
    }
  }

  fn check_symbol(&mut self, h: ExprH, stmt: crate::types::ast::StmtH) -> TypeH {
    use crate::types::ast::StmtKind;
    match &self.ast.stmt(stmt).op {
      StmtKind::Label { .. } => self.ts.void(),
      StmtKind::Decl(d) | StmtKind::GlobalDecl(d) => {
        let ty = d.ty;
        if let TypeKind::Array { elem, .. } = self.ts.get(ty).kind {
          let elem = *elem;
          let cast = self.ts.new_pointer(elem);
          self.ast.expr_mut(h).cast_type = Some(cast);
        }
        ty
      }
      StmtKind::FuncDecl { decl, .. } => decl.ty,
      _ => panic!("check_symbol: referenced statement is not a declaration"),
    }
  }

  fn check_param(&self, index: u32) -> TypeH {
    let func = self.current_func.as_ref().expect("Param expression outside a function body");
    func.params.get(index as usize).copied().expect("Param index out of range for enclosing function")
  }

  fn check_subscript(&mut self, h: ExprH, base: ExprH, index: ExprH) -> TypeH {
    let mut base_ty = self.check_expr(base);
    let mut index_ty = self.check_expr(index);
    if self.decayed_pointee(index_ty).is_some() {
      std::mem::swap(&mut base_ty, &mut index_ty);
      if let ExprKind::Subscript { base, index } = &mut self.ast.expr_mut(h).op {
        std::mem::swap(base, index);
      }
    }
    self.decayed_pointee(base_ty).expect("Subscript base did not resolve to a pointer/array type")
  }

  fn check_deref(&mut self, loc: crate::diag::SourceLoc, inner: ExprH) -> TypeH {
    let base_ty = self.check_expr(inner);
    self.decayed_pointee(base_ty).unwrap_or_else(|| {
      panic!("{loc:?}: dereference of non-pointer, non-array type {}", self.ts.display(base_ty))
    })
  }

  fn check_call(&mut self, loc: crate::diag::SourceLoc, target: ExprH, args: &[ExprH]) -> TypeH {
    let target_ty = self.check_expr(target);
    let func_ty = match self.ts.get(target_ty).kind {
      TypeKind::Pointer { pointee } if matches!(self.ts.get(*pointee).kind, TypeKind::Function { .. }) => *pointee,
      _ => target_ty,
    };
    self.ast.expr_mut(target).cast_type = Some(func_ty);

    let TypeKind::Function { ret, params, varargs, .. } = self.ts.get(func_ty).kind.clone() else {
      self.diag.report(Severity::Error, loc, "function call target must be a function-type");
      return self.ts.void();
    };
    let params = self.ts.params(params).to_vec();

    if varargs {
      if args.len() < params.len() {
        self.diag.report(Severity::Error, loc, format!("not enough arguments (expected at least {}, got {})", params.len(), args.len()));
      }
    } else if args.len() != params.len() {
      self.diag.report(Severity::Error, loc, format!("argument count mismatch (expected {}, got {})", params.len(), args.len()));
    }

    for (i, &arg) in args.iter().enumerate() {
      let arg_ty = self.check_expr(arg);
      if let Some(p) = params.get(i) {
        if !self.assignable(arg_ty, p.ty, arg) {
          self.diag.report(Severity::Error, loc, format!(
            "could not implicitly convert type {} into {}", self.ts.display(arg_ty), self.ts.display(p.ty)));
        }
        self.ast.expr_mut(arg).cast_type = Some(p.ty);
      } else {
        self.ast.expr_mut(arg).cast_type = Some(arg_ty);
      }
    }

    ret
  }

  fn check_ternary(&mut self, loc: crate::diag::SourceLoc, cond: ExprH, then: ExprH, else_: ExprH) -> TypeH {
    let cond_ty = self.check_expr(cond);
    if !is_scalar_kind(&self.ts.get(cond_ty).kind) {
      self.diag.report(Severity::Error, loc, format!("could not convert type {} into boolean", self.ts.display(cond_ty)));
    }
    let cond_bool = self.ts.bool_();
    self.ast.expr_mut(cond).cast_type = Some(cond_bool);

    let then_ty = self.check_expr(then);
    let else_ty = self.check_expr(else_);
    let common = self.ts.common(then_ty, else_ty);
    self.ast.expr_mut(then).cast_type = Some(common);
    self.ast.expr_mut(else_).cast_type = Some(common);
    common
  }

  fn check_dot(&mut self, h: ExprH, loc: crate::diag::SourceLoc, base: ExprH, name: crate::symbol::Symbol) -> TypeH {
    let base_ty = self.check_expr(base);
    let record_ty = match self.ts.get(base_ty).kind {
      TypeKind::Pointer { pointee } => {
        if self.opts.pedantic {
          self.diag.report(Severity::Error, loc, "implicit dereference is a non-standard extension (enable pedantic mode to disallow it)");
          return self.ts.void();
        }
        *pointee
      }
      _ => base_ty,
    };
    self.resolve_member(h, loc, record_ty, name, false)
  }

  fn check_arrow(&mut self, h: ExprH, loc: crate::diag::SourceLoc, base: ExprH, name: crate::symbol::Symbol) -> TypeH {
    let base_ty = self.check_expr(base);
    let Some(record_ty) = self.decayed_pointee(base_ty) else {
      self.diag.report(Severity::Error, loc, "cannot do arrow operator on non-pointer type");
      return self.ts.void();
    };
    self.resolve_member(h, loc, record_ty, name, true)
  }

  fn resolve_member(&mut self, h: ExprH, loc: crate::diag::SourceLoc, record_ty: TypeH, name: crate::symbol::Symbol, is_arrow: bool) -> TypeH {
    let members = match self.ts.get(record_ty).kind {
      TypeKind::Struct { members, .. } | TypeKind::Union { members, .. } => *members,
      _ => {
        self.diag.report(Severity::Error, loc, "cannot get the member of a non-record type");
        return self.ts.void();
      }
    };
    let found = self.ts.members(members).iter().enumerate().find(|(_, m)| m.name == name);
    let Some((idx, member)) = found else {
      self.diag.report(Severity::Error, loc, "could not find member under that name");
      return self.ts.void();
    };
    let member_ty = member.ty;
    let member_h = crate::types::MemberH::from_usize(members.as_usize_range().start + idx);
    match &mut self.ast.expr_mut(h).op {
      ExprKind::Dot { member, .. } if !is_arrow => *member = Some(member_h),
      ExprKind::Arrow { member, .. } if is_arrow => *member = Some(member_h),
      _ => {}
    }
    member_ty
  }

  fn check_logical(&mut self, left: ExprH, right: ExprH) -> TypeH {
    self.check_expr(left);
    self.check_expr(right);
    let b = self.ts.bool_();
    self.ast.expr_mut(left).cast_type = Some(b);
    let b2 = self.ts.bool_();
    self.ast.expr_mut(right).cast_type = Some(b2);
    self.ts.bool_()
  }

  fn check_binary(&mut self, h: ExprH, loc: crate::diag::SourceLoc, op: BinOp, mut left: ExprH, mut right: ExprH) -> TypeH {
    let mut left_ty = self.check_expr(left);
    let mut right_ty = self.check_expr(right);
    let is_ptr_arith = matches!(op, BinOp::Plus | BinOp::Minus)
      && (self.decayed_pointee(left_ty).is_some() || self.decayed_pointee(right_ty).is_some());

    if !is_ptr_arith {
      if !(is_arithmetic(&self.ts.get(left_ty).kind) && is_arithmetic(&self.ts.get(right_ty).kind)) {
        self.diag.report(Severity::Error, loc, format!(
          "cannot apply binary operator to {} and {}", self.ts.display(left_ty), self.ts.display(right_ty)));
        return self.ts.void();
      }
      let common = self.ts.common(left_ty, right_ty);
      self.ast.expr_mut(left).cast_type = Some(common);
      self.ast.expr_mut(right).cast_type = Some(common);
      return common;
    }

    // Canonicalize so the pointer/array operand is on the left (spec §4.3).
    if self.decayed_pointee(right_ty).is_some() {
      std::mem::swap(&mut left, &mut right);
      std::mem::swap(&mut left_ty, &mut right_ty);
      if let ExprKind::Binary { left, right, .. } = &mut self.ast.expr_mut(h).op { std::mem::swap(left, right); }
    }

    if self.decayed_pointee(right_ty).is_some() {
      // both operands are pointer/array
      if op == BinOp::Minus {
        self.ast.expr_mut(left).cast_type = Some(left_ty);
        self.ast.expr_mut(right).cast_type = Some(right_ty);
        if let ExprKind::Binary { op, .. } = &mut self.ast.expr_mut(h).op { *op = BinOp::PtrDiff; }
        self.ts.long(false)
      } else {
        self.diag.report(Severity::Error, loc, "cannot do pointer addition with two pointer operands, one must be an integral type");
        self.ts.void()
      }
    } else {
      let ulong = self.ts.long(true);
      self.ast.expr_mut(left).cast_type = Some(left_ty);
      self.ast.expr_mut(right).cast_type = Some(ulong);
      let new_op = if op == BinOp::Plus { BinOp::PtrAdd } else { BinOp::PtrSub };
      if let ExprKind::Binary { op, .. } = &mut self.ast.expr_mut(h).op { *op = new_op; }
      match self.ts.get(left_ty).kind { TypeKind::Array { elem, .. } => self.ts.new_pointer(*elem), _ => left_ty }
    }
  }

  fn check_compare(&mut self, left: ExprH, right: ExprH) -> TypeH {
    let l = self.check_expr(left);
    let r = self.check_expr(right);
    let common = self.ts.common(l, r);
    self.ast.expr_mut(left).cast_type = Some(common);
    self.ast.expr_mut(right).cast_type = Some(common);
    self.ts.bool_()
  }

  fn check_assign(&mut self, left: ExprH, right: ExprH) -> TypeH {
    let l = self.check_expr(left);
    let r = self.check_expr(right);
    let common = self.ts.common(l, r);
    self.ast.expr_mut(left).cast_type = Some(common);
    self.ast.expr_mut(right).cast_type = Some(common);
    common
  }

  /// `true` if `t` is `Pointer`/`Array`, returning its pointee/element type.
  fn decayed_pointee(&self, t: TypeH) -> Option<TypeH> {
    match self.ts.get(t).kind {
      TypeKind::Pointer { pointee } => Some(*pointee),
      TypeKind::Array { elem, .. } => Some(*elem),
      _ => None,
    }
  }

  /// `type_compatible(a, b, a_expr)` (spec §4.3, "Assignability").
  pub(crate) fn assignable(&self, src: TypeH, dst: TypeH, src_expr: ExprH) -> bool {
    if self.ts.equal(src, dst) { return true; }
    let sk = self.ts.get(src).kind.clone();
    let dk = self.ts.get(dst).kind.clone();

    if int_info(&sk).is_some() && int_info(&dk).is_some() { return true; }

    if self.decayed_pointee(dst).is_some() {
      if let ExprKind::Int { value: 0, .. } = self.ast.expr(src_expr).op { return true; }
    }

    if (matches!(sk, TypeKind::Float | TypeKind::Double) && is_arithmetic(&dk))
      || (matches!(dk, TypeKind::Float | TypeKind::Double) && is_arithmetic(&sk)) {
      return true;
    }

    if matches!(sk, TypeKind::Function { .. }) {
      if let Some(fn_pointee) = self.decayed_pointee(dst) {
        if matches!(self.ts.get(fn_pointee).kind, TypeKind::Function { .. }) {
          return self.ts.equal(src, fn_pointee);
        }
      }
    }

    if let (Some(sp), Some(dp)) = (self.decayed_pointee(src), self.decayed_pointee(dst)) {
      if matches!(self.ts.get(sp).kind, TypeKind::Void) || matches!(self.ts.get(dp).kind, TypeKind::Void) { return true; }
      return self.ts.equal(sp, dp);
    }

    false
  }
}

fn is_scalar_kind(k: &TypeKind) -> bool { crate::types::is_scalar(k) }

#[cfg(test)]
mod tests {
  use super::*;
  use crate::check::CheckerOptions;
  use crate::diag::{DiagnosticSink, SourceLoc};
  use crate::ir::module::Module;
  use crate::symtab::SymbolTable;
  use crate::types::ast::{AstStore, IntSuffix};
  use crate::types::TypeStore;
  use std::collections::HashSet;

  fn int_literal(ast: &mut AstStore, value: u64) -> ExprH {
    ast.push_expr(ExprKind::Int { value, suffix: IntSuffix::None }, SourceLoc(0))
  }

  #[test]
  fn binary_arithmetic_promotes_to_common_type() {
    let mut ts = TypeStore::new();
    let mut ast = AstStore::new();
    let symtab = SymbolTable::new();
    let diag = DiagnosticSink::new();
    let module = Module::new(1);
    let builtins = HashSet::new();
    let bump = bumpalo::Bump::new();
    let intern = crate::symbol::Interner::new(&bump);
    let mut checker = Checker::new(&mut ts, &mut ast, &symtab, &diag, &module, CheckerOptions::default(), &builtins, &intern);

    let left = int_literal(checker.ast, 1);
    let right = checker.ast.push_expr(ExprKind::Int { value: 2, suffix: IntSuffix::Ul }, SourceLoc(0));
    let bin = checker.ast.push_expr(ExprKind::Binary { op: BinOp::Plus, left, right }, SourceLoc(0));

    let result = checker.check_expr(bin);
    assert!(matches!(checker.ts.get(result).kind, TypeKind::Long { unsigned: true }));
    assert!(!diag.has_errors());
  }

  #[test]
  fn pointer_arithmetic_canonicalizes_pointer_to_the_left() {
    let mut ts = TypeStore::new();
    let mut ast = AstStore::new();
    let symtab = SymbolTable::new();
    let diag = DiagnosticSink::new();
    let module = Module::new(1);
    let builtins = HashSet::new();
    let bump = bumpalo::Bump::new();
    let intern = crate::symbol::Interner::new(&bump);
    let mut checker = Checker::new(&mut ts, &mut ast, &symtab, &diag, &module, CheckerOptions::default(), &builtins, &intern);

    let int_ty = checker.ts.int(false);
    let ptr_ty = checker.ts.new_pointer(int_ty);
    let cast_src = int_literal(checker.ast, 0);
    let ptr_expr = checker.ast.push_expr(ExprKind::Cast { ty: ptr_ty, src: cast_src }, SourceLoc(0));
    let offset = int_literal(checker.ast, 3);
    // `3 + ptr` in source order: int literal on the left, pointer on the right.
    let bin = checker.ast.push_expr(ExprKind::Binary { op: BinOp::Plus, left: offset, right: ptr_expr }, SourceLoc(0));

    let result = checker.check_expr(bin);
    assert!(matches!(checker.ts.get(result).kind, TypeKind::Pointer { .. }));
    let ExprKind::Binary { left, op, .. } = &checker.ast.expr(bin).op else { panic!() };
    assert!(matches!(checker.ts.get(checker.ast.expr(*left).ty.unwrap()).kind, TypeKind::Pointer { .. }));
    assert_eq!(*op, BinOp::PtrAdd);
  }

  #[test]
  fn call_with_wrong_argument_count_reports_an_error() {
    let mut ts = TypeStore::new();
    let mut ast = AstStore::new();
    let symtab = SymbolTable::new();
    let diag = DiagnosticSink::new();
    let module = Module::new(1);
    let builtins = HashSet::new();
    let bump = bumpalo::Bump::new();
    let mut intern = crate::symbol::Interner::new(&bump);
    let callee_name = intern.intern("f");
    let mut checker = Checker::new(&mut ts, &mut ast, &symtab, &diag, &module, CheckerOptions::default(), &builtins, &intern);

    let ret = checker.ts.void();
    let param_ty = checker.ts.int(false);
    let func_ty = checker.ts.new_func(ret, &[crate::types::Param { name: None, ty: param_ty }], false, None);
    let body = checker.ast.push_stmt(crate::types::ast::StmtKind::Break, SourceLoc(0));
    let callee = checker.ast.push_stmt(
      crate::types::ast::StmtKind::FuncDecl {
        decl: crate::types::ast::Decl {
          name: callee_name,
          ty: func_ty,
          initial: None,
          attrs: crate::types::ast::DeclAttrs::empty(),
        },
        body,
      },
      SourceLoc(0),
    );
    let target = checker.ast.push_expr(ExprKind::Symbol { stmt: callee, next_symbol_in_chain: None }, SourceLoc(0));
    let call = checker.ast.push_expr(ExprKind::Call { target, args: Default::default() }, SourceLoc(0));

    checker.check_expr(call);
    assert!(diag.has_errors());
  }
}
