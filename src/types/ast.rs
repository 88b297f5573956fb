//! AST store (spec component C2): stable handle-based storage for
//! statements, expressions, parameters and initializer trees, as produced by
//! the (out-of-scope) parser and mutated in place by the checker.

use smallvec::SmallVec;

use crate::diag::SourceLoc;
use crate::handle::{define_handle, HandleRange};
use crate::symbol::Symbol;
use crate::types::{MemberH, TypeH};

define_handle!(
  /// Handle into [`AstStore::stmts`].
  StmtH
);
define_handle!(
  /// Handle into [`AstStore::exprs`].
  ExprH
);
define_handle!(
  /// Handle into [`AstStore::init_nodes`].
  InitNodeH
);

/// A reserved label id, handed out by the statement checker (C6) the first
/// time it reaches a `Label` statement, since a later `goto` may jump to it
/// before it is textually declared.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct LabelId(pub u32);

/// Integer literal suffix, selecting which of `int | unsigned int | long |
/// unsigned long` a literal is typed as.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum IntSuffix { None, U, L, Ll, Ul, Ull }

/// Binary arithmetic/bitwise/shift operators, including the pointer-specific
/// variants `PtrAdd`/`PtrSub`/`PtrDiff` that the expression checker (C5)
/// rewrites `Plus`/`Minus` into in place once it sees a pointer operand.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BinOp { Plus, Minus, Times, Slash, Percent, And, Or, Xor, Shl, Shr, PtrAdd, PtrSub, PtrDiff }

/// Relational/equality operators.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CmpOp { Eq, Ne, Gt, Ge, Lt, Le }

/// Simple and compound assignment operators.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AssignOp { Assign, Plus, Minus, Times, Slash, And, Or, Xor, Shl, Shr }

/// A flattened initializer-tree node (spec §3, "Initializer trees"): either
/// an aggregate group header (`kids_count > 0`, the children are the next
/// `kids_count` entries of the same flattened sequence) or an expression
/// leaf.
#[derive(Clone, Copy, Debug)]
pub struct InitNode {
  /// Number of immediate children, or `0` for a leaf.
  pub kids_count: u32,
  /// The leaf expression, if `kids_count == 0`.
  pub expr: Option<ExprH>,
}

/// A contiguous run of top-level initializer siblings, `[start, start +
/// top_count)` into [`AstStore::init_nodes`].
#[derive(Clone, Copy, Debug)]
pub struct InitRange {
  pub(crate) start: u32,
  pub(crate) top_count: u32,
}

/// Walk a flattened initializer tree in pre-order, calling `leaf` on every
/// expression leaf. Mirrors `walk_initializer_for_sema` in the original
/// implementation: `count` is the number of *siblings* to process at this
/// level, and an aggregate group's `kids_count` is its number of *immediate*
/// children, not a total descendant count.
pub fn walk_init_nodes(nodes: &[InitNode], count: usize, leaf: &mut impl FnMut(ExprH)) -> usize {
  let mut pos = 0;
  for _ in 0..count {
    let node = nodes[pos];
    if node.kids_count == 0 {
      leaf(node.expr.expect("leaf init node must carry an expression"));
      pos += 1;
    } else {
      pos += 1 + walk_init_nodes(&nodes[pos + 1..], node.kids_count as usize, leaf);
    }
  }
  pos
}

/// An expression's operator and operator-specific payload. The checker (C5)
/// may rewrite a node's `op` in place (`Sizeof`/`Alignof` → `Int`,
/// `Plus`/`Minus` → `PtrAdd`/`PtrSub`/`PtrDiff`).
#[derive(Clone, Debug)]
pub enum ExprKind {
  /// Integer literal.
  Int { value: u64, suffix: IntSuffix },
  /// `float` literal.
  Float32(f32),
  /// `double` literal.
  Float64(f64),
  /// Character literal.
  Char(u32),
  /// String literal; `wide` marks an `L"..."` literal (`short` element type).
  Str { bytes: Box<[u8]>, wide: bool },
  /// Enumerator reference; always typed `int`.
  Enum(i64),
  /// Reference to a bound declaration. `next_symbol_in_chain` links every
  /// symbol reference lexically inside one function body into the flat list
  /// the reachability pass (C8) walks; it is parser-supplied, read-only input.
  Symbol { stmt: StmtH, next_symbol_in_chain: Option<ExprH> },
  /// Reference to the `index`-th parameter of the enclosing function.
  Param { index: u32 },
  /// `*inner`.
  Deref(ExprH),
  /// `&inner`.
  Addr(ExprH),
  /// `base[index]`.
  Subscript { base: ExprH, index: ExprH },
  /// `base.name`; `member` is filled in by C5 once the field is resolved.
  Dot { base: ExprH, name: Symbol, member: Option<MemberH> },
  /// `base->name`; `member` is filled in by C5 once the field is resolved.
  Arrow { base: ExprH, name: Symbol, member: Option<MemberH> },
  /// `!inner`.
  LogicalNot(ExprH),
  /// `-inner`.
  Negate(ExprH),
  /// `~inner`.
  BitNot(ExprH),
  /// `++inner` (prefix).
  PreInc(ExprH),
  /// `--inner` (prefix).
  PreDec(ExprH),
  /// `inner++` (postfix).
  PostInc(ExprH),
  /// `inner--` (postfix).
  PostDec(ExprH),
  /// `left OP right` for arithmetic/bitwise/shift/pointer-arithmetic operators.
  Binary { op: BinOp, left: ExprH, right: ExprH },
  /// `left OP right` for relational/equality operators.
  Compare { op: CmpOp, left: ExprH, right: ExprH },
  /// `left && right` / `left || right`.
  Logical { is_and: bool, left: ExprH, right: ExprH },
  /// `left OP= right` / `left = right`.
  Assign { op: AssignOp, left: ExprH, right: ExprH },
  /// `cond ? then : else_`.
  Ternary { cond: ExprH, then: ExprH, else_: ExprH },
  /// `left, right`.
  Comma { left: ExprH, right: ExprH },
  /// `target(args...)`.
  Call { target: ExprH, args: SmallVec<[ExprH; 4]> },
  /// `(ty) src`.
  Cast { ty: TypeH, src: ExprH },
  /// `sizeof expr`; rewritten to `Int` by C5.
  SizeofExpr(ExprH),
  /// `_Alignof expr`; rewritten to `Int` by C5.
  AlignofExpr(ExprH),
  /// `sizeof(ty)`; rewritten to `Int` by C5.
  SizeofType(TypeH),
  /// `_Alignof(ty)`; rewritten to `Int` by C5.
  AlignofType(TypeH),
  /// `(T){ ... }` / brace-initializer.
  Initializer { ty: TypeH, nodes: InitRange },
}

/// One node in the expression arena: its operator/payload plus the two type
/// annotations C5 attaches (spec §9, "Cast-type as a second type field").
#[derive(Clone, Debug)]
pub struct ExprData {
  pub op: ExprKind,
  pub loc: SourceLoc,
  /// This expression's own value type, set by C5. `None` until checked (and
  /// permanently `None` for a reference to a `Label`, spec §4.3).
  pub ty: Option<TypeH>,
  /// The type the parent expects this value coerced to before consuming it;
  /// distinct from `ty` (spec §9).
  pub cast_type: Option<TypeH>,
}

bitflags::bitflags! {
  /// Declaration attributes, set by the parser (`is_static`/`is_extern`/
  /// `is_inline`/`is_root`) and mutated by the reachability pass (`is_used`).
  #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
  pub struct DeclAttrs: u8 {
    const STATIC = 1 << 0;
    const EXTERN = 1 << 1;
    const INLINE = 1 << 2;
    const USED   = 1 << 3;
    const ROOT   = 1 << 4;
  }
}

/// The shared payload of `Decl`/`GlobalDecl`/`FuncDecl` statements.
#[derive(Clone, Debug)]
pub struct Decl {
  pub name: Symbol,
  pub ty: TypeH,
  pub initial: Option<ExprH>,
  pub attrs: DeclAttrs,
}

/// A statement node. The checker (C6/C7) walks these structurally,
/// delegating to C5 for every embedded expression.
#[derive(Clone, Debug)]
pub enum StmtKind {
  /// `{ kids... }`. `first_symbol` is the head of the function-body symbol
  /// chain the reachability pass (C8) walks (only meaningful on a
  /// `FuncDecl`'s body).
  Compound { kids: Box<[StmtH]>, first_symbol: Option<ExprH> },
  /// A local/global variable/typedef declaration, depending on context.
  Decl(Decl),
  /// A top-level variable declaration (storage duration = the whole program).
  GlobalDecl(Decl),
  /// A top-level function declaration/definition.
  FuncDecl { decl: Decl, body: StmtH },
  /// An expression-statement.
  Expr(ExprH),
  /// `return expr;` / `return;`.
  Return(Option<ExprH>),
  /// `if (cond) body [else next]`.
  If { cond: ExprH, body: StmtH, next: Option<StmtH> },
  /// `while (cond) body`.
  While { cond: ExprH, body: Option<StmtH> },
  /// `do body while (cond);`.
  DoWhile { body: Option<StmtH>, cond: ExprH },
  /// `for (first; cond; next) body`.
  For { first: Option<StmtH>, cond: Option<ExprH>, next: Option<ExprH>, body: StmtH },
  /// `switch (condition) body`.
  Switch { condition: ExprH, body: StmtH },
  /// `case ...: body`.
  Case { body: StmtH },
  /// `default: body`.
  Default { body: StmtH },
  /// `break;`.
  Break,
  /// `continue;`.
  Continue,
  /// `goto target;`.
  Goto { target: ExprH },
  /// A label definition; `id` is reserved by C6 the first time it is visited.
  Label { id: Option<LabelId> },
}

/// One node in the statement arena.
#[derive(Clone, Debug)]
pub struct StmtData {
  pub op: StmtKind,
  pub loc: SourceLoc,
}

/// Handle-indexed storage for every statement, expression and initializer
/// node produced for one translation unit.
#[derive(Default)]
pub struct AstStore {
  stmts: Vec<StmtData>,
  exprs: Vec<ExprData>,
  init_nodes: Vec<InitNode>,
  top_level_stmts: Vec<StmtH>,
  next_label: u32,
}

impl AstStore {
  /// Create an empty store.
  #[must_use] pub fn new() -> Self { Self::default() }

  /// Append a new statement, returning its handle.
  pub fn push_stmt(&mut self, op: StmtKind, loc: SourceLoc) -> StmtH {
    let h = StmtH::from_usize(self.stmts.len());
    self.stmts.push(StmtData { op, loc });
    h
  }

  /// Append a new expression (type/cast-type unset), returning its handle.
  pub fn push_expr(&mut self, op: ExprKind, loc: SourceLoc) -> ExprH {
    let h = ExprH::from_usize(self.exprs.len());
    self.exprs.push(ExprData { op, loc, ty: None, cast_type: None });
    h
  }

  /// Append a flattened initializer subtree (depth-first) built from a
  /// nested in-memory tree, returning the range of its top-level siblings.
  pub fn push_init_tree(&mut self, groups: &[InitTree]) -> InitRange {
    let start = self.init_nodes.len();
    for g in groups { self.push_init_group(g); }
    InitRange { start: u32::try_from(start).expect("arena overflow"), top_count: u32::try_from(groups.len()).expect("arena overflow") }
  }

  fn push_init_group(&mut self, g: &InitTree) {
    match g {
      InitTree::Leaf(e) => self.init_nodes.push(InitNode { kids_count: 0, expr: Some(*e) }),
      InitTree::Group(children) => {
        self.init_nodes.push(InitNode { kids_count: u32::try_from(children.len()).expect("arena overflow"), expr: None });
        for c in children { self.push_init_group(c); }
      }
    }
  }

  /// Borrow a statement.
  #[must_use] pub fn stmt(&self, h: StmtH) -> &StmtData { &self.stmts[h.into_usize()] }
  /// Mutably borrow a statement.
  pub fn stmt_mut(&mut self, h: StmtH) -> &mut StmtData { &mut self.stmts[h.into_usize()] }
  /// Borrow an expression.
  #[must_use] pub fn expr(&self, h: ExprH) -> &ExprData { &self.exprs[h.into_usize()] }
  /// Mutably borrow an expression.
  pub fn expr_mut(&mut self, h: ExprH) -> &mut ExprData { &mut self.exprs[h.into_usize()] }

  /// The flattened initializer node array backing `range`, for tree-walking
  /// consumers (C5's type check, C7's constant-init evaluation).
  #[must_use] pub fn init_nodes(&self, range: InitRange) -> (&[InitNode], usize) {
    (&self.init_nodes[range.start as usize..], range.top_count as usize)
  }

  /// Record `s` as a top-level statement, in source order.
  pub fn push_top_level(&mut self, s: StmtH) { self.top_level_stmts.push(s); }
  /// Every top-level statement, in source order.
  #[must_use] pub fn top_level_stmts(&self) -> &[StmtH] { &self.top_level_stmts }

  /// Reserve a fresh label id (C6, `Label` statement handling).
  pub fn fresh_label(&mut self) -> LabelId {
    let id = LabelId(self.next_label);
    self.next_label += 1;
    id
  }
}

/// An in-memory (non-flattened) initializer tree, used by test/embedding
/// code to build an `Initializer` expression before it's flattened into the
/// arena via [`AstStore::push_init_tree`].
#[derive(Clone, Debug)]
pub enum InitTree {
  /// An expression leaf.
  Leaf(ExprH),
  /// An aggregate group of (possibly nested) children.
  Group(Vec<InitTree>),
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn init_tree_flattens_and_walks_in_preorder() {
    let mut ast = AstStore::new();
    let loc = SourceLoc(0);
    let e0 = ast.push_expr(ExprKind::Int { value: 1, suffix: IntSuffix::None }, loc);
    let e1 = ast.push_expr(ExprKind::Int { value: 2, suffix: IntSuffix::None }, loc);
    let e2 = ast.push_expr(ExprKind::Int { value: 3, suffix: IntSuffix::None }, loc);
    let tree = vec![
      InitTree::Group(vec![InitTree::Leaf(e0), InitTree::Leaf(e1)]),
      InitTree::Leaf(e2),
    ];
    let range = ast.push_init_tree(&tree);
    assert_eq!(range.top_count, 2);
    let (nodes, top_count) = ast.init_nodes(range);
    let mut seen = Vec::new();
    let consumed = walk_init_nodes(nodes, top_count, &mut |e| seen.push(e));
    assert_eq!(consumed, 4); // group header + 2 leaves + 1 top-level leaf
    assert_eq!(seen, vec![e0, e1, e2]);
  }

  #[test]
  fn labels_are_reserved_in_order() {
    let mut ast = AstStore::new();
    let a = ast.fresh_label();
    let b = ast.fresh_label();
    assert_ne!(a, b);
    assert_eq!(a.0 + 1, b.0);
  }
}
