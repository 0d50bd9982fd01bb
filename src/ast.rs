// Abstract syntax tree (§3, §4.5).
//
// Nodes are reference-counted and otherwise immutable; per-node
// analysis results (resolved identifier, type, compile-time value) are
// cached in a `RefCell` alongside the node so the identifier resolver,
// type resolver, and compiler can attach results without threading a
// side table through every pass.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::ids::IdentifierId;
use crate::source::Span;
use crate::types::{Constantness, Type, Variant};

// Abstract over various memory management strategies.
pub type Node<T> = Rc<T>;
pub type Seq<T> = Vec<Node<T>>;
pub type AList<T> = Vec<(String, Node<T>)>;
pub type Map<T> = HashMap<String, Node<T>>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Shl,
    Shr,
    BitAnd,
    BitOr,
    BitXor,
    And,
    Or,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnOp {
    Plus,
    Neg,
    Not,
    BitNot,
}

// How a binary operator types and evaluates its operands: `Logical`
// operators take and produce `bool`; `Comparison` peer-resolves its
// operands (same rule as `Arithmetic`) but always produces `bool`;
// `Arithmetic` peer-resolves its operands and produces a value of the
// peer type, wrapped to that type's width.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OpCategory {
    Arithmetic,
    Comparison,
    Logical,
}

impl BinOp {
    pub fn category(self) -> OpCategory {
        match self {
            BinOp::Add
            | BinOp::Sub
            | BinOp::Mul
            | BinOp::Div
            | BinOp::Mod
            | BinOp::Shl
            | BinOp::Shr
            | BinOp::BitAnd
            | BinOp::BitOr
            | BinOp::BitXor => OpCategory::Arithmetic,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => OpCategory::Comparison,
            BinOp::And | BinOp::Or => OpCategory::Logical,
        }
    }
}

// Results an expression's evaluation caches once known. `identifier`
// is only set on `Expression::Identifier` nodes; the others apply to
// every expression node.
#[derive(Default)]
pub struct ExprCache {
    pub identifier: Option<IdentifierId>,
    pub ty: Option<Node<Type>>,
    pub constantness: Option<Constantness>,
    pub value: Option<Variant>,
}

pub struct Expr {
    pub span: Span,
    pub kind: ExprKind,
    pub cache: RefCell<ExprCache>,
}

impl Expr {
    pub fn new(span: Span, kind: ExprKind) -> Node<Expr> {
        Rc::new(Expr { span, kind, cache: RefCell::new(ExprCache::default()) })
    }
}

pub enum ExprKind {
    Identifier(String),
    Integer { digits: String, type_flag: Option<String> },
    Str(String),
    Binary(BinOp, Node<Expr>, Node<Expr>),
    Unary(UnOp, Node<Expr>),
    Call(Node<Expr>, Seq<Expr>),
    Group(Node<Expr>),
    FieldAccess(Node<Expr>, String),
    // `test then a else b`. The only conditional form in the
    // language: there is no bare `if` without an `else`.
    Cond(Node<Expr>, Node<Expr>, Node<Expr>),
}

pub struct Argument {
    pub name: String,
    pub type_expr: Node<Expr>,
    pub span: Span,
    // Parameters default to immutable; `mut` opts a parameter into
    // being reassignable within the function body.
    pub mutable: bool,
    pub identifier: RefCell<Option<IdentifierId>>,
}

// Metadata recorded on a function for the benefit of a hypothetical
// future backend; code generation itself is out of scope.
#[derive(Default, Clone, Copy)]
pub struct FunctionMeta {
    pub recursive: bool,
    pub entry_point: bool,
}

pub struct Function {
    pub name: String,
    pub name_span: Span,
    pub args: Seq<Argument>,
    pub return_type: Option<Node<Expr>>,
    pub body: Seq<Statement>,
    pub meta: FunctionMeta,
    pub identifier: RefCell<Option<IdentifierId>>,
    // The concrete type `return_type` evaluates to, if there is a
    // `return_type` at all. Filled in by the type resolver.
    pub resolved_return_type: RefCell<Option<Type>>,
}

pub struct Constant {
    pub name: String,
    pub name_span: Span,
    pub type_expr: Option<Node<Expr>>,
    pub value: Node<Expr>,
    pub identifier: RefCell<Option<IdentifierId>>,
}

// A statement-level flag such as `@print`, written directly before the
// statement it annotates.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StatementFlag {
    Print,
}

pub enum StatementKind {
    Constant(Constant),
    Function(Function),
    Return(Option<Node<Expr>>),
}

pub struct Statement {
    pub span: Span,
    pub kind: StatementKind,
    // Consecutive leading `///` lines, joined by `\n`, or `None` if the
    // statement has no documentation comment.
    pub doc: Option<String>,
    pub flags: Vec<StatementFlag>,
}

pub struct File {
    pub statements: Seq<Statement>,
}
