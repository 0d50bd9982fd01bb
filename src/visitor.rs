// AST traversal (§4.5).
//
// A `Visitor` gets an enter/exit pair around each composite node and a
// single callback for each leaf. The identifier resolver, type
// resolver, and pretty-printer are all single implementations of this
// trait rather than each hand-rolling their own walk.
//
// `enter_function_scope` fires once the function's own identifier has
// been visited but before its parameters or body are — the natural
// point for a caller to push a new lexical scope that the parameters
// and body should resolve names against.

use crate::ast::{Argument, Constant, Expr, ExprKind, File, Function, Statement, StatementKind};
use crate::ids::IdentifierId;

#[allow(unused_variables)]
pub trait Visitor {
    fn enter_file(&mut self, file: &File) {}
    fn exit_file(&mut self, file: &File) {}

    fn enter_statement(&mut self, stmt: &Statement) {}
    fn exit_statement(&mut self, stmt: &Statement) {}

    fn enter_constant(&mut self, c: &Constant) {}
    fn exit_constant(&mut self, c: &Constant) {}

    fn enter_function(&mut self, f: &Function) {}
    fn enter_function_scope(&mut self, f: &Function) {}
    fn exit_function(&mut self, f: &Function) {}

    fn enter_argument(&mut self, a: &Argument) {}
    fn exit_argument(&mut self, a: &Argument) {}

    fn enter_expr(&mut self, e: &Expr) {}
    fn exit_expr(&mut self, e: &Expr) {}

    fn visit_identifier_definition(&mut self, name: &str, id: IdentifierId) {}
    fn visit_identifier_usage(&mut self, e: &Expr, name: &str) {}
    fn visit_integer(&mut self, e: &Expr, digits: &str, type_flag: Option<&str>) {}
    fn visit_string(&mut self, e: &Expr, text: &str) {}
}

pub fn walk_file(v: &mut impl Visitor, file: &File) {
    v.enter_file(file);
    for stmt in &file.statements {
        walk_statement(v, stmt);
    }
    v.exit_file(file);
}

pub fn walk_statement(v: &mut impl Visitor, stmt: &Statement) {
    v.enter_statement(stmt);
    match &stmt.kind {
        StatementKind::Constant(c) => {
            v.enter_constant(c);
            walk_expr(v, &c.value);
            if let Some(t) = &c.type_expr {
                walk_expr(v, t);
            }
            v.exit_constant(c);
        }
        StatementKind::Function(f) => {
            v.enter_function(f);
            v.enter_function_scope(f);
            for arg in &f.args {
                v.enter_argument(arg);
                walk_expr(v, &arg.type_expr);
                v.exit_argument(arg);
            }
            if let Some(t) = &f.return_type {
                walk_expr(v, t);
            }
            for body_stmt in &f.body {
                walk_statement(v, body_stmt);
            }
            v.exit_function(f);
        }
        StatementKind::Return(Some(e)) => walk_expr(v, e),
        StatementKind::Return(None) => {}
    }
    v.exit_statement(stmt);
}

pub fn walk_expr(v: &mut impl Visitor, e: &Expr) {
    v.enter_expr(e);
    match &e.kind {
        ExprKind::Identifier(name) => v.visit_identifier_usage(e, name),
        ExprKind::Integer { digits, type_flag } => {
            v.visit_integer(e, digits, type_flag.as_deref())
        }
        ExprKind::Str(s) => v.visit_string(e, s),
        ExprKind::Binary(_, lhs, rhs) => {
            walk_expr(v, lhs);
            walk_expr(v, rhs);
        }
        ExprKind::Unary(_, operand) => walk_expr(v, operand),
        ExprKind::Call(callee, args) => {
            walk_expr(v, callee);
            for arg in args {
                walk_expr(v, arg);
            }
        }
        ExprKind::Group(inner) => walk_expr(v, inner),
        ExprKind::FieldAccess(base, _) => walk_expr(v, base),
        ExprKind::Cond(test, then_branch, else_branch) => {
            walk_expr(v, test);
            walk_expr(v, then_branch);
            walk_expr(v, else_branch);
        }
    }
    v.exit_expr(e);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{Location, Span};
    use std::rc::Rc;

    fn span() -> Span {
        let loc = Location { file: 0, index: 0, line: 0, column: 0 };
        Span::new(loc, loc)
    }

    struct CountIdentifiers(usize);
    impl Visitor for CountIdentifiers {
        fn visit_identifier_usage(&mut self, _e: &Expr, _name: &str) {
            self.0 += 1;
        }
    }

    #[test]
    fn walks_into_both_binary_operands() {
        let lhs = Expr::new(span(), ExprKind::Identifier("a".into()));
        let rhs = Expr::new(span(), ExprKind::Identifier("b".into()));
        let bin = Expr::new(span(), ExprKind::Binary(crate::ast::BinOp::Add, lhs, rhs));
        let mut counter = CountIdentifiers(0);
        walk_expr(&mut counter, &bin);
        assert_eq!(counter.0, 2);
    }

    #[test]
    fn field_access_visits_base_not_the_field_name() {
        let base = Expr::new(span(), ExprKind::Identifier("a".into()));
        let dot = Expr::new(span(), ExprKind::FieldAccess(base, "b".into()));
        let mut counter = CountIdentifiers(0);
        walk_expr(&mut counter, &dot);
        assert_eq!(counter.0, 1);
        let _ = Rc::strong_count(&dot);
    }
}
