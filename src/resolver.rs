// Identifier resolution (§4.6).
//
// Two passes per scope: "scout" allocates an `IdentifierId` for every
// name a scope declares before any of that scope's expressions are
// looked at, so declaration order within a scope never matters —
// `const b = a + 1; const a = 1;` resolves `a` even though it's used
// before its own declaration. "Resolve" then walks every expression,
// binding each identifier usage to the id its name is visible as in
// the current scope chain.
//
// Segmented identifiers (`a/b`, parsed as `FieldAccess`) are
// recognized but intentionally left unresolved: the language does not
// yet define what a segment means to resolve against, so the resolver
// reports the construct as not implemented rather than guessing.

use std::rc::Rc;

use crate::ast::{Expr, ExprKind, File, Statement, StatementKind};
use crate::diagnostics::Diagnostics;
use crate::ids::{IdentifierStorage, Scope};

pub struct IdentifierResolver<'a> {
    storage: &'a mut IdentifierStorage,
    diagnostics: &'a mut Diagnostics,
}

impl<'a> IdentifierResolver<'a> {
    pub fn new(storage: &'a mut IdentifierStorage, diagnostics: &'a mut Diagnostics) -> IdentifierResolver<'a> {
        IdentifierResolver { storage, diagnostics }
    }

    // Returns whether resolution succeeded (no errors recorded in either
    // pass). After scouting, if any errors were recorded, the resolve
    // pass does not run: a scope with a broken declaration has no
    // reliable bindings to resolve usages against (§4.6).
    pub fn resolve_file(&mut self, file: &File) -> bool {
        log::debug!("identifier resolution: scout pass over {} top-level statements", file.statements.len());
        let root = Scope::root(self.storage);
        let global = Scope::chain(&root);
        let errors_before = self.diagnostics.error_count();
        self.scout(&file.statements, &global);
        if self.diagnostics.error_count() != errors_before {
            log::debug!("identifier resolution: scout pass found errors, skipping resolve pass");
            return false;
        }
        log::debug!("identifier resolution: resolve pass");
        self.resolve_statements(&file.statements, &global);
        let ok = self.diagnostics.error_count() == errors_before;
        log::debug!("identifier resolution finished, ok={}", ok);
        ok
    }

    // Allocate an id for every constant and function declared directly
    // in `stmts`, binding it in `scope`. Does not descend into a
    // function's own body or parameters — those belong to the
    // function's own inner scope and are scouted when that scope is
    // entered.
    fn scout(&mut self, stmts: &[Rc<Statement>], scope: &Rc<Scope>) {
        for stmt in stmts {
            let (name, name_span, slot): (&str, _, _) = match &stmt.kind {
                StatementKind::Constant(c) => (&c.name, c.name_span, &c.identifier),
                StatementKind::Function(f) => (&f.name, f.name_span, &f.identifier),
                StatementKind::Return(_) => continue,
            };
            let id = self.storage.alloc(name, name_span);
            *slot.borrow_mut() = Some(id);
            if let Some(previous) = scope.define(name, id) {
                self.diagnostics.push_error(name_span, format!("Declaration of '{}' overshadows a previous declaration.", name));
                if let Some(prev_span) = self.storage.get(previous).span {
                    self.diagnostics.push_note(prev_span, "previous declaration is here");
                }
            }
        }
    }

    fn resolve_statements(&mut self, stmts: &[Rc<Statement>], scope: &Rc<Scope>) {
        for stmt in stmts {
            self.resolve_statement(stmt, scope);
        }
    }

    fn resolve_statement(&mut self, stmt: &Statement, scope: &Rc<Scope>) {
        match &stmt.kind {
            StatementKind::Constant(c) => {
                let id = c.identifier.borrow().expect("scouted before resolve");
                self.storage.get(id).is_being_defined.set(true);
                if let Some(t) = &c.type_expr {
                    self.resolve_expr(t, scope);
                }
                self.resolve_expr(&c.value, scope);
                self.storage.get(id).is_being_defined.set(false);
            }
            StatementKind::Function(f) => {
                log::trace!("pushing function scope for '{}'", f.name);
                let fn_scope = Scope::chain(scope);
                for arg in &f.args {
                    self.resolve_expr(&arg.type_expr, &fn_scope);
                    let id = self.storage.alloc(&arg.name, arg.span);
                    *arg.identifier.borrow_mut() = Some(id);
                    if let Some(previous) = fn_scope.define(&arg.name, id) {
                        self.diagnostics.push_error(arg.span, format!("Declaration of '{}' overshadows a previous declaration.", arg.name));
                        if let Some(prev_span) = self.storage.get(previous).span {
                            self.diagnostics.push_note(prev_span, "previous declaration is here");
                        }
                    }
                }
                if let Some(t) = &f.return_type {
                    self.resolve_expr(t, &fn_scope);
                }
                self.scout(&f.body, &fn_scope);
                self.resolve_statements(&f.body, &fn_scope);
            }
            StatementKind::Return(Some(e)) => self.resolve_expr(e, scope),
            StatementKind::Return(None) => {}
        }
    }

    fn resolve_expr(&mut self, expr: &Expr, scope: &Rc<Scope>) {
        match &expr.kind {
            ExprKind::Identifier(name) => {
                match scope.lookup(name) {
                    None => {
                        self.diagnostics.push_error(expr.span, format!("Usage of undeclared identifier '{}'.", name));
                    }
                    Some(id) => {
                        let entry = self.storage.get(id);
                        if entry.is_being_defined.get() {
                            self.diagnostics.push_error(expr.span, format!("Invalid recursive use of '{}'.", name));
                            if let Some(span) = entry.span {
                                self.diagnostics.push_note(span, format!("`{}` is being defined here", name));
                            }
                        } else {
                            log::trace!("bound usage of '{}' to {:?}", name, id);
                            expr.cache.borrow_mut().identifier = Some(id);
                        }
                    }
                }
            }
            ExprKind::Integer { .. } | ExprKind::Str(_) => {}
            ExprKind::Binary(_, lhs, rhs) => {
                self.resolve_expr(lhs, scope);
                self.resolve_expr(rhs, scope);
            }
            ExprKind::Unary(_, operand) => self.resolve_expr(operand, scope),
            ExprKind::Call(callee, args) => {
                self.resolve_expr(callee, scope);
                for arg in args {
                    self.resolve_expr(arg, scope);
                }
            }
            ExprKind::Group(inner) => self.resolve_expr(inner, scope),
            ExprKind::Cond(test, then_branch, else_branch) => {
                self.resolve_expr(test, scope);
                self.resolve_expr(then_branch, scope);
                self.resolve_expr(else_branch, scope);
            }
            ExprKind::FieldAccess(base, _segment) => {
                self.resolve_expr(base, scope);
                self.diagnostics.push_error(expr.span, "segmented identifier resolution is not yet implemented");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;

    fn resolve(src: &str) -> (File, IdentifierStorage, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let file = parser::parse(src.as_bytes(), 0, &mut diagnostics);
        let mut storage = IdentifierStorage::new();
        IdentifierResolver::new(&mut storage, &mut diagnostics).resolve_file(&file);
        (file, storage, diagnostics)
    }

    #[test]
    fn forward_reference_between_top_level_constants_resolves() {
        let (_, _, diagnostics) = resolve("const b = a + 1; const a = 1;");
        assert!(!diagnostics.has_errors());
    }

    #[test]
    fn undeclared_identifier_is_an_error() {
        let (_, _, diagnostics) = resolve("const a = nope;");
        assert!(diagnostics.has_errors());
    }

    #[test]
    fn self_reference_during_definition_is_invalid_recursion() {
        let (_, _, diagnostics) = resolve("const a = a;");
        assert!(diagnostics.has_errors());
    }

    #[test]
    fn redeclaration_in_the_same_scope_overshadows() {
        let (_, _, diagnostics) = resolve("const a = 1; const a = 2;");
        assert!(diagnostics.has_errors());
        assert_eq!(diagnostics.error_count(), 1);
    }

    #[test]
    fn function_body_sees_its_own_parameters() {
        let (_, _, diagnostics) = resolve("proc f(param x: i4) returns i4 is begin return x; end");
        assert!(!diagnostics.has_errors());
    }

    #[test]
    fn recursive_function_can_reference_itself() {
        let (_, _, diagnostics) = resolve("proc recursive f(param x: i4) returns i4 is begin return f x; end");
        assert!(!diagnostics.has_errors());
    }

    #[test]
    fn segmented_identifier_is_reported_not_implemented() {
        let (_, _, diagnostics) = resolve("const a = 1; const b = a/field;");
        assert!(diagnostics.has_errors());
    }
}
