// Type resolution (§4.7, §4.9).
//
// Resolves the type (and, for constants, the folded compile-time value) of
// every constant declaration and every parameter/return type annotation in
// a file. This is deliberately narrower than a full semantic pass: a
// function's own body expressions are never type-checked beyond whatever
// nested `const`/`proc` declarations they contain, since there is no
// bytecode codegen for a function body and so nothing to check it
// against. Only expressions a constant's value or a type annotation can
// contain are ever compiled and run.
//
// Declarations can reference each other in any order and across scopes
// (a nested constant can use an enclosing function's parameter, a
// top-level constant can be defined after its first use), so resolution
// runs as a fixed-point loop: collect every unresolved declaration once,
// then repeatedly sweep the list, resolving whatever now has enough of
// its dependencies in place, until nothing is left or nothing more can be
// made progress on. A sweep that resolves zero items while items remain
// means the remaining items form a dependency cycle (or depend on
// something that itself failed outright) — that's reported as a normal
// diagnostic, not a panic. A sweep whose unresolved count goes *up*,
// on the other hand, would mean this resolver is unsound; that is an
// internal-invariant violation and panics.

use std::rc::Rc;

use crate::ast::{Constant, Expr, ExprKind, Function, Statement, StatementKind};
use crate::bytecode::Program;
use crate::compiler;
use crate::diagnostics::Diagnostics;
use crate::ids::{EntryData, IdentifierStorage};
use crate::types::{Constantness, Type, Variant};
use crate::vm::Vm;

enum Status {
    Ready,
    Suspend,
}

// Type-check `expr` bottom-up, caching `ty`/`constantness` on every node
// it successfully types. Returns `Suspend` if it's blocked on an
// identifier whose own type hasn't been resolved yet (try again on a
// later sweep); returns `Err(())` once a real type error has been found
// and diagnosed (or propagated silently from a child that already
// diagnosed one).
fn check_expr(expr: &Expr, storage: &IdentifierStorage, diagnostics: &mut Diagnostics) -> Result<Status, ()> {
    match &expr.kind {
        ExprKind::Identifier(_) => {
            let id = match expr.cache.borrow().identifier {
                Some(id) => id,
                None => return Err(()), // already diagnosed by the identifier resolver
            };
            let entry = storage.get(id);
            if entry.resolution_failed.get() {
                return Err(());
            }
            let (constantness, ty) = match &*entry.data.borrow() {
                EntryData::None => return Ok(Status::Suspend),
                EntryData::Expression { constantness, ty } => (*constantness, ty.clone()),
            };
            expr.cache.borrow_mut().ty = Some(Rc::new(ty));
            expr.cache.borrow_mut().constantness = Some(constantness);
            Ok(Status::Ready)
        }
        ExprKind::Integer { digits, type_flag } => {
            if digits.parse::<i128>().is_err() {
                diagnostics.push_error(expr.span, format!("integer literal `{}` is out of range", digits));
                return Err(());
            }
            // The literal-flag lexicon (§6) spells the untyped case `ct`,
            // distinct from `IntTag::from_name`'s `ct_int` (the name of
            // the type itself, as it appears in a type annotation).
            let ty = match type_flag.as_deref() {
                None | Some("ct") => Type::ct_int(),
                Some(flag) => match crate::types::IntTag::from_name(flag) {
                    Some(tag) => Type::Integer(tag),
                    None => {
                        diagnostics.push_error(expr.span, format!("`{}` is not a known integer type", flag));
                        return Err(());
                    }
                },
            };
            expr.cache.borrow_mut().ty = Some(Rc::new(ty));
            expr.cache.borrow_mut().constantness = Some(Constantness::Constant);
            Ok(Status::Ready)
        }
        ExprKind::Str(_) => {
            diagnostics.push_error(expr.span, "string literals cannot appear in a compile-time constant expression");
            Err(())
        }
        ExprKind::Binary(op, lhs, rhs) => {
            let l = check_expr(lhs, storage, diagnostics);
            let r = check_expr(rhs, storage, diagnostics);
            match (l, r) {
                (Err(()), _) | (_, Err(())) => Err(()),
                (Ok(Status::Suspend), _) | (_, Ok(Status::Suspend)) => Ok(Status::Suspend),
                (Ok(Status::Ready), Ok(Status::Ready)) => {
                    use crate::ast::OpCategory;
                    let lt = lhs.cache.borrow().ty.clone().unwrap();
                    let rt = rhs.cache.borrow().ty.clone().unwrap();
                    let constantness = lhs.cache.borrow().constantness.unwrap().mix(rhs.cache.borrow().constantness.unwrap());
                    let ty = match op.category() {
                        OpCategory::Logical => {
                            if !matches!(*lt, Type::Boolean) || !matches!(*rt, Type::Boolean) {
                                diagnostics.push_error(expr.span, "`and`/`or` require boolean operands");
                                return Err(());
                            }
                            Type::Boolean
                        }
                        OpCategory::Comparison => {
                            if lt.peer(&rt).is_none() {
                                diagnostics.push_error(
                                    expr.span,
                                    format!("cannot compare `{}` with `{}`", lt, rt),
                                );
                                return Err(());
                            }
                            Type::Boolean
                        }
                        OpCategory::Arithmetic => match lt.peer(&rt) {
                            Some(peer) => {
                                log::trace!("peer resolution: {} and {} -> {}", lt, rt, peer);
                                peer
                            }
                            None => {
                                diagnostics.push_error(
                                    expr.span,
                                    format!("mismatched operand types `{}` and `{}`", lt, rt),
                                );
                                return Err(());
                            }
                        },
                    };
                    expr.cache.borrow_mut().ty = Some(Rc::new(ty));
                    expr.cache.borrow_mut().constantness = Some(constantness);
                    Ok(Status::Ready)
                }
            }
        }
        ExprKind::Unary(op, operand) => {
            use crate::ast::UnOp;
            match check_expr(operand, storage, diagnostics)? {
                Status::Suspend => Ok(Status::Suspend),
                Status::Ready => {
                    let operand_ty = operand.cache.borrow().ty.clone().unwrap();
                    let ty = match op {
                        UnOp::Not => {
                            if !matches!(*operand_ty, Type::Boolean) {
                                diagnostics.push_error(expr.span, "`not` requires a boolean operand");
                                return Err(());
                            }
                            Type::Boolean
                        }
                        UnOp::Plus | UnOp::Neg | UnOp::BitNot => {
                            if !matches!(*operand_ty, Type::Integer(_)) {
                                diagnostics.push_error(expr.span, "expected an integer operand");
                                return Err(());
                            }
                            (*operand_ty).clone()
                        }
                    };
                    expr.cache.borrow_mut().ty = Some(Rc::new(ty));
                    expr.cache.borrow_mut().constantness = operand.cache.borrow().constantness;
                    Ok(Status::Ready)
                }
            }
        }
        ExprKind::Group(inner) => match check_expr(inner, storage, diagnostics)? {
            Status::Suspend => Ok(Status::Suspend),
            Status::Ready => {
                expr.cache.borrow_mut().ty = inner.cache.borrow().ty.clone();
                expr.cache.borrow_mut().constantness = inner.cache.borrow().constantness;
                Ok(Status::Ready)
            }
        },
        ExprKind::Cond(test, then_branch, else_branch) => {
            let t = check_expr(test, storage, diagnostics);
            let a = check_expr(then_branch, storage, diagnostics);
            let b = check_expr(else_branch, storage, diagnostics);
            match (t, a, b) {
                (Err(()), _, _) | (_, Err(()), _) | (_, _, Err(())) => Err(()),
                (Ok(Status::Suspend), _, _) | (_, Ok(Status::Suspend), _) | (_, _, Ok(Status::Suspend)) => {
                    Ok(Status::Suspend)
                }
                (Ok(Status::Ready), Ok(Status::Ready), Ok(Status::Ready)) => {
                    let test_ty = test.cache.borrow().ty.clone().unwrap();
                    if !matches!(*test_ty, Type::Boolean) {
                        diagnostics.push_error(test.span, "the condition of `then`/`else` must be boolean");
                        return Err(());
                    }
                    let at = then_branch.cache.borrow().ty.clone().unwrap();
                    let bt = else_branch.cache.borrow().ty.clone().unwrap();
                    let ty = match at.peer(&bt) {
                        Some(ty) => ty,
                        None => {
                            diagnostics.push_error(expr.span, format!("`then`/`else` arms have mismatched types `{}` and `{}`", at, bt));
                            return Err(());
                        }
                    };
                    let constantness = test.cache.borrow().constantness.unwrap()
                        .mix(then_branch.cache.borrow().constantness.unwrap())
                        .mix(else_branch.cache.borrow().constantness.unwrap());
                    expr.cache.borrow_mut().ty = Some(Rc::new(ty));
                    expr.cache.borrow_mut().constantness = Some(constantness);
                    Ok(Status::Ready)
                }
            }
        }
        ExprKind::Call(..) => {
            diagnostics.push_error(expr.span, "function calls are not supported in compile-time constant expressions");
            Err(())
        }
        ExprKind::FieldAccess(..) => Err(()), // already diagnosed by the identifier resolver
    }
}

// Compile and run `expr`, which must already be fully type-checked
// (`Status::Ready`). Folds to `target` if given, otherwise to the
// expression's own natural type. Diagnoses a `CompileError` or `VmError`
// at `expr`'s span and returns `None` on failure.
fn fold(expr: &Expr, target: Option<&Type>, storage: &IdentifierStorage, diagnostics: &mut Diagnostics) -> Option<Variant> {
    log::debug!("compiling constant expression at {} (target={:?})", expr.span.start, target.map(|t| t.to_string()));
    let mut program = Program::default();
    let compiled = match target {
        Some(t) => compiler::compile_for_target(&mut program, expr, t),
        None => compiler::compile_expr(&mut program, expr),
    };
    if let Err(e) = compiled {
        diagnostics.push_error(expr.span, e.to_string());
        return None;
    }
    program.push(crate::bytecode::Opcode::Ret);
    match Vm::new(&program, storage).run() {
        Ok(v) => {
            expr.cache.borrow_mut().value = Some(v.clone());
            Some(v)
        }
        Err(e) => {
            diagnostics.push_error(expr.span, format!("could not evaluate constant expression: {}", e));
            None
        }
    }
}

// One declaration (or annotation) the fixed-point loop still needs to
// make progress on.
enum PendingItem {
    Constant(Rc<Statement>),
    Param(Rc<crate::ast::Argument>),
    ReturnType(Rc<Statement>),
}

fn collect_pending(stmts: &[Rc<Statement>], items: &mut Vec<PendingItem>) {
    for stmt in stmts {
        match &stmt.kind {
            StatementKind::Constant(_) => items.push(PendingItem::Constant(stmt.clone())),
            StatementKind::Function(f) => {
                for arg in &f.args {
                    items.push(PendingItem::Param(arg.clone()));
                }
                if f.return_type.is_some() {
                    items.push(PendingItem::ReturnType(stmt.clone()));
                }
                collect_pending(&f.body, items);
            }
            StatementKind::Return(_) => {}
        }
    }
}

pub struct TypeResolver<'a> {
    storage: &'a mut IdentifierStorage,
    diagnostics: &'a mut Diagnostics,
}

impl<'a> TypeResolver<'a> {
    pub fn new(storage: &'a mut IdentifierStorage, diagnostics: &'a mut Diagnostics) -> TypeResolver<'a> {
        TypeResolver { storage, diagnostics }
    }

    pub fn resolve_file(&mut self, file: &crate::ast::File) {
        let mut items = Vec::new();
        collect_pending(&file.statements, &mut items);
        let mut done = vec![false; items.len()];
        let mut unresolved = items.len();
        log::debug!("type resolution: {} declarations pending", unresolved);

        let mut pass = 0;
        loop {
            if unresolved == 0 {
                log::debug!("type resolution converged after {} passes", pass);
                return;
            }
            pass += 1;
            let before = unresolved;
            for (i, item) in items.iter().enumerate() {
                if done[i] {
                    continue;
                }
                if self.attempt(item) {
                    done[i] = true;
                    unresolved -= 1;
                }
            }
            log::debug!("type resolution pass {}: {} -> {} unresolved", pass, before, unresolved);
            if unresolved == before {
                // No progress this sweep: whatever's left is either a
                // dependency cycle or depends on something that will
                // never resolve. Diagnose and stop.
                for (i, item) in items.iter().enumerate() {
                    if !done[i] {
                        self.diagnostics.push_error(item_span(item), "could not resolve type: unresolved or cyclic dependency");
                        self.mark_item_failed(item);
                    }
                }
                return;
            }
            if unresolved > before {
                panic!("internal error: type resolver's unresolved count increased between sweeps");
            }
        }
    }

    fn mark_item_failed(&mut self, item: &PendingItem) {
        match item {
            PendingItem::Constant(stmt) => {
                if let StatementKind::Constant(c) = &stmt.kind {
                    let id = c.identifier.borrow().expect("scouted");
                    self.storage.get(id).resolution_failed.set(true);
                }
            }
            PendingItem::Param(arg) => {
                let id = arg.identifier.borrow().expect("scouted");
                self.storage.get(id).resolution_failed.set(true);
            }
            PendingItem::ReturnType(_) => {}
        }
    }

    // Attempt to resolve one item. Returns `true` if the item is done
    // (whether it succeeded or hit a terminal error), `false` if it's
    // still blocked on something that hasn't resolved yet.
    fn attempt(&mut self, item: &PendingItem) -> bool {
        match item {
            PendingItem::Constant(stmt) => self.attempt_constant(stmt),
            PendingItem::Param(arg) => self.attempt_param(arg),
            PendingItem::ReturnType(stmt) => self.attempt_return_type(stmt),
        }
    }

    fn attempt_constant(&mut self, stmt: &Rc<Statement>) -> bool {
        let c: &Constant = match &stmt.kind {
            StatementKind::Constant(c) => c,
            _ => unreachable!(),
        };
        let id = c.identifier.borrow().expect("scouted before type resolution");

        let hint = match &c.type_expr {
            Some(type_expr) => match self.resolve_type_annotation(type_expr) {
                Outcome::Suspend => return false,
                Outcome::Failed => {
                    self.storage.get(id).resolution_failed.set(true);
                    return true;
                }
                Outcome::Ready(ty) => Some(ty),
            },
            None => None,
        };

        match check_expr(&c.value, self.storage, self.diagnostics) {
            Err(()) => {
                self.storage.get(id).resolution_failed.set(true);
                true
            }
            Ok(Status::Suspend) => false,
            Ok(Status::Ready) => {
                let value_ty = c.value.cache.borrow().ty.clone().unwrap();
                let value_constantness = c.value.cache.borrow().constantness.unwrap();
                let final_ty = match &hint {
                    Some(h) if value_ty.coerces_to(h) => h.clone(),
                    Some(h) => {
                        self.diagnostics.push_error(
                            c.value.span,
                            format!("'{}' cannot be coerced to '{}'", value_ty, h),
                        );
                        self.storage.get(id).resolution_failed.set(true);
                        return true;
                    }
                    None => (*value_ty).clone(),
                };
                if value_constantness != Constantness::Constant {
                    self.diagnostics.push_error(
                        c.value.span,
                        "a constant's value must be a compile-time constant expression",
                    );
                    self.storage.get(id).resolution_failed.set(true);
                    return true;
                }
                match fold(&c.value, Some(&final_ty), self.storage, self.diagnostics) {
                    Some(v) => {
                        *self.storage.get(id).data.borrow_mut() =
                            EntryData::Expression { constantness: Constantness::Constant, ty: final_ty };
                        *self.storage.get(id).value.borrow_mut() = Some(v);
                        true
                    }
                    None => {
                        self.storage.get(id).resolution_failed.set(true);
                        true
                    }
                }
            }
        }
    }

    fn attempt_param(&mut self, arg: &Rc<crate::ast::Argument>) -> bool {
        let id = arg.identifier.borrow().expect("scouted before type resolution");
        match self.resolve_type_annotation(&arg.type_expr) {
            Outcome::Suspend => false,
            Outcome::Failed => {
                self.storage.get(id).resolution_failed.set(true);
                true
            }
            Outcome::Ready(ty) => {
                // A parameter's value is only known at call time: any
                // expression that uses it is poisoned to `NotConstant`.
                *self.storage.get(id).data.borrow_mut() =
                    EntryData::Expression { constantness: Constantness::NotConstant, ty };
                true
            }
        }
    }

    fn attempt_return_type(&mut self, stmt: &Rc<Statement>) -> bool {
        let f: &Function = match &stmt.kind {
            StatementKind::Function(f) => f,
            _ => unreachable!(),
        };
        let return_type = f.return_type.as_ref().expect("only queued when present");
        match self.resolve_type_annotation(return_type) {
            Outcome::Suspend => false,
            Outcome::Failed => true,
            Outcome::Ready(ty) => {
                *f.resolved_return_type.borrow_mut() = Some(ty);
                true
            }
        }
    }

    // A type annotation (a parameter's, a return type's, or a constant's)
    // is itself an expression that must type-check to `type` and fold to
    // a `Variant::Type`.
    fn resolve_type_annotation(&mut self, type_expr: &Expr) -> Outcome {
        match check_expr(type_expr, self.storage, self.diagnostics) {
            Err(()) => Outcome::Failed,
            Ok(Status::Suspend) => Outcome::Suspend,
            Ok(Status::Ready) => {
                let ty = type_expr.cache.borrow().ty.clone().unwrap();
                if !matches!(*ty, Type::TypeOfTypes) {
                    self.diagnostics.push_error(type_expr.span, format!("expected a type, found a value of type `{}`", ty));
                    return Outcome::Failed;
                }
                match fold(type_expr, None, self.storage, self.diagnostics) {
                    Some(Variant::Type(t)) => Outcome::Ready((*t).clone()),
                    Some(_) => {
                        self.diagnostics.push_error(type_expr.span, "type annotation did not evaluate to a type");
                        Outcome::Failed
                    }
                    None => Outcome::Failed,
                }
            }
        }
    }
}

enum Outcome {
    Ready(Type),
    Suspend,
    Failed,
}

fn item_span(item: &PendingItem) -> crate::source::Span {
    match item {
        PendingItem::Constant(stmt) => stmt.span,
        PendingItem::Param(arg) => arg.span,
        PendingItem::ReturnType(stmt) => stmt.span,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::IdentifierStorage;
    use crate::resolver::IdentifierResolver;

    fn run(src: &str) -> (crate::ast::File, IdentifierStorage, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let file = crate::parser::parse(src.as_bytes(), 0, &mut diagnostics);
        let mut storage = IdentifierStorage::new();
        IdentifierResolver::new(&mut storage, &mut diagnostics).resolve_file(&file);
        TypeResolver::new(&mut storage, &mut diagnostics).resolve_file(&file);
        (file, storage, diagnostics)
    }

    fn const_value(file: &crate::ast::File, storage: &IdentifierStorage, name: &str) -> Variant {
        for stmt in &file.statements {
            if let StatementKind::Constant(c) = &stmt.kind {
                if c.name == name {
                    let id = c.identifier.borrow().unwrap();
                    return storage.get(id).value.borrow().clone().unwrap();
                }
            }
        }
        panic!("no such constant {}", name);
    }

    #[test]
    fn folds_builtin_arithmetic() {
        let (file, storage, diagnostics) = run("const a = 2 + 3 * 4;");
        assert!(!diagnostics.has_errors());
        assert_eq!(const_value(&file, &storage, "a"), Variant::Integer(14, crate::types::IntTag::CT_INT));
    }

    #[test]
    fn peer_resolution_pins_ct_int_to_a_concrete_type() {
        let (file, storage, diagnostics) = run("const a : i1 = 100 + 100;");
        assert!(!diagnostics.has_errors());
        let i1 = crate::types::IntTag::from_name("i1").unwrap();
        assert_eq!(const_value(&file, &storage, "a"), Variant::Integer(-56, i1));
    }

    #[test]
    fn forward_reference_resolves_through_the_fixed_point_loop() {
        let (file, storage, diagnostics) = run("const b = a + 1; const a = 41;");
        assert!(!diagnostics.has_errors());
        assert_eq!(const_value(&file, &storage, "b"), Variant::Integer(42, crate::types::IntTag::CT_INT));
    }

    #[test]
    fn mismatched_operand_types_is_an_error() {
        let (_, _, diagnostics) = run("const a : i4 = 1; const b : u4 = 1; const c = a + b;");
        assert!(diagnostics.has_errors());
    }

    #[test]
    fn call_in_a_constant_expression_is_rejected() {
        let (_, _, diagnostics) = run("proc f(param x: i4) returns i4 is begin return x; end const a = f 1;");
        assert!(diagnostics.has_errors());
    }

    #[test]
    fn function_parameter_type_is_resolved() {
        let (file, storage, diagnostics) = run("proc f(param x: i4) returns i4 is begin return x; end");
        assert!(!diagnostics.has_errors());
        let stmt = &file.statements[0];
        if let StatementKind::Function(f) = &stmt.kind {
            assert_eq!(*f.resolved_return_type.borrow(), Some(Type::Integer(crate::types::IntTag::from_name("i4").unwrap())));
            let id = f.args[0].identifier.borrow().unwrap();
            match &*storage.get(id).data.borrow() {
                EntryData::Expression { constantness, .. } => assert_eq!(*constantness, Constantness::NotConstant),
                EntryData::None => panic!("parameter type was never resolved"),
            }
        } else {
            panic!("expected a function");
        }
    }

    #[test]
    fn division_by_zero_in_a_constant_is_diagnosed_not_panicked() {
        let (_, _, diagnostics) = run("const a = 1 / 0;");
        assert!(diagnostics.has_errors());
    }
}
