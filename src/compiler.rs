// Expression compiler (§4.9).
//
// Turns a single already-typed `Expr` into a `bytecode::Program`. "Already
// typed" means every node's `cache.ty` has been filled in by the type
// resolver's `typecheck::check_expr` pass before this runs: the compiler
// never infers a type itself, it only reads what was already decided and
// emits casts at the points where two differently-typed values meet (a
// binary operator's operands, a conditional's two arms, a constant's
// declared type against its value's natural type).
//
// A compiled node leaves exactly one value on the stack, of that node's
// own `cache.ty`: a `ct_int` node leaves a raw, unwrapped integer; a
// concretely-typed node leaves a value already wrapped to its width. Casts
// between the two are the caller's responsibility, not this function's.
//
// §4.9's opcode table has no dedicated unary instruction. Each `UnOp` is
// synthesized from the opcodes that do exist: `neg` is `0 - x`, `bitnot`
// is `x xor -1` (two's-complement bit flip, truncated to width by the
// same `cast_int` that would re-wrap any other arithmetic result), and
// `not` is a branch that picks between the two boolean literals — the
// same machinery `Cond` already uses.

use crate::ast::{BinOp, Expr, ExprKind, OpCategory, UnOp};
use crate::bytecode::{pack_cast, tag_index, CmpOp, IntOp, Opcode, Program};
use crate::types::{IntTag, Type, Variant};

#[derive(thiserror::Error, Debug)]
pub enum CompileError {
    #[error("function calls cannot be evaluated in a compile-time constant expression")]
    UnsupportedCall,
    #[error("segmented identifiers cannot be evaluated in a compile-time constant expression")]
    UnsupportedFieldAccess,
    #[error("string literals cannot appear in a compile-time constant expression")]
    UnsupportedString,
    #[error("integer literal `{0}` does not fit in a compile-time constant")]
    IntegerOutOfRange(String),
}

type Result<T> = std::result::Result<T, CompileError>;

fn cached_ty(expr: &Expr) -> Type {
    expr.cache
        .borrow()
        .ty
        .clone()
        .expect("compile_expr called before the expression was type-checked")
        .as_ref()
        .clone()
}

fn int_tag(ty: &Type) -> IntTag {
    match ty {
        Type::Integer(tag) => *tag,
        _ => IntTag::CT_INT,
    }
}

// Append the cast needed to bring a value of type `from` to `to`, if any.
// Only ever asked to widen/pin a `ct_int` to a concrete type or to re-wrap
// a concrete type to itself; two distinct concrete types never meet here
// because the type checker already rejected that combination upstream.
fn cast_if_needed(program: &mut Program, from: &Type, to: &Type) {
    if from.same_as(to) {
        if let Type::Integer(tag) = to {
            if !tag.is_dynamic() {
                // Re-wrap: the value may have just come out of an
                // arithmetic operator that can overflow its own width.
                program.push(Opcode::CastInt(pack_cast(tag, tag)));
            }
        }
        return;
    }
    match to {
        Type::Integer(tag) if !tag.is_dynamic() => {
            program.push(Opcode::CastInt(pack_cast(&int_tag(from), tag)));
        }
        _ => {}
    }
}

pub fn compile_expr(program: &mut Program, expr: &Expr) -> Result<()> {
    match &expr.kind {
        ExprKind::Identifier(_) => {
            let id = expr.cache.borrow().identifier.expect("resolved before compiling");
            program.push(Opcode::LoadId(id));
        }
        ExprKind::Integer { digits, .. } => {
            let value: i128 =
                digits.parse().map_err(|_| CompileError::IntegerOutOfRange(digits.clone()))?;
            program.push(Opcode::LoadData(Variant::Integer(value, IntTag::CT_INT)));
            // §8's documented boundary behavior: an overflowing literal is
            // truncated by this cast at evaluation time, not diagnosed
            // earlier by the type resolver.
            cast_if_needed(program, &Type::ct_int(), &cached_ty(expr));
        }
        ExprKind::Str(_) => return Err(CompileError::UnsupportedString),
        ExprKind::Binary(op, lhs, rhs) => {
            let lhs_ty = cached_ty(lhs);
            let rhs_ty = cached_ty(rhs);
            match op.category() {
                OpCategory::Logical => {
                    compile_expr(program, lhs)?;
                    compile_expr(program, rhs)?;
                    program.push(match op {
                        BinOp::And => Opcode::Land,
                        BinOp::Or => Opcode::Lor,
                        _ => unreachable!("logical category only contains And/Or"),
                    });
                }
                OpCategory::Comparison => {
                    let peer = lhs_ty.peer(&rhs_ty).expect("checked: operands must peer");
                    compile_expr(program, lhs)?;
                    cast_if_needed(program, &lhs_ty, &peer);
                    compile_expr(program, rhs)?;
                    cast_if_needed(program, &rhs_ty, &peer);
                    let cmp = CmpOp::from_bin_op(*op).expect("comparison category maps to a CmpOp");
                    program.push(Opcode::IntCompare(cmp, tag_index(&int_tag(&peer))));
                }
                OpCategory::Arithmetic => {
                    let peer = lhs_ty.peer(&rhs_ty).expect("checked: operands must peer");
                    compile_expr(program, lhs)?;
                    cast_if_needed(program, &lhs_ty, &peer);
                    compile_expr(program, rhs)?;
                    cast_if_needed(program, &rhs_ty, &peer);
                    let peer_tag = int_tag(&peer);
                    let int_op = IntOp::from_bin_op(*op).expect("arithmetic category maps to an IntOp");
                    program.push(Opcode::IntBinary(int_op, tag_index(&peer_tag)));
                }
            }
        }
        ExprKind::Unary(op, operand) => {
            let ty = cached_ty(operand);
            match op {
                UnOp::Plus => compile_expr(program, operand)?,
                UnOp::Neg => {
                    let tag = int_tag(&ty);
                    let idx = tag_index(&tag);
                    program.push(Opcode::LoadData(Variant::Integer(0, tag)));
                    compile_expr(program, operand)?;
                    program.push(Opcode::IntBinary(IntOp::Sub, idx));
                }
                UnOp::BitNot => {
                    let tag = int_tag(&ty);
                    let idx = tag_index(&tag);
                    compile_expr(program, operand)?;
                    program.push(Opcode::LoadData(Variant::Integer(-1, tag)));
                    program.push(Opcode::IntBinary(IntOp::BXor, idx));
                }
                UnOp::Not => {
                    compile_expr(program, operand)?;
                    let else_jump = program.push(Opcode::BranchFalse { target: 0 });
                    program.push(Opcode::LoadData(Variant::Boolean(false)));
                    let end_jump = program.push(Opcode::Branch { target: 0 });
                    let else_start = program.len();
                    program.patch_target(else_jump, else_start);
                    program.push(Opcode::LoadData(Variant::Boolean(true)));
                    let end = program.len();
                    program.patch_target(end_jump, end);
                }
            }
        }
        ExprKind::Group(inner) => compile_expr(program, inner)?,
        ExprKind::Cond(test, then_branch, else_branch) => {
            compile_expr(program, test)?;
            let else_jump = program.push(Opcode::BranchFalse { target: 0 });
            compile_expr(program, then_branch)?;
            cast_if_needed(program, &cached_ty(then_branch), &cached_ty(expr));
            let end_jump = program.push(Opcode::Branch { target: 0 });
            let else_start = program.len();
            program.patch_target(else_jump, else_start);
            compile_expr(program, else_branch)?;
            cast_if_needed(program, &cached_ty(else_branch), &cached_ty(expr));
            let end = program.len();
            program.patch_target(end_jump, end);
        }
        ExprKind::Call(..) => return Err(CompileError::UnsupportedCall),
        ExprKind::FieldAccess(..) => return Err(CompileError::UnsupportedFieldAccess),
    }
    Ok(())
}

// Compile `expr` (already type-checked) and, if `target` differs from its
// own natural type, append the cast that pins it there. Used when a
// constant's declared type widens or narrows the type its value
// expression would otherwise have on its own.
pub fn compile_for_target(program: &mut Program, expr: &Expr, target: &Type) -> Result<()> {
    compile_expr(program, expr)?;
    let natural = cached_ty(expr);
    cast_if_needed(program, &natural, target);
    Ok(())
}
