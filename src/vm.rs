// Compile-time bytecode evaluator (§4.9).
//
// `State` is the runnable closure §4.9 describes: an identifier-storage
// reference, a parameter vector, a local vector, an operand stack, the
// instruction vector, and the instruction index (`ip`). It is owned
// exclusively by one `run()` call for one expression and dropped
// afterwards — nothing is shared across evaluations. Execution fetches
// the instruction at `ip`, advances, and dispatches to a handler that
// returns `HandlerResult`; `run()` loops until the handler reports
// `Finished` or `Failed`, exactly mirroring the `{not_finished, finished,
// failed}` tri-state §4.9 specifies.

use std::fmt;

use crate::bytecode::{unpack_cast, CmpOp, IntOp, Opcode, Program};
use crate::ids::{EntryData, IdentifierId, IdentifierStorage};
use crate::types::Variant;

#[derive(thiserror::Error, Debug)]
pub enum VmError {
    #[error("stack underflow")]
    Underflow,
    #[error("expected {expected}, found {found}")]
    TypeMismatch { expected: &'static str, found: &'static str },
    #[error("division by zero")]
    DivisionByZero,
    #[error("parameter index {0} out of bounds")]
    ParamOutOfBounds(u32),
    #[error("local index {0} out of bounds")]
    LocalOutOfBounds(u32),
    #[error("identifier has no compile-time value yet")]
    UnresolvedIdentifier(IdentifierId),
    #[error("branch target {0} is out of range")]
    IllegalAddr(usize),
    #[error("evaluation failed (`err` instruction reached)")]
    Failed,
}

type Result<T> = std::result::Result<T, VmError>;

enum HandlerResult {
    NotFinished,
    Finished(Variant),
    Failed(VmError),
}

impl Variant {
    fn kind_name(&self) -> &'static str {
        match self {
            Variant::None => "none",
            Variant::Integer(..) => "integer",
            Variant::Boolean(_) => "boolean",
            Variant::Type(_) => "type",
        }
    }
}

fn expect_integer(v: &Variant) -> Result<i128> {
    match v {
        Variant::Integer(n, _) => Ok(*n),
        other => Err(VmError::TypeMismatch { expected: "integer", found: other.kind_name() }),
    }
}

fn expect_boolean(v: &Variant) -> Result<bool> {
    match v {
        Variant::Boolean(b) => Ok(*b),
        other => Err(VmError::TypeMismatch { expected: "boolean", found: other.kind_name() }),
    }
}

pub struct Vm<'a> {
    storage: &'a IdentifierStorage,
    params: Vec<Variant>,
    locals: Vec<Variant>,
    stack: Vec<Variant>,
    code: &'a [Opcode],
    ip: usize,
}

impl<'a> Vm<'a> {
    pub fn new(program: &'a Program, storage: &'a IdentifierStorage) -> Vm<'a> {
        Vm::with_params(program, storage, Vec::new())
    }

    pub fn with_params(program: &'a Program, storage: &'a IdentifierStorage, params: Vec<Variant>) -> Vm<'a> {
        Vm { storage, params, locals: Vec::new(), stack: Vec::new(), code: &program.code, ip: 0 }
    }

    // Fetch-dispatch-advance until a handler reports `Finished`/`Failed`.
    pub fn run(mut self) -> Result<Variant> {
        log::debug!("vm: running {} instructions", self.code.len());
        loop {
            let opcode = self.code.get(self.ip).ok_or(VmError::IllegalAddr(self.ip))?.clone();
            crate::trace!("vm: ip={} op={:?}", self.ip, opcode);
            self.ip += 1;
            match self.dispatch(&opcode) {
                HandlerResult::NotFinished => {}
                HandlerResult::Finished(v) => {
                    log::debug!("vm: finished with {:?}", v);
                    return Ok(v);
                }
                HandlerResult::Failed(e) => {
                    log::debug!("vm: failed: {}", e);
                    return Err(e);
                }
            }
        }
    }

    fn push(&mut self, v: Variant) {
        self.stack.push(v);
    }

    fn pop(&mut self) -> Result<Variant> {
        self.stack.pop().ok_or(VmError::Underflow)
    }

    fn dispatch(&mut self, opcode: &Opcode) -> HandlerResult {
        match self.dispatch_inner(opcode) {
            Ok(r) => r,
            Err(e) => HandlerResult::Failed(e),
        }
    }

    fn dispatch_inner(&mut self, opcode: &Opcode) -> Result<HandlerResult> {
        match opcode {
            Opcode::Noop => Ok(HandlerResult::NotFinished),
            Opcode::LoadData(v) => {
                self.push(v.clone());
                Ok(HandlerResult::NotFinished)
            }
            Opcode::LoadId(id) => {
                self.push(self.load_id(*id)?);
                Ok(HandlerResult::NotFinished)
            }
            Opcode::LoadParam(i) => {
                let v = self.params.get(*i as usize).cloned().ok_or(VmError::ParamOutOfBounds(*i))?;
                self.push(v);
                Ok(HandlerResult::NotFinished)
            }
            Opcode::LoadLocal(i) => {
                let v = self.locals.get(*i as usize).cloned().ok_or(VmError::LocalOutOfBounds(*i))?;
                self.push(v);
                Ok(HandlerResult::NotFinished)
            }
            Opcode::WriteLocal(i) => {
                let v = self.pop()?;
                let idx = *i as usize;
                if idx >= self.locals.len() {
                    self.locals.resize(idx + 1, Variant::None);
                }
                self.locals[idx] = v;
                Ok(HandlerResult::NotFinished)
            }
            Opcode::Drop(n) => {
                for _ in 0..*n {
                    self.pop()?;
                }
                Ok(HandlerResult::NotFinished)
            }
            Opcode::Dup(n) => {
                let top = self.stack.last().cloned().ok_or(VmError::Underflow)?;
                for _ in 0..*n {
                    self.push(top.clone());
                }
                Ok(HandlerResult::NotFinished)
            }
            Opcode::Swap => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(b);
                self.push(a);
                Ok(HandlerResult::NotFinished)
            }
            Opcode::CastInt(packed) => {
                let n = expect_integer(&self.pop()?)?;
                let (_from, to) = unpack_cast(*packed);
                self.push(Variant::Integer(to.wrap(n), to));
                Ok(HandlerResult::NotFinished)
            }
            Opcode::IntBinary(op, tag) => {
                let rhs = expect_integer(&self.pop()?)?;
                let lhs = expect_integer(&self.pop()?)?;
                self.push(self.int_binary(*op, *tag, lhs, rhs)?);
                Ok(HandlerResult::NotFinished)
            }
            Opcode::IntCompare(op, _tag) => {
                let rhs = expect_integer(&self.pop()?)?;
                let lhs = expect_integer(&self.pop()?)?;
                let result = match op {
                    CmpOp::Eq => lhs == rhs,
                    CmpOp::Ne => lhs != rhs,
                    CmpOp::Lt => lhs < rhs,
                    CmpOp::Le => lhs <= rhs,
                    CmpOp::Gt => lhs > rhs,
                    CmpOp::Ge => lhs >= rhs,
                };
                self.push(Variant::Boolean(result));
                Ok(HandlerResult::NotFinished)
            }
            Opcode::Land => {
                let b = expect_boolean(&self.pop()?)?;
                let a = expect_boolean(&self.pop()?)?;
                self.push(Variant::Boolean(a && b));
                Ok(HandlerResult::NotFinished)
            }
            Opcode::Lor => {
                let b = expect_boolean(&self.pop()?)?;
                let a = expect_boolean(&self.pop()?)?;
                self.push(Variant::Boolean(a || b));
                Ok(HandlerResult::NotFinished)
            }
            Opcode::BranchFalse { target } => {
                let cond = expect_boolean(&self.pop()?)?;
                if !cond {
                    self.ip = *target;
                }
                Ok(HandlerResult::NotFinished)
            }
            Opcode::Branch { target } => {
                self.ip = *target;
                Ok(HandlerResult::NotFinished)
            }
            Opcode::End => Ok(HandlerResult::Finished(Variant::None)),
            Opcode::Ret => Ok(HandlerResult::Finished(self.pop()?)),
            Opcode::Err => Err(VmError::Failed),
        }
    }

    fn load_id(&self, id: IdentifierId) -> Result<Variant> {
        let entry = self.storage.get(id);
        match &*entry.data.borrow() {
            EntryData::None => return Err(VmError::UnresolvedIdentifier(id)),
            EntryData::Expression { .. } => {}
        }
        entry.value.borrow().clone().ok_or(VmError::UnresolvedIdentifier(id))
    }

    // Shift counts are masked to the destination tag's own width before
    // use (§4.9: "i1 shifts use only the low 3 bits"); `ct_int` has no
    // fixed width, so its shifts are left unmasked.
    fn int_binary(&self, op: IntOp, tag: u8, lhs: i128, rhs: i128) -> Result<Variant> {
        let tag = crate::bytecode::tag_at_index(tag);
        let wrap = |v: i128| Variant::Integer(tag.wrap(v), tag);
        Ok(match op {
            IntOp::Add => wrap(lhs.wrapping_add(rhs)),
            IntOp::Sub => wrap(lhs.wrapping_sub(rhs)),
            IntOp::Mul => wrap(lhs.wrapping_mul(rhs)),
            IntOp::Div => {
                if rhs == 0 {
                    return Err(VmError::DivisionByZero);
                }
                wrap(lhs.wrapping_div(rhs))
            }
            IntOp::Mod => {
                if rhs == 0 {
                    return Err(VmError::DivisionByZero);
                }
                wrap(lhs.wrapping_rem(rhs))
            }
            IntOp::Shl | IntOp::Shr => {
                let bits = tag.width.bits().unwrap_or(128);
                let mask = (bits - 1) as u32;
                let amount = (rhs as i64 & mask as i64) as u32;
                wrap(if op == IntOp::Shl { lhs.wrapping_shl(amount) } else { lhs.wrapping_shr(amount) })
            }
            IntOp::BAnd => wrap(lhs & rhs),
            IntOp::BOr => wrap(lhs | rhs),
            IntOp::BXor => wrap(lhs ^ rhs),
        })
    }
}

impl fmt::Debug for Vm<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Vm {{ ip: {}, stack depth: {} }}", self.ip, self.stack.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{pack_cast, tag_index};
    use crate::types::IntTag;

    fn run(program: Program) -> Variant {
        let storage = IdentifierStorage::new();
        Vm::new(&program, &storage).run().expect("program should run")
    }

    #[test]
    fn adds_two_constants() {
        let i4 = IntTag::from_name("i4").unwrap();
        let ct = IntTag::CT_INT;
        let mut p = Program::default();
        p.push(Opcode::LoadData(Variant::Integer(2, ct)));
        p.push(Opcode::LoadData(Variant::Integer(3, ct)));
        p.push(Opcode::IntBinary(IntOp::Add, tag_index(&i4)));
        p.push(Opcode::Ret);
        assert_eq!(run(p), Variant::Integer(5, i4));
    }

    #[test]
    fn cast_wraps_on_overflow() {
        let i1 = IntTag::from_name("i1").unwrap();
        let ct = IntTag::CT_INT;
        let mut p = Program::default();
        p.push(Opcode::LoadData(Variant::Integer(200, ct)));
        p.push(Opcode::CastInt(pack_cast(&IntTag::CT_INT, &i1)));
        p.push(Opcode::Ret);
        assert_eq!(run(p), Variant::Integer(-56, i1));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let ct = IntTag::CT_INT;
        let mut p = Program::default();
        p.push(Opcode::LoadData(Variant::Integer(1, ct)));
        p.push(Opcode::LoadData(Variant::Integer(0, ct)));
        p.push(Opcode::IntBinary(IntOp::Div, tag_index(&ct)));
        p.push(Opcode::Ret);
        let storage = IdentifierStorage::new();
        assert!(matches!(Vm::new(&p, &storage).run(), Err(VmError::DivisionByZero)));
    }

    #[test]
    fn branch_false_skips_to_target() {
        let ct = IntTag::CT_INT;
        let mut p = Program::default();
        p.push(Opcode::LoadData(Variant::Boolean(false)));
        p.push(Opcode::BranchFalse { target: 4 });
        p.push(Opcode::LoadData(Variant::Integer(1, ct)));
        p.push(Opcode::Branch { target: 5 });
        p.push(Opcode::LoadData(Variant::Integer(2, ct)));
        p.push(Opcode::Ret);
        assert_eq!(run(p), Variant::Integer(2, ct));
    }

    #[test]
    fn stack_underflow_is_reported_not_panicked() {
        let ct = IntTag::CT_INT;
        let mut p = Program::default();
        p.push(Opcode::IntBinary(IntOp::Add, tag_index(&ct)));
        p.push(Opcode::Ret);
        let storage = IdentifierStorage::new();
        assert!(matches!(Vm::new(&p, &storage).run(), Err(VmError::Underflow)));
    }

    #[test]
    fn shift_count_masks_to_destination_width() {
        // i1 is 8 bits wide; a shift count of 9 behaves like a shift of 1.
        let i1 = IntTag::from_name("i1").unwrap();
        let mut p = Program::default();
        p.push(Opcode::LoadData(Variant::Integer(1, i1)));
        p.push(Opcode::LoadData(Variant::Integer(9, i1)));
        p.push(Opcode::IntBinary(IntOp::Shl, tag_index(&i1)));
        p.push(Opcode::Ret);
        assert_eq!(run(p), Variant::Integer(2, i1));
    }

    #[test]
    fn err_opcode_fails_evaluation() {
        let mut p = Program::default();
        p.push(Opcode::Err);
        let storage = IdentifierStorage::new();
        assert!(matches!(Vm::new(&p, &storage).run(), Err(VmError::Failed)));
    }

    #[test]
    fn param_index_out_of_bounds_is_reported() {
        let mut p = Program::default();
        p.push(Opcode::LoadParam(0));
        p.push(Opcode::Ret);
        let storage = IdentifierStorage::new();
        assert!(matches!(Vm::new(&p, &storage).run(), Err(VmError::ParamOutOfBounds(0))));
    }
}
