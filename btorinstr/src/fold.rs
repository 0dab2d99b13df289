//! Constant folding.
use crate::{
    consts::BvConst,
    eval::eval_scalar,
    modules::{
        instructions::{
            AnyInstr, ArithInstr, BtorInstr, Instruction, InstructionFlags, Operation,
            arith::ArithConstant, bv::BvConstant,
        },
        operand::Value,
    },
    types::Type,
};

/// Result of folding an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpFoldResult {
    /// The operation always produces this literal.
    Attr(BvConst),
    /// The operation always produces this existing value.
    Value(Value),
}

impl OpFoldResult {
    /// Operation materializing this result as `dest`, when it is a literal.
    pub fn materialize(&self, dest: Value) -> Option<Operation> {
        match self {
            OpFoldResult::Attr(value) => Some(Operation::new(BvConstant {
                dest,
                ty: Type::BitVec(value.ty()),
                value: value.clone(),
            })),
            OpFoldResult::Value(_) => None,
        }
    }
}

/// Fold a constant operation to its own literal.
pub fn fold(op: &Operation) -> Option<OpFoldResult> {
    match &op.instr {
        AnyInstr::Btor(BtorInstr::Constant(BvConstant { value, .. }))
        | AnyInstr::Arith(ArithInstr::Constant(ArithConstant { value, .. })) => {
            Some(OpFoldResult::Attr(value.clone()))
        }
        _ => None,
    }
}

/// Fold `op` given the constant value of some operands.
///
/// Pure scalar operations whose operands are all known fold to a literal; a
/// `ite`/`select` with a known condition folds to the chosen branch.
/// Sources, array and assertion operations never fold.
pub fn fold_with(op: &Operation, lookup: impl Fn(Value) -> Option<BvConst>) -> Option<OpFoldResult> {
    if let Some(folded) = fold(op) {
        return Some(folded);
    }

    let opaque = InstructionFlags::META
        | InstructionFlags::NONDET
        | InstructionFlags::ARRAY
        | InstructionFlags::VECTOR
        | InstructionFlags::MEMORY;
    if op.flags().intersects(opaque) || !op.destination_type()?.is_bit_vec() {
        return None;
    }

    let branches = match &op.instr {
        AnyInstr::Btor(BtorInstr::Ite(ite)) => Some((&ite.cond, &ite.then_value, &ite.else_value)),
        AnyInstr::Arith(ArithInstr::Select(select)) => {
            Some((&select.cond, &select.then_value, &select.else_value))
        }
        _ => None,
    };
    if let Some((cond, then_value, else_value)) = branches {
        if let Some(cond) = lookup(cond.value) {
            let chosen = if cond.is_true() { then_value } else { else_value };
            return Some(match lookup(chosen.value) {
                Some(value) => OpFoldResult::Attr(value),
                None => OpFoldResult::Value(chosen.value),
            });
        }
    }

    let args = op
        .operands()
        .map(|operand| lookup(operand.value))
        .collect::<Option<Vec<_>>>()?;
    eval_scalar(&op.instr, &args).ok().map(OpFoldResult::Attr)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::{
        modules::{
            builder::OpBuilder,
            instructions::bv::{BinaryVariant, SourceVariant},
        },
        types::BitVecType,
    };

    fn byte() -> BitVecType {
        BitVecType::new(8).unwrap()
    }

    #[test]
    fn constant_folding_is_idempotent() {
        let mut b = OpBuilder::new(Value(0));
        b.constant_u64(byte(), 42).unwrap();
        let op = b.take().remove(0);

        let folded = fold(&op).unwrap();
        assert_eq!(folded, OpFoldResult::Attr(BvConst::from_u64(byte(), 42)));

        let again = folded.materialize(Value(0)).unwrap();
        assert_eq!(again, op);
        assert_eq!(fold(&again), Some(folded));
    }

    #[test]
    fn computed_values_fold_with_known_operands() {
        let mut b = OpBuilder::new(Value(0));
        let x = b.constant_u64(byte(), 250).unwrap();
        let y = b.constant_u64(byte(), 10).unwrap();
        let sum = b.binary(BinaryVariant::Add, &x, &y).unwrap();
        let ops = b.take();

        let known: BTreeMap<Value, BvConst> = ops
            .iter()
            .filter_map(|op| match fold(op)? {
                OpFoldResult::Attr(c) => Some((op.destination()?, c)),
                OpFoldResult::Value(_) => None,
            })
            .collect();
        assert_eq!(fold(&ops[2]), None);
        assert_eq!(
            fold_with(&ops[2], |v| known.get(&v).cloned()),
            Some(OpFoldResult::Attr(BvConst::from_u64(byte(), 4)))
        );
        assert_eq!(sum.value, Value(2));
    }

    #[test]
    fn sources_and_unknown_operands_do_not_fold() {
        let mut b = OpBuilder::new(Value(0));
        let input = b.source(SourceVariant::Input, Type::bv(8), 0).unwrap();
        let twice = b.binary(BinaryVariant::Add, &input, &input).unwrap();
        let ops = b.take();
        assert_eq!(fold_with(&ops[0], |_| None), None);
        assert_eq!(fold_with(&ops[1], |_| None), None);
        assert_eq!(twice.ty, Type::bv(8));
    }

    #[test]
    fn ite_with_known_condition_picks_a_branch() {
        let mut b = OpBuilder::new(Value(0));
        let t = b.constant_u64(BitVecType::BOOL, 1).unwrap();
        let a = b.source(SourceVariant::Input, Type::bv(8), 0).unwrap();
        let c = b.source(SourceVariant::Input, Type::bv(8), 1).unwrap();
        b.ite(&t, &a, &c).unwrap();
        let ops = b.take();
        let lookup = |v: Value| (v == t.value).then(|| BvConst::from_bool(true));
        assert_eq!(fold_with(&ops[3], lookup), Some(OpFoldResult::Value(a.value)));
    }
}
