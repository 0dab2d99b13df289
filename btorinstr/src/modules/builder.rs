//! Construction helpers computing result types.
//!
//! [`OpBuilder`] hands out fresh values, infers the result type of each
//! operation from its operands and runs the operation verifier before
//! appending it, so an ill-typed construction fails at the call site.
use crate::{
    consts::BvConst,
    modules::{
        instructions::{
            AnyInstr, Instruction, Operation,
            arith::{
                ArithBinary, ArithBinaryVariant, ArithCast, ArithCastVariant, ArithCmp,
                ArithConstant, ArithSelect,
            },
            array::{
                ArrayInit, ArrayRead, ArrayWrite, InitVariant, IteWriteInPlace, NdArray,
                ReadVariant, WriteVariant,
            },
            bv::{
                BinaryVariant, BvBinary, BvCmp, BvConcat, BvConstant, BvExt, BvIte, BvLogic,
                BvOverflow, BvReduce, BvSlice, BvSource, BvUnary, CmpPredicate, ExtVariant,
                LogicVariant, OverflowVariant, ReduceVariant, SourceVariant, UnaryVariant,
            },
            meta::{AssertVariant, BtorAssert},
        },
        operand::{Operand, Value},
    },
    types::{BitVecType, Type},
    utils::Error,
    verify::{Verify, expect_bitvec},
};

#[derive(Debug, Clone)]
pub struct OpBuilder {
    next_value: Value,
    operations: Vec<Operation>,
}

impl OpBuilder {
    /// Creates a builder allocating values from `next_value` upwards.
    pub fn new(next_value: Value) -> Self {
        Self {
            next_value,
            operations: Vec::new(),
        }
    }

    pub fn fresh(&mut self) -> Value {
        let value = self.next_value;
        self.next_value = Value(value.0 + 1);
        value
    }

    /// First value not handed out yet.
    pub fn next_value(&self) -> Value {
        self.next_value
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Take the operations built so far, keeping the value counter.
    pub fn take(&mut self) -> Vec<Operation> {
        std::mem::take(&mut self.operations)
    }

    /// Verifies and appends an operation, returning its result.
    pub fn push(&mut self, op: Operation) -> Result<Option<Operand>, Error> {
        op.verify()?;
        let result = match (op.destination(), op.destination_type()) {
            (Some(value), Some(ty)) => Some(Operand { value, ty }),
            _ => None,
        };
        self.operations.push(op);
        Ok(result)
    }

    fn emit(&mut self, instr: impl Into<AnyInstr>) -> Result<Operand, Error> {
        let op = Operation::new(instr);
        let dest = op.destination();
        // every instruction built through `emit` has a result
        self.push(op)?.ok_or(Error::UndefinedValue {
            value: dest.unwrap_or(self.next_value),
            block: crate::modules::BlockKind::Next,
        })
    }

    pub fn constant(&mut self, value: BvConst) -> Result<Operand, Error> {
        let dest = self.fresh();
        self.emit(BvConstant {
            dest,
            ty: value.ty().into(),
            value,
        })
    }

    pub fn constant_u64(&mut self, ty: BitVecType, value: u64) -> Result<Operand, Error> {
        self.constant(BvConst::from_u64(ty, value))
    }

    pub fn binary(
        &mut self,
        variant: BinaryVariant,
        lhs: &Operand,
        rhs: &Operand,
    ) -> Result<Operand, Error> {
        let dest = self.fresh();
        self.emit(BvBinary {
            dest,
            variant,
            ty: lhs.ty.clone(),
            lhs: lhs.clone(),
            rhs: rhs.clone(),
        })
    }

    pub fn overflow(
        &mut self,
        variant: OverflowVariant,
        lhs: &Operand,
        rhs: &Operand,
    ) -> Result<Operand, Error> {
        let dest = self.fresh();
        self.emit(BvOverflow {
            dest,
            variant,
            lhs: lhs.clone(),
            rhs: rhs.clone(),
        })
    }

    pub fn logic(
        &mut self,
        variant: LogicVariant,
        lhs: &Operand,
        rhs: &Operand,
    ) -> Result<Operand, Error> {
        let dest = self.fresh();
        self.emit(BvLogic {
            dest,
            variant,
            lhs: lhs.clone(),
            rhs: rhs.clone(),
        })
    }

    pub fn cmp(
        &mut self,
        predicate: CmpPredicate,
        lhs: &Operand,
        rhs: &Operand,
    ) -> Result<Operand, Error> {
        let dest = self.fresh();
        self.emit(BvCmp {
            dest,
            predicate,
            lhs: lhs.clone(),
            rhs: rhs.clone(),
        })
    }

    pub fn unary(&mut self, variant: UnaryVariant, operand: &Operand) -> Result<Operand, Error> {
        let dest = self.fresh();
        self.emit(BvUnary {
            dest,
            variant,
            ty: operand.ty.clone(),
            operand: operand.clone(),
        })
    }

    pub fn reduce(&mut self, variant: ReduceVariant, operand: &Operand) -> Result<Operand, Error> {
        let dest = self.fresh();
        self.emit(BvReduce {
            dest,
            variant,
            operand: operand.clone(),
        })
    }

    pub fn ext(
        &mut self,
        variant: ExtVariant,
        operand: &Operand,
        to: BitVecType,
    ) -> Result<Operand, Error> {
        let dest = self.fresh();
        self.emit(BvExt {
            dest,
            variant,
            ty: to.into(),
            operand: operand.clone(),
        })
    }

    /// Slice with constant bounds, materializing the bound constants.
    pub fn slice_const(
        &mut self,
        operand: &Operand,
        upper: u32,
        lower: u32,
    ) -> Result<Operand, Error> {
        let ty = expect_bitvec("slice", "its operand", &operand.ty)?;
        if lower > upper || upper >= ty.width() {
            return Err(Error::SliceBounds {
                upper: upper as u64,
                lower: lower as u64,
                width: ty.width(),
            });
        }
        let upper_value = self.constant_u64(ty, upper as u64)?;
        let lower_value = self.constant_u64(ty, lower as u64)?;
        let dest = self.fresh();
        self.emit(BvSlice {
            dest,
            ty: Type::bv(upper - lower + 1),
            operand: operand.clone(),
            upper: upper_value,
            lower: lower_value,
        })
    }

    pub fn concat(&mut self, lhs: &Operand, rhs: &Operand) -> Result<Operand, Error> {
        let high = expect_bitvec("concat", "its left operand", &lhs.ty)?;
        let low = expect_bitvec("concat", "its right operand", &rhs.ty)?;
        let width = high.width().saturating_add(low.width());
        let ty = BitVecType::new(width).ok_or(Error::ConcatWidth {
            lhs: high.width(),
            rhs: low.width(),
            found: width,
        })?;
        let dest = self.fresh();
        self.emit(BvConcat {
            dest,
            ty: ty.into(),
            lhs: lhs.clone(),
            rhs: rhs.clone(),
        })
    }

    pub fn ite(
        &mut self,
        cond: &Operand,
        then_value: &Operand,
        else_value: &Operand,
    ) -> Result<Operand, Error> {
        let dest = self.fresh();
        self.emit(BvIte {
            dest,
            ty: then_value.ty.clone(),
            cond: cond.clone(),
            then_value: then_value.clone(),
            else_value: else_value.clone(),
        })
    }

    pub fn source(&mut self, variant: SourceVariant, ty: Type, id: u64) -> Result<Operand, Error> {
        let dest = self.fresh();
        self.emit(BvSource {
            dest,
            variant,
            ty,
            id,
        })
    }

    pub fn nd_array(&mut self, ty: Type, id: u64) -> Result<Operand, Error> {
        let dest = self.fresh();
        self.emit(NdArray { dest, ty, id })
    }

    pub fn array_init(
        &mut self,
        variant: InitVariant,
        ty: Type,
        init: Option<&Operand>,
    ) -> Result<Operand, Error> {
        let dest = self.fresh();
        self.emit(ArrayInit {
            dest,
            variant,
            ty,
            init: init.cloned(),
        })
    }

    pub fn read(
        &mut self,
        variant: ReadVariant,
        base: &Operand,
        index: &Operand,
    ) -> Result<Operand, Error> {
        let element = base.ty.element().ok_or_else(|| Error::ExpectedArrayKind {
            op: variant.to_str(),
            expected: variant.storage().describe(),
            found: base.ty.clone(),
        })?;
        let dest = self.fresh();
        self.emit(ArrayRead {
            dest,
            variant,
            ty: element.into(),
            base: base.clone(),
            index: index.clone(),
        })
    }

    pub fn write(
        &mut self,
        variant: WriteVariant,
        value: &Operand,
        base: &Operand,
        index: &Operand,
    ) -> Result<Operand, Error> {
        let dest = self.fresh();
        self.emit(ArrayWrite {
            dest,
            variant,
            ty: base.ty.clone(),
            value: value.clone(),
            base: base.clone(),
            index: index.clone(),
        })
    }

    pub fn ite_write_in_place(
        &mut self,
        cond: &Operand,
        value: &Operand,
        base: &Operand,
        index: &Operand,
    ) -> Result<Operand, Error> {
        let dest = self.fresh();
        self.emit(IteWriteInPlace {
            dest,
            ty: base.ty.clone(),
            cond: cond.clone(),
            value: value.clone(),
            base: base.clone(),
            index: index.clone(),
        })
    }

    pub fn assert(
        &mut self,
        variant: AssertVariant,
        cond: &Operand,
        id: Option<u64>,
    ) -> Result<(), Error> {
        self.push(Operation::new(BtorAssert {
            variant,
            cond: cond.clone(),
            id,
        }))
        .map(|_| ())
    }

    pub fn arith_binary(
        &mut self,
        variant: ArithBinaryVariant,
        lhs: &Operand,
        rhs: &Operand,
    ) -> Result<Operand, Error> {
        let dest = self.fresh();
        self.emit(ArithBinary {
            dest,
            variant,
            ty: lhs.ty.clone(),
            lhs: lhs.clone(),
            rhs: rhs.clone(),
        })
    }

    pub fn arith_cmp(
        &mut self,
        predicate: CmpPredicate,
        lhs: &Operand,
        rhs: &Operand,
    ) -> Result<Operand, Error> {
        let dest = self.fresh();
        self.emit(ArithCmp {
            dest,
            predicate,
            lhs: lhs.clone(),
            rhs: rhs.clone(),
        })
    }

    pub fn select(
        &mut self,
        cond: &Operand,
        then_value: &Operand,
        else_value: &Operand,
    ) -> Result<Operand, Error> {
        let dest = self.fresh();
        self.emit(ArithSelect {
            dest,
            ty: then_value.ty.clone(),
            cond: cond.clone(),
            then_value: then_value.clone(),
            else_value: else_value.clone(),
        })
    }

    pub fn cast(
        &mut self,
        variant: ArithCastVariant,
        operand: &Operand,
        to: BitVecType,
    ) -> Result<Operand, Error> {
        let dest = self.fresh();
        self.emit(ArithCast {
            dest,
            variant,
            ty: to.into(),
            operand: operand.clone(),
        })
    }

    pub fn arith_constant(&mut self, value: BvConst) -> Result<Operand, Error> {
        let dest = self.fresh();
        self.emit(ArithConstant { dest, value })
    }

    pub fn arith_constant_u64(&mut self, ty: BitVecType, value: u64) -> Result<Operand, Error> {
        self.arith_constant(BvConst::from_u64(ty, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inferred_result_types() {
        let mut b = OpBuilder::new(Value(0));
        let a = b.constant_u64(BitVecType::new(3).unwrap(), 5).unwrap();
        let c = b.constant_u64(BitVecType::new(5).unwrap(), 1).unwrap();
        let cat = b.concat(&a, &c).unwrap();
        assert_eq!(cat.ty, Type::bv(8));

        let slice = b.slice_const(&cat, 5, 2).unwrap();
        assert_eq!(slice.ty, Type::bv(4));
        assert!(b.slice_const(&cat, 8, 0).unwrap_err().is_slice_bounds());
        assert!(b.slice_const(&cat, 1, 3).unwrap_err().is_slice_bounds());

        let flag = b.overflow(OverflowVariant::UAddO, &cat, &cat).unwrap();
        assert_eq!(flag.ty, Type::bv(1));
    }

    #[test]
    fn ill_typed_ops_are_not_appended() {
        let mut b = OpBuilder::new(Value(0));
        let a = b.constant_u64(BitVecType::new(4).unwrap(), 1).unwrap();
        let c = b.constant_u64(BitVecType::new(8).unwrap(), 1).unwrap();
        assert!(b.binary(BinaryVariant::Add, &a, &c).is_err());
        assert_eq!(b.operations().len(), 2);
    }
}
