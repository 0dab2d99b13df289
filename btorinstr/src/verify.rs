//! Operation-local verification.
//!
//! Every rule only looks at the operation and the types its operands
//! declare. Rules that need to know where a value comes from (constant
//! slice bounds, SSA visibility) are checked by [`Model::verify`].
//!
//! [`Model::verify`]: crate::modules::Model::verify
use crate::{
    modules::instructions::{
        AnyInstr, ArithInstr, ArrayStorage, BtorInstr, Operation,
        arith::{ArithBinary, ArithCast, ArithCastVariant, ArithCmp, ArithConstant, ArithSelect},
        array::{ArrayInit, ArrayRead, ArrayWrite, IteWriteInPlace, NdArray},
        bv::{
            BvBinary, BvCmp, BvConcat, BvConstant, BvExt, BvIte, BvLogic, BvOverflow, BvReduce,
            BvSlice, BvSource, BvUnary,
        },
        meta::BtorAssert,
    },
    types::{BitVecType, Type},
    utils::Error,
};

pub trait Verify {
    /// Checks the structural rules of the operation.
    fn verify(&self) -> Result<(), Error>;
}

pub(crate) fn expect_bitvec(
    op: &'static str,
    what: &'static str,
    ty: &Type,
) -> Result<BitVecType, Error> {
    ty.as_bitvec().ok_or_else(|| Error::ExpectedBitVec {
        op,
        what,
        found: ty.clone(),
    })
}

pub(crate) fn expect_type(
    op: &'static str,
    what: &'static str,
    expected: &Type,
    found: &Type,
) -> Result<(), Error> {
    if expected == found {
        Ok(())
    } else {
        Err(Error::TypeMismatch {
            op,
            what,
            expected: expected.clone(),
            found: found.clone(),
        })
    }
}

pub(crate) fn expect_bool(op: &'static str, what: &'static str, ty: &Type) -> Result<(), Error> {
    expect_type(op, what, &Type::BitVec(BitVecType::BOOL), ty)
}

/// Checks that `ty` is an array of the given storage with a usable shape,
/// returning its `(index, element)` types.
pub(crate) fn expect_array(
    op: &'static str,
    storage: ArrayStorage,
    ty: &Type,
) -> Result<(BitVecType, BitVecType), Error> {
    if !storage.matches(ty) {
        return Err(Error::ExpectedArrayKind {
            op,
            expected: storage.describe(),
            found: ty.clone(),
        });
    }
    match (ty.index(), ty.element()) {
        (Some(index), Some(element)) => Ok((index, element)),
        _ => Err(Error::InvalidShape {
            op,
            ty: ty.clone(),
        }),
    }
}

/// Checks the shape of any array type appearing in a non-array operation
/// such as `ite` or `select`.
fn expect_valid_shape(op: &'static str, ty: &Type) -> Result<(), Error> {
    if ty.is_any_array() && ty.index().is_none() {
        return Err(Error::InvalidShape {
            op,
            ty: ty.clone(),
        });
    }
    Ok(())
}

impl Verify for BvBinary {
    fn verify(&self) -> Result<(), Error> {
        let op = self.variant.to_str();
        expect_bitvec(op, "its result", &self.ty)?;
        expect_type(op, "its left operand", &self.ty, &self.lhs.ty)?;
        expect_type(op, "its right operand", &self.ty, &self.rhs.ty)
    }
}

impl Verify for BvOverflow {
    fn verify(&self) -> Result<(), Error> {
        let op = self.variant.to_str();
        expect_bitvec(op, "its left operand", &self.lhs.ty)?;
        expect_type(op, "its right operand", &self.lhs.ty, &self.rhs.ty)
    }
}

impl Verify for BvLogic {
    fn verify(&self) -> Result<(), Error> {
        let op = self.variant.to_str();
        expect_bool(op, "its left operand", &self.lhs.ty)?;
        expect_bool(op, "its right operand", &self.rhs.ty)
    }
}

impl Verify for BvCmp {
    fn verify(&self) -> Result<(), Error> {
        expect_bitvec("cmp", "its left operand", &self.lhs.ty)?;
        expect_type("cmp", "its right operand", &self.lhs.ty, &self.rhs.ty)
    }
}

impl Verify for BvUnary {
    fn verify(&self) -> Result<(), Error> {
        let op = self.variant.to_str();
        expect_bitvec(op, "its result", &self.ty)?;
        expect_type(op, "its operand", &self.ty, &self.operand.ty)
    }
}

impl Verify for BvReduce {
    fn verify(&self) -> Result<(), Error> {
        expect_bitvec(self.variant.to_str(), "its operand", &self.operand.ty).map(|_| ())
    }
}

impl Verify for BvExt {
    fn verify(&self) -> Result<(), Error> {
        let op = self.variant.to_str();
        let from = expect_bitvec(op, "its operand", &self.operand.ty)?;
        let to = expect_bitvec(op, "its result", &self.ty)?;
        if to.width() <= from.width() {
            return Err(Error::ExtNotWider {
                op,
                from: from.width(),
                to: to.width(),
            });
        }
        Ok(())
    }
}

impl Verify for BvSlice {
    fn verify(&self) -> Result<(), Error> {
        let operand = expect_bitvec("slice", "its operand", &self.operand.ty)?;
        expect_type("slice", "its upper bound", &self.operand.ty, &self.upper.ty)?;
        expect_type("slice", "its lower bound", &self.operand.ty, &self.lower.ty)?;
        let result = expect_bitvec("slice", "its result", &self.ty)?;
        if result.width() > operand.width() {
            return Err(Error::SliceResultTooWide {
                result: result.width(),
                width: operand.width(),
            });
        }
        Ok(())
    }
}

impl Verify for BvConcat {
    fn verify(&self) -> Result<(), Error> {
        let lhs = expect_bitvec("concat", "its left operand", &self.lhs.ty)?;
        let rhs = expect_bitvec("concat", "its right operand", &self.rhs.ty)?;
        let result = expect_bitvec("concat", "its result", &self.ty)?;
        if lhs.width() as u64 + rhs.width() as u64 != result.width() as u64 {
            return Err(Error::ConcatWidth {
                lhs: lhs.width(),
                rhs: rhs.width(),
                found: result.width(),
            });
        }
        Ok(())
    }
}

impl Verify for BvIte {
    fn verify(&self) -> Result<(), Error> {
        expect_bool("ite", "its condition", &self.cond.ty)?;
        expect_valid_shape("ite", &self.ty)?;
        expect_type("ite", "its then value", &self.ty, &self.then_value.ty)?;
        expect_type("ite", "its else value", &self.ty, &self.else_value.ty)
    }
}

impl Verify for BvConstant {
    fn verify(&self) -> Result<(), Error> {
        let ty = expect_bitvec("constant", "its result", &self.ty)?;
        if ty.width() != self.value.width() {
            return Err(Error::ConstantWidth {
                literal: self.value.width(),
                declared: ty.width(),
            });
        }
        Ok(())
    }
}

impl Verify for BvSource {
    fn verify(&self) -> Result<(), Error> {
        expect_bitvec(self.variant.to_str(), "its result", &self.ty).map(|_| ())
    }
}

impl Verify for NdArray {
    fn verify(&self) -> Result<(), Error> {
        expect_array("nd_array", ArrayStorage::Abstract, &self.ty).map(|_| ())
    }
}

impl Verify for ArrayInit {
    fn verify(&self) -> Result<(), Error> {
        let op = self.variant.to_str();
        let storage = self.variant.storage();
        let (_, element) = expect_array(op, storage, &self.ty)?;
        match &self.init {
            Some(init) => expect_type(op, "its initial value", &element.into(), &init.ty),
            None if storage == ArrayStorage::Abstract => Err(Error::MissingArrayInit { op }),
            None => Ok(()),
        }
    }
}

impl Verify for ArrayRead {
    fn verify(&self) -> Result<(), Error> {
        let op = self.variant.to_str();
        let (index, element) = expect_array(op, self.variant.storage(), &self.base.ty)?;
        expect_type(op, "its index", &index.into(), &self.index.ty)?;
        expect_type(op, "its result", &element.into(), &self.ty)
    }
}

impl Verify for ArrayWrite {
    fn verify(&self) -> Result<(), Error> {
        let op = self.variant.to_str();
        let (index, element) = expect_array(op, self.variant.storage(), &self.ty)?;
        expect_type(op, "its base array", &self.ty, &self.base.ty)?;
        expect_type(op, "its index", &index.into(), &self.index.ty)?;
        expect_type(op, "its value", &element.into(), &self.value.ty)
    }
}

impl Verify for IteWriteInPlace {
    fn verify(&self) -> Result<(), Error> {
        let op = "ite_write_in_place";
        expect_bool(op, "its condition", &self.cond.ty)?;
        let (index, element) = expect_array(op, ArrayStorage::Abstract, &self.ty)?;
        expect_type(op, "its base array", &self.ty, &self.base.ty)?;
        expect_type(op, "its index", &index.into(), &self.index.ty)?;
        expect_type(op, "its value", &element.into(), &self.value.ty)
    }
}

impl Verify for BtorAssert {
    fn verify(&self) -> Result<(), Error> {
        let op = self.variant.to_str();
        expect_bool(op, "its condition", &self.cond.ty)?;
        match (self.variant.has_id(), self.id) {
            (true, None) => Err(Error::MissingAssertId { op }),
            (false, Some(_)) => Err(Error::UnexpectedAssertId { op }),
            _ => Ok(()),
        }
    }
}

impl Verify for ArithBinary {
    fn verify(&self) -> Result<(), Error> {
        let op = self.variant.to_str();
        expect_bitvec(op, "its result", &self.ty)?;
        expect_type(op, "its left operand", &self.ty, &self.lhs.ty)?;
        expect_type(op, "its right operand", &self.ty, &self.rhs.ty)
    }
}

impl Verify for ArithCmp {
    fn verify(&self) -> Result<(), Error> {
        expect_bitvec("cmpi", "its left operand", &self.lhs.ty)?;
        expect_type("cmpi", "its right operand", &self.lhs.ty, &self.rhs.ty)
    }
}

impl Verify for ArithSelect {
    fn verify(&self) -> Result<(), Error> {
        expect_bool("select", "its condition", &self.cond.ty)?;
        if self.ty.is_array() {
            return Err(Error::ExpectedArrayKind {
                op: "select",
                expected: "bit-vector, vector array or memory array",
                found: self.ty.clone(),
            });
        }
        expect_valid_shape("select", &self.ty)?;
        expect_type("select", "its then value", &self.ty, &self.then_value.ty)?;
        expect_type("select", "its else value", &self.ty, &self.else_value.ty)
    }
}

impl Verify for ArithCast {
    fn verify(&self) -> Result<(), Error> {
        let op = self.variant.to_str();
        let from = expect_bitvec(op, "its operand", &self.operand.ty)?;
        let to = expect_bitvec(op, "its result", &self.ty)?;
        let valid = match self.variant {
            ArithCastVariant::ExtUI | ArithCastVariant::ExtSI => to.width() > from.width(),
            ArithCastVariant::TruncI => to.width() < from.width(),
        };
        if !valid {
            return Err(Error::CastWidth {
                op,
                from: from.width(),
                to: to.width(),
            });
        }
        Ok(())
    }
}

impl Verify for ArithConstant {
    fn verify(&self) -> Result<(), Error> {
        Ok(())
    }
}

macro_rules! define_verify_delegation {
    ($enum:ident { $($variant:ident),* $(,)? }) => {
        impl Verify for $enum {
            fn verify(&self) -> Result<(), Error> {
                match self {
                    $($enum::$variant(instr) => instr.verify(),)*
                }
            }
        }
    };
}

define_verify_delegation! {
    BtorInstr {
        Binary,
        Overflow,
        Logic,
        Cmp,
        Unary,
        Reduce,
        Ext,
        Slice,
        Concat,
        Ite,
        Constant,
        Source,
        NdArray,
        ArrayInit,
        Read,
        Write,
        IteWriteInPlace,
        Assert,
    }
}

define_verify_delegation! {
    ArithInstr {
        Binary,
        Cmp,
        Select,
        Cast,
        Constant,
    }
}

define_verify_delegation! {
    AnyInstr {
        Btor,
        Arith,
    }
}

impl Verify for Operation {
    fn verify(&self) -> Result<(), Error> {
        self.instr.verify()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        consts::BvConst,
        modules::{
            instructions::{
                array::{ReadVariant, WriteVariant},
                bv::{BinaryVariant, ExtVariant, OverflowVariant},
            },
            operand::{Operand, Value},
        },
        types::{ArrayType, MemArrayType, VectorArrayType},
    };
    use strum::IntoEnumIterator;

    fn bv(width: u32) -> Type {
        Type::bv(width)
    }

    fn opnd(id: u32, ty: Type) -> Operand {
        Operand::new(Value(id), ty)
    }

    #[test]
    fn binary_requires_identical_widths() {
        for variant in BinaryVariant::iter() {
            let ok = BvBinary {
                dest: Value(2),
                variant,
                ty: bv(8),
                lhs: opnd(0, bv(8)),
                rhs: opnd(1, bv(8)),
            };
            assert!(ok.verify().is_ok());

            let bad = BvBinary {
                rhs: opnd(1, bv(4)),
                ..ok
            };
            assert!(bad.verify().unwrap_err().is_type_mismatch());
        }
    }

    #[test]
    fn overflow_result_is_one_bit() {
        use crate::modules::instructions::Instruction;
        for width in [1, 8, 32, 64] {
            for variant in OverflowVariant::iter() {
                let op = BvOverflow {
                    dest: Value(2),
                    variant,
                    lhs: opnd(0, bv(width)),
                    rhs: opnd(1, bv(width)),
                };
                assert!(op.verify().is_ok());
                assert_eq!(op.destination_type(), Some(bv(1)));
            }
        }
    }

    #[test]
    fn ext_must_widen() {
        let ext = |to| BvExt {
            dest: Value(1),
            variant: ExtVariant::UExt,
            ty: bv(to),
            operand: opnd(0, bv(4)),
        };
        assert!(ext(4).verify().unwrap_err().is_ext_not_wider());
        assert!(ext(8).verify().is_ok());
    }

    #[test]
    fn concat_width_is_sum() {
        let concat = |res| BvConcat {
            dest: Value(2),
            ty: bv(res),
            lhs: opnd(0, bv(3)),
            rhs: opnd(1, bv(5)),
        };
        assert!(concat(8).verify().is_ok());
        assert!(concat(7).verify().unwrap_err().is_concat_width());
    }

    #[test]
    fn constant_width_matches() {
        let c = BvConstant {
            dest: Value(0),
            ty: bv(8),
            value: BvConst::from_u64(BitVecType::new(4).unwrap(), 3),
        };
        assert!(c.verify().unwrap_err().is_constant_width());
    }

    #[test]
    fn array_access_types() {
        let arr: Type = ArrayType {
            index: BitVecType::new(8).unwrap(),
            element: BitVecType::new(8).unwrap(),
        }
        .into();
        let read = ArrayRead {
            dest: Value(2),
            variant: ReadVariant::Read,
            ty: bv(8),
            base: opnd(0, arr.clone()),
            index: opnd(1, bv(8)),
        };
        assert!(read.verify().is_ok());

        let wrong_elem = ArrayWrite {
            dest: Value(3),
            variant: WriteVariant::Write,
            ty: arr.clone(),
            value: opnd(2, bv(4)),
            base: opnd(0, arr),
            index: opnd(1, bv(8)),
        };
        assert!(wrong_elem.verify().unwrap_err().is_type_mismatch());
    }

    #[test]
    fn non_power_of_two_shape_is_rejected() {
        for element in [1, 8, 32] {
            let elem = BitVecType::new(element).unwrap();
            let vec: Type = VectorArrayType::new(6, elem).into();
            let read = ArrayRead {
                dest: Value(2),
                variant: ReadVariant::ReadVec,
                ty: elem.into(),
                base: opnd(0, vec),
                index: opnd(1, bv(3)),
            };
            assert!(read.verify().unwrap_err().is_invalid_shape());

            let mem: Type = MemArrayType::new(6, elem).into();
            let init = ArrayInit {
                dest: Value(0),
                variant: crate::modules::instructions::array::InitVariant::ArrayMem,
                ty: mem,
                init: None,
            };
            assert!(init.verify().unwrap_err().is_invalid_shape());
        }
    }

    #[test]
    fn abstract_array_needs_init() {
        let arr: Type = ArrayType {
            index: BitVecType::new(2).unwrap(),
            element: BitVecType::new(8).unwrap(),
        }
        .into();
        let init = ArrayInit {
            dest: Value(0),
            variant: crate::modules::instructions::array::InitVariant::Array,
            ty: arr,
            init: None,
        };
        assert!(init.verify().unwrap_err().is_missing_array_init());
    }
}
