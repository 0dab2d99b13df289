//! Generic integer arithmetic
//!
//! Target of the arithmetic lowering. Unlike the `btor` dialect, division,
//! remainder and shifts are undefined for a zero divisor, for the signed
//! `MIN / -1` case and for shift amounts not below the width. Producers
//! must guard those inputs.
use strum::{EnumIter, IntoEnumIterator};

use crate::{
    consts::BvConst,
    modules::{
        instructions::{Instruction, InstructionFlags, bv::CmpPredicate, instruction_impl},
        operand::{Operand, Value},
    },
    types::{BitVecType, Type},
};

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, EnumIter)]
pub enum ArithBinaryVariant {
    AddI,
    SubI,
    MulI,
    DivSI,
    DivUI,
    RemSI,
    RemUI,
    AndI,
    OrI,
    XOrI,
    ShLI,
    ShRUI,
    ShRSI,
}

impl ArithBinaryVariant {
    pub fn from_str(s: &str) -> Option<Self> {
        ArithBinaryVariant::iter().find(|op| op.to_str() == s)
    }

    pub fn to_str(&self) -> &'static str {
        match self {
            ArithBinaryVariant::AddI => "addi",
            ArithBinaryVariant::SubI => "subi",
            ArithBinaryVariant::MulI => "muli",
            ArithBinaryVariant::DivSI => "divsi",
            ArithBinaryVariant::DivUI => "divui",
            ArithBinaryVariant::RemSI => "remsi",
            ArithBinaryVariant::RemUI => "remui",
            ArithBinaryVariant::AndI => "andi",
            ArithBinaryVariant::OrI => "ori",
            ArithBinaryVariant::XOrI => "xori",
            ArithBinaryVariant::ShLI => "shli",
            ArithBinaryVariant::ShRUI => "shrui",
            ArithBinaryVariant::ShRSI => "shrsi",
        }
    }

    /// Evaluates the operation, returning `None` on undefined inputs.
    pub fn evaluate(&self, lhs: &BvConst, rhs: &BvConst) -> Option<BvConst> {
        let ty = lhs.ty();
        let in_range_shift = rhs.to_u64().is_some_and(|s| s < ty.width() as u64);
        let signed_overflow = *lhs == BvConst::signed_min(ty) && rhs.is_ones();
        match self {
            ArithBinaryVariant::AddI => Some(lhs.add(rhs)),
            ArithBinaryVariant::SubI => Some(lhs.sub(rhs)),
            ArithBinaryVariant::MulI => Some(lhs.mul(rhs)),
            ArithBinaryVariant::DivSI if rhs.is_zero() || signed_overflow => None,
            ArithBinaryVariant::DivSI => Some(lhs.sdiv(rhs)),
            ArithBinaryVariant::DivUI if rhs.is_zero() => None,
            ArithBinaryVariant::DivUI => Some(lhs.udiv(rhs)),
            ArithBinaryVariant::RemSI if rhs.is_zero() || signed_overflow => None,
            ArithBinaryVariant::RemSI => Some(lhs.srem(rhs)),
            ArithBinaryVariant::RemUI if rhs.is_zero() => None,
            ArithBinaryVariant::RemUI => Some(lhs.urem(rhs)),
            ArithBinaryVariant::AndI => Some(lhs.and(rhs)),
            ArithBinaryVariant::OrI => Some(lhs.or(rhs)),
            ArithBinaryVariant::XOrI => Some(lhs.xor(rhs)),
            ArithBinaryVariant::ShLI if in_range_shift => Some(lhs.sll(rhs)),
            ArithBinaryVariant::ShRUI if in_range_shift => Some(lhs.srl(rhs)),
            ArithBinaryVariant::ShRSI if in_range_shift => Some(lhs.sra(rhs)),
            ArithBinaryVariant::ShLI | ArithBinaryVariant::ShRUI | ArithBinaryVariant::ShRSI => {
                None
            }
        }
    }
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct ArithBinary {
    pub dest: Value,
    pub variant: ArithBinaryVariant,
    pub ty: Type,
    pub lhs: Operand,
    pub rhs: Operand,
}

instruction_impl!(
    ArithBinary,
    flags: |_this| InstructionFlags::ARITH | InstructionFlags::ELEMENTWISE,
    operands: [lhs, rhs],
    result: |this| this.ty.clone()
);

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct ArithCmp {
    pub dest: Value,
    pub predicate: CmpPredicate,
    pub lhs: Operand,
    pub rhs: Operand,
}

instruction_impl!(
    ArithCmp,
    flags: |_this| InstructionFlags::ARITH | InstructionFlags::ELEMENTWISE,
    operands: [lhs, rhs],
    result: |_this| Type::BitVec(BitVecType::BOOL)
);

/// `cond ? then_value : else_value` over any non-abstract type.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct ArithSelect {
    pub dest: Value,
    pub ty: Type,
    pub cond: Operand,
    pub then_value: Operand,
    pub else_value: Operand,
}

instruction_impl!(
    ArithSelect,
    flags: |_this| InstructionFlags::ARITH,
    operands: [cond, then_value, else_value],
    result: |this| this.ty.clone()
);

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, EnumIter)]
pub enum ArithCastVariant {
    ExtUI,
    ExtSI,
    TruncI,
}

impl ArithCastVariant {
    pub fn from_str(s: &str) -> Option<Self> {
        ArithCastVariant::iter().find(|op| op.to_str() == s)
    }

    pub fn to_str(&self) -> &'static str {
        match self {
            ArithCastVariant::ExtUI => "extui",
            ArithCastVariant::ExtSI => "extsi",
            ArithCastVariant::TruncI => "trunci",
        }
    }

    pub fn evaluate(&self, operand: &BvConst, to: BitVecType) -> BvConst {
        match self {
            ArithCastVariant::ExtUI => operand.uext(to),
            ArithCastVariant::ExtSI => operand.sext(to),
            ArithCastVariant::TruncI => BvConst::wrapping(to, operand.value().clone()),
        }
    }
}

/// Width change; extensions must widen and truncation must narrow.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct ArithCast {
    pub dest: Value,
    pub variant: ArithCastVariant,
    pub ty: Type,
    pub operand: Operand,
}

instruction_impl!(
    ArithCast,
    flags: |_this| InstructionFlags::ARITH | InstructionFlags::ELEMENTWISE,
    operands: [operand],
    result: |this| this.ty.clone()
);

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct ArithConstant {
    pub dest: Value,
    pub value: BvConst,
}

impl Instruction for ArithConstant {
    fn flags(&self) -> InstructionFlags {
        InstructionFlags::ARITH
    }

    fn operands(&self) -> impl Iterator<Item = &Operand> {
        std::iter::empty()
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        std::iter::empty()
    }

    fn destination(&self) -> Option<Value> {
        Some(self.dest)
    }

    fn destination_type(&self) -> Option<Type> {
        Some(Type::BitVec(self.value.ty()))
    }

    fn set_destination(&mut self, value: Value) {
        self.dest = value;
    }
}
