//! Bit-vector instructions
//!
//! Arithmetic, bitwise, comparison, cast, slice/concat, select, constants
//! and nondeterministic sources over fixed-width bit-vectors. Each
//! instruction carries its destination [`Value`], its operands and, when
//! the result type is not implied by the family, its declared result type.
use strum::{EnumIter, IntoEnumIterator};

use crate::{
    consts::BvConst,
    modules::{
        instructions::{ArrayStorage, InstructionFlags, instruction_impl},
        operand::{Operand, Value},
    },
    types::{BitVecType, Type},
};

/// Binary operations whose operands and result share one type.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, EnumIter)]
pub enum BinaryVariant {
    Add,
    Sub,
    Mul,
    SDiv,
    UDiv,
    SRem,
    URem,
    SMod,
    Or,
    Nor,
    And,
    Nand,
    Xor,
    Xnor,
    /// Logical shift left
    Sll,
    /// Logical shift right
    Srl,
    /// Arithmetic shift right
    Sra,
    /// Rotate left
    Rol,
    /// Rotate right
    Ror,
}

impl BinaryVariant {
    /// Creates a [`BinaryVariant`] from its string representation.
    pub fn from_str(s: &str) -> Option<Self> {
        BinaryVariant::iter().find(|op| op.to_str() == s)
    }

    /// Returns the string representation of the [`BinaryVariant`].
    pub fn to_str(&self) -> &'static str {
        match self {
            BinaryVariant::Add => "add",
            BinaryVariant::Sub => "sub",
            BinaryVariant::Mul => "mul",
            BinaryVariant::SDiv => "sdiv",
            BinaryVariant::UDiv => "udiv",
            BinaryVariant::SRem => "srem",
            BinaryVariant::URem => "urem",
            BinaryVariant::SMod => "smod",
            BinaryVariant::Or => "or",
            BinaryVariant::Nor => "nor",
            BinaryVariant::And => "and",
            BinaryVariant::Nand => "nand",
            BinaryVariant::Xor => "xor",
            BinaryVariant::Xnor => "xnor",
            BinaryVariant::Sll => "sll",
            BinaryVariant::Srl => "srl",
            BinaryVariant::Sra => "sra",
            BinaryVariant::Rol => "rol",
            BinaryVariant::Ror => "ror",
        }
    }

    /// Evaluates the operation on two literals of the same width.
    pub fn evaluate(&self, lhs: &BvConst, rhs: &BvConst) -> BvConst {
        match self {
            BinaryVariant::Add => lhs.add(rhs),
            BinaryVariant::Sub => lhs.sub(rhs),
            BinaryVariant::Mul => lhs.mul(rhs),
            BinaryVariant::SDiv => lhs.sdiv(rhs),
            BinaryVariant::UDiv => lhs.udiv(rhs),
            BinaryVariant::SRem => lhs.srem(rhs),
            BinaryVariant::URem => lhs.urem(rhs),
            BinaryVariant::SMod => lhs.smod(rhs),
            BinaryVariant::Or => lhs.or(rhs),
            BinaryVariant::Nor => lhs.or(rhs).not(),
            BinaryVariant::And => lhs.and(rhs),
            BinaryVariant::Nand => lhs.and(rhs).not(),
            BinaryVariant::Xor => lhs.xor(rhs),
            BinaryVariant::Xnor => lhs.xor(rhs).not(),
            BinaryVariant::Sll => lhs.sll(rhs),
            BinaryVariant::Srl => lhs.srl(rhs),
            BinaryVariant::Sra => lhs.sra(rhs),
            BinaryVariant::Rol => lhs.rol(rhs),
            BinaryVariant::Ror => lhs.ror(rhs),
        }
    }
}

/// Binary operation of the [`BinaryVariant`] family.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct BvBinary {
    pub dest: Value,
    pub variant: BinaryVariant,
    pub ty: Type,
    pub lhs: Operand,
    pub rhs: Operand,
}

instruction_impl!(
    BvBinary,
    flags: |_this| InstructionFlags::ELEMENTWISE,
    operands: [lhs, rhs],
    result: |this| this.ty.clone()
);

/// Overflow predicates; the result is `1` iff the corresponding operation
/// does not fit the operand width under the given signedness.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, EnumIter)]
pub enum OverflowVariant {
    SAddO,
    UAddO,
    SSubO,
    USubO,
    SMulO,
    UMulO,
    SDivO,
    UDivO,
}

impl OverflowVariant {
    pub fn from_str(s: &str) -> Option<Self> {
        OverflowVariant::iter().find(|op| op.to_str() == s)
    }

    pub fn to_str(&self) -> &'static str {
        match self {
            OverflowVariant::SAddO => "saddo",
            OverflowVariant::UAddO => "uaddo",
            OverflowVariant::SSubO => "ssubo",
            OverflowVariant::USubO => "usubo",
            OverflowVariant::SMulO => "smulo",
            OverflowVariant::UMulO => "umulo",
            OverflowVariant::SDivO => "sdivo",
            OverflowVariant::UDivO => "udivo",
        }
    }

    pub fn evaluate(&self, lhs: &BvConst, rhs: &BvConst) -> bool {
        match self {
            OverflowVariant::SAddO => lhs.saddo(rhs),
            OverflowVariant::UAddO => lhs.uaddo(rhs),
            OverflowVariant::SSubO => lhs.ssubo(rhs),
            OverflowVariant::USubO => lhs.usubo(rhs),
            OverflowVariant::SMulO => lhs.smulo(rhs),
            OverflowVariant::UMulO => lhs.umulo(rhs),
            OverflowVariant::SDivO => lhs.sdivo(rhs),
            OverflowVariant::UDivO => lhs.udivo(rhs),
        }
    }
}

/// Overflow flag of a binary operation, always `!btor.bv<1>`.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct BvOverflow {
    pub dest: Value,
    pub variant: OverflowVariant,
    pub lhs: Operand,
    pub rhs: Operand,
}

instruction_impl!(
    BvOverflow,
    flags: |_this| InstructionFlags::ELEMENTWISE,
    operands: [lhs, rhs],
    result: |_this| Type::BitVec(BitVecType::BOOL)
);

/// Boolean connectives over `!btor.bv<1>`.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, EnumIter)]
pub enum LogicVariant {
    Iff,
    Implies,
}

impl LogicVariant {
    pub fn from_str(s: &str) -> Option<Self> {
        LogicVariant::iter().find(|op| op.to_str() == s)
    }

    pub fn to_str(&self) -> &'static str {
        match self {
            LogicVariant::Iff => "iff",
            LogicVariant::Implies => "implies",
        }
    }

    pub fn evaluate(&self, lhs: bool, rhs: bool) -> bool {
        match self {
            LogicVariant::Iff => lhs == rhs,
            LogicVariant::Implies => !lhs || rhs,
        }
    }
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct BvLogic {
    pub dest: Value,
    pub variant: LogicVariant,
    pub lhs: Operand,
    pub rhs: Operand,
}

instruction_impl!(
    BvLogic,
    flags: |_this| InstructionFlags::ELEMENTWISE,
    operands: [lhs, rhs],
    result: |_this| Type::BitVec(BitVecType::BOOL)
);

/// Comparison predicates, shared by `btor.cmp` and `arith.cmpi`.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, EnumIter)]
pub enum CmpPredicate {
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
    Ult,
    Ule,
    Ugt,
    Uge,
}

impl CmpPredicate {
    pub fn from_str(s: &str) -> Option<Self> {
        CmpPredicate::iter().find(|op| op.to_str() == s)
    }

    pub fn to_str(&self) -> &'static str {
        match self {
            CmpPredicate::Eq => "eq",
            CmpPredicate::Ne => "ne",
            CmpPredicate::Slt => "slt",
            CmpPredicate::Sle => "sle",
            CmpPredicate::Sgt => "sgt",
            CmpPredicate::Sge => "sge",
            CmpPredicate::Ult => "ult",
            CmpPredicate::Ule => "ule",
            CmpPredicate::Ugt => "ugt",
            CmpPredicate::Uge => "uge",
        }
    }

    pub fn evaluate(&self, lhs: &BvConst, rhs: &BvConst) -> bool {
        match self {
            CmpPredicate::Eq => lhs == rhs,
            CmpPredicate::Ne => lhs != rhs,
            CmpPredicate::Slt => lhs.slt(rhs),
            CmpPredicate::Sle => !rhs.slt(lhs),
            CmpPredicate::Sgt => rhs.slt(lhs),
            CmpPredicate::Sge => !lhs.slt(rhs),
            CmpPredicate::Ult => lhs.ult(rhs),
            CmpPredicate::Ule => !rhs.ult(lhs),
            CmpPredicate::Ugt => rhs.ult(lhs),
            CmpPredicate::Uge => !lhs.ult(rhs),
        }
    }
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct BvCmp {
    pub dest: Value,
    pub predicate: CmpPredicate,
    pub lhs: Operand,
    pub rhs: Operand,
}

instruction_impl!(
    BvCmp,
    flags: |_this| InstructionFlags::ELEMENTWISE,
    operands: [lhs, rhs],
    result: |_this| Type::BitVec(BitVecType::BOOL)
);

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, EnumIter)]
pub enum UnaryVariant {
    Not,
    Inc,
    Dec,
    Neg,
}

impl UnaryVariant {
    pub fn from_str(s: &str) -> Option<Self> {
        UnaryVariant::iter().find(|op| op.to_str() == s)
    }

    pub fn to_str(&self) -> &'static str {
        match self {
            UnaryVariant::Not => "not",
            UnaryVariant::Inc => "inc",
            UnaryVariant::Dec => "dec",
            UnaryVariant::Neg => "neg",
        }
    }

    pub fn evaluate(&self, operand: &BvConst) -> BvConst {
        match self {
            UnaryVariant::Not => operand.not(),
            UnaryVariant::Inc => operand.inc(),
            UnaryVariant::Dec => operand.dec(),
            UnaryVariant::Neg => operand.neg(),
        }
    }
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct BvUnary {
    pub dest: Value,
    pub variant: UnaryVariant,
    pub ty: Type,
    pub operand: Operand,
}

instruction_impl!(
    BvUnary,
    flags: |_this| InstructionFlags::ELEMENTWISE,
    operands: [operand],
    result: |this| this.ty.clone()
);

/// Reductions across all bits of the operand.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, EnumIter)]
pub enum ReduceVariant {
    RedAnd,
    RedOr,
    RedXor,
}

impl ReduceVariant {
    pub fn from_str(s: &str) -> Option<Self> {
        ReduceVariant::iter().find(|op| op.to_str() == s)
    }

    pub fn to_str(&self) -> &'static str {
        match self {
            ReduceVariant::RedAnd => "redand",
            ReduceVariant::RedOr => "redor",
            ReduceVariant::RedXor => "redxor",
        }
    }

    pub fn evaluate(&self, operand: &BvConst) -> bool {
        match self {
            ReduceVariant::RedAnd => operand.redand(),
            ReduceVariant::RedOr => operand.redor(),
            ReduceVariant::RedXor => operand.redxor(),
        }
    }
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct BvReduce {
    pub dest: Value,
    pub variant: ReduceVariant,
    pub operand: Operand,
}

instruction_impl!(
    BvReduce,
    flags: |_this| InstructionFlags::ELEMENTWISE,
    operands: [operand],
    result: |_this| Type::BitVec(BitVecType::BOOL)
);

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, EnumIter)]
pub enum ExtVariant {
    /// Zero-fill the high bits
    UExt,
    /// Replicate the sign bit into the high bits
    SExt,
}

impl ExtVariant {
    pub fn from_str(s: &str) -> Option<Self> {
        ExtVariant::iter().find(|op| op.to_str() == s)
    }

    pub fn to_str(&self) -> &'static str {
        match self {
            ExtVariant::UExt => "uext",
            ExtVariant::SExt => "sext",
        }
    }

    pub fn evaluate(&self, operand: &BvConst, to: BitVecType) -> BvConst {
        match self {
            ExtVariant::UExt => operand.uext(to),
            ExtVariant::SExt => operand.sext(to),
        }
    }
}

/// Extension to a strictly wider type.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct BvExt {
    pub dest: Value,
    pub variant: ExtVariant,
    pub ty: Type,
    pub operand: Operand,
}

instruction_impl!(
    BvExt,
    flags: |_this| InstructionFlags::ELEMENTWISE,
    operands: [operand],
    result: |this| this.ty.clone()
);

/// Bits `upper..=lower` of `operand`. Both bounds are runtime values of the
/// operand type.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct BvSlice {
    pub dest: Value,
    pub ty: Type,
    pub operand: Operand,
    pub upper: Operand,
    pub lower: Operand,
}

instruction_impl!(
    BvSlice,
    flags: |_this| InstructionFlags::ELEMENTWISE,
    operands: [operand, upper, lower],
    result: |this| this.ty.clone()
);

/// `lhs` occupies the high-order bits, `rhs` the low-order bits.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct BvConcat {
    pub dest: Value,
    pub ty: Type,
    pub lhs: Operand,
    pub rhs: Operand,
}

instruction_impl!(
    BvConcat,
    flags: |_this| InstructionFlags::ELEMENTWISE,
    operands: [lhs, rhs],
    result: |this| this.ty.clone()
);

/// If-then-else. The branches may be bit-vectors or arrays of any storage;
/// only the bit-vector form is elementwise.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct BvIte {
    pub dest: Value,
    pub ty: Type,
    pub cond: Operand,
    pub then_value: Operand,
    pub else_value: Operand,
}

instruction_impl!(
    BvIte,
    flags: |this| {
        ArrayStorage::of_type(&this.ty).map_or(InstructionFlags::ELEMENTWISE, |s| s.flag())
    },
    operands: [cond, then_value, else_value],
    result: |this| this.ty.clone()
);

/// Literal value. The literal width must equal the declared type width.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct BvConstant {
    pub dest: Value,
    pub ty: Type,
    pub value: BvConst,
}

impl crate::modules::instructions::Instruction for BvConstant {
    fn flags(&self) -> InstructionFlags {
        InstructionFlags::empty()
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
        Some(self.ty.clone())
    }

    fn set_destination(&mut self, value: Value) {
        self.dest = value;
    }
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, EnumIter)]
pub enum SourceVariant {
    /// Value of the i-th model input
    Input,
    /// Unconstrained value of the i-th state element
    NdState,
}

impl SourceVariant {
    pub fn from_str(s: &str) -> Option<Self> {
        SourceVariant::iter().find(|op| op.to_str() == s)
    }

    pub fn to_str(&self) -> &'static str {
        match self {
            SourceVariant::Input => "input",
            SourceVariant::NdState => "nd_state",
        }
    }
}

/// Externally chosen bit-vector. The id is provenance only.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct BvSource {
    pub dest: Value,
    pub variant: SourceVariant,
    pub ty: Type,
    pub id: u64,
}

impl crate::modules::instructions::Instruction for BvSource {
    fn flags(&self) -> InstructionFlags {
        InstructionFlags::NONDET
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
        Some(self.ty.clone())
    }

    fn set_destination(&mut self, value: Value) {
        self.dest = value;
    }
}
