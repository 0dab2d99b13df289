use auto_enums::auto_enum;
use bitflags::bitflags;
use strum::{EnumDiscriminants, EnumIs, EnumIter, EnumTryAs, IntoEnumIterator};

use crate::{
    attributes::Attributes,
    modules::operand::{Operand, Value},
    types::Type,
};

pub mod arith;
pub mod array;
pub mod bv;
pub mod meta;

bitflags! {
    /// Flags providing additional information about instructions, such as
    /// whether it is an assertion, whether it introduces nondeterminism, or
    /// which array representation it manipulates.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct InstructionFlags: u32 {
        /// Assertion-like instruction (constraint, bad, assert_not).
        ///
        /// Those produce no value and are the observable effects of a model.
        /// Liveness treats them as roots.
        const META = 1 << 0;

        /// Instruction is a pure scalar computation that can be broadcast
        /// over a vector of its operand type once lowered.
        const ELEMENTWISE = 1 << 1;

        /// Instruction yields an externally chosen value (input, nd_state,
        /// nd_array, uninitialized arrays).
        const NONDET = 1 << 2;

        /// Instruction manipulates an abstract `!btor.array`.
        const ARRAY = 1 << 3;

        /// Instruction manipulates a vector-backed array.
        const VECTOR = 1 << 4;

        /// Instruction manipulates a memory-backed array.
        const MEMORY = 1 << 5;

        /// Instruction belongs to the generic `arith` dialect.
        const ARITH = 1 << 6;
    }
}

/// Common interface implemented by every instruction node.
///
/// This trait provides lightweight, zero-allocation iteration over an
/// instruction's operands and exposes its destination value when present.
pub trait Instruction {
    fn flags(&self) -> InstructionFlags;

    /// Returns true if this instruction is an assertion, see [`InstructionFlags::META`].
    #[inline]
    fn is_meta_instruction(&self) -> bool {
        self.flags().contains(InstructionFlags::META)
    }

    /// Returns true if this instruction introduces a nondeterministic value.
    #[inline]
    fn is_nondet(&self) -> bool {
        self.flags().contains(InstructionFlags::NONDET)
    }

    /// Iterate over all operands for this instruction.
    fn operands(&self) -> impl Iterator<Item = &Operand>;

    /// Mutably iterate over all operands for this instruction.
    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand>;

    /// Return the destination value if the instruction produces a result.
    fn destination(&self) -> Option<Value> {
        None
    }

    /// Type of the destination value if the instruction produces a result.
    fn destination_type(&self) -> Option<Type> {
        None
    }

    /// Update the destination value for this instruction. No-op if the
    /// instruction does not produce a result.
    fn set_destination(&mut self, _value: Value) {}

    /// Convenience iterator over the values read by this instruction.
    fn dependencies(&self) -> impl Iterator<Item = Value> {
        self.operands().map(|op| op.value)
    }

    /// Remap operands according to a mapping.
    fn remap_operands(&mut self, mapping: impl Fn(Value) -> Option<Value>) {
        for operand in self.operands_mut() {
            if let Some(new_value) = mapping(operand.value) {
                operand.value = new_value;
            }
        }
    }
}

/// Implements [`Instruction`] for an instruction struct with a `dest` field
/// and a fixed list of operand fields.
macro_rules! instruction_impl {
    (
        $name:ident,
        flags: |$fs:ident| $flags:expr,
        operands: [$($field:ident),+],
        result: |$this:ident| $result:expr
    ) => {
        impl $crate::modules::instructions::Instruction for $name {
            fn flags(&self) -> $crate::modules::instructions::InstructionFlags {
                let $fs = self;
                $flags
            }

            fn operands(&self) -> impl Iterator<Item = &Operand> {
                [$(&self.$field),+].into_iter()
            }

            fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
                [$(&mut self.$field),+].into_iter()
            }

            fn destination(&self) -> Option<Value> {
                Some(self.dest)
            }

            fn destination_type(&self) -> Option<Type> {
                let $this = self;
                Some($result)
            }

            fn set_destination(&mut self, value: Value) {
                self.dest = value;
            }
        }
    };
}

pub(crate) use instruction_impl;

/// Where the elements of an array live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum ArrayStorage {
    /// `!btor.array<I, E>`
    Abstract,
    /// `vector<N x E>`
    Vector,
    /// `memref<N x E>`
    Memory,
}

impl ArrayStorage {
    /// Flag carried by instructions working on this storage.
    pub fn flag(&self) -> InstructionFlags {
        match self {
            ArrayStorage::Abstract => InstructionFlags::ARRAY,
            ArrayStorage::Vector => InstructionFlags::VECTOR,
            ArrayStorage::Memory => InstructionFlags::MEMORY,
        }
    }

    /// Storage of `ty`, or `None` for bit-vectors.
    pub fn of_type(ty: &Type) -> Option<Self> {
        match ty {
            Type::BitVec(_) => None,
            Type::Array(_) => Some(ArrayStorage::Abstract),
            Type::Vector(_) => Some(ArrayStorage::Vector),
            Type::Memory(_) => Some(ArrayStorage::Memory),
        }
    }

    /// Returns true when `ty` is an array of this storage.
    pub fn matches(&self, ty: &Type) -> bool {
        matches!(
            (self, ty),
            (ArrayStorage::Abstract, Type::Array(_))
                | (ArrayStorage::Vector, Type::Vector(_))
                | (ArrayStorage::Memory, Type::Memory(_))
        )
    }

    pub fn describe(&self) -> &'static str {
        match self {
            ArrayStorage::Abstract => "abstract array",
            ArrayStorage::Vector => "vector array",
            ArrayStorage::Memory => "memory array",
        }
    }
}

/// Every instruction of the `btor` dialect.
///
/// The generated [`BtorOp`] discriminant identifies the family of an
/// instruction; the exact mnemonic is given by [`BtorInstr::opname`].
#[derive(Debug, Clone, Hash, PartialEq, Eq, EnumIs, EnumTryAs, EnumDiscriminants)]
#[strum_discriminants(name(BtorOp), derive(EnumIter, Hash))]
pub enum BtorInstr {
    Binary(bv::BvBinary),
    Overflow(bv::BvOverflow),
    Logic(bv::BvLogic),
    Cmp(bv::BvCmp),
    Unary(bv::BvUnary),
    Reduce(bv::BvReduce),
    Ext(bv::BvExt),
    Slice(bv::BvSlice),
    Concat(bv::BvConcat),
    Ite(bv::BvIte),
    Constant(bv::BvConstant),
    Source(bv::BvSource),

    NdArray(array::NdArray),
    ArrayInit(array::ArrayInit),
    Read(array::ArrayRead),
    Write(array::ArrayWrite),
    IteWriteInPlace(array::IteWriteInPlace),

    Assert(meta::BtorAssert),
}

impl BtorOp {
    /// Every mnemonic of this family, without the dialect prefix.
    pub fn opnames(&self) -> Vec<&'static str> {
        match self {
            BtorOp::Binary => bv::BinaryVariant::iter().map(|v| v.to_str()).collect(),
            BtorOp::Overflow => bv::OverflowVariant::iter().map(|v| v.to_str()).collect(),
            BtorOp::Logic => bv::LogicVariant::iter().map(|v| v.to_str()).collect(),
            BtorOp::Cmp => vec!["cmp"],
            BtorOp::Unary => bv::UnaryVariant::iter().map(|v| v.to_str()).collect(),
            BtorOp::Reduce => bv::ReduceVariant::iter().map(|v| v.to_str()).collect(),
            BtorOp::Ext => bv::ExtVariant::iter().map(|v| v.to_str()).collect(),
            BtorOp::Slice => vec!["slice"],
            BtorOp::Concat => vec!["concat"],
            BtorOp::Ite => vec!["ite"],
            BtorOp::Constant => vec!["constant"],
            BtorOp::Source => bv::SourceVariant::iter().map(|v| v.to_str()).collect(),
            BtorOp::NdArray => vec!["nd_array"],
            BtorOp::ArrayInit => array::InitVariant::iter().map(|v| v.to_str()).collect(),
            BtorOp::Read => array::ReadVariant::iter().map(|v| v.to_str()).collect(),
            BtorOp::Write => array::WriteVariant::iter().map(|v| v.to_str()).collect(),
            BtorOp::IteWriteInPlace => vec!["ite_write_in_place"],
            BtorOp::Assert => meta::AssertVariant::iter().map(|v| v.to_str()).collect(),
        }
    }

    /// Every mnemonic of the dialect.
    pub fn all_opnames() -> Vec<&'static str> {
        BtorOp::iter().flat_map(|op| op.opnames()).collect()
    }
}

impl BtorInstr {
    /// Return the discriminant for this instruction value.
    pub fn op(&self) -> BtorOp {
        self.into()
    }

    /// Return the mnemonic used when printing this instruction, without the
    /// `btor.` prefix.
    pub fn opname(&self) -> &'static str {
        match self {
            BtorInstr::Binary(i) => i.variant.to_str(),
            BtorInstr::Overflow(i) => i.variant.to_str(),
            BtorInstr::Logic(i) => i.variant.to_str(),
            BtorInstr::Cmp(_) => "cmp",
            BtorInstr::Unary(i) => i.variant.to_str(),
            BtorInstr::Reduce(i) => i.variant.to_str(),
            BtorInstr::Ext(i) => i.variant.to_str(),
            BtorInstr::Slice(_) => "slice",
            BtorInstr::Concat(_) => "concat",
            BtorInstr::Ite(_) => "ite",
            BtorInstr::Constant(_) => "constant",
            BtorInstr::Source(i) => i.variant.to_str(),
            BtorInstr::NdArray(_) => "nd_array",
            BtorInstr::ArrayInit(i) => i.variant.to_str(),
            BtorInstr::Read(i) => i.variant.to_str(),
            BtorInstr::Write(i) => i.variant.to_str(),
            BtorInstr::IteWriteInPlace(_) => "ite_write_in_place",
            BtorInstr::Assert(i) => i.variant.to_str(),
        }
    }
}

/// Instructions of the generic `arith` dialect, produced by the
/// arithmetic lowering.
#[derive(Debug, Clone, Hash, PartialEq, Eq, EnumIs, EnumTryAs, EnumDiscriminants)]
#[strum_discriminants(name(ArithOp), derive(EnumIter, Hash))]
pub enum ArithInstr {
    Binary(arith::ArithBinary),
    Cmp(arith::ArithCmp),
    Select(arith::ArithSelect),
    Cast(arith::ArithCast),
    Constant(arith::ArithConstant),
}

impl ArithInstr {
    pub fn op(&self) -> ArithOp {
        self.into()
    }

    /// Mnemonic without the `arith.` prefix.
    pub fn opname(&self) -> &'static str {
        match self {
            ArithInstr::Binary(i) => i.variant.to_str(),
            ArithInstr::Cmp(_) => "cmpi",
            ArithInstr::Select(_) => "select",
            ArithInstr::Cast(i) => i.variant.to_str(),
            ArithInstr::Constant(_) => "constant",
        }
    }
}

/// Any instruction of either dialect.
#[derive(Debug, Clone, Hash, PartialEq, Eq, EnumIs, EnumTryAs)]
pub enum AnyInstr {
    Btor(BtorInstr),
    Arith(ArithInstr),
}

impl AnyInstr {
    /// Dialect prefix printed before the mnemonic.
    pub fn dialect(&self) -> &'static str {
        match self {
            AnyInstr::Btor(_) => "btor",
            AnyInstr::Arith(_) => "arith",
        }
    }

    pub fn opname(&self) -> &'static str {
        match self {
            AnyInstr::Btor(i) => i.opname(),
            AnyInstr::Arith(i) => i.opname(),
        }
    }

    /// Fully qualified mnemonic, e.g. `btor.add`.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.dialect(), self.opname())
    }
}

macro_rules! define_instr_delegation {
    (
        $enum:ident { $($variant:ident),* $(,)? }
    ) => {
        impl Instruction for $enum {
            fn flags(&self) -> InstructionFlags {
                match self {
                    $(
                        $enum::$variant(instr) => instr.flags(),
                    )*
                }
            }

            #[auto_enum(Iterator)]
            fn operands(&self) -> impl Iterator<Item = &Operand> {
                match self {
                    $(
                        $enum::$variant(instr) => instr.operands(),
                    )*
                }
            }

            #[auto_enum(Iterator)]
            fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
                match self {
                    $(
                        $enum::$variant(instr) => instr.operands_mut(),
                    )*
                }
            }

            fn destination(&self) -> Option<Value> {
                match self {
                    $(
                        $enum::$variant(instr) => instr.destination(),
                    )*
                }
            }

            fn destination_type(&self) -> Option<Type> {
                match self {
                    $(
                        $enum::$variant(instr) => instr.destination_type(),
                    )*
                }
            }

            fn set_destination(&mut self, value: Value) {
                match self {
                    $(
                        $enum::$variant(instr) => instr.set_destination(value),
                    )*
                }
            }
        }
    };
}

define_instr_delegation! {
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

define_instr_delegation! {
    ArithInstr {
        Binary,
        Cmp,
        Select,
        Cast,
        Constant,
    }
}

define_instr_delegation! {
    AnyInstr {
        Btor,
        Arith,
    }
}

macro_rules! define_instr_from {
    ($enum:ident, $typ:ty, $variant:ident) => {
        impl From<$typ> for $enum {
            fn from(inst: $typ) -> Self {
                $enum::$variant(inst)
            }
        }

        impl From<$typ> for AnyInstr {
            fn from(inst: $typ) -> Self {
                AnyInstr::from($enum::$variant(inst))
            }
        }
    };
}

impl From<BtorInstr> for AnyInstr {
    fn from(inst: BtorInstr) -> Self {
        AnyInstr::Btor(inst)
    }
}

impl From<ArithInstr> for AnyInstr {
    fn from(inst: ArithInstr) -> Self {
        AnyInstr::Arith(inst)
    }
}

define_instr_from!(BtorInstr, bv::BvBinary, Binary);
define_instr_from!(BtorInstr, bv::BvOverflow, Overflow);
define_instr_from!(BtorInstr, bv::BvLogic, Logic);
define_instr_from!(BtorInstr, bv::BvCmp, Cmp);
define_instr_from!(BtorInstr, bv::BvUnary, Unary);
define_instr_from!(BtorInstr, bv::BvReduce, Reduce);
define_instr_from!(BtorInstr, bv::BvExt, Ext);
define_instr_from!(BtorInstr, bv::BvSlice, Slice);
define_instr_from!(BtorInstr, bv::BvConcat, Concat);
define_instr_from!(BtorInstr, bv::BvIte, Ite);
define_instr_from!(BtorInstr, bv::BvConstant, Constant);
define_instr_from!(BtorInstr, bv::BvSource, Source);
define_instr_from!(BtorInstr, array::NdArray, NdArray);
define_instr_from!(BtorInstr, array::ArrayInit, ArrayInit);
define_instr_from!(BtorInstr, array::ArrayRead, Read);
define_instr_from!(BtorInstr, array::ArrayWrite, Write);
define_instr_from!(BtorInstr, array::IteWriteInPlace, IteWriteInPlace);
define_instr_from!(BtorInstr, meta::BtorAssert, Assert);

define_instr_from!(ArithInstr, arith::ArithBinary, Binary);
define_instr_from!(ArithInstr, arith::ArithCmp, Cmp);
define_instr_from!(ArithInstr, arith::ArithSelect, Select);
define_instr_from!(ArithInstr, arith::ArithCast, Cast);
define_instr_from!(ArithInstr, arith::ArithConstant, Constant);

/// An instruction together with its discardable attributes.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct Operation {
    pub instr: AnyInstr,
    pub attrs: Attributes,
}

impl Operation {
    pub fn new(instr: impl Into<AnyInstr>) -> Self {
        Self {
            instr: instr.into(),
            attrs: Attributes::default(),
        }
    }

    pub fn with_attrs(mut self, attrs: Attributes) -> Self {
        self.attrs = attrs;
        self
    }

    pub fn as_btor(&self) -> Option<&BtorInstr> {
        match &self.instr {
            AnyInstr::Btor(instr) => Some(instr),
            AnyInstr::Arith(_) => None,
        }
    }

    pub fn as_arith(&self) -> Option<&ArithInstr> {
        match &self.instr {
            AnyInstr::Arith(instr) => Some(instr),
            AnyInstr::Btor(_) => None,
        }
    }
}

impl Instruction for Operation {
    fn flags(&self) -> InstructionFlags {
        self.instr.flags()
    }

    fn operands(&self) -> impl Iterator<Item = &Operand> {
        self.instr.operands()
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        self.instr.operands_mut()
    }

    fn destination(&self) -> Option<Value> {
        self.instr.destination()
    }

    fn destination_type(&self) -> Option<Type> {
        self.instr.destination_type()
    }

    fn set_destination(&mut self, value: Value) {
        self.instr.set_destination(value)
    }
}
