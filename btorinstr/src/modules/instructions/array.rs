//! Array instructions
//!
//! Arrays are SSA values. A `write` yields a new array and leaves every other
//! reference to its base untouched; `write_in_place` and
//! `ite_write_in_place` promise that no other use of the base survives, which
//! licenses a destructive update once lowered to memory.
//!
//! The `_vec` and `_mem` variants are the same operations over
//! vector- and memory-backed arrays, produced by the array lowerings.
use strum::{EnumIter, IntoEnumIterator};

use crate::{
    modules::{
        instructions::{ArrayStorage, Instruction, InstructionFlags, instruction_impl},
        operand::{Operand, Value},
    },
    types::Type,
};

/// Unconstrained array tagged with a source id.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct NdArray {
    pub dest: Value,
    pub ty: Type,
    pub id: u64,
}

impl Instruction for NdArray {
    fn flags(&self) -> InstructionFlags {
        InstructionFlags::NONDET | InstructionFlags::ARRAY
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
pub enum InitVariant {
    Array,
    ArrayVec,
    ArrayMem,
}

impl InitVariant {
    pub fn from_str(s: &str) -> Option<Self> {
        InitVariant::iter().find(|op| op.to_str() == s)
    }

    pub fn to_str(&self) -> &'static str {
        match self {
            InitVariant::Array => "array",
            InitVariant::ArrayVec => "array_vec",
            InitVariant::ArrayMem => "array_mem",
        }
    }

    pub fn storage(&self) -> ArrayStorage {
        match self {
            InitVariant::Array => ArrayStorage::Abstract,
            InitVariant::ArrayVec => ArrayStorage::Vector,
            InitVariant::ArrayMem => ArrayStorage::Memory,
        }
    }

    pub fn for_storage(storage: ArrayStorage) -> Self {
        match storage {
            ArrayStorage::Abstract => InitVariant::Array,
            ArrayStorage::Vector => InitVariant::ArrayVec,
            ArrayStorage::Memory => InitVariant::ArrayMem,
        }
    }
}

/// Array mapping every index to `init`.
///
/// The abstract form requires an initial value. The vector and memory forms
/// accept none, in which case the contents are unconstrained.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct ArrayInit {
    pub dest: Value,
    pub variant: InitVariant,
    pub ty: Type,
    pub init: Option<Operand>,
}

impl Instruction for ArrayInit {
    fn flags(&self) -> InstructionFlags {
        let flags = self.variant.storage().flag();
        if self.init.is_none() {
            flags | InstructionFlags::NONDET
        } else {
            flags
        }
    }

    fn operands(&self) -> impl Iterator<Item = &Operand> {
        self.init.iter()
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        self.init.iter_mut()
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
pub enum ReadVariant {
    Read,
    ReadVec,
    ReadMem,
}

impl ReadVariant {
    pub fn from_str(s: &str) -> Option<Self> {
        ReadVariant::iter().find(|op| op.to_str() == s)
    }

    pub fn to_str(&self) -> &'static str {
        match self {
            ReadVariant::Read => "read",
            ReadVariant::ReadVec => "read_vec",
            ReadVariant::ReadMem => "read_mem",
        }
    }

    pub fn storage(&self) -> ArrayStorage {
        match self {
            ReadVariant::Read => ArrayStorage::Abstract,
            ReadVariant::ReadVec => ArrayStorage::Vector,
            ReadVariant::ReadMem => ArrayStorage::Memory,
        }
    }

    pub fn for_storage(storage: ArrayStorage) -> Self {
        match storage {
            ArrayStorage::Abstract => ReadVariant::Read,
            ArrayStorage::Vector => ReadVariant::ReadVec,
            ArrayStorage::Memory => ReadVariant::ReadMem,
        }
    }
}

/// Element of `base` at `index`.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct ArrayRead {
    pub dest: Value,
    pub variant: ReadVariant,
    pub ty: Type,
    pub base: Operand,
    pub index: Operand,
}

impl ArrayRead {
    fn flags_impl(&self) -> InstructionFlags {
        self.variant.storage().flag()
    }
}

instruction_impl!(
    ArrayRead,
    flags: |this| this.flags_impl(),
    operands: [base, index],
    result: |this| this.ty.clone()
);

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, EnumIter)]
pub enum WriteVariant {
    Write,
    WriteInPlace,
    WriteVec,
    WriteMem,
}

impl WriteVariant {
    pub fn from_str(s: &str) -> Option<Self> {
        WriteVariant::iter().find(|op| op.to_str() == s)
    }

    pub fn to_str(&self) -> &'static str {
        match self {
            WriteVariant::Write => "write",
            WriteVariant::WriteInPlace => "write_in_place",
            WriteVariant::WriteVec => "write_vec",
            WriteVariant::WriteMem => "write_mem",
        }
    }

    pub fn storage(&self) -> ArrayStorage {
        match self {
            WriteVariant::Write | WriteVariant::WriteInPlace => ArrayStorage::Abstract,
            WriteVariant::WriteVec => ArrayStorage::Vector,
            WriteVariant::WriteMem => ArrayStorage::Memory,
        }
    }

    /// Returns true when the base is known to have no surviving alias.
    pub fn is_in_place(&self) -> bool {
        matches!(self, WriteVariant::WriteInPlace | WriteVariant::WriteMem)
    }
}

/// Copy of `base` where `index` now holds `value`.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct ArrayWrite {
    pub dest: Value,
    pub variant: WriteVariant,
    pub ty: Type,
    pub value: Operand,
    pub base: Operand,
    pub index: Operand,
}

impl ArrayWrite {
    fn flags_impl(&self) -> InstructionFlags {
        self.variant.storage().flag()
    }
}

instruction_impl!(
    ArrayWrite,
    flags: |this| this.flags_impl(),
    operands: [value, base, index],
    result: |this| this.ty.clone()
);

/// In-place write performed only when `cond` holds; otherwise the base is
/// returned unchanged.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct IteWriteInPlace {
    pub dest: Value,
    pub ty: Type,
    pub cond: Operand,
    pub value: Operand,
    pub base: Operand,
    pub index: Operand,
}

instruction_impl!(
    IteWriteInPlace,
    flags: |_this| InstructionFlags::ARRAY,
    operands: [cond, value, base, index],
    result: |this| this.ty.clone()
);
