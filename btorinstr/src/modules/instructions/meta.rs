//! Assertion instructions
//!
//! `constraint` restricts the admissible traces of a model, `bad` and
//! `assert_not` flag a property violation. None of them produces a value.
use strum::{EnumIter, IntoEnumIterator};

use crate::modules::{
    instructions::{Instruction, InstructionFlags},
    operand::Operand,
};

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, EnumIter)]
pub enum AssertVariant {
    /// The condition must hold on every admissible step.
    Constraint,
    /// The model fails when the condition is true.
    Bad,
    /// The model fails when the condition is false.
    AssertNot,
}

impl AssertVariant {
    pub fn from_str(s: &str) -> Option<Self> {
        AssertVariant::iter().find(|op| op.to_str() == s)
    }

    pub fn to_str(&self) -> &'static str {
        match self {
            AssertVariant::Constraint => "constraint",
            AssertVariant::Bad => "bad",
            AssertVariant::AssertNot => "assert_not",
        }
    }

    /// Only `assert_not` carries a property id.
    pub fn has_id(&self) -> bool {
        matches!(self, AssertVariant::AssertNot)
    }

    /// Returns true when a step with `cond` violates the property.
    pub fn fails_on(&self, cond: bool) -> bool {
        match self {
            AssertVariant::Constraint => false,
            AssertVariant::Bad => cond,
            AssertVariant::AssertNot => !cond,
        }
    }
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct BtorAssert {
    pub variant: AssertVariant,
    pub cond: Operand,
    pub id: Option<u64>,
}

impl Instruction for BtorAssert {
    fn flags(&self) -> InstructionFlags {
        InstructionFlags::META
    }

    fn operands(&self) -> impl Iterator<Item = &Operand> {
        std::iter::once(&self.cond)
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        std::iter::once(&mut self.cond)
    }
}
