//! SSA values and typed operands.
//!
//! A [`Value`] names the result of exactly one operation (or a state
//! parameter of the `next` block). Uses refer to it through an [`Operand`],
//! which also records the type the use expects. Operands never own their
//! producer, they are plain identifiers into the enclosing model.
use crate::types::Type;

/// SSA value identifier, printed as `%N`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Value(pub u32);

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Use of a value together with its declared type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Operand {
    pub value: Value,
    pub ty: Type,
}

impl Operand {
    pub fn new(value: Value, ty: impl Into<Type>) -> Self {
        Self {
            value,
            ty: ty.into(),
        }
    }

    /// Width of the operand when it is a bit-vector.
    pub fn width(&self) -> Option<u32> {
        self.ty.as_bitvec().map(|bv| bv.width())
    }
}
