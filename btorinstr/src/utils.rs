use strum::{EnumIs, EnumTryAs};
use thiserror::Error;

use crate::{
    modules::{BlockKind, operand::Value},
    types::Type,
};

/// A single syntax error, located in the parsed source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParserError {
    /// Byte offset of the first offending character.
    pub start: usize,
    /// Byte offset one past the last offending character.
    pub end: usize,
    /// 1-based line of `start`.
    pub line: usize,
    /// 1-based column of `start`, in characters.
    pub column: usize,
    pub message: String,
}

impl ParserError {
    /// Builds an error for the byte range `start..end` of `source`.
    pub fn new(source: &str, start: usize, end: usize, message: impl Into<String>) -> Self {
        let start = start.min(source.len());
        let prefix = source.get(..start).unwrap_or(source);
        let line = prefix.matches('\n').count() + 1;
        let line_start = prefix.rfind('\n').map(|i| i + 1).unwrap_or(0);
        let column = prefix[line_start..].chars().count() + 1;
        Self {
            start,
            end: end.max(start),
            line,
            column,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ParserError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.message)
    }
}

fn sum_widths(lhs: &u32, rhs: &u32) -> u64 {
    *lhs as u64 + *rhs as u64
}

fn join_errors(errors: &[ParserError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, PartialEq, Eq, Hash, EnumIs, EnumTryAs, Error)]
pub enum Error {
    /// A value is defined more than once.
    #[error(
        "Multiple definitions of the same value violate SSA requirements. The value `{duplicate}` is defined more than once within the model."
    )]
    DuplicateValue { duplicate: Value },

    /// An operand refers to a value not visible at that point.
    #[error(
        "An operand of the `{block}` block refers to `{value}`, which is not defined before its use in that block."
    )]
    UndefinedValue { value: Value, block: BlockKind },

    /// An operand declares a type different from its definition.
    #[error(
        "The operand `{value}` is used with type `{declared}` but its definition has type `{defined}`."
    )]
    OperandTypeMismatch {
        value: Value,
        declared: Type,
        defined: Type,
    },

    /// Two types that must be equal are not.
    #[error("`{op}` requires {what} of type `{expected}`, but found `{found}`.")]
    TypeMismatch {
        op: &'static str,
        what: &'static str,
        expected: Type,
        found: Type,
    },

    /// A bit-vector was required.
    #[error("`{op}` requires {what} to be a bit-vector, but found `{found}`.")]
    ExpectedBitVec {
        op: &'static str,
        what: &'static str,
        found: Type,
    },

    /// An array of a given storage was required.
    #[error("`{op}` operates on {expected} values, but found `{found}`.")]
    ExpectedArrayKind {
        op: &'static str,
        expected: &'static str,
        found: Type,
    },

    /// Extension that does not widen.
    #[error(
        "`{op}` must produce a strictly wider bit-vector, but extends width {from} to width {to}."
    )]
    ExtNotWider { op: &'static str, from: u32, to: u32 },

    /// Arith cast that does not widen (extensions) or narrow (truncation).
    #[error("`{op}` cannot convert width {from} to width {to}.")]
    CastWidth { op: &'static str, from: u32, to: u32 },

    /// Slice result wider than its operand.
    #[error("`slice` of a {width}-bit operand cannot produce {result} bits.")]
    SliceResultTooWide { result: u32, width: u32 },

    /// Constant slice bounds outside `0 <= lower <= upper < width`.
    #[error(
        "`slice` bounds must satisfy `0 <= lower <= upper < width`, but got upper = {upper}, lower = {lower} for a {width}-bit operand."
    )]
    SliceBounds { upper: u64, lower: u64, width: u32 },

    /// Constant slice bounds disagree with the declared result width.
    #[error(
        "`slice` with bounds [{upper}:{lower}] produces {expected} bits, but its result is declared with {found} bits."
    )]
    SliceResultWidth {
        upper: u64,
        lower: u64,
        expected: u64,
        found: u32,
    },

    /// Concat result width is not the sum of its operand widths.
    #[error(
        "`concat` of {lhs} and {rhs} bits produces {} bits, but its result is declared with {found} bits.",
        sum_widths(.lhs, .rhs)
    )]
    ConcatWidth { lhs: u32, rhs: u32, found: u32 },

    /// Literal width differs from the declared type.
    #[error("Constant literal has width {literal}, but its declared type has width {declared}.")]
    ConstantWidth { literal: u32, declared: u32 },

    /// Vector/memory shape that is not a single power-of-two dimension.
    #[error(
        "`{op}` requires a single power-of-two dimension, but found `{ty}`. Only one-dimensional shapes whose length is a power of two are supported."
    )]
    InvalidShape { op: &'static str, ty: Type },

    /// Abstract array initialization without a value.
    #[error("`{op}` requires an initial element value.")]
    MissingArrayInit { op: &'static str },

    /// `assert_not` without a property id.
    #[error("`{op}` requires a property id.")]
    MissingAssertId { op: &'static str },

    /// Property id on an assertion that does not take one.
    #[error("`{op}` does not take a property id, but one was given.")]
    UnexpectedAssertId { op: &'static str },

    /// Yield arity differs from the number of states.
    #[error("The `{block}` block yields {found} values, but the model declares {expected} states.")]
    YieldArity {
        block: BlockKind,
        expected: usize,
        found: usize,
    },

    /// Yielded value type differs from its state type.
    #[error(
        "The `{block}` block yields `{found}` for state #{index}, but the state has type `{expected}`."
    )]
    YieldType {
        block: BlockKind,
        index: usize,
        expected: Type,
        found: Type,
    },

    /// The parser rejected the input.
    #[error(
        "Failed to parse input: {}",
        join_errors(.errors)
    )]
    ParserErrors { errors: Vec<ParserError> },
}
