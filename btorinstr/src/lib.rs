//! Word-level bit-precise transition-system IR.
//!
//! The crate defines the `btor` and `arith` dialects, the [`modules::Model`]
//! container holding a transition system, its verifier, textual codec,
//! constant folder and reference evaluator.
pub mod attributes;
pub mod consts;
pub mod eval;
pub mod fmt;
pub mod fold;
pub mod modules;
#[cfg(feature = "chumsky")]
pub mod parser;
pub mod types;
pub mod utils;
pub mod verify;
