//! Passes over `btor` transition-system models.
//!
//! The crate provides the preparation passes (dead-code elimination, cast
//! resolution), the lowerings to the `arith` dialect and to vector or memory
//! arrays, and the final lowering to a machine-level program. Passes are
//! registered in [`pass::PassKind`] and chained by [`pipeline::Pipeline`],
//! configured through [`config::PipelineConfig`].

pub mod analysis;
pub mod config;
pub mod lowering;
pub mod machine;
pub mod magic;
pub mod pass;
pub mod pipeline;
pub mod transforms;
pub mod utils;
