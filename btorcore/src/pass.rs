//! Pass interface and registry.
//!
//! Every transformation of a [`Model`] implements [`Pass`]. Passes are
//! registered under a fixed name in [`PassKind`] together with the
//! representations they may introduce, so a driver can check that the
//! destination of a pipeline accepts them.
use bitflags::bitflags;
use btorinstr::{
    modules::{
        Model,
        instructions::{Instruction, InstructionFlags},
    },
    types::Type,
};
use strum::{EnumIter, IntoEnumIterator};

use crate::{
    analysis::liveness::DeadCodeElimination,
    config::PipelineConfig,
    lowering::{
        arith::ArithLowering,
        array::{ArrayTarget, ArrayLowering},
        machine::MachineLowering,
    },
    transforms::cast_resolution::CastResolution,
    utils::error::{BtorError, BtorResult},
};

bitflags! {
    /// Representations a model may contain.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Dialects: u32 {
        /// `btor` bit-vector and abstract array operations.
        const BTOR = 1 << 0;
        /// Generic `arith` operations.
        const ARITH = 1 << 1;
        /// Vector-backed arrays (`vector<N x E>` and the `_vec` operations).
        const VECTOR = 1 << 2;
        /// Memory-backed arrays (`memref<N x E>` and the `_mem` operations).
        const MEMORY = 1 << 3;
        /// The machine-level program, see [`crate::machine`].
        const MACHINE = 1 << 4;
    }
}

impl Dialects {
    /// Name of a single representation.
    pub fn describe(&self) -> &'static str {
        [
            (Dialects::BTOR, "btor"),
            (Dialects::ARITH, "arith"),
            (Dialects::VECTOR, "btor.vector"),
            (Dialects::MEMORY, "btor.memory"),
            (Dialects::MACHINE, "machine"),
        ]
        .into_iter()
        .find(|(flag, _)| flag == self)
        .map(|(_, name)| name)
        .unwrap_or("<mixed>")
    }

    /// Representations used by the operations and states of `model`.
    pub fn of_model(model: &Model) -> Dialects {
        let mut dialects = Dialects::empty();
        let add_type = |ty: &Type, dialects: &mut Dialects| match ty {
            Type::Vector(_) => *dialects |= Dialects::VECTOR,
            Type::Memory(_) => *dialects |= Dialects::MEMORY,
            Type::BitVec(_) | Type::Array(_) => {}
        };

        for (_, ty) in &model.states {
            add_type(ty, &mut dialects);
        }
        for op in model.operations() {
            let flags = op.flags();
            if flags.contains(InstructionFlags::ARITH) {
                dialects |= Dialects::ARITH;
            } else if !flags.intersects(InstructionFlags::VECTOR | InstructionFlags::MEMORY) {
                dialects |= Dialects::BTOR;
            }
            if let Some(ty) = op.destination_type() {
                add_type(&ty, &mut dialects);
            }
        }
        dialects
    }
}

/// A transformation of a model.
///
/// `run` may leave the model in any state when it fails; the
/// [`crate::pipeline::Pipeline`] only adopts the result of successful runs.
pub trait Pass {
    /// Registered name of the pass.
    fn name(&self) -> &'static str;

    /// Representations the pass may introduce.
    fn introduces(&self) -> Dialects;

    fn run(&mut self, model: &mut Model) -> BtorResult<()>;
}

/// Every registered pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum PassKind {
    Liveness,
    CastResolution,
    ToArith,
    ToVector,
    ToMemory,
    ToMachine,
}

impl PassKind {
    pub fn name(&self) -> &'static str {
        match self {
            PassKind::Liveness => "btor-liveness",
            PassKind::CastResolution => "btor-cast-resolution",
            PassKind::ToArith => "convert-btor-to-arith",
            PassKind::ToVector => "convert-btor-to-vector",
            PassKind::ToMemory => "convert-btor-to-memref",
            PassKind::ToMachine => "convert-btor-to-machine",
        }
    }

    pub fn introduces(&self) -> Dialects {
        match self {
            PassKind::Liveness => Dialects::empty(),
            PassKind::CastResolution => Dialects::BTOR,
            PassKind::ToArith => Dialects::ARITH,
            PassKind::ToVector => Dialects::VECTOR,
            PassKind::ToMemory => Dialects::MEMORY,
            PassKind::ToMachine => Dialects::MACHINE,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        PassKind::iter().find(|kind| kind.name() == name)
    }

    /// Instantiate the pass with the settings of `config`.
    pub fn create(&self, config: &PipelineConfig) -> Box<dyn Pass> {
        match self {
            PassKind::Liveness => Box::new(DeadCodeElimination),
            PassKind::CastResolution => Box::new(CastResolution),
            PassKind::ToArith => Box::new(ArithLowering),
            PassKind::ToVector => Box::new(ArrayLowering::new(
                ArrayTarget::Vector,
                config.vector.max_length,
            )),
            PassKind::ToMemory => Box::new(ArrayLowering::new(
                ArrayTarget::Memory,
                config.vector.max_length,
            )),
            PassKind::ToMachine => Box::new(MachineLowering::new(config.machine.clone())),
        }
    }
}

/// Instantiate a registered pass by name.
pub fn create_pass(name: &str, config: &PipelineConfig) -> BtorResult<Box<dyn Pass>> {
    PassKind::from_name(name)
        .map(|kind| kind.create(config))
        .ok_or_else(|| BtorError::UnknownPass(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_names_round_trip() {
        let config = PipelineConfig::default();
        for kind in PassKind::iter() {
            assert_eq!(PassKind::from_name(kind.name()), Some(kind));
            let pass = kind.create(&config);
            assert_eq!(pass.name(), kind.name());
            assert_eq!(pass.introduces(), kind.introduces());
        }
    }

    #[test]
    fn unknown_names_are_errors() {
        let err = create_pass("convert-btor-to-tensor", &PipelineConfig::default())
            .err()
            .unwrap();
        assert!(err.is_unknown_pass());
    }
}
