//! Pipeline driver.
//!
//! A [`Pipeline`] runs an ordered list of passes over a copy of a model. The
//! copy replaces the caller's model only once every pass (and, with
//! `verify_each`, the verifier after each of them) succeeded; a failing
//! pipeline leaves the model unchanged.
use btorinstr::modules::Model;
use log::{debug, info};

use crate::{
    config::{ArrayLowering, PipelineConfig},
    lowering::machine::lower_to_machine,
    machine::MachineModule,
    pass::{Dialects, Pass, PassKind, create_pass},
    utils::error::{BtorError, BtorResult},
};

pub struct Pipeline {
    config: PipelineConfig,
    passes: Vec<Box<dyn Pass>>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("passes", &self.pass_names())
            .finish()
    }
}

impl Pipeline {
    /// Passes enabled by `config`, in their fixed order: cast resolution,
    /// dead-code elimination, array lowering, arithmetic lowering.
    pub fn from_config(config: &PipelineConfig) -> Self {
        let mut kinds = Vec::new();
        if config.cast_resolution {
            kinds.push(PassKind::CastResolution);
        }
        if config.dead_code_elimination {
            kinds.push(PassKind::Liveness);
        }
        match config.array_lowering {
            ArrayLowering::None => {}
            ArrayLowering::Vector => kinds.push(PassKind::ToVector),
            ArrayLowering::Memory => kinds.push(PassKind::ToMemory),
        }
        if config.arith {
            kinds.push(PassKind::ToArith);
        }

        Self {
            config: config.clone(),
            passes: kinds.iter().map(|kind| kind.create(config)).collect(),
        }
    }

    /// Passes given by their registered names, in order.
    pub fn from_names<'a>(
        names: impl IntoIterator<Item = &'a str>,
        config: &PipelineConfig,
    ) -> BtorResult<Self> {
        let passes = names
            .into_iter()
            .map(|name| create_pass(name, config))
            .collect::<BtorResult<Vec<_>>>()?;
        Ok(Self {
            config: config.clone(),
            passes,
        })
    }

    pub fn push(&mut self, pass: Box<dyn Pass>) {
        self.passes.push(pass);
    }

    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|pass| pass.name()).collect()
    }

    /// Every representation the passes may introduce.
    pub fn introduces(&self) -> Dialects {
        self.passes
            .iter()
            .fold(Dialects::empty(), |acc, pass| acc | pass.introduces())
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn run_pass(pass: &mut dyn Pass, model: &Model, verify_each: bool) -> BtorResult<Model> {
        let mut working = model.clone();
        pass.run(&mut working)?;
        if verify_each {
            working
                .verify()
                .map_err(|source| BtorError::VerificationFailed {
                    pass: pass.name(),
                    source,
                })?;
        }
        Ok(working)
    }

    /// Run every pass over `model`.
    pub fn run(&mut self, model: &mut Model) -> BtorResult<()> {
        let verify_each = self.config.verify_each;
        let before = model.op_count();

        let mut working = model.clone();
        for pass in self.passes.iter_mut() {
            debug!("Running {} on `{}`", pass.name(), working.name);
            working = Self::run_pass(pass.as_mut(), &working, verify_each)?;
        }
        *model = working;

        info!(
            "Pipeline over `{}` ran {} passes, {} operations before, {} after (dialects: {:?})",
            model.name,
            self.passes.len(),
            before,
            model.op_count(),
            Dialects::of_model(model)
        );
        Ok(())
    }

    /// Machine program of `model`, which must have gone through the
    /// arithmetic lowering.
    pub fn lower_to_machine(&self, model: &Model) -> BtorResult<MachineModule> {
        lower_to_machine(model, &self.config.machine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_follow_the_fixed_order() {
        let config = PipelineConfig {
            array_lowering: ArrayLowering::Memory,
            ..PipelineConfig::default()
        };
        let pipeline = Pipeline::from_config(&config);
        assert_eq!(
            pipeline.pass_names(),
            [
                "btor-cast-resolution",
                "btor-liveness",
                "convert-btor-to-memref",
                "convert-btor-to-arith"
            ]
        );
        assert!(pipeline.introduces().contains(Dialects::MEMORY | Dialects::ARITH));

        let config = PipelineConfig {
            cast_resolution: false,
            arith: false,
            ..PipelineConfig::default()
        };
        assert_eq!(Pipeline::from_config(&config).pass_names(), ["btor-liveness"]);
    }

    #[test]
    fn names_are_resolved_through_the_registry() {
        let config = PipelineConfig::default();
        let pipeline =
            Pipeline::from_names(["convert-btor-to-vector", "btor-liveness"], &config).unwrap();
        assert_eq!(
            pipeline.pass_names(),
            ["convert-btor-to-vector", "btor-liveness"]
        );

        let err = Pipeline::from_names(["btor-liveness", "inline"], &config).unwrap_err();
        assert!(err.is_unknown_pass());
    }
}
