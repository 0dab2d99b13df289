//! Pipeline configuration, read from and written to TOML.
//!
//! Every field has a default, so a partial (or empty) file is valid:
//!
//! ```toml
//! verify_each = true
//! array_lowering = "memory"
//!
//! [vector]
//! max_length = 4096
//!
//! [machine]
//! nd_lowering = "freeze"
//! ```
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    magic::{DEFAULT_MAX_ARRAY_LENGTH, ENV_PIPELINE_CONFIG},
    utils::error::{BtorError, BtorResult},
};

/// How abstract arrays are lowered, if at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrayLowering {
    #[default]
    None,
    Vector,
    Memory,
}

/// How nondeterministic sources are materialized by the machine lowering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NdLowering {
    /// Opaque call to a runtime hook, one per source.
    #[default]
    Call,
    /// `freeze poison`, an arbitrary but fixed value.
    Freeze,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorConfig {
    /// Largest number of elements an array may be lowered to, for both the
    /// vector and the memory lowering.
    pub max_length: u64,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_ARRAY_LENGTH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    pub nd_lowering: NdLowering,
    /// Lower `constraint` to `llvm.assume`. When disabled, a model with a
    /// constraint cannot be lowered.
    pub allow_assume: bool,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            nd_lowering: NdLowering::Call,
            allow_assume: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Verify the model after every pass.
    pub verify_each: bool,
    pub cast_resolution: bool,
    pub dead_code_elimination: bool,
    pub array_lowering: ArrayLowering,
    /// Lower the `btor` bit-vector operations to `arith`.
    pub arith: bool,
    pub vector: VectorConfig,
    pub machine: MachineConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            verify_each: true,
            cast_resolution: true,
            dead_code_elimination: true,
            array_lowering: ArrayLowering::None,
            arith: true,
            vector: VectorConfig::default(),
            machine: MachineConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse a configuration from TOML text. `origin` names the source in
    /// error messages.
    fn parse(text: &str, origin: &str) -> BtorResult<Self> {
        toml::from_str(text).map_err(|e| BtorError::ConfigParseError {
            source: e,
            file: origin.to_string(),
        })
    }

    pub fn from_toml_str(text: &str) -> BtorResult<Self> {
        Self::parse(text, "<string>")
    }

    /// Load a PipelineConfig from a TOML file.
    pub fn load_from_toml(path: &Path) -> BtorResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text, &path.display().to_string())
    }

    /// Save the PipelineConfig to a TOML file, creating parent directories.
    pub fn save_to_toml(&self, path: &Path) -> BtorResult<()> {
        let text = toml::to_string(self).map_err(|e| BtorError::ConfigSerializeError {
            source: e,
            file: path.display().to_string(),
        })?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, text)?;
        Ok(())
    }

    /// Configuration named by the `BTOR_PIPELINE_CONFIG` environment
    /// variable, or the default one when it is unset.
    pub fn from_env() -> BtorResult<Self> {
        match std::env::var_os(ENV_PIPELINE_CONFIG) {
            Some(path) => Self::load_from_toml(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_is_default() {
        assert_eq!(
            PipelineConfig::from_toml_str("").unwrap(),
            PipelineConfig::default()
        );
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let config = PipelineConfig::from_toml_str(
            r#"
array_lowering = "memory"

[machine]
nd_lowering = "freeze"
"#,
        )
        .unwrap();
        assert_eq!(config.array_lowering, ArrayLowering::Memory);
        assert_eq!(config.machine.nd_lowering, NdLowering::Freeze);
        assert!(config.machine.allow_assume);
        assert!(config.verify_each);
        assert_eq!(config.vector.max_length, DEFAULT_MAX_ARRAY_LENGTH);
    }

    #[test]
    fn unknown_enum_values_are_rejected() {
        let err = PipelineConfig::from_toml_str("array_lowering = \"tensor\"").unwrap_err();
        assert!(err.is_config_parse_error());
    }
}
