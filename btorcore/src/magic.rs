/// Name of the environment variable containing the path to a pipeline
/// configuration file. When unset, [`crate::config::PipelineConfig::from_env`]
/// returns the default configuration.
pub const ENV_PIPELINE_CONFIG: &str = "BTOR_PIPELINE_CONFIG";

/// Runtime hook returning the value of a model input, `@btor.input.i<W>(i64 id)`.
pub const MACHINE_INPUT_FN: &str = "btor.input";

/// Runtime hook returning an unconstrained state value, `@btor.nd.i<W>(i64 id)`.
pub const MACHINE_ND_FN: &str = "btor.nd";

/// Runtime hook called when a property is violated, `@btor.bad(i64 id)`.
pub const MACHINE_BAD_FN: &str = "btor.bad";

/// Assumption intrinsic used for constraints.
pub const MACHINE_ASSUME_FN: &str = "llvm.assume";

/// Attribute naming the provenance id of a lowered nondeterministic array.
pub const ND_ARRAY_ID_ATTR: &str = "id";

/// Default bound on the number of elements of a lowered array.
pub const DEFAULT_MAX_ARRAY_LENGTH: u64 = 1 << 16;
