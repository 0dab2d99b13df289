use btorinstr::{modules::operand::Value, types::Type};
use strum::EnumIs;
use thiserror::Error;

#[derive(Debug, Error, EnumIs)]
pub enum BtorError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse configuration file '{file}': {source}")]
    ConfigParseError {
        source: toml::de::Error,
        file: String,
    },

    #[error("Failed to serialize configuration to '{file}': {source}")]
    ConfigSerializeError {
        source: toml::ser::Error,
        file: String,
    },

    #[error("Invalid model: {0}")]
    Verify(#[from] btorinstr::utils::Error),

    #[error(
        "`{op}` operates on the abstract array type `{ty}`, which has no arithmetic lowering. Run the vector or memory lowering first."
    )]
    UnloweredArray { op: String, ty: Type },

    #[error(
        "The extent of array type `{ty}` cannot be determined statically within the limit of {max_length} elements."
    )]
    UnknownArrayExtent { ty: Type, max_length: u64 },

    #[error(
        "`{op}` writes destructively to `{base}` while `{aliased}` still reads the same memory afterwards."
    )]
    AliasedWrite {
        op: String,
        base: Value,
        aliased: Value,
    },

    #[error("Pass `{pass}` has no lowering for `{op}`{}.", detail_suffix(.detail))]
    MissingLowering {
        pass: &'static str,
        op: String,
        detail: Option<String>,
    },

    #[error("Model does not verify after pass `{pass}`: {source}")]
    VerificationFailed {
        pass: &'static str,
        source: btorinstr::utils::Error,
    },

    #[error("Pass with name '{0}' not found")]
    UnknownPass(String),
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail
        .as_ref()
        .map(|d| format!(" ({})", d))
        .unwrap_or_default()
}

pub type BtorResult<T> = Result<T, BtorError>;
