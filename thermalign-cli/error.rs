use std::path::PathBuf;
use thermalign_core::ParameterError;
use thiserror::Error;

/// Errors that prevent a batch from starting
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Input directory not found: {}", .0.display())]
    MissingDirectory(PathBuf),

    #[error("Failed to read directory {}: {source}", path.display())]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot create output directory {}: {source}", path.display())]
    OutputDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No thermal/visible pairs found in {}", .0.display())]
    NoPairs(PathBuf),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ParameterError),

    #[error("Batch already ran (state: {0})")]
    AlreadyRun(crate::batch::BatchState),
}

/// Errors from loading, validating or saving an [`AppConfig`](crate::config::AppConfig)
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to access config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported config format: {} (expected .toml or .json)", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("Missing required setting `{0}`")]
    Missing(&'static str),

    #[error("Invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error(transparent)]
    Parameter(#[from] ParameterError),
}

/// Command-line usage errors
#[derive(Debug, Error, PartialEq)]
pub enum ArgsError {
    #[error("Unknown option: {0}")]
    UnknownOption(String),

    #[error("Option {0} requires a value")]
    MissingValue(&'static str),

    #[error("Invalid value {value:?} for {option}")]
    InvalidValue { option: &'static str, value: String },

    #[error("Unexpected argument: {0}")]
    UnexpectedArgument(String),
}
