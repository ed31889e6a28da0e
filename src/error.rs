use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading configuration, synthesizing noise, or
/// persisting generated files.
#[derive(Debug, Error)]
pub enum NoiseError {
    #[error("failed to load noise configuration {}: {reason}", path.display())]
    ConfigLoad { path: PathBuf, reason: String },

    #[error("simulator log file {} not found: {hint}", path.display())]
    MissingLogFile { path: PathBuf, hint: String },

    /// A watched file disappeared between polls. The daemon treats this as
    /// the simulator shutting down rather than as a failure.
    #[error("watched resource {} vanished", .0.display())]
    ResourceVanished(PathBuf),

    #[error("invalid sample grid: {0}")]
    InvalidGrid(String),

    /// The daemon was polled before `start` captured its baseline.
    #[error("regeneration daemon polled before it was started")]
    NotStarted,

    #[error("invalid parameters for noise source '{source_name}': {reason}")]
    Parameter { source_name: String, reason: String },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to launch simulator {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl NoiseError {
    pub(crate) fn parameter(source_name: &str, reason: impl Into<String>) -> Self {
        NoiseError::Parameter {
            source_name: source_name.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn config(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        NoiseError::ConfigLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True for errors that end only the current regeneration pass.
    pub fn is_pass_local(&self) -> bool {
        matches!(self, NoiseError::Parameter { .. })
    }
}

pub type Result<T> = std::result::Result<T, NoiseError>;
