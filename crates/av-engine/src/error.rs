//! Error types for the av-engine layer.

use std::path::PathBuf;

/// Engine error type wrapping errors from the storage and core crates.
///
/// Only configuration and export paths surface these to callers; a
/// [`crate::Session`] degrades every failure to an empty chart plus an
/// advisory instead.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Failed to read config file: {path}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Config(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Results error: {0}")]
    Results(#[from] av_results::ResultsError),

    #[error("{0}")]
    Core(#[from] av_core::CoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for av-engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
