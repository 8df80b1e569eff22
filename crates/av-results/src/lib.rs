//! av-results: discovery and loading of per-run annealing instrumentation.

pub mod naming;
pub mod source;
pub mod store;
pub mod table;
pub mod types;

pub use naming::{matches_instance, parse_run_id};
pub use source::{DirectorySource, FileHandle, MemorySource, RunSource};
pub use store::RunStore;
pub use table::{Row, Table};
pub use types::*;

use av_core::InstanceId;

pub type ResultsResult<T> = Result<T, ResultsError>;

#[derive(thiserror::Error, Debug)]
pub enum ResultsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No run files found for instance {instance}")]
    NotFound { instance: InstanceId },

    #[error("Malformed run id in file name: {file}")]
    MalformedRunId { file: String },

    #[error("Malformed table {file}: {message}")]
    MalformedTable { file: String, message: String },

    #[error("Unsupported table format: {file}")]
    UnsupportedFormat { file: String },
}
