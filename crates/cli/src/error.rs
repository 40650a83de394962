use engine_core::error::StateError;
use engine_runtime::error::PipelineError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Failed to resolve a data directory: {0}")]
    DataDir(String),

    #[error("Failed to open store at {path}: {reason}")]
    StoreOpen { path: String, reason: String },

    #[error("Pipeline run failed: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Failed to serialize data to JSON: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    #[error("Shutdown requested")]
    ShutdownRequested,
}
