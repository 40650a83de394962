use engine_core::{error::StateError, lease::LeaseHeld};
use engine_processing::error::{IngestError, ReconcileError, TransformError};
use std::time::Duration;
use thiserror::Error;

/// Top-level errors of a pipeline run. Any of these leaves the watermark
/// and the lease in their pre-run state.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    LeaseHeld(#[from] LeaseHeld),

    #[error("extract failed for batch {batch_id}: {source}")]
    Extract {
        batch_id: String,
        #[source]
        source: IngestError,
    },

    #[error("transform failed for batch {batch_id}: {source}")]
    Transform {
        batch_id: String,
        #[source]
        source: TransformError,
    },

    #[error("reconciliation error: {0}")]
    Reconcile(#[from] ReconcileError),

    /// Includes the watermark conflict raised when a concurrent writer won
    /// the race; the caller must re-read and schedule a fresh run.
    #[error("state error: {0}")]
    State(#[from] StateError),

    #[error("stage {stage} timed out after {timeout:?}")]
    StageTimeout {
        stage: &'static str,
        timeout: Duration,
    },

    #[error("shutdown requested")]
    ShutdownRequested,

    #[error("task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}
