use connectors::error::{ConnectorError, SinkError};
use engine_core::{error::StateError, retry::Transient};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("connector error: {0}")]
    Connector(#[from] ConnectorError),

    #[error("sink error: {0}")]
    Sink(#[from] SinkError),
}

impl Transient for IngestError {
    /// Only a flapping source is worth another attempt; sink and data
    /// errors surface immediately.
    fn is_transient(&self) -> bool {
        matches!(self, IngestError::Connector(err) if err.is_transient())
    }
}

#[derive(Error, Debug)]
pub enum TransformError {
    /// A reject-batch quality rule matched. The whole batch is aborted and
    /// no stage rows exist for it.
    #[error("quality rule '{rule}' rejected batch {batch_id}: {message}")]
    QualityRule {
        batch_id: String,
        rule: String,
        message: String,
    },

    #[error("sink error: {0}")]
    Sink(#[from] SinkError),
}

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("reconciliation result for batch {0} already recorded")]
    DuplicateResult(String),

    #[error("state error: {0}")]
    State(StateError),
}

impl From<StateError> for ReconcileError {
    fn from(err: StateError) -> Self {
        match err {
            StateError::DuplicateReconciliation(batch_id) => {
                ReconcileError::DuplicateResult(batch_id)
            }
            other => ReconcileError::State(other),
        }
    }
}
