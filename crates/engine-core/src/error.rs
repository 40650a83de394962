use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StateError {
    /// A concurrent writer advanced the watermark after it was read. The
    /// caller must re-read and restart; retrying the same advance would
    /// lose the other writer's update.
    #[error("watermark conflict for {key}: expected {expected}, stored {stored}")]
    WatermarkConflict {
        key: String,
        expected: DateTime<Utc>,
        stored: DateTime<Utc>,
    },

    #[error("watermark for {key} cannot move backwards: stored {stored}, requested {requested}")]
    WatermarkRegression {
        key: String,
        stored: DateTime<Utc>,
        requested: DateTime<Utc>,
    },

    /// A reconciliation result is an audit record; writing it twice for one
    /// batch would silently overwrite history.
    #[error("reconciliation result for batch {0} already recorded")]
    DuplicateReconciliation(String),

    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error("codec error: {0}")]
    Codec(String),
}
