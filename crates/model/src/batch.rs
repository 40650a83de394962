use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Extraction window of one batch: records with a watermark-column value
/// strictly greater than `since` and at most `until` belong to it. `until`
/// is the candidate the watermark advances to on commit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatchWindow {
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

/// Terminal state of a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchStatus {
    /// Reconciliation accepted the batch and the watermark advanced.
    Committed,
    /// The batch is parked for operator review; the watermark is untouched.
    Quarantined,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Committed => "committed",
            BatchStatus::Quarantined => "quarantined",
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a single pipeline run produced, returned to the scheduler/CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub batch_id: String,
    pub status: BatchStatus,
    pub source_count: u64,
    pub target_count: u64,
}
