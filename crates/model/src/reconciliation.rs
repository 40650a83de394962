use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconStatus {
    /// Counts match exactly.
    Pass,
    /// Counts diverge within the configured threshold.
    Warn,
    /// Counts diverge beyond the threshold; the watermark must not advance.
    Fail,
}

impl ReconStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconStatus::Pass => "PASS",
            ReconStatus::Warn => "WARN",
            ReconStatus::Fail => "FAIL",
        }
    }
}

impl fmt::Display for ReconStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Count comparison between pre-stage and stage for one batch. Written
/// exactly once per batch_id and never overwritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationResult {
    pub batch_id: String,
    pub source_table: String,
    pub target_table: String,
    pub source_count: u64,
    pub target_count: u64,
    pub status: ReconStatus,
    pub variance: u64,
    pub process_timestamp: DateTime<Utc>,
    pub remarks: String,
}
