use crate::error::ReconcileError;
use chrono::Utc;
use engine_core::state::ReconciliationLog;
use model::{
    key::TableKey,
    reconciliation::{ReconStatus, ReconciliationResult},
};
use std::sync::Arc;
use tracing::{info, warn};

/// Pure status determination. Variance is the absolute count difference;
/// the ordered rules are: exact match passes, a relative variance within the
/// threshold warns, everything else fails. An empty source with staged rows
/// can only fail.
pub fn classify(source_count: u64, target_count: u64, warn_threshold: f64) -> (u64, ReconStatus) {
    let variance = source_count.abs_diff(target_count);
    let status = if variance == 0 {
        ReconStatus::Pass
    } else if source_count > 0 && (variance as f64 / source_count as f64) <= warn_threshold {
        ReconStatus::Warn
    } else {
        ReconStatus::Fail
    };
    (variance, status)
}

/// Compares pre-stage and stage counts for a batch and persists the verdict
/// exactly once. The orchestrator gates the watermark commit on the status.
pub struct ReconciliationEngine {
    log: Arc<dyn ReconciliationLog>,
    warn_threshold: f64,
}

impl ReconciliationEngine {
    pub fn new(log: Arc<dyn ReconciliationLog>, warn_threshold: f64) -> Self {
        ReconciliationEngine {
            log,
            warn_threshold,
        }
    }

    pub async fn reconcile(
        &self,
        batch_id: &str,
        key: &TableKey,
        source_count: u64,
        target_count: u64,
    ) -> Result<ReconciliationResult, ReconcileError> {
        let (variance, status) = classify(source_count, target_count, self.warn_threshold);

        let remarks = match status {
            ReconStatus::Pass => "counts match".to_string(),
            ReconStatus::Warn => format!(
                "variance {variance} of {source_count} within threshold {}",
                self.warn_threshold
            ),
            ReconStatus::Fail => format!(
                "variance {variance} of {source_count} exceeds threshold {}",
                self.warn_threshold
            ),
        };

        let result = ReconciliationResult {
            batch_id: batch_id.to_string(),
            source_table: format!("pre_stage_data.{}", key.table_name),
            target_table: format!("stage_data.{}", key.table_name),
            source_count,
            target_count,
            status,
            variance,
            process_timestamp: Utc::now(),
            remarks,
        };

        self.log.record(&result).await?;

        match status {
            ReconStatus::Pass => {
                info!(batch_id, source_count, target_count, "reconciliation passed")
            }
            ReconStatus::Warn => warn!(
                batch_id,
                source_count, target_count, variance, "reconciliation variance within threshold"
            ),
            ReconStatus::Fail => warn!(
                batch_id,
                source_count, target_count, variance, "reconciliation failed"
            ),
        }

        Ok(result)
    }
}
