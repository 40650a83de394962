use crate::{
    error::TransformError,
    quality::{RuleSet, RuleVerdict},
};
use chrono::Utc;
use connectors::sink::SinkWriter;
use model::records::staged::{PreStageRecord, StageRecord};
use std::sync::Arc;
use tracing::{info, warn};

/// One business-rule transformation. Must be a pure function of the record
/// (and static reference data) so a replayed batch stages identical rows.
pub trait Transform: Send + Sync {
    fn apply(&self, record: &PreStageRecord) -> PreStageRecord;
}

#[derive(Clone, Default)]
pub struct TransformPipeline {
    transforms: Vec<Arc<dyn Transform>>,
}

impl TransformPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_transform<T: Transform + 'static>(mut self, transform: T) -> Self {
        self.transforms.push(Arc::new(transform));
        self
    }

    pub fn apply(&self, record: &PreStageRecord) -> PreStageRecord {
        self.transforms
            .iter()
            .fold(record.clone(), |acc, transform| transform.apply(&acc))
    }
}

/// Uppercases and trims the status code.
pub struct NormalizeStatus;

impl Transform for NormalizeStatus {
    fn apply(&self, record: &PreStageRecord) -> PreStageRecord {
        let mut out = record.clone();
        out.status = out.status.map(|s| s.trim().to_uppercase());
        out
    }
}

/// Rounds the amount to cents; source systems disagree on precision.
pub struct RoundAmount;

impl Transform for RoundAmount {
    fn apply(&self, record: &PreStageRecord) -> PreStageRecord {
        let mut out = record.clone();
        out.transaction_amount = (out.transaction_amount * 100.0).round() / 100.0;
        out
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TransformSummary {
    pub accepted: u64,
    pub quarantined: u64,
}

/// Reads a pre-stage batch, applies the quality rules in order, then the
/// business transforms, and stages the survivors. A reject-batch rule aborts
/// before anything is written, so that failure class is all-or-nothing.
pub struct Transformer {
    sink: Arc<dyn SinkWriter>,
    rules: RuleSet,
    pipeline: TransformPipeline,
}

impl Transformer {
    pub fn new(sink: Arc<dyn SinkWriter>, rules: RuleSet, pipeline: TransformPipeline) -> Self {
        Transformer {
            sink,
            rules,
            pipeline,
        }
    }

    /// Default transformer: standard rules plus status/amount normalization.
    pub fn standard(sink: Arc<dyn SinkWriter>) -> Self {
        Self::new(
            sink,
            RuleSet::standard(),
            TransformPipeline::new()
                .add_transform(NormalizeStatus)
                .add_transform(RoundAmount),
        )
    }

    pub async fn transform(&self, batch_id: &str) -> Result<TransformSummary, TransformError> {
        let rows = self.sink.load_pre_stage(batch_id).await?;

        let mut accepted = Vec::new();
        let mut quarantined = 0u64;
        for row in rows {
            match self.rules.evaluate(&row) {
                RuleVerdict::Reject(rule) => {
                    return Err(TransformError::QualityRule {
                        batch_id: batch_id.to_string(),
                        rule: rule.label().to_string(),
                        message: rule.message().to_string(),
                    });
                }
                RuleVerdict::Quarantine(rule) => {
                    warn!(
                        batch_id,
                        rule = rule.label(),
                        record_id = row.id,
                        "record quarantined"
                    );
                    quarantined += 1;
                }
                RuleVerdict::Pass => accepted.push(row),
            }
        }

        let processed_timestamp = Utc::now();
        let staged: Vec<StageRecord> = accepted
            .iter()
            .map(|row| StageRecord::from_pre_stage(self.pipeline.apply(row), processed_timestamp))
            .collect();

        self.sink.write_stage(&staged).await?;
        info!(
            batch_id,
            accepted = staged.len(),
            quarantined,
            "stage batch written"
        );

        Ok(TransformSummary {
            accepted: staged.len() as u64,
            quarantined,
        })
    }
}
