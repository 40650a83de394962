use crate::error::SinkError;
use async_trait::async_trait;
use model::records::staged::{PreStageRecord, StageRecord};
use std::path::Path;
use tracing::debug;

/// Write-side capability used by the ingestor and the transformer. Pre-stage
/// writes are upserts keyed on (batch_id, natural key) so a retried batch
/// lands on the same rows instead of duplicating them.
#[async_trait]
pub trait SinkWriter: Send + Sync {
    async fn upsert_pre_stage(&self, records: &[PreStageRecord]) -> Result<(), SinkError>;
    async fn load_pre_stage(&self, batch_id: &str) -> Result<Vec<PreStageRecord>, SinkError>;
    async fn count_pre_stage(&self, batch_id: &str) -> Result<u64, SinkError>;

    async fn write_stage(&self, records: &[StageRecord]) -> Result<(), SinkError>;
    async fn count_stage(&self, batch_id: &str) -> Result<u64, SinkError>;
}

/// Sled-backed staging area: one tree per landing zone, rows bincode-encoded
/// under `{batch_id}:{id}` keys.
pub struct SledSink {
    _db: sled::Db,
    pre_stage: sled::Tree,
    stage: sled::Tree,
}

impl SledSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let db = sled::open(path)?;
        let pre_stage = db.open_tree("pre_stage")?;
        let stage = db.open_tree("stage")?;
        Ok(SledSink {
            _db: db,
            pre_stage,
            stage,
        })
    }

    fn row_key(batch_id: &str, id: i64) -> String {
        // Zero-padded id keeps rows of a batch in natural-key order.
        format!("{batch_id}:{id:020}")
    }

    fn batch_prefix(batch_id: &str) -> String {
        format!("{batch_id}:")
    }

    fn count_prefix(tree: &sled::Tree, prefix: &str) -> Result<u64, SinkError> {
        let mut count = 0u64;
        for item in tree.scan_prefix(prefix) {
            item?;
            count += 1;
        }
        Ok(count)
    }
}

#[async_trait]
impl SinkWriter for SledSink {
    async fn upsert_pre_stage(&self, records: &[PreStageRecord]) -> Result<(), SinkError> {
        for record in records {
            let key = Self::row_key(&record.batch_id, record.id);
            let bytes =
                bincode::serialize(record).map_err(|err| SinkError::Encode(err.to_string()))?;
            self.pre_stage.insert(key.as_bytes(), bytes)?;
        }
        debug!(count = records.len(), "upserted pre-stage rows");
        Ok(())
    }

    async fn load_pre_stage(&self, batch_id: &str) -> Result<Vec<PreStageRecord>, SinkError> {
        let mut rows = Vec::new();
        for item in self.pre_stage.scan_prefix(Self::batch_prefix(batch_id)) {
            let (_key, value) = item?;
            let record: PreStageRecord =
                bincode::deserialize(&value).map_err(|err| SinkError::Decode(err.to_string()))?;
            rows.push(record);
        }
        Ok(rows)
    }

    async fn count_pre_stage(&self, batch_id: &str) -> Result<u64, SinkError> {
        Self::count_prefix(&self.pre_stage, &Self::batch_prefix(batch_id))
    }

    async fn write_stage(&self, records: &[StageRecord]) -> Result<(), SinkError> {
        for record in records {
            let key = Self::row_key(&record.batch_id, record.id);
            let bytes =
                bincode::serialize(record).map_err(|err| SinkError::Encode(err.to_string()))?;
            self.stage.insert(key.as_bytes(), bytes)?;
        }
        debug!(count = records.len(), "wrote stage rows");
        Ok(())
    }

    async fn count_stage(&self, batch_id: &str) -> Result<u64, SinkError> {
        Self::count_prefix(&self.stage, &Self::batch_prefix(batch_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;

    fn pre_stage(batch_id: &str, id: i64) -> PreStageRecord {
        PreStageRecord {
            id,
            customer_id: 1,
            product_id: 2,
            transaction_amount: 9.99,
            transaction_date: Utc::now(),
            status: Some("NEW".into()),
            source_system: "erp".into(),
            load_timestamp: Utc::now(),
            batch_id: batch_id.to_string(),
        }
    }

    #[tokio::test]
    async fn upsert_is_idempotent_per_batch_and_key() {
        let dir = tempdir().unwrap();
        let sink = SledSink::open(dir.path()).unwrap();

        let rows = vec![pre_stage("bat-1", 1), pre_stage("bat-1", 2)];
        sink.upsert_pre_stage(&rows).await.unwrap();
        // Retry of the same batch writes the same keys again.
        sink.upsert_pre_stage(&rows).await.unwrap();

        assert_eq!(sink.count_pre_stage("bat-1").await.unwrap(), 2);
        let loaded = sink.load_pre_stage("bat-1").await.unwrap();
        assert_eq!(
            loaded.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![1, 2]
        );
    }

    #[tokio::test]
    async fn batches_are_isolated_by_prefix() {
        let dir = tempdir().unwrap();
        let sink = SledSink::open(dir.path()).unwrap();

        sink.upsert_pre_stage(&[pre_stage("bat-1", 1)]).await.unwrap();
        sink.upsert_pre_stage(&[pre_stage("bat-2", 1)]).await.unwrap();

        assert_eq!(sink.count_pre_stage("bat-1").await.unwrap(), 1);
        assert_eq!(sink.count_pre_stage("bat-2").await.unwrap(), 1);
        assert_eq!(sink.count_stage("bat-1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn stage_rows_carry_processed_timestamp() {
        let dir = tempdir().unwrap();
        let sink = SledSink::open(dir.path()).unwrap();

        let processed = Utc::now();
        let staged = StageRecord::from_pre_stage(pre_stage("bat-1", 5), processed);
        sink.write_stage(&[staged]).await.unwrap();

        assert_eq!(sink.count_stage("bat-1").await.unwrap(), 1);
    }
}
