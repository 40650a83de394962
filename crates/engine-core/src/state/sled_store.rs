use crate::{
    error::StateError,
    state::{
        AuditLog, ReconciliationLog, WatermarkStore,
        models::{AuditEntry, WatermarkRecord, WatermarkStatus},
    },
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use model::{key::TableKey, reconciliation::ReconciliationResult};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use std::{
    path::Path,
    sync::atomic::{AtomicU64, Ordering},
};
use tracing::info;

// Tie-breaker for audit keys written within the same clock tick.
static AUDIT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Sled-backed control state: watermark rows, audit trail and reconciliation
/// log in one keyspace. The conditional watermark advance runs as a sled
/// transaction so check-then-set is atomic under concurrent writers.
pub struct SledStateStore {
    db: sled::Db,
}

impl SledStateStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, sled::Error> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    #[inline]
    fn wm_key(key: &TableKey) -> String {
        format!("wm:{}:{}", key.source_system, key.table_name)
    }

    #[inline]
    fn audit_prefix(key: &TableKey) -> String {
        format!("audit:{}:{}:", key.source_system, key.table_name)
    }

    #[inline]
    fn recon_key(batch_id: &str) -> String {
        format!("recon:{batch_id}")
    }
}

#[async_trait]
impl WatermarkStore for SledStateStore {
    async fn get(&self, key: &TableKey) -> Result<WatermarkRecord, StateError> {
        match self.db.get(Self::wm_key(key))? {
            Some(bytes) => {
                bincode::deserialize(&bytes).map_err(|err| StateError::Codec(err.to_string()))
            }
            None => Ok(WatermarkRecord::bootstrap(key, Utc::now())),
        }
    }

    async fn advance(
        &self,
        key: &TableKey,
        expected: DateTime<Utc>,
        new_ts: DateTime<Utc>,
        batch_id: &str,
    ) -> Result<(), StateError> {
        let wm_key = Self::wm_key(key);

        let result = self.db.transaction::<_, _, StateError>(|tx| {
            let now = Utc::now();
            let record = match tx.get(&wm_key)? {
                Some(bytes) => {
                    let mut existing: WatermarkRecord = bincode::deserialize(&bytes)
                        .map_err(|e| ConflictableTransactionError::Abort(StateError::Codec(e.to_string())))?;

                    // Optimistic concurrency: the stored value must still be
                    // what this batch read at INIT.
                    if existing.last_processed_timestamp != expected {
                        return Err(ConflictableTransactionError::Abort(
                            StateError::WatermarkConflict {
                                key: key.to_string(),
                                expected,
                                stored: existing.last_processed_timestamp,
                            },
                        ));
                    }
                    if new_ts < existing.last_processed_timestamp {
                        return Err(ConflictableTransactionError::Abort(
                            StateError::WatermarkRegression {
                                key: key.to_string(),
                                stored: existing.last_processed_timestamp,
                                requested: new_ts,
                            },
                        ));
                    }

                    existing.last_processed_timestamp = new_ts;
                    existing.process_date = now.date_naive();
                    existing.status = WatermarkStatus::Active;
                    existing.updated_at = now;
                    existing
                }
                None => {
                    // First commit for this pair creates the control row. A
                    // racing second writer will then see a stored timestamp
                    // that no longer matches its expected value.
                    let mut record = WatermarkRecord::bootstrap(key, now);
                    record.last_processed_timestamp = new_ts;
                    record.process_date = now.date_naive();
                    record.status = WatermarkStatus::Active;
                    record
                }
            };

            let bytes = bincode::serialize(&record)
                .map_err(|e| ConflictableTransactionError::Abort(StateError::Codec(e.to_string())))?;
            tx.insert(wm_key.as_str(), bytes)?;
            Ok(())
        });

        match result {
            Ok(()) => {
                info!(key = %key, from = %expected, to = %new_ts, batch_id, "watermark advanced");
                self.append(&AuditEntry::WatermarkAdvanced {
                    source_system: key.source_system.clone(),
                    table_name: key.table_name.clone(),
                    batch_id: batch_id.to_string(),
                    from: expected,
                    to: new_ts,
                    at: Utc::now(),
                })
                .await
            }
            Err(TransactionError::Abort(err)) => Err(err),
            Err(TransactionError::Storage(err)) => Err(StateError::Storage(err)),
        }
    }
}

#[async_trait]
impl AuditLog for SledStateStore {
    async fn append(&self, entry: &AuditEntry) -> Result<(), StateError> {
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or(0);
        let seq = AUDIT_SEQ.fetch_add(1, Ordering::Relaxed);
        let key = format!(
            "audit:{}:{}:{nanos:020}:{seq:06}",
            entry.source_system(),
            entry.table_name()
        );
        let bytes = bincode::serialize(entry).map_err(|err| StateError::Codec(err.to_string()))?;
        self.db.insert(key.as_str(), bytes)?;
        Ok(())
    }

    async fn entries(&self, key: &TableKey) -> Result<Vec<AuditEntry>, StateError> {
        let mut entries = Vec::new();
        for item in self.db.scan_prefix(Self::audit_prefix(key)) {
            let (_key, value) = item?;
            let entry: AuditEntry =
                bincode::deserialize(&value).map_err(|err| StateError::Codec(err.to_string()))?;
            entries.push(entry);
        }
        Ok(entries)
    }
}

#[async_trait]
impl ReconciliationLog for SledStateStore {
    async fn record(&self, result: &ReconciliationResult) -> Result<(), StateError> {
        let recon_key = Self::recon_key(&result.batch_id);
        let bytes =
            bincode::serialize(result).map_err(|err| StateError::Codec(err.to_string()))?;

        let outcome = self.db.transaction::<_, _, StateError>(|tx| {
            if tx.get(&recon_key)?.is_some() {
                return Err(ConflictableTransactionError::Abort(
                    StateError::DuplicateReconciliation(result.batch_id.clone()),
                ));
            }
            tx.insert(recon_key.as_str(), bytes.as_slice())?;
            Ok(())
        });

        match outcome {
            Ok(()) => Ok(()),
            Err(TransactionError::Abort(err)) => Err(err),
            Err(TransactionError::Storage(err)) => Err(StateError::Storage(err)),
        }
    }

    async fn load(&self, batch_id: &str) -> Result<Option<ReconciliationResult>, StateError> {
        match self.db.get(Self::recon_key(batch_id))? {
            Some(bytes) => Ok(Some(
                bincode::deserialize(&bytes).map_err(|err| StateError::Codec(err.to_string()))?,
            )),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use model::reconciliation::ReconStatus;
    use tempfile::tempdir;

    fn key() -> TableKey {
        TableKey::new("erp", "transactions")
    }

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, hour, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn absent_control_row_yields_bootstrap_default() {
        let dir = tempdir().unwrap();
        let store = SledStateStore::open(dir.path()).unwrap();

        let record = store.get(&key()).await.unwrap();
        assert_eq!(record.status, WatermarkStatus::Bootstrap);
        assert_eq!(record.watermark_column, "transaction_date");

        let lookback = Utc::now() - record.last_processed_timestamp;
        let drift = (lookback - Duration::hours(24)).num_seconds().abs();
        assert!(drift < 60, "default watermark should be about 24h back");
    }

    #[tokio::test]
    async fn advance_creates_row_and_is_monotone() {
        let dir = tempdir().unwrap();
        let store = SledStateStore::open(dir.path()).unwrap();
        let key = key();

        let base = store.get(&key).await.unwrap().last_processed_timestamp;
        store.advance(&key, base, ts(10), "bat-1").await.unwrap();
        store.advance(&key, ts(10), ts(12), "bat-2").await.unwrap();
        // Equal timestamp is allowed: an empty window commits in place.
        store.advance(&key, ts(12), ts(12), "bat-3").await.unwrap();

        let record = store.get(&key).await.unwrap();
        assert_eq!(record.last_processed_timestamp, ts(12));
        assert_eq!(record.status, WatermarkStatus::Active);
    }

    #[tokio::test]
    async fn racing_advance_from_same_base_has_one_winner() {
        let dir = tempdir().unwrap();
        let store = SledStateStore::open(dir.path()).unwrap();
        let key = key();

        let base = store.get(&key).await.unwrap().last_processed_timestamp;
        store.advance(&key, base, ts(10), "bat-a").await.unwrap();

        // Second writer still holds the old base.
        let err = store.advance(&key, base, ts(11), "bat-b").await.unwrap_err();
        assert!(matches!(err, StateError::WatermarkConflict { .. }));

        let record = store.get(&key).await.unwrap();
        assert_eq!(record.last_processed_timestamp, ts(10));
    }

    #[tokio::test]
    async fn advance_rejects_regression() {
        let dir = tempdir().unwrap();
        let store = SledStateStore::open(dir.path()).unwrap();
        let key = key();

        let base = store.get(&key).await.unwrap().last_processed_timestamp;
        store.advance(&key, base, ts(10), "bat-1").await.unwrap();

        let err = store.advance(&key, ts(10), ts(8), "bat-2").await.unwrap_err();
        assert!(matches!(err, StateError::WatermarkRegression { .. }));
    }

    #[tokio::test]
    async fn advance_appends_audit_entry() {
        let dir = tempdir().unwrap();
        let store = SledStateStore::open(dir.path()).unwrap();
        let key = key();

        let base = store.get(&key).await.unwrap().last_processed_timestamp;
        store.advance(&key, base, ts(10), "bat-1").await.unwrap();

        let entries = store.entries(&key).await.unwrap();
        assert!(entries.iter().any(|e| matches!(
            e,
            AuditEntry::WatermarkAdvanced { batch_id, to, .. }
                if batch_id == "bat-1" && *to == ts(10)
        )));
    }

    #[tokio::test]
    async fn audit_entries_keep_append_order() {
        let dir = tempdir().unwrap();
        let store = SledStateStore::open(dir.path()).unwrap();
        let key = key();

        for batch in ["bat-1", "bat-2", "bat-3"] {
            store
                .append(&AuditEntry::RunStart {
                    source_system: key.source_system.clone(),
                    table_name: key.table_name.clone(),
                    batch_id: batch.to_string(),
                    watermark: ts(9),
                    at: Utc::now(),
                })
                .await
                .unwrap();
        }

        let entries = store.entries(&key).await.unwrap();
        let ids: Vec<String> = entries.iter().map(|e| e.batch_id().to_string()).collect();
        assert_eq!(ids, vec!["bat-1", "bat-2", "bat-3"]);
    }

    #[tokio::test]
    async fn reconciliation_result_is_write_once() {
        let dir = tempdir().unwrap();
        let store = SledStateStore::open(dir.path()).unwrap();

        let result = ReconciliationResult {
            batch_id: "bat-1".into(),
            source_table: "pre_stage_data".into(),
            target_table: "stage_data".into(),
            source_count: 10,
            target_count: 10,
            status: ReconStatus::Pass,
            variance: 0,
            process_timestamp: Utc::now(),
            remarks: "counts match".into(),
        };

        store.record(&result).await.unwrap();
        let err = store.record(&result).await.unwrap_err();
        assert!(matches!(err, StateError::DuplicateReconciliation(_)));

        let loaded = store.load("bat-1").await.unwrap().unwrap();
        assert_eq!(loaded.status, ReconStatus::Pass);
        assert!(store.load("bat-missing").await.unwrap().is_none());
    }
}
