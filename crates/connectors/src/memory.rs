use crate::{
    error::ConnectorError,
    source::{SourceConnector, ensure_watermark_column, filter_window},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use model::records::source::SourceRecord;
use std::{
    collections::HashMap,
    sync::atomic::{AtomicU32, Ordering},
};
use tokio::sync::RwLock;

/// In-memory source keyed by table name. Used by tests and as the reference
/// connector implementation; `fail_next` injects transient failures to
/// exercise the retry path.
#[derive(Default)]
pub struct MemorySource {
    tables: RwLock<HashMap<String, Vec<SourceRecord>>>,
    failures_remaining: AtomicU32,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, table: &str, records: Vec<SourceRecord>) {
        let mut tables = self.tables.write().await;
        tables.entry(table.to_string()).or_default().extend(records);
    }

    /// Make the next `n` reads fail with a transient error.
    pub fn fail_next(&self, n: u32) {
        self.failures_remaining.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl SourceConnector for MemorySource {
    async fn read(
        &self,
        table: &str,
        watermark_column: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<SourceRecord>, ConnectorError> {
        ensure_watermark_column(watermark_column)?;

        if self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(ConnectorError::Unreachable(
                "injected transient failure".to_string(),
            ));
        }

        let tables = self.tables.read().await;
        let rows = tables
            .get(table)
            .ok_or_else(|| ConnectorError::UnknownTable(table.to_string()))?
            .clone();

        Ok(filter_window(rows, since, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::TRANSACTION_DATE_COLUMN;
    use chrono::TimeZone;

    fn record(id: i64, ts: DateTime<Utc>) -> SourceRecord {
        SourceRecord {
            id,
            customer_id: 7,
            product_id: 9,
            transaction_amount: 42.5,
            transaction_date: ts,
            status: Some("NEW".into()),
        }
    }

    #[tokio::test]
    async fn reads_only_rows_newer_than_since() {
        let t0 = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let source = MemorySource::new();
        source
            .insert(
                "transactions",
                vec![
                    record(1, t0),
                    record(2, t0 + chrono::Duration::hours(1)),
                    record(3, t0 + chrono::Duration::hours(2)),
                ],
            )
            .await;

        let rows = source
            .read("transactions", TRANSACTION_DATE_COLUMN, t0, 100)
            .await
            .unwrap();
        assert_eq!(rows.iter().map(|r| r.id).collect::<Vec<_>>(), vec![2, 3]);
    }

    #[tokio::test]
    async fn unknown_table_is_not_transient() {
        let source = MemorySource::new();
        let err = source
            .read("missing", TRANSACTION_DATE_COLUMN, Utc::now(), 10)
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectorError::UnknownTable(_)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn injected_failures_are_transient_and_bounded() {
        let source = MemorySource::new();
        source.insert("transactions", vec![]).await;
        source.fail_next(2);

        for _ in 0..2 {
            let err = source
                .read("transactions", TRANSACTION_DATE_COLUMN, Utc::now(), 10)
                .await
                .unwrap_err();
            assert!(err.is_transient());
        }

        assert!(
            source
                .read("transactions", TRANSACTION_DATE_COLUMN, Utc::now(), 10)
                .await
                .is_ok()
        );
    }
}
