use crate::error::StateError;
use crate::state::models::{AuditEntry, WatermarkRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use model::{key::TableKey, reconciliation::ReconciliationResult};

pub mod models;
pub mod sled_store;

/// Watermark column assumed when no control row exists yet.
pub const DEFAULT_WATERMARK_COLUMN: &str = "transaction_date";

/// How far back a brand-new (source, table) pair starts ingesting.
pub const DEFAULT_LOOKBACK_HOURS: i64 = 24;

/// Durable last-processed position per (source_system, table_name).
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    /// Read-only. Absent control rows yield a bootstrap record at
    /// now − [`DEFAULT_LOOKBACK_HOURS`] with the default column.
    async fn get(&self, key: &TableKey) -> Result<WatermarkRecord, StateError>;

    /// Conditional advance: succeeds only while the stored timestamp still
    /// equals `expected` (the value read at batch start) and `new_ts` does
    /// not regress. Appends an audit entry on success.
    async fn advance(
        &self,
        key: &TableKey,
        expected: DateTime<Utc>,
        new_ts: DateTime<Utc>,
        batch_id: &str,
    ) -> Result<(), StateError>;
}

/// Append-only trail of every batch state transition.
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn append(&self, entry: &AuditEntry) -> Result<(), StateError>;
    async fn entries(&self, key: &TableKey) -> Result<Vec<AuditEntry>, StateError>;
}

/// Exactly-once persistence of reconciliation outcomes.
#[async_trait]
pub trait ReconciliationLog: Send + Sync {
    async fn record(&self, result: &ReconciliationResult) -> Result<(), StateError>;
    async fn load(&self, batch_id: &str) -> Result<Option<ReconciliationResult>, StateError>;
}

pub trait StateStore: WatermarkStore + AuditLog + ReconciliationLog {}

impl<T: WatermarkStore + AuditLog + ReconciliationLog> StateStore for T {}
