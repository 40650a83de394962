use crate::state::{DEFAULT_LOOKBACK_HOURS, DEFAULT_WATERMARK_COLUMN};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use model::{key::TableKey, reconciliation::ReconStatus};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatermarkStatus {
    /// Synthesized default, no commit has happened yet.
    Bootstrap,
    /// At least one batch committed for this pair.
    Active,
}

/// One row of the watermark control table. `last_processed_timestamp` is
/// monotonically non-decreasing per key and only a successful commit moves it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct WatermarkRecord {
    pub source_system: String,
    pub table_name: String,
    pub last_processed_timestamp: DateTime<Utc>,
    pub watermark_column: String,
    pub process_date: NaiveDate,
    pub status: WatermarkStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WatermarkRecord {
    /// Synthetic record for a pair with no control row yet.
    pub fn bootstrap(key: &TableKey, now: DateTime<Utc>) -> Self {
        WatermarkRecord {
            source_system: key.source_system.clone(),
            table_name: key.table_name.clone(),
            last_processed_timestamp: now - Duration::hours(DEFAULT_LOOKBACK_HOURS),
            watermark_column: DEFAULT_WATERMARK_COLUMN.to_string(),
            process_date: now.date_naive(),
            status: WatermarkStatus::Bootstrap,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn key(&self) -> TableKey {
        TableKey::new(&self.source_system, &self.table_name)
    }
}

/// Append-only audit trail entry, one per batch state transition.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub enum AuditEntry {
    RunStart {
        source_system: String,
        table_name: String,
        batch_id: String,
        watermark: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    BatchIngested {
        source_system: String,
        table_name: String,
        batch_id: String,
        record_count: u64,
        window_end: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    BatchTransformed {
        source_system: String,
        table_name: String,
        batch_id: String,
        accepted: u64,
        quarantined: u64,
        at: DateTime<Utc>,
    },
    Reconciled {
        source_system: String,
        table_name: String,
        batch_id: String,
        status: ReconStatus,
        variance: u64,
        at: DateTime<Utc>,
    },
    WatermarkAdvanced {
        source_system: String,
        table_name: String,
        batch_id: String,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    BatchQuarantined {
        source_system: String,
        table_name: String,
        batch_id: String,
        reason: String,
        at: DateTime<Utc>,
    },
    BatchFailed {
        source_system: String,
        table_name: String,
        batch_id: String,
        stage: String,
        reason: String,
        at: DateTime<Utc>,
    },
    RunDone {
        source_system: String,
        table_name: String,
        batch_id: String,
        outcome: String,
        at: DateTime<Utc>,
    },
}

impl AuditEntry {
    pub fn source_system(&self) -> &str {
        match self {
            AuditEntry::RunStart { source_system, .. }
            | AuditEntry::BatchIngested { source_system, .. }
            | AuditEntry::BatchTransformed { source_system, .. }
            | AuditEntry::Reconciled { source_system, .. }
            | AuditEntry::WatermarkAdvanced { source_system, .. }
            | AuditEntry::BatchQuarantined { source_system, .. }
            | AuditEntry::BatchFailed { source_system, .. }
            | AuditEntry::RunDone { source_system, .. } => source_system,
        }
    }

    pub fn table_name(&self) -> &str {
        match self {
            AuditEntry::RunStart { table_name, .. }
            | AuditEntry::BatchIngested { table_name, .. }
            | AuditEntry::BatchTransformed { table_name, .. }
            | AuditEntry::Reconciled { table_name, .. }
            | AuditEntry::WatermarkAdvanced { table_name, .. }
            | AuditEntry::BatchQuarantined { table_name, .. }
            | AuditEntry::BatchFailed { table_name, .. }
            | AuditEntry::RunDone { table_name, .. } => table_name,
        }
    }

    pub fn batch_id(&self) -> &str {
        match self {
            AuditEntry::RunStart { batch_id, .. }
            | AuditEntry::BatchIngested { batch_id, .. }
            | AuditEntry::BatchTransformed { batch_id, .. }
            | AuditEntry::Reconciled { batch_id, .. }
            | AuditEntry::WatermarkAdvanced { batch_id, .. }
            | AuditEntry::BatchQuarantined { batch_id, .. }
            | AuditEntry::BatchFailed { batch_id, .. }
            | AuditEntry::RunDone { batch_id, .. } => batch_id,
        }
    }
}
