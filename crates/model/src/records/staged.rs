use crate::records::source::SourceRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw landed row. Immutable once written; the sink upserts on
/// (batch_id, id) so re-ingesting a window never duplicates rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreStageRecord {
    pub id: i64,
    pub customer_id: i64,
    pub product_id: i64,
    pub transaction_amount: f64,
    pub transaction_date: DateTime<Utc>,
    pub status: Option<String>,
    pub source_system: String,
    pub load_timestamp: DateTime<Utc>,
    pub batch_id: String,
}

impl PreStageRecord {
    pub fn from_source(
        record: SourceRecord,
        source_system: &str,
        batch_id: &str,
        load_timestamp: DateTime<Utc>,
    ) -> Self {
        PreStageRecord {
            id: record.id,
            customer_id: record.customer_id,
            product_id: record.product_id,
            transaction_amount: record.transaction_amount,
            transaction_date: record.transaction_date,
            status: record.status,
            source_system: source_system.to_string(),
            load_timestamp,
            batch_id: batch_id.to_string(),
        }
    }
}

/// Quality-checked, transformed row. Only records that passed every
/// quality rule are staged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub id: i64,
    pub customer_id: i64,
    pub product_id: i64,
    pub transaction_amount: f64,
    pub transaction_date: DateTime<Utc>,
    pub status: Option<String>,
    pub source_system: String,
    pub load_timestamp: DateTime<Utc>,
    pub batch_id: String,
    pub processed_timestamp: DateTime<Utc>,
}

impl StageRecord {
    pub fn from_pre_stage(record: PreStageRecord, processed_timestamp: DateTime<Utc>) -> Self {
        StageRecord {
            id: record.id,
            customer_id: record.customer_id,
            product_id: record.product_id,
            transaction_amount: record.transaction_amount,
            transaction_date: record.transaction_date,
            status: record.status,
            source_system: record.source_system,
            load_timestamp: record.load_timestamp,
            batch_id: record.batch_id,
            processed_timestamp,
        }
    }
}
