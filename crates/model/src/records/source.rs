use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One raw transaction row as produced by a source connector. `id` is the
/// natural key; `transaction_date` is the default watermark column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub id: i64,
    pub customer_id: i64,
    pub product_id: i64,
    pub transaction_amount: f64,
    pub transaction_date: DateTime<Utc>,
    pub status: Option<String>,
}
