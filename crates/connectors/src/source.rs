use crate::error::ConnectorError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use model::records::source::SourceRecord;

/// Column the built-in sources support as watermark.
pub const TRANSACTION_DATE_COLUMN: &str = "transaction_date";

/// Read-side capability consumed by the ingestor. Implementations return a
/// finite slice of records strictly newer than `since`, bounded by `limit`
/// so a single batch never grows past the configured window.
#[async_trait]
pub trait SourceConnector: Send + Sync {
    async fn read(
        &self,
        table: &str,
        watermark_column: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<SourceRecord>, ConnectorError>;
}

/// Shared incremental-window filter for the built-in sources: keep rows with
/// `transaction_date > since`, oldest first, ties broken by id so repeated
/// reads of an unchanged window return the same slice. The limit may be
/// exceeded by rows sharing the cut-off timestamp: the watermark commits to
/// the last timestamp of the batch, and cutting inside a timestamp group
/// would strand its tail behind the strict `> since` filter forever.
pub fn filter_window(
    mut records: Vec<SourceRecord>,
    since: DateTime<Utc>,
    limit: usize,
) -> Vec<SourceRecord> {
    records.retain(|r| r.transaction_date > since);
    records.sort_by(|a, b| {
        a.transaction_date
            .cmp(&b.transaction_date)
            .then(a.id.cmp(&b.id))
    });

    if limit == 0 {
        records.clear();
        return records;
    }
    if records.len() > limit {
        let boundary = records[limit - 1].transaction_date;
        let ties = records[limit..]
            .iter()
            .take_while(|r| r.transaction_date == boundary)
            .count();
        records.truncate(limit + ties);
    }
    records
}

pub fn ensure_watermark_column(column: &str) -> Result<(), ConnectorError> {
    if column == TRANSACTION_DATE_COLUMN {
        Ok(())
    } else {
        Err(ConnectorError::UnsupportedWatermarkColumn(
            column.to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(id: i64, ts: DateTime<Utc>) -> SourceRecord {
        SourceRecord {
            id,
            customer_id: 1,
            product_id: 1,
            transaction_amount: 10.0,
            transaction_date: ts,
            status: Some("NEW".into()),
        }
    }

    #[test]
    fn filter_window_drops_rows_at_or_before_since() {
        let t0 = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let rows = vec![
            record(1, t0),
            record(2, t0 + chrono::Duration::minutes(1)),
            record(3, t0 - chrono::Duration::minutes(1)),
        ];

        let kept = filter_window(rows, t0, 10);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, 2);
    }

    #[test]
    fn filter_window_orders_and_bounds() {
        let t0 = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let rows = vec![
            record(3, t0 + chrono::Duration::minutes(3)),
            record(1, t0 + chrono::Duration::minutes(1)),
            record(2, t0 + chrono::Duration::minutes(2)),
        ];

        let kept = filter_window(rows, t0, 2);
        assert_eq!(
            kept.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![1, 2],
            "oldest rows first, bounded by limit"
        );
    }

    #[test]
    fn filter_window_keeps_timestamp_ties_at_the_cut() {
        let t0 = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let t1 = t0 + chrono::Duration::minutes(1);
        let rows = vec![
            record(1, t1),
            record(2, t1),
            record(3, t1),
            record(4, t0 + chrono::Duration::minutes(2)),
        ];

        let kept = filter_window(rows, t0, 2);
        assert_eq!(
            kept.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![1, 2, 3],
            "rows sharing the cut-off timestamp all come along"
        );
    }

    #[test]
    fn filter_window_with_zero_limit_is_empty() {
        let t0 = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let rows = vec![record(1, t0 + chrono::Duration::minutes(1))];
        assert!(filter_window(rows, t0, 0).is_empty());
    }
}
