use crate::{
    error::ConnectorError,
    source::{SourceConnector, ensure_watermark_column, filter_window},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use model::records::source::SourceRecord;
use std::path::{Path, PathBuf};

/// File-backed source for CLI-driven runs: one JSON file holding an array of
/// source records, re-read on every extract so the file can grow between
/// batches.
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        JsonFileSource {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl SourceConnector for JsonFileSource {
    async fn read(
        &self,
        _table: &str,
        watermark_column: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<SourceRecord>, ConnectorError> {
        ensure_watermark_column(watermark_column)?;

        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|err| ConnectorError::FileRead {
                path: self.path.display().to_string(),
                reason: err.to_string(),
            })?;

        let records: Vec<SourceRecord> = serde_json::from_str(&raw)
            .map_err(|err| ConnectorError::Malformed(err.to_string()))?;

        Ok(filter_window(records, since, limit))
    }
}
