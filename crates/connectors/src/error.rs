use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConnectorError {
    /// The source could not be reached. Retryable.
    #[error("source unreachable: {0}")]
    Unreachable(String),

    /// The source returned data that could not be decoded.
    #[error("malformed source data: {0}")]
    Malformed(String),

    #[error("unknown table: {0}")]
    UnknownTable(String),

    #[error("unsupported watermark column: {0}")]
    UnsupportedWatermarkColumn(String),

    #[error("failed to read source file {path}: {reason}")]
    FileRead { path: String, reason: String },
}

impl ConnectorError {
    /// Transient errors are retried with backoff; everything else fails the
    /// extract immediately.
    pub fn is_transient(&self) -> bool {
        matches!(self, ConnectorError::Unreachable(_))
    }
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("sink storage error: {0}")]
    Storage(String),

    #[error("failed to encode record: {0}")]
    Encode(String),

    #[error("failed to decode record: {0}")]
    Decode(String),
}

impl From<sled::Error> for SinkError {
    fn from(err: sled::Error) -> Self {
        SinkError::Storage(err.to_string())
    }
}
