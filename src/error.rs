use thiserror::Error;

/// Failures of the query path.
///
/// `InvalidPattern` and `InvalidPort` are caller mistakes and are never
/// retried; `StoreUnavailable` and `Timeout` are safe to retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("URL pattern '{pattern}' is not a valid regular expression: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("'{value}' is not a valid port (expected an integer between 1 and 65535)")]
    InvalidPort { value: String },

    #[error("entry store is not initialized")]
    StoreUnavailable,

    #[error("query exceeded its deadline after {elapsed_ms} ms")]
    Timeout { elapsed_ms: u64 },
}

impl QueryError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, QueryError::StoreUnavailable | QueryError::Timeout { .. })
    }
}
