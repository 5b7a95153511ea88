//! Realtime feed error types.

/// A feed row that could not be parsed into its typed shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {dataset} record, field {field}: {reason}")]
pub struct RecordError {
    pub dataset: &'static str,
    pub field: &'static str,
    pub reason: String,
}

/// Errors that can occur when fetching or querying a realtime feed.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// HTTP request failed (network error, timeout, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Credentials were rejected
    #[error("unauthorized: check FEED_USERNAME and FEED_PASSWORD")]
    Unauthorized,

    /// API returned an error status
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Response body was not the expected JSON
    #[error("JSON parse error: {message}")]
    Json { message: String },

    /// A fetched row is missing a field or has a malformed one
    #[error(transparent)]
    Record(#[from] RecordError),

    /// The query cannot be answered as asked
    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = FeedError::Api {
            status: 503,
            message: "Service Unavailable".into(),
        };
        assert_eq!(err.to_string(), "API error 503: Service Unavailable");

        let err: FeedError = RecordError {
            dataset: "delays",
            field: "delaipassage",
            reason: "unrecognized delay \"soon\"".into(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "invalid delays record, field delaipassage: unrecognized delay \"soon\""
        );
    }
}
