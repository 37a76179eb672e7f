use thiserror::Error;

/// Failure of a single fetch-and-cache operation.
///
/// Cloneable so that one failed download can be reported to every caller
/// that was waiting on the same in-flight request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("unexpected status {status} for {id}")]
    Status { id: String, status: u16 },

    #[error("invalid item id {id}: {reason}")]
    InvalidId { id: String, reason: String },

    #[error("invalid base URL {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("fetch timed out after {0}ms")]
    Timeout(u64),

    #[error("{0}")]
    Other(String),
}
