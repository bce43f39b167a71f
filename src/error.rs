//! Error types for the driver.
//!
//! Each phase of a query's life has its own error family: configuration,
//! submission/polling, result retrieval, and value conversion. The families
//! are kept separate so callers can match on the failure kind; the top-level
//! [`AthenaError`] is what the public API returns.

use thiserror::Error;

/// Errors raised while building or parsing a [`Config`](crate::Config).
///
/// These always surface at open/connect time, never at query time.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The `db` parameter (or `Config::database`) was empty.
    #[error("database is required")]
    DatabaseRequired,

    /// Programmatic construction requires an AWS SDK configuration.
    #[error("an AWS session is required")]
    SessionRequired,

    /// The `result_mode` parameter was not one of `api`, `dl`, `download`, `gzip`.
    #[error("invalid result mode: {0:?}")]
    InvalidResultMode(String),

    #[error("invalid poll_frequency parameter: {0:?}")]
    InvalidPollFrequency(String),

    #[error("invalid timeout parameter: {0:?}")]
    InvalidTimeout(String),
}

/// A single remote call failed.
///
/// `operation` names the failing service call (e.g. `GetQueryResults`) so the
/// context survives as the error crosses component boundaries.
#[derive(Debug, Error)]
#[error("{operation}: {message}")]
pub struct ClientError {
    pub operation: &'static str,
    pub message: String,
}

impl ClientError {
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }
}

/// Errors raised between submitting a query and its terminal state.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The remote service rejected the submission (syntax, permissions).
    /// Not retried.
    #[error("query submission failed: {0}")]
    Submission(#[source] ClientError),

    /// A status check failed mid-poll. Not retried.
    #[error("polling query status failed: {0}")]
    Polling(#[source] ClientError),

    /// The remote service reports the query itself failed. `reason` is the
    /// remote-supplied failure reason, verbatim.
    #[error("query execution failed: {reason}")]
    ExecutionFailed { reason: String },

    /// The query reached the `Cancelled` state, or the caller's cancellation
    /// token fired while waiting.
    #[error("query was cancelled")]
    Cancelled,

    /// The local deadline expired while waiting. A best-effort stop request
    /// has already been issued.
    #[error("query timed out after {seconds}s")]
    Timeout { seconds: u64 },
}

/// Errors raised while materializing a result cursor.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("fetching result page failed: {0}")]
    Page(#[source] ClientError),

    #[error("downloading result object failed: {0}")]
    Download(#[source] ClientError),

    #[error("fetching result metadata failed: {0}")]
    Metadata(#[source] ClientError),

    #[error("decompressing result object {key:?} failed: {message}")]
    Decompress { key: String, message: String },

    #[error("invalid output location: {0:?}")]
    InvalidLocation(String),
}

/// A cell's text could not be parsed as its declared column type.
///
/// Carries the offending column index and the raw text; a coercion failure
/// aborts the current row decode and is never silently downgraded to a
/// string value.
#[derive(Debug, Error)]
#[error("cannot parse {value:?} at index {index} as {column_type}")]
pub struct ConversionError {
    pub index: usize,
    pub value: String,
    pub column_type: String,
}

/// Top-level driver error.
#[derive(Debug, Error)]
pub enum AthenaError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A remote call outside the submit/poll/retrieve protocol failed
    /// (e.g. the workgroup output-location lookup).
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),
}
