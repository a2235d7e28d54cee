//! Error types for the feed poller.

use std::time::Duration;

use thiserror::Error;

/// Common error type for the feed poller.
#[derive(Error, Debug)]
pub enum PollerError {
    /// Transport failure, timeout or non-success HTTP status while fetching a feed.
    #[error("network error: {0}")]
    Network(String),

    /// The feed body is not well-formed XML with a `channel` of `item`s.
    #[error("decode error: {0}")]
    Decode(String),

    /// A publication date matched none of the supported RSS date formats.
    #[error("unrecognized publication date: {0:?}")]
    DateFormat(String),

    /// A post with the same (feed, source URL) already exists.
    ///
    /// This is benign: the ingester swallows it and moves on.
    #[error("unique constraint violation: {0}")]
    UniqueConstraint(String),

    /// Any other persistence failure.
    #[error("database error: {0}")]
    Repository(String),

    /// The repository query selecting due feeds failed.
    #[error("feed selection failed: {0}")]
    Selection(String),

    /// A job ran past its per-job deadline.
    #[error("job deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PollerError {
    /// Returns true for the benign duplicate-post case.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, PollerError::UniqueConstraint(_))
    }
}

// Unique violations are split out so the ingester can tell a duplicate
// post apart from a real storage failure.
impl From<sqlx::Error> for PollerError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                PollerError::UniqueConstraint(db.message().to_string())
            }
            _ => PollerError::Repository(e.to_string()),
        }
    }
}

/// Result type alias for poller operations.
pub type Result<T> = std::result::Result<T, PollerError>;
