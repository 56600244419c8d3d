//! Error types for the aggregation pipeline.

use thiserror::Error;

/// Why a single line could not be turned into a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("missing field separator")]
    MissingSeparator,

    #[error("invalid numeric value: {0:?}")]
    InvalidValue(String),

    #[error("numeric value out of range: {0:?}")]
    Overflow(String),
}

/// Pipeline errors
#[derive(Debug, Error)]
pub enum Error {
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed record {line:?}: {source}")]
    Parse {
        line: String,
        #[source]
        source: ParseError,
    },

    #[error("record exceeds {limit} bytes without a line separator")]
    OversizedRecord { limit: usize },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("pipeline cancelled")]
    Cancelled,

    #[error("worker {0} panicked")]
    WorkerPanicked(usize),
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;
