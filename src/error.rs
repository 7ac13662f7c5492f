//! Error types for hmmlda.

use thiserror::Error;

use crate::counts::TableKind;

/// Result type for hmmlda operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for hmmlda operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Lexicon queried for an id it has never issued.
    #[error("unknown lexicon id: {0}")]
    UnknownId(usize),

    /// A frozen lexicon was asked to intern a token it has not seen.
    #[error("unknown token on frozen lexicon: {0:?}")]
    UnknownToken(String),

    /// A word list used to restore a lexicon contains the same token twice.
    #[error("duplicate token in lexicon: {0:?}")]
    DuplicateToken(String),

    /// Categorical draw over an empty, all-zero or non-finite weight vector.
    #[error("degenerate distribution over {len} weights")]
    DegenerateDistribution {
        /// Number of weights offered to the draw.
        len: usize,
    },

    /// A decrement would take a count below zero.
    #[error("negative count in {table} table at ({row}, {col})")]
    NegativeCount {
        /// Table that was decremented.
        table: TableKind,
        /// Row index of the cell.
        row: usize,
        /// Column index of the cell.
        col: usize,
    },

    /// Configuration values are out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A stored snapshot does not agree with the corpus it is resumed on.
    #[error("snapshot mismatch: {0}")]
    SnapshotMismatch(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create an invalid configuration error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Error::InvalidConfig(msg.into())
    }

    /// Create a snapshot mismatch error.
    pub fn snapshot_mismatch(msg: impl Into<String>) -> Self {
        Error::SnapshotMismatch(msg.into())
    }
}
