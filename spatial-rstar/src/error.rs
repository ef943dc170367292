//! Error and result types shared by the tree, the storage layer and the
//! bulk loader.

use std::io;
use thiserror::Error;

/// Errors that can occur while maintaining or building an R*-tree.
#[derive(Debug, Error)]
pub enum RTreeError {
    /// A rectangle scheduled for deletion is not stored in the tree.
    #[error("Object {id} not found in tree")]
    NotFound { id: u64 },

    /// The bulk loader was handed an empty input sequence.
    #[error("Input sequence is empty")]
    EndOfInput,

    /// Block store or external sequence I/O failure.
    #[error("Storage I/O error: {0}")]
    StorageIo(#[from] io::Error),

    /// Fanout or block size that cannot be honoured.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// On-disk state that does not decode to what the tree expects.
    #[error("Corrupted storage: {0}")]
    Corrupted(String),
}

impl From<bincode::error::EncodeError> for RTreeError {
    fn from(err: bincode::error::EncodeError) -> Self {
        RTreeError::Serialization(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for RTreeError {
    fn from(err: bincode::error::DecodeError) -> Self {
        RTreeError::Serialization(err.to_string())
    }
}

impl RTreeError {
    /// True for errors caused by the underlying storage rather than by the
    /// caller's request.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            RTreeError::StorageIo(_) | RTreeError::Serialization(_) | RTreeError::Corrupted(_)
        )
    }
}

/// Result type for R*-tree operations
pub type RTreeResult<T> = Result<T, RTreeError>;
