//! Error types for shardseq operations.

use shardseq_metrics::RecalError;
use shardseq_sam::ClipError;
use thiserror::Error;

/// Result type alias for shardseq operations
pub type Result<T> = std::result::Result<T, ShardseqError>;

/// Error type for shardseq operations
#[derive(Error, Debug)]
pub enum ShardseqError {
    /// The compressed stream or a record inside it cannot be decoded.
    #[error("Corrupt BAM stream at block {block_offset}: {reason}")]
    CorruptStream {
        /// Compressed offset of the block being decoded
        block_offset: u64,
        /// What was wrong with it
        reason: String,
    },

    /// A virtual offset that cannot be sought to.
    #[error("Invalid virtual offset {compressed}/{uncompressed}: {reason}")]
    InvalidOffset {
        /// Compressed block offset
        compressed: u64,
        /// Offset within the decompressed block
        uncompressed: u16,
        /// Why the offset was rejected
        reason: String,
    },

    /// A statistic was constructed or updated with an out-of-range value.
    #[error(transparent)]
    InvalidArgument(#[from] RecalError),

    /// A clipping operation was asked for something the read cannot satisfy.
    #[error(transparent)]
    PreconditionViolation(#[from] ClipError),

    /// Invalid parameter value provided
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// The parameter name
        parameter: String,
        /// Explanation of why it's invalid
        reason: String,
    },

    /// Invalid quality threshold
    #[error("Invalid quality threshold: {value} (must be between 0 and {max})")]
    InvalidQuality {
        /// The invalid quality value
        value: u8,
        /// Maximum valid value
        max: u8,
    },

    /// File format error
    #[error("Invalid {file_type} file '{path}': {reason}")]
    InvalidFileFormat {
        /// Type of file (e.g., "BAM")
        file_type: String,
        /// Path to the file
        path: String,
        /// Explanation of the problem
        reason: String,
    },

    /// Required reference sequence not found
    #[error("Reference sequence '{ref_name}' not found in header")]
    ReferenceNotFound {
        /// The reference sequence name
        ref_name: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ShardseqError {
    /// Shorthand for a [`ShardseqError::CorruptStream`].
    pub fn corrupt(block_offset: u64, reason: impl Into<String>) -> Self {
        Self::CorruptStream { block_offset, reason: reason.into() }
    }
}
