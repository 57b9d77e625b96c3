//! Errors raised by the clipping engine.
//!
//! Every variant describes a caller mistake: the request could not be carried
//! out on the read it was given. They carry the offending coordinates so the
//! diagnostic identifies what was asked for.

use thiserror::Error;

/// Result type alias for clipping operations.
pub type Result<T> = std::result::Result<T, ClipError>;

/// A clip request that violates the preconditions of the operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClipError {
    /// Reference coordinates are undefined for unmapped reads.
    #[error("Cannot clip read '{name}' by reference coordinates: read is unmapped")]
    UnmappedRead {
        /// Read name
        name: String,
    },

    /// Soft clipping needs an alignment to adjust.
    #[error("Cannot soft clip read '{name}': read is unmapped")]
    SoftClipUnmapped {
        /// Read name
        name: String,
    },

    /// The clip touches neither end of the read.
    #[error("Cannot clip interior region [{start}, {stop}] of a read of length {read_length}")]
    InteriorClip {
        /// First read position to clip
        start: i64,
        /// Last read position to clip
        stop: i64,
        /// Length of the read
        read_length: usize,
    },

    /// The clip interval lies outside the read.
    #[error("Clip interval [{start}, {stop}] is outside a read of length {read_length}")]
    OutOfBounds {
        /// First read position to clip
        start: i64,
        /// Last read position to clip
        stop: i64,
        /// Length of the read
        read_length: usize,
    },

    /// The clip interval is inverted.
    #[error("Invalid clip interval: start {start} is after stop {stop}")]
    InvertedInterval {
        /// First position
        start: i64,
        /// Last position
        stop: i64,
    },

    /// Tail clipping needs exactly one of the two reference bounds.
    #[error(
        "Tail clipping requires exactly one of refStart/refStop to be negative, got refStart={ref_start}, refStop={ref_stop}"
    )]
    AmbiguousTail {
        /// Requested reference start
        ref_start: i64,
        /// Requested reference stop
        ref_stop: i64,
    },

    /// Both-ends clipping with bounds outside the alignment.
    #[error(
        "Clip bounds [{left}, {right}] must satisfy left <= right within the alignment [{alignment_start}, {alignment_end}]"
    )]
    BoundsOutsideAlignment {
        /// Left reference bound
        left: i64,
        /// Right reference bound
        right: i64,
        /// Read alignment start
        alignment_start: i64,
        /// Read alignment end
        alignment_end: i64,
    },

    /// The reference coordinate could not be placed on the read.
    #[error("Reference coordinate {ref_coord} is not covered by read with alignment start {alignment_start} and CIGAR {cigar}")]
    CoordinateNotCovered {
        /// Requested reference coordinate
        ref_coord: i64,
        /// Read alignment start
        alignment_start: i64,
        /// CIGAR rendering
        cigar: String,
    },

    /// The CIGAR holds nothing but hard clips.
    #[error("Read '{name}' is entirely hard clipped")]
    EntirelyHardClipped {
        /// Read name
        name: String,
    },

    /// A CIGAR string that could not be parsed.
    #[error("Invalid CIGAR '{cigar}': {reason}")]
    InvalidCigar {
        /// The text that was parsed
        cigar: String,
        /// What was wrong with it
        reason: String,
    },
}
