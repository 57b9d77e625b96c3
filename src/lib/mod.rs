#![deny(unsafe_code)]
// Clippy lint configuration for CI
// These lints are allowed because:
// - cast_*: BAM fields, CIGAR lengths, and virtual offsets move between widths
// - missing_*_doc: Documentation improvements tracked separately
// - needless_pass_by_value: Some APIs designed for ownership transfer
// - items_after_statements: Some test code uses late item declarations
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::needless_pass_by_value,
    clippy::items_after_statements,
    clippy::module_name_repetitions
)]

//! # shardseq - BAM sharding, clipping, and recalibration statistics
//!
//! ## Overview
//!
//! ### Reading
//!
//! - **[`bam_reader`]** - Decode the records between two BGZF virtual offsets
//! - **[`bam_codec`]** - BAM record bytes to and from [`shardseq_sam::Read`]
//! - **[`header`]** - BAM header text and reference dictionary
//!
//! ### Processing
//!
//! - **[`shard_key`]** - 64-bit partition keys
//! - **[`recal`]** - Quality-by-cycle recalibration observations
//! - **[`depth`]** - Per-chromosome coverage from sorted reads
//!
//! Clipping lives in [`shardseq_sam::clipper`]; statistics types in
//! [`shardseq_metrics`].
//!
//! ### Utilities
//!
//! - **[`bam_writer`]** - BAM output with explicit block boundaries
//! - **[`validation`]** - Input validation
//! - **[`progress`]** - Progress tracking
//! - **[`logging`]** - Formatting for log output
//! - **[`errors`]** - Error types
//!
//! ## Quick Start
//!
//! ```no_run
//! use noodles::bgzf::VirtualPosition;
//! use shardseq_lib::bam_reader::CompressedBlockReader;
//! use shardseq_lib::shard_key::ShardKeyEncoder;
//!
//! # fn main() -> shardseq_lib::errors::Result<()> {
//! let mut reader = CompressedBlockReader::open("input.bam")?;
//! reader.seek(VirtualPosition::from(4_194_304))?;
//! reader.set_end(VirtualPosition::from(8_388_608));
//!
//! let encoder = ShardKeyEncoder::new();
//! for read in reader {
//!     let read = read?;
//!     println!("{}\t{}", encoder.encode(&read)?, read.name);
//! }
//! # Ok(())
//! # }
//! ```

pub mod bam_codec;
pub mod bam_reader;
pub mod bam_writer;
pub mod depth;
pub mod errors;
pub mod header;
pub mod logging;
pub mod progress;
pub mod recal;
pub mod shard_key;
pub mod validation;

pub use errors::{Result, ShardseqError};
