//! CLI command implementations for shardseq.
//!
//! Every command works on one range of virtual offsets of an input BAM, so a
//! large file can be processed as independent shards.
//!
//! - [`keys`] - Shard key of every record
//! - [`clip`] - Clip reads and write a new BAM
//! - [`recal`] - Base quality statistics by quality and cycle
//! - [`coverage`] - Per-chromosome coverage of a coordinate-sorted BAM

// Blanket clippy pedantic allows for command implementations.
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::uninlined_format_args,
    clippy::too_many_lines
)]

pub mod clip;
pub mod command;
pub mod common;
pub mod coverage;
pub mod keys;
pub mod recal;
