//! Integration tests for shardseq.
//!
//! These tests run the `shardseq` binary on BAM files written with the
//! crate's own [`BamWriter`](shardseq_lib::bam_writer::BamWriter), so the
//! BGZF block layout of every fixture is known exactly.

mod helpers;
mod test_block_reader;
mod test_clip_command;
mod test_coverage_command;
mod test_keys_command;
mod test_recal_command;
