//! `keys` command: shard key for every record in a virtual offset range.

use std::io::Write;

use anyhow::{Context, Result};
use clap::Parser;
use fgoxide::io::Io;
use log::info;
use shardseq_lib::logging::OperationTimer;
use shardseq_lib::shard_key::{ShardKeyEncoder, is_unmapped_key};

use super::command::Command;
use super::common::{BamIoOptions, RangeOptions, log_io};

/// Column header of the output.
pub const KEYS_HEADER: &str = "key\tname\treference\tposition\tmapped";

/// Writes the shard key of each record
#[derive(Parser, Debug)]
#[command(
    name = "keys",
    about = "Compute shard keys for reads in a BAM range",
    long_about = r#"
Computes the 64-bit shard key of every record between two virtual offsets and writes them as a
tab-separated table with columns key, name, reference, position, and mapped.

Mapped reads get (reference index << 32) | (zero-based start). Unmapped reads, and reads without
a reference or position, get (2^31 - 1) << 32 | hash, where hash is the absolute value of the
MurmurHash3 of the record bytes, so they sort after every mapped read.
"#
)]
pub struct Keys {
    #[command(flatten)]
    pub io: BamIoOptions,

    #[command(flatten)]
    pub range: RangeOptions,
}

impl Command for Keys {
    fn execute(&self, _command_line: &str) -> Result<()> {
        self.io.validate()?;
        self.range.validate()?;

        info!("Keys");
        log_io(&self.io, &self.range);

        let timer = OperationTimer::new("Computing shard keys");
        let mut reader = self.range.open_reader(&self.io.input)?;
        let mut out = Io::default()
            .new_writer(&self.io.output)
            .with_context(|| format!("Failed to create output: {}", self.io.output.display()))?;
        writeln!(out, "{KEYS_HEADER}")?;

        let encoder = ShardKeyEncoder::new();
        let mut unmapped = 0u64;
        while let Some(read) = reader.decode_next()? {
            let key = encoder.encode(&read)?;
            unmapped += u64::from(is_unmapped_key(key));
            let reference = reader.header().reference_name(read.reference_sequence_id).unwrap_or("*");
            writeln!(
                out,
                "{key}\t{}\t{reference}\t{}\t{}",
                read.name,
                read.alignment_start,
                !is_unmapped_key(key)
            )?;
        }
        out.flush()?;

        let total = reader.close();
        info!("{unmapped} of {total} reads were keyed by hash");
        timer.log_completion(total);
        Ok(())
    }
}
