//! `recal` command: base quality statistics by reported quality and cycle.

use anyhow::Result;
use clap::Parser;
use log::info;
use shardseq_lib::logging::{OperationTimer, format_count};
use shardseq_lib::recal::{QualityCycleKey, observe_read, to_metrics};
use shardseq_metrics::{RecalTable, write_metrics_auto};

use super::command::Command;
use super::common::{BamIoOptions, RangeOptions, log_io};

/// Tabulates observed error rates per reported quality and cycle
#[derive(Parser, Debug)]
#[command(
    name = "recal",
    about = "Tabulate base quality statistics by quality and cycle",
    long_about = r#"
Counts bases and mismatches for every (reported quality, machine cycle) pair over the reads between
two virtual offsets, and writes one row per pair with the empirical quality.

Only bases aligned with '=' or 'X' CIGAR operations are counted; 'X' bases are errors. Reads that are
unmapped, secondary, supplementary, duplicates, or QC failures are skipped, as are bases with a
missing quality. Cycles count from the first base sequenced, so reverse-strand reads are counted from
their end, and second reads of a pair get negative cycles.
"#
)]
pub struct Recal {
    #[command(flatten)]
    pub io: BamIoOptions,

    #[command(flatten)]
    pub range: RangeOptions,
}

impl Command for Recal {
    fn execute(&self, _command_line: &str) -> Result<()> {
        self.io.validate()?;
        self.range.validate()?;

        info!("Recal");
        log_io(&self.io, &self.range);

        let timer = OperationTimer::new("Tabulating base qualities");
        let mut reader = self.range.open_reader(&self.io.input)?;
        let mut table: RecalTable<QualityCycleKey> = RecalTable::new();
        let mut bases = 0u64;
        while let Some(read) = reader.decode_next()? {
            bases += observe_read(&mut table, &read);
        }
        let total = reader.close();

        match table.total() {
            Some(overall) => info!(
                "Observed {} bases ({} mismatches) in {} keys; empirical quality {:.2}",
                format_count(bases),
                format_count(overall.mismatches()),
                format_count(table.len() as u64),
                overall.empirical_quality()
            ),
            None => info!("No bases were eligible for tabulation"),
        }

        write_metrics_auto(&self.io.output, &to_metrics(&table))?;
        timer.log_completion(total);
        Ok(())
    }
}
