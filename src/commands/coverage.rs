//! `coverage` command: per-chromosome coverage from a coordinate-sorted BAM.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use fgoxide::io::Io;
use log::info;
use shardseq_lib::depth::DepthAccumulator;
use shardseq_lib::logging::{OperationTimer, format_count, format_percent};
use shardseq_metrics::{CoverageMetric, CoverageRegistry, write_metrics_auto};

use super::command::Command;
use super::common::{BamIoOptions, RangeOptions, log_io};

/// Summarizes coverage per chromosome
#[derive(Parser, Debug)]
#[command(
    name = "coverage",
    about = "Summarize per-chromosome coverage of a coordinate-sorted BAM",
    long_about = r#"
Builds per-position depth from the reads between two virtual offsets of a coordinate-sorted BAM and
writes one row per reference sequence with covered bases, coverage percentage, mean depth over
covered positions, and the percentages of positions with indel or mismatch support.

Mismatches are only known from 'X' CIGAR operations. Unmapped, secondary, and supplementary reads
are skipped.

With --reducer, the raw counters are also written one chromosome per line so that the outputs of
several ranges can be summed.
"#
)]
pub struct Coverage {
    #[command(flatten)]
    pub io: BamIoOptions,

    #[command(flatten)]
    pub range: RangeOptions,

    /// Also write raw per-chromosome counters to this file
    #[arg(long = "reducer")]
    pub reducer: Option<PathBuf>,
}

impl Coverage {
    fn write_reducer_lines(&self, registry: &CoverageRegistry) -> Result<()> {
        let Some(path) = &self.reducer else { return Ok(()) };
        let mut out =
            Io::default().new_writer(path).with_context(|| format!("Failed to create output: {}", path.display()))?;
        for (_, entry) in registry.iter() {
            writeln!(out, "{}", entry.to_reducer_line())?;
        }
        out.flush()?;
        Ok(())
    }
}

impl Command for Coverage {
    fn execute(&self, _command_line: &str) -> Result<()> {
        self.io.validate()?;
        self.range.validate()?;

        info!("Coverage");
        log_io(&self.io, &self.range);
        if let Some(path) = &self.reducer {
            info!("  Reducer output: {}", path.display());
        }

        let timer = OperationTimer::new("Accumulating coverage");
        let mut reader = self.range.open_reader(&self.io.input)?;
        let mut accumulator = DepthAccumulator::new(reader.header());
        while let Some(read) = reader.decode_next()? {
            accumulator
                .add_read(&read)
                .with_context(|| format!("Failed to add read '{}'", read.display_name()))?;
        }
        let used = accumulator.reads_used();
        let total = reader.close();
        let registry = accumulator.finish();

        let (length, covered) =
            registry.iter().fold((0u64, 0u64), |(l, c), (_, e)| (l + e.length(), c + e.covered_bases()));
        info!(
            "Used {} of {} reads; {} of {} positions covered",
            format_count(used),
            format_count(total),
            format_count(covered),
            format_count(length)
        );
        if length > 0 {
            #[expect(clippy::cast_precision_loss, reason = "genome lengths stay far below 2^52")]
            let fraction = covered as f64 / length as f64;
            info!("Overall coverage: {}", format_percent(fraction, 2));
        }

        let metrics: Vec<CoverageMetric> = registry.iter().map(|(_, entry)| CoverageMetric::from(entry)).collect();
        write_metrics_auto(&self.io.output, &metrics)?;
        self.write_reducer_lines(&registry)?;
        timer.log_completion(total);
        Ok(())
    }
}
