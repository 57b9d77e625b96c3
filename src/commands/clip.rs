//! `clip` command implementation.
//!
//! Runs every read in a range through a fixed clipping pipeline and writes
//! the non-empty results to a new BAM file.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::info;
use shardseq_lib::bam_writer::BamWriter;
use shardseq_lib::logging::{OperationTimer, format_count};
use shardseq_lib::validation::{Region, validate_quality_score};
use shardseq_metrics::{ClippingMetric, write_metrics_auto};
use shardseq_sam::clipper::{
    clip_low_quality_tails, hard_clip_adaptor_sequence, hard_clip_soft_clipped_bases, hard_clip_to_region,
    revert_soft_clips, revert_soft_clips_above_quality,
};
use shardseq_sam::{ClippingRepresentation, InsertSizeAdaptorBoundary, Read};
use std::io::Write;
use std::path::PathBuf;

use super::command::Command;
use super::common::{BamIoOptions, CompressionOptions, RangeOptions, log_io};

/// How clipped bases are represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ClipMode {
    /// Remove bases and record them as `H`
    Hard,
    /// Keep bases and record them as `S`
    Soft,
    /// Replace bases with `N`
    N,
    /// Set qualities to 0
    Q0,
    /// Replace bases with `N` and set qualities to 0
    Nq0,
}

impl From<ClipMode> for ClippingRepresentation {
    fn from(mode: ClipMode) -> Self {
        match mode {
            ClipMode::Hard => ClippingRepresentation::HardClipBases,
            ClipMode::Soft => ClippingRepresentation::SoftClipBases,
            ClipMode::N => ClippingRepresentation::WriteNs,
            ClipMode::Q0 => ClippingRepresentation::WriteQ0s,
            ClipMode::Nq0 => ClippingRepresentation::WriteNsQ0s,
        }
    }
}

/// Clips reads in a BAM range
#[derive(Parser, Debug)]
#[command(
    name = "clip",
    about = "Clip reads in a BAM range",
    long_about = r#"
Clips every read between two virtual offsets and writes the results to a new BAM file. Steps run in
this order, each only when requested:

1. --revert-soft-clips: turn soft clips back into aligned bases. With --min-quality, the outer
   part of each soft-clipped tail whose qualities drop below the minimum is hard-clipped first.
2. --hard-clip-soft-clips: hard-clip all soft-clipped bases.
3. --clip-adaptors: hard-clip bases past the fragment end implied by the template length.
4. --region: hard-clip bases outside CHR:START-END; reads outside the region are dropped.
5. --quality-threshold: clip tails whose qualities are all at or below the threshold, using --mode.

Reads left without bases are dropped. Unmapped reads skip steps 1 to 3, are dropped by --region, and
are only quality clipped when --mode is not soft.
"#
)]
#[allow(clippy::struct_excessive_bools)]
pub struct Clip {
    #[command(flatten)]
    pub io: BamIoOptions,

    #[command(flatten)]
    pub range: RangeOptions,

    /// Representation of bases clipped for low quality
    #[arg(short = 'm', long = "mode", value_enum, default_value_t = ClipMode::Hard)]
    pub mode: ClipMode,

    /// Clip read tails with qualities at or below this value
    #[arg(short = 'q', long = "quality-threshold")]
    pub quality_threshold: Option<u8>,

    /// Keep only the part of each read inside CHR:START-END (1-based, inclusive)
    #[arg(long = "region")]
    pub region: Option<String>,

    /// Hard-clip soft-clipped bases
    #[arg(long = "hard-clip-soft-clips", default_value = "false")]
    pub hard_clip_soft_clips: bool,

    /// Hard-clip adaptor sequence past the fragment end
    #[arg(long = "clip-adaptors", default_value = "false")]
    pub clip_adaptors: bool,

    /// Revert soft clips to aligned bases
    #[arg(long = "revert-soft-clips", default_value = "false")]
    pub revert_soft_clips: bool,

    /// With --revert-soft-clips, hard-clip soft-clipped bases outside the
    /// run of qualities at or above this value
    #[arg(long = "min-quality", requires = "revert_soft_clips")]
    pub min_quality: Option<u8>,

    /// Output file for clipping metrics
    #[arg(long = "metrics")]
    pub metrics: Option<PathBuf>,

    #[command(flatten)]
    pub compression: CompressionOptions,
}

/// The steps selected on the command line, resolved against the header.
struct ClipPipeline {
    revert_soft_clips: bool,
    min_quality: Option<u8>,
    hard_clip_soft_clips: bool,
    clip_adaptors: bool,
    region: Option<(i32, i64, i64)>,
    quality_threshold: Option<u8>,
    representation: ClippingRepresentation,
}

impl ClipPipeline {
    /// Applies every selected step to `read`.
    fn apply(&self, read: &Read) -> Result<Read> {
        let mut read = read.detached();
        let mapped = !read.is_unmapped();

        if self.revert_soft_clips && mapped {
            read = match self.min_quality {
                Some(min_quality) => revert_soft_clips_above_quality(&read, min_quality)?,
                None => revert_soft_clips(&read)?,
            };
        }
        if self.hard_clip_soft_clips && mapped {
            read = hard_clip_soft_clipped_bases(&read)?;
        }
        if self.clip_adaptors && mapped {
            read = hard_clip_adaptor_sequence(&read, &InsertSizeAdaptorBoundary)?;
        }
        if let Some((reference_sequence_id, start, end)) = self.region {
            if read.reference_sequence_id != reference_sequence_id {
                return Ok(Read::empty_from(&read));
            }
            read = hard_clip_to_region(&read, start, end)?;
        }
        if let Some(threshold) = self.quality_threshold {
            let soft = self.representation == ClippingRepresentation::SoftClipBases;
            if !read.is_empty() && (mapped || !soft) {
                read = clip_low_quality_tails(&read, self.representation, threshold)?;
            }
        }
        Ok(read)
    }
}

impl Command for Clip {
    fn execute(&self, command_line: &str) -> Result<()> {
        self.io.validate()?;
        self.range.validate()?;
        if let Some(q) = self.quality_threshold {
            validate_quality_score(q)?;
        }
        if let Some(q) = self.min_quality {
            validate_quality_score(q)?;
        }
        let region = self.region.as_deref().map(Region::parse).transpose()?;

        info!("Clip");
        log_io(&self.io, &self.range);
        info!("  Mode: {:?}", self.mode);
        info!("  Quality threshold: {:?}", self.quality_threshold);
        info!("  Region: {}", self.region.as_deref().unwrap_or("none"));
        info!("  Hard clip soft clips: {}", self.hard_clip_soft_clips);
        info!("  Clip adaptors: {}", self.clip_adaptors);
        info!("  Revert soft clips: {} (min quality {:?})", self.revert_soft_clips, self.min_quality);

        let timer = OperationTimer::new("Clipping reads");
        let mut reader = self.range.open_reader(&self.io.input)?;
        let region = region.map(|r| r.reference_id(reader.header()).map(|id| (id, r.start, r.end))).transpose()?;

        let pipeline = ClipPipeline {
            revert_soft_clips: self.revert_soft_clips,
            min_quality: self.min_quality,
            hard_clip_soft_clips: self.hard_clip_soft_clips,
            clip_adaptors: self.clip_adaptors,
            region,
            quality_threshold: self.quality_threshold,
            representation: self.mode.into(),
        };

        let header = reader.header().with_program(env!("CARGO_PKG_VERSION"), command_line)?;
        let mut writer = BamWriter::create(&self.io.output, &header, self.compression.compression_level)
            .with_context(|| format!("Failed to create output BAM: {}", self.io.output.display()))?;

        let mut metric = ClippingMetric::default();
        while let Some(read) = reader.decode_next()? {
            let clipped =
                pipeline.apply(&read).with_context(|| format!("Failed to clip read '{}'", read.display_name()))?;
            let changed = clipped.cigar != read.cigar
                || clipped.sequence != read.sequence
                || clipped.quality_scores != read.quality_scores;
            metric.record(read.len(), clipped.len(), changed);
            if !clipped.is_empty() {
                writer.write_read(&clipped)?;
            }
        }
        writer.finish()?.flush()?;
        let total = reader.close();

        let metric = metric.finish();
        info!(
            "Clipped {} of {} reads; dropped {}",
            format_count(metric.reads_clipped),
            format_count(metric.reads),
            format_count(metric.reads_emptied)
        );
        if let Some(path) = &self.metrics {
            write_metrics_auto(path, &[metric])?;
        }
        timer.log_completion(total);
        Ok(())
    }
}
