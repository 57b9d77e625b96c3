//! Common CLI options shared across commands.
//!
//! These are composed into command structs using `#[command(flatten)]`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use log::info;
use noodles::bgzf::VirtualPosition;

use shardseq_lib::bam_reader::{CompressedBlockReader, format_offset};
use shardseq_lib::bam_writer::DEFAULT_COMPRESSION_LEVEL;
use shardseq_lib::validation::{validate_file_exists, validate_range_order};

/// Input BAM and output file.
#[derive(Debug, Clone, Args)]
pub struct BamIoOptions {
    /// Input BAM file
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,

    /// Output file
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,
}

impl BamIoOptions {
    /// Validates that the input file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the input file does not exist.
    pub fn validate(&self) -> Result<()> {
        validate_file_exists(&self.input, "Input BAM")?;
        Ok(())
    }
}

/// Parses a virtual offset given either as a raw 64-bit value or as
/// `COMPRESSED/UNCOMPRESSED`.
///
/// # Errors
///
/// Returns an error if the text is not a number, or the in-block offset does
/// not fit in 16 bits, or the block offset does not fit in 48 bits.
pub fn parse_virtual_offset(text: &str) -> std::result::Result<VirtualPosition, String> {
    match text.split_once('/') {
        Some((compressed, uncompressed)) => {
            let compressed: u64 =
                compressed.trim().parse().map_err(|e| format!("invalid block offset '{compressed}': {e}"))?;
            let uncompressed: u16 = uncompressed
                .trim()
                .parse()
                .map_err(|e| format!("invalid in-block offset '{uncompressed}': {e}"))?;
            if compressed >> 48 != 0 {
                return Err(format!("block offset {compressed} does not fit in 48 bits"));
            }
            Ok(VirtualPosition::from((compressed << 16) | u64::from(uncompressed)))
        }
        None => text.trim().parse::<u64>().map(VirtualPosition::from).map_err(|e| format!("invalid offset '{text}': {e}")),
    }
}

/// Virtual offset range to decode.
#[derive(Debug, Clone, Default, Args)]
pub struct RangeOptions {
    /// First virtual offset to decode, as a raw value or COMPRESSED/UNCOMPRESSED
    #[arg(long = "start", value_parser = parse_virtual_offset)]
    pub start: Option<VirtualPosition>,

    /// Virtual offset at which decoding stops (exclusive)
    #[arg(long = "end", value_parser = parse_virtual_offset)]
    pub end: Option<VirtualPosition>,
}

impl RangeOptions {
    /// Validates that `start` does not come after `end`.
    ///
    /// # Errors
    ///
    /// Returns an error if both are set and `end < start`.
    pub fn validate(&self) -> Result<()> {
        if let (Some(start), Some(end)) = (self.start, self.end) {
            validate_range_order(u64::from(start), u64::from(end), "--start", "--end")?;
        }
        Ok(())
    }

    /// Opens `path` and positions the reader on this range.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or the start offset is invalid.
    pub fn open_reader(&self, path: &Path) -> Result<CompressedBlockReader> {
        let mut reader = CompressedBlockReader::open(path)
            .with_context(|| format!("Failed to open input BAM: {}", path.display()))?;
        if let Some(start) = self.start {
            reader.seek(start).with_context(|| format!("Failed to seek to {}", format_offset(start)))?;
        }
        if let Some(end) = self.end {
            reader.set_end(end);
        }
        Ok(reader)
    }

    #[must_use]
    pub fn log_message(&self) -> String {
        let describe = |offset: Option<VirtualPosition>, default: &str| {
            offset.map_or_else(|| default.to_string(), format_offset)
        };
        format!("Range: {} to {}", describe(self.start, "first record"), describe(self.end, "end of file"))
    }
}

/// Output compression.
#[derive(Debug, Clone, Args)]
pub struct CompressionOptions {
    /// Compression level for output BAM (1-12).
    #[arg(long, default_value_t = DEFAULT_COMPRESSION_LEVEL)]
    pub compression_level: u32,
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self { compression_level: DEFAULT_COMPRESSION_LEVEL }
    }
}

/// Logs the shared parameters of a command.
pub fn log_io(io: &BamIoOptions, range: &RangeOptions) {
    info!("  Input: {}", io.input.display());
    info!("  Output: {}", io.output.display());
    info!("  {}", range.log_message());
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("0", 0, 0)]
    #[case("65537", 1, 1)]
    #[case("12/34", 12, 34)]
    #[case(" 7 / 0 ", 7, 0)]
    fn test_parse_virtual_offset(#[case] text: &str, #[case] compressed: u64, #[case] uncompressed: u16) {
        let offset = parse_virtual_offset(text).unwrap();
        assert_eq!(offset.compressed(), compressed);
        assert_eq!(offset.uncompressed(), uncompressed);
    }

    #[rstest]
    #[case("abc")]
    #[case("1/70000")]
    #[case("-1")]
    #[case("281474976710656/0")]
    fn test_parse_virtual_offset_rejects(#[case] text: &str) {
        assert!(parse_virtual_offset(text).is_err());
    }

    #[test]
    fn test_range_validation() {
        let range = RangeOptions { start: Some(VirtualPosition::from(10)), end: Some(VirtualPosition::from(5)) };
        assert!(range.validate().is_err());
        let range = RangeOptions { start: Some(VirtualPosition::from(5)), end: None };
        range.validate().unwrap();
        assert!(range.log_message().contains("0/5 to end of file"));
    }

    #[test]
    fn test_missing_input_rejected() {
        let io = BamIoOptions { input: PathBuf::from("/nonexistent.bam"), output: PathBuf::from("out") };
        assert!(io.validate().unwrap_err().to_string().contains("File does not exist"));
    }
}
