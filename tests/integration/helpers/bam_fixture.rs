//! BAM fixtures with explicit block boundaries and binary invocation helpers.

use noodles::bgzf::VirtualPosition;
use shardseq_lib::bam_reader::{CompressedBlockReader, format_offset};
use shardseq_lib::bam_writer::BamWriter;
use shardseq_lib::header::{BamHeader, ReferenceSequence};
use shardseq_sam::Read;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};

/// Header with `chr1` (10,000 bp) and `chr2` (5,000 bp).
pub fn test_header() -> BamHeader {
    BamHeader::from_references(vec![ReferenceSequence::new("chr1", 10_000), ReferenceSequence::new("chr2", 5_000)])
}

/// Writes `blocks` to `path`, one BGZF block per inner vector, and returns
/// the virtual offset of the first record of each block.
pub fn write_bam(path: &Path, header: &BamHeader, blocks: &[Vec<Read>]) -> Vec<VirtualPosition> {
    let mut writer = BamWriter::create(path, header, 1).expect("Failed to create BAM");
    let mut starts = Vec::with_capacity(blocks.len());
    for block in blocks {
        starts.push(writer.virtual_position());
        for read in block {
            writer.write_read(read).expect("Failed to write read");
        }
        writer.flush_block().expect("Failed to flush block");
    }
    let mut inner = writer.finish().expect("Failed to finish BAM");
    std::io::Write::flush(&mut inner).expect("Failed to flush BAM");
    starts
}

/// Every record of the BAM at `path`.
pub fn read_bam(path: &Path) -> (BamHeader, Vec<Read>) {
    let reader = CompressedBlockReader::open(path).expect("Failed to open BAM");
    let header = reader.header().clone();
    let reads = reader.collect::<Result<Vec<_>, _>>().expect("Failed to decode BAM");
    (header, reads)
}

/// Runs the binary with `args`.
pub fn run_shardseq(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_shardseq")).args(args).output().expect("Failed to run shardseq")
}

/// Runs the binary and fails the test with its stderr if it does not succeed.
pub fn run_shardseq_ok(args: &[&str]) -> Output {
    let output = run_shardseq(args);
    assert!(output.status.success(), "shardseq {args:?} failed:\n{}", String::from_utf8_lossy(&output.stderr));
    output
}

/// `C/U` text for a virtual offset, as accepted by `--start` and `--end`.
pub fn offset_arg(offset: VirtualPosition) -> String {
    format_offset(offset)
}

/// Rows of a tab-separated file, header included.
pub fn read_tsv(path: &Path) -> Vec<Vec<String>> {
    fs::read_to_string(path)
        .expect("Failed to read TSV")
        .lines()
        .map(|line| line.split('\t').map(str::to_string).collect())
        .collect()
}

/// Value of column `name` in each data row of `rows`.
pub fn column<'a>(rows: &'a [Vec<String>], name: &str) -> Vec<&'a str> {
    let index = rows[0].iter().position(|c| c == name).unwrap_or_else(|| panic!("no column {name}"));
    rows[1..].iter().map(|row| row[index].as_str()).collect()
}
