//! End-to-end CLI tests for the clip command.

use shardseq_sam::ReadBuilder;
use tempfile::TempDir;

use crate::helpers::{column, read_bam, read_tsv, run_shardseq, run_shardseq_ok, test_header, write_bam};

#[test]
fn test_clip_low_quality_tails_with_metrics() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.bam");
    let output = temp_dir.path().join("output.bam");
    let metrics = temp_dir.path().join("metrics.tsv");

    let reads = vec![
        ReadBuilder::new().name("tails").mapped(0, 100, "8M").qualities(&[2, 2, 30, 30, 30, 30, 30, 2]).build(),
        ReadBuilder::new().name("clean").mapped(0, 200, "8M").build(),
        ReadBuilder::new().name("junk").mapped(0, 300, "4M").qualities(&[2; 4]).build(),
    ];
    write_bam(&input, &test_header(), &[reads]);

    run_shardseq_ok(&[
        "clip",
        "-i",
        input.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
        "--quality-threshold",
        "2",
        "--metrics",
        metrics.to_str().unwrap(),
        "--compression-level",
        "1",
    ]);

    let (_, reads) = read_bam(&output);
    assert_eq!(reads.len(), 2, "the all-low-quality read should be dropped");
    assert_eq!(reads[0].cigar_string(), "2H5M1H");
    assert_eq!(reads[0].alignment_start, 102);
    assert_eq!(reads[0].sequence.len(), 5);
    assert_eq!(reads[1].cigar_string(), "8M");

    let rows = read_tsv(&metrics);
    assert_eq!(column(&rows, "reads"), vec!["3"]);
    assert_eq!(column(&rows, "reads_clipped"), vec!["2"]);
    assert_eq!(column(&rows, "reads_emptied"), vec!["1"]);
    assert_eq!(column(&rows, "bases_in"), vec!["20"]);
    assert_eq!(column(&rows, "bases_out"), vec!["13"]);
}

#[test]
fn test_clip_masking_keeps_read_length() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.bam");
    let output = temp_dir.path().join("output.bam");

    let read = ReadBuilder::new().mapped(0, 100, "4M").bases("ACGT").qualities(&[5, 30, 30, 5]).build();
    write_bam(&input, &test_header(), &[vec![read]]);

    run_shardseq_ok(&[
        "clip",
        "-i",
        input.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
        "--quality-threshold",
        "5",
        "--mode",
        "nq0",
    ]);

    let (_, reads) = read_bam(&output);
    assert_eq!(reads[0].cigar_string(), "4M");
    assert_eq!(reads[0].sequence, b"NCGN");
    assert_eq!(reads[0].quality_scores, vec![0, 30, 30, 0]);
}

#[test]
fn test_clip_to_region_drops_reads_elsewhere() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.bam");
    let output = temp_dir.path().join("output.bam");

    let reads = vec![
        ReadBuilder::new().name("overlap").mapped(0, 100, "10M").build(),
        ReadBuilder::new().name("outside").mapped(0, 500, "10M").build(),
        ReadBuilder::new().name("other_chrom").mapped(1, 100, "10M").build(),
    ];
    write_bam(&input, &test_header(), &[reads]);

    run_shardseq_ok(&[
        "clip",
        "-i",
        input.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
        "--region",
        "chr1:100-104",
    ]);

    let (_, reads) = read_bam(&output);
    assert_eq!(reads.len(), 1);
    assert_eq!(reads[0].name, "overlap");
    assert_eq!(reads[0].cigar_string(), "5M5H");
}

#[test]
fn test_clip_reverts_soft_clips() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.bam");
    let output = temp_dir.path().join("output.bam");

    let read = ReadBuilder::new().mapped(0, 100, "3S7M").build();
    write_bam(&input, &test_header(), &[vec![read]]);

    run_shardseq_ok(&["clip", "-i", input.to_str().unwrap(), "-o", output.to_str().unwrap(), "--revert-soft-clips"]);

    let (_, reads) = read_bam(&output);
    assert_eq!(reads[0].cigar_string(), "10M");
    assert_eq!(reads[0].alignment_start, 97);
}

#[test]
fn test_clip_hard_clips_soft_clips_and_records_program() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.bam");
    let output = temp_dir.path().join("output.bam");

    let read = ReadBuilder::new().mapped(0, 100, "2S6M2S").build();
    write_bam(&input, &test_header(), &[vec![read]]);

    run_shardseq_ok(&["clip", "-i", input.to_str().unwrap(), "-o", output.to_str().unwrap(), "--hard-clip-soft-clips"]);

    let (header, reads) = read_bam(&output);
    assert_eq!(reads[0].cigar_string(), "2H6M2H");
    assert_eq!(reads[0].alignment_start, 100);
    assert!(header.text().contains("@PG"));
    assert!(header.text().contains("ID:shardseq"));
    assert_eq!(header.references(), test_header().references());
}

#[test]
fn test_clip_rejects_quality_above_maximum() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.bam");
    let output = temp_dir.path().join("output.bam");
    write_bam(&input, &test_header(), &[vec![ReadBuilder::new().mapped(0, 100, "4M").build()]]);

    let result = run_shardseq(&[
        "clip",
        "-i",
        input.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
        "--quality-threshold",
        "94",
    ]);
    assert!(!result.status.success());
    assert!(!output.exists());
}

#[test]
fn test_clip_rejects_unknown_region_reference() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.bam");
    let output = temp_dir.path().join("output.bam");
    write_bam(&input, &test_header(), &[vec![ReadBuilder::new().mapped(0, 100, "4M").build()]]);

    let result =
        run_shardseq(&["clip", "-i", input.to_str().unwrap(), "-o", output.to_str().unwrap(), "--region", "chrZ:1-10"]);
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("chrZ"));
}
