//! End-to-end CLI tests for the recal command.

use noodles::sam::alignment::record::Flags;
use shardseq_sam::ReadBuilder;
use tempfile::TempDir;

use crate::helpers::{column, read_tsv, run_shardseq_ok, test_header, write_bam};

#[test]
fn test_recal_counts_by_quality_and_cycle() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.bam");
    let output = temp_dir.path().join("recal.tsv");

    let reads = vec![
        ReadBuilder::new().name("fwd").mapped(0, 100, "3=1X").qualities(&[30; 4]).build(),
        ReadBuilder::new().name("rev").mapped(0, 100, "4=").qualities(&[20; 4]).reverse(true).build(),
        // Plain M bases carry no match information.
        ReadBuilder::new().name("m").mapped(0, 100, "4M").build(),
        ReadBuilder::new().name("dup").mapped(0, 100, "4X").flags(Flags::DUPLICATE).build(),
    ];
    write_bam(&input, &test_header(), &[reads]);

    run_shardseq_ok(&["recal", "-i", input.to_str().unwrap(), "-o", output.to_str().unwrap()]);

    let rows = read_tsv(&output);
    assert_eq!(column(&rows, "reported_quality"), vec!["20", "20", "20", "20", "30", "30", "30", "30"]);
    assert_eq!(column(&rows, "cycle"), vec!["1", "2", "3", "4", "1", "2", "3", "4"]);
    assert_eq!(column(&rows, "bases"), vec!["1"; 8]);
    assert_eq!(column(&rows, "mismatches"), vec!["0", "0", "0", "0", "0", "0", "0", "1"]);
}

#[test]
fn test_recal_second_of_pair_gets_negative_cycles() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.bam");
    let output = temp_dir.path().join("recal.tsv");

    let flags = Flags::SEGMENTED | Flags::LAST_SEGMENT;
    let read = ReadBuilder::new().mapped(0, 100, "2=").qualities(&[25, 25]).flags(flags).build();
    write_bam(&input, &test_header(), &[vec![read]]);

    run_shardseq_ok(&["recal", "-i", input.to_str().unwrap(), "-o", output.to_str().unwrap()]);

    let rows = read_tsv(&output);
    assert_eq!(column(&rows, "cycle"), vec!["-2", "-1"]);
}

#[test]
fn test_recal_with_no_eligible_bases_writes_header_only() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.bam");
    let output = temp_dir.path().join("recal.tsv");
    write_bam(&input, &test_header(), &[vec![ReadBuilder::new().bases("ACGT").build()]]);

    run_shardseq_ok(&["recal", "-i", input.to_str().unwrap(), "-o", output.to_str().unwrap()]);

    let rows = read_tsv(&output);
    assert!(rows.len() <= 1);
}
