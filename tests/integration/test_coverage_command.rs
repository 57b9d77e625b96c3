//! End-to-end CLI tests for the coverage command.

use shardseq_metrics::{ChromosomeCoverage, CoverageRegistry};
use shardseq_sam::ReadBuilder;
use std::fs;
use tempfile::TempDir;

use crate::helpers::{column, offset_arg, read_tsv, run_shardseq, run_shardseq_ok, test_header, write_bam};

#[test]
fn test_coverage_per_chromosome() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.bam");
    let output = temp_dir.path().join("coverage.tsv");

    let reads = vec![
        ReadBuilder::new().name("a").mapped(0, 100, "10M").build(),
        ReadBuilder::new().name("b").mapped(0, 105, "10M").build(),
        ReadBuilder::new().name("u").bases("ACGT").build(),
    ];
    write_bam(&input, &test_header(), &[reads]);

    run_shardseq_ok(&["coverage", "-i", input.to_str().unwrap(), "-o", output.to_str().unwrap()]);

    let rows = read_tsv(&output);
    assert_eq!(column(&rows, "chromosome"), vec!["chr1", "chr2"]);
    assert_eq!(column(&rows, "length"), vec!["10000", "5000"]);
    assert_eq!(column(&rows, "covered_bases"), vec!["15", "0"]);
    assert_eq!(column(&rows, "coverage"), vec!["0.150000", "0.000000"]);
    assert_eq!(column(&rows, "mean_depth"), vec!["1.333333", "0.000000"]);
}

#[test]
fn test_coverage_indels_and_mismatches() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.bam");
    let output = temp_dir.path().join("coverage.tsv");

    let reads = vec![
        ReadBuilder::new().name("x").mapped(1, 1, "2=1X2=").build(),
        ReadBuilder::new().name("i").mapped(1, 1, "2M1I2M").build(),
    ];
    write_bam(&input, &test_header(), &[reads]);

    run_shardseq_ok(&["coverage", "-i", input.to_str().unwrap(), "-o", output.to_str().unwrap()]);

    let rows = read_tsv(&output);
    // chr2 has 5,000 positions: one mismatch and one indel position are 0.02%.
    assert_eq!(column(&rows, "mismatch_rate")[1], "0.020000");
    assert_eq!(column(&rows, "indel_rate")[1], "0.020000");
    assert_eq!(column(&rows, "covered_bases")[1], "5");
}

#[test]
fn test_coverage_reducer_lines_sum_across_shards() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.bam");

    let blocks = vec![
        vec![ReadBuilder::new().name("a").mapped(0, 100, "10M").build()],
        vec![ReadBuilder::new().name("b").mapped(0, 200, "10M").build()],
    ];
    let starts = write_bam(&input, &test_header(), &blocks);

    let mut registry = CoverageRegistry::new();
    for (i, range) in [vec!["--end".to_string(), offset_arg(starts[1])], vec!["--start".to_string(), offset_arg(starts[1])]]
        .iter()
        .enumerate()
    {
        let output = temp_dir.path().join(format!("coverage{i}.tsv"));
        let reducer = temp_dir.path().join(format!("reducer{i}.txt"));
        let mut args = vec![
            "coverage",
            "-i",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--reducer",
            reducer.to_str().unwrap(),
        ];
        args.extend(range.iter().map(String::as_str));
        run_shardseq_ok(&args);

        for line in fs::read_to_string(&reducer).unwrap().lines() {
            registry.absorb_reducer_line(line).unwrap();
        }
    }

    let id = registry.id("chr1").unwrap();
    let chr1: &ChromosomeCoverage = registry.get(id).unwrap();
    assert_eq!(chr1.covered_bases(), 20);
    assert_eq!(chr1.total_depth(), 20);
    assert_eq!(chr1.length(), 10_000);
}

#[test]
fn test_coverage_rejects_unsorted_input() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.bam");
    let output = temp_dir.path().join("coverage.tsv");

    let reads = vec![
        ReadBuilder::new().name("late").mapped(0, 500, "10M").build(),
        ReadBuilder::new().name("early").mapped(0, 100, "10M").build(),
    ];
    write_bam(&input, &test_header(), &[reads]);

    let result = run_shardseq(&["coverage", "-i", input.to_str().unwrap(), "-o", output.to_str().unwrap()]);
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("not coordinate sorted"));
}
