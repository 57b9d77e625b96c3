//! End-to-end CLI tests for the keys command.

use shardseq_lib::shard_key::UNMAPPED_KEY_PREFIX;
use shardseq_sam::ReadBuilder;
use tempfile::TempDir;

use crate::helpers::{column, offset_arg, read_tsv, run_shardseq, run_shardseq_ok, test_header, write_bam};

#[test]
fn test_keys_for_whole_file() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.bam");
    let output = temp_dir.path().join("keys.tsv");

    let reads = vec![
        ReadBuilder::new().name("a").mapped(0, 100, "10M").build(),
        ReadBuilder::new().name("b").mapped(1, 1, "10M").build(),
        ReadBuilder::new().name("c").bases("ACGT").build(),
    ];
    write_bam(&input, &test_header(), &[reads]);

    run_shardseq_ok(&["keys", "-i", input.to_str().unwrap(), "-o", output.to_str().unwrap()]);

    let rows = read_tsv(&output);
    assert_eq!(rows[0].join("\t"), "key\tname\treference\tposition\tmapped");
    assert_eq!(column(&rows, "name"), vec!["a", "b", "c"]);
    assert_eq!(column(&rows, "reference"), vec!["chr1", "chr2", "*"]);
    assert_eq!(column(&rows, "mapped"), vec!["true", "true", "false"]);

    let keys: Vec<u64> = column(&rows, "key").iter().map(|k| k.parse().unwrap()).collect();
    assert_eq!(keys[0], 99);
    assert_eq!(keys[1], 1 << 32);
    assert!(keys[2] >= UNMAPPED_KEY_PREFIX);
}

#[test]
fn test_keys_are_stable_across_runs() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.bam");
    let first = temp_dir.path().join("first.tsv");
    let second = temp_dir.path().join("second.tsv");

    let reads = (0..5).map(|i| ReadBuilder::new().name(&format!("u{i}")).bases("ACGTACGT").build()).collect();
    write_bam(&input, &test_header(), &[reads]);

    for output in [&first, &second] {
        run_shardseq_ok(&["keys", "-i", input.to_str().unwrap(), "-o", output.to_str().unwrap()]);
    }
    assert_eq!(read_tsv(&first), read_tsv(&second));

    let rows = read_tsv(&first);
    let keys = column(&rows, "key");
    let mut distinct = keys.clone();
    distinct.sort_unstable();
    distinct.dedup();
    assert_eq!(distinct.len(), keys.len(), "differently named reads should hash apart");
}

#[test]
fn test_keys_for_block_range() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.bam");
    let output = temp_dir.path().join("keys.tsv");

    let blocks: Vec<Vec<_>> = (0..3)
        .map(|b| (0..2).map(|r| ReadBuilder::new().name(&format!("b{b}r{r}")).mapped(0, 100 * (b + 1), "5M").build()).collect())
        .collect();
    let starts = write_bam(&input, &test_header(), &blocks);

    run_shardseq_ok(&[
        "keys",
        "-i",
        input.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
        "--start",
        &offset_arg(starts[1]),
        "--end",
        &offset_arg(starts[2]),
    ]);

    let rows = read_tsv(&output);
    assert_eq!(column(&rows, "name"), vec!["b1r0", "b1r1"]);
}

#[test]
fn test_keys_rejects_reversed_range() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.bam");
    let output = temp_dir.path().join("keys.tsv");
    write_bam(&input, &test_header(), &[vec![ReadBuilder::new().mapped(0, 1, "5M").build()]]);

    let result =
        run_shardseq(&["keys", "-i", input.to_str().unwrap(), "-o", output.to_str().unwrap(), "--start", "10/0", "--end", "5/0"]);
    assert!(!result.status.success());
}

#[test]
fn test_keys_rejects_start_inside_header() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.bam");
    let output = temp_dir.path().join("keys.tsv");
    write_bam(&input, &test_header(), &[vec![ReadBuilder::new().mapped(0, 1, "5M").build()]]);

    let result = run_shardseq(&["keys", "-i", input.to_str().unwrap(), "-o", output.to_str().unwrap(), "--start", "0/0"]);
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("Invalid virtual offset"));
}

#[test]
fn test_keys_missing_input() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("keys.tsv");
    let result = run_shardseq(&["keys", "-i", "/nonexistent/input.bam", "-o", output.to_str().unwrap()]);
    assert!(!result.status.success());
    assert!(!output.exists());
}
