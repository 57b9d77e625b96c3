//! Shard partitioning through the library reader.

use noodles::bgzf::VirtualPosition;
use shardseq_lib::bam_reader::CompressedBlockReader;
use shardseq_lib::shard_key::ShardKeyEncoder;
use shardseq_sam::{Read, ReadBuilder};
use tempfile::TempDir;

use crate::helpers::{read_bam, test_header, write_bam};

fn read_range(path: &std::path::Path, start: Option<VirtualPosition>, end: Option<VirtualPosition>) -> Vec<Read> {
    let mut reader = CompressedBlockReader::open(path).unwrap();
    if let Some(start) = start {
        reader.seek(start).unwrap();
    }
    if let Some(end) = end {
        reader.set_end(end);
    }
    reader.collect::<Result<Vec<_>, _>>().unwrap()
}

#[test]
fn test_shards_at_block_boundaries_cover_file_once() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.bam");

    let blocks: Vec<Vec<Read>> = (0..5)
        .map(|b| {
            (0..3)
                .map(|r| ReadBuilder::new().name(&format!("b{b}r{r}")).mapped(0, 10 * (3 * b + r) + 1, "8M").build())
                .collect()
        })
        .collect();
    let starts = write_bam(&input, &test_header(), &blocks);
    let (_, whole) = read_bam(&input);
    assert_eq!(whole.len(), 15);

    let mut bounds: Vec<Option<VirtualPosition>> = vec![None];
    bounds.extend([starts[2], starts[3]].map(Some));
    bounds.push(None);

    let mut sharded = Vec::new();
    for pair in bounds.windows(2) {
        sharded.extend(read_range(&input, pair[0], pair[1]));
    }

    let names = |reads: &[Read]| reads.iter().map(Read::display_name).collect::<Vec<_>>();
    assert_eq!(names(&sharded), names(&whole));

    let encoder = ShardKeyEncoder::new();
    let keys: Vec<u64> = sharded.iter().map(|r| encoder.encode(r).unwrap()).collect();
    let whole_keys: Vec<u64> = whole.iter().map(|r| encoder.encode(r).unwrap()).collect();
    assert_eq!(keys, whole_keys);
}

#[test]
fn test_seek_inside_block_starts_at_record() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.bam");

    let reads: Vec<Read> = (0..3).map(|i| ReadBuilder::new().name(&format!("r{i}")).mapped(0, i + 1, "4M").build()).collect();
    write_bam(&input, &test_header(), &[reads]);

    let mut reader = CompressedBlockReader::open(&input).unwrap();
    reader.decode_next().unwrap().unwrap();
    let second = reader.current_offset();
    drop(reader);

    let rest = read_range(&input, Some(second), None);
    assert_eq!(rest.iter().map(Read::display_name).collect::<Vec<_>>(), vec!["r1", "r2"]);
}

#[test]
fn test_progress_reaches_one_at_range_end() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.bam");
    let blocks = vec![
        vec![ReadBuilder::new().name("a").mapped(0, 1, "4M").build()],
        vec![ReadBuilder::new().name("b").mapped(0, 2, "4M").build()],
    ];
    let starts = write_bam(&input, &test_header(), &blocks);

    let mut reader = CompressedBlockReader::open(&input).unwrap();
    reader.set_end(starts[1]);
    assert!(reader.progress() < 1.0);
    while reader.decode_next().unwrap().is_some() {}
    assert!((reader.progress() - 1.0).abs() < f64::EPSILON);
    assert_eq!(reader.close(), 1);
}
