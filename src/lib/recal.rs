//! Folding aligned bases into recalibration statistics.
//!
//! Bases are keyed by `(reported quality, machine cycle)`. Only bases aligned
//! with an explicit `=` or `X` operation are observed: without a reference the
//! outcome of an `M` base is unknown.

use noodles::sam::alignment::record::Flags;
use noodles::sam::alignment::record::cigar::op::Kind;
use shardseq_metrics::{QualityByCycleMetric, RecalTable};
use shardseq_sam::{MISSING_QUALITY, Read};

/// `(reported quality, cycle)`.
pub type QualityCycleKey = (u8, i32);

/// Reads with these flags are not observed.
const SKIPPED_FLAGS: Flags = Flags::UNMAPPED
    .union(Flags::SECONDARY)
    .union(Flags::SUPPLEMENTARY)
    .union(Flags::DUPLICATE)
    .union(Flags::QC_FAIL);

/// 1-based sequencing cycle of the base at 0-based `offset`.
///
/// Reverse-strand reads were sequenced from their last stored base; second
/// reads of a pair get negative cycles.
#[must_use]
pub fn cycle(read: &Read, offset: usize) -> i32 {
    let from_start = if read.is_reverse_complemented() { read.len() - offset } else { offset + 1 };
    let cycle = from_start as i32;
    if read.is_paired() && read.flags.is_last_segment() { -cycle } else { cycle }
}

/// Adds every `=`/`X` base of `read` to `table` and returns how many were added.
pub fn observe_read(table: &mut RecalTable<QualityCycleKey>, read: &Read) -> u64 {
    if read.flags.intersects(SKIPPED_FLAGS) {
        return 0;
    }

    let mut observed = 0;
    let mut offset = 0;
    for op in &read.cigar {
        let len = op.len();
        match op.kind() {
            Kind::SequenceMatch | Kind::SequenceMismatch => {
                let is_error = op.kind() == Kind::SequenceMismatch;
                for i in offset..offset + len {
                    let Some(&quality) = read.quality_scores.get(i) else { break };
                    if quality == MISSING_QUALITY {
                        continue;
                    }
                    table.observe((quality, cycle(read, i)), quality, is_error);
                    observed += 1;
                }
                offset += len;
            }
            Kind::Match | Kind::Insertion | Kind::SoftClip => offset += len,
            Kind::Deletion | Kind::Skip | Kind::HardClip | Kind::Pad => {}
        }
    }
    observed
}

/// One metric row per key, in key order.
#[must_use]
pub fn to_metrics(table: &RecalTable<QualityCycleKey>) -> Vec<QualityByCycleMetric> {
    table.iter().map(|(&(quality, cycle), statistic)| QualityByCycleMetric::new(quality, cycle, statistic)).collect()
}
