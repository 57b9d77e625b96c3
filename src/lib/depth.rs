//! Per-position depth from a coordinate-sorted read stream.
//!
//! [`DepthAccumulator`] keeps a window of [`PositionDepth`] values starting at
//! the leftmost position a later read could still touch. When a read starts
//! further right, every position before it is final and is folded into the
//! chromosome's [`ChromosomeCoverage`] entry.

use log::debug;
use noodles::sam::alignment::record::Flags;
use noodles::sam::alignment::record::cigar::op::Kind;
use shardseq_metrics::{ChromosomeId, CoverageRegistry, PositionDepth};
use shardseq_sam::Read;
use std::collections::VecDeque;

use crate::errors::{Result, ShardseqError};
use crate::header::BamHeader;

/// Reads with these flags do not add depth.
const SKIPPED_FLAGS: Flags = Flags::UNMAPPED.union(Flags::SECONDARY).union(Flags::SUPPLEMENTARY);

struct CurrentChromosome {
    reference_sequence_id: i32,
    id: ChromosomeId,
    length: i64,
    last_start: i64,
}

pub struct DepthAccumulator {
    registry: CoverageRegistry,
    ids: Vec<ChromosomeId>,
    lengths: Vec<i64>,
    current: Option<CurrentChromosome>,
    window_start: i64,
    window: VecDeque<PositionDepth>,
    reads_used: u64,
}

impl DepthAccumulator {
    /// Accumulator with one registry entry per reference in `header`, in
    /// header order.
    #[must_use]
    pub fn new(header: &BamHeader) -> Self {
        let mut registry = CoverageRegistry::new();
        let mut ids = Vec::with_capacity(header.references().len());
        let mut lengths = Vec::with_capacity(header.references().len());
        for reference in header.references() {
            ids.push(registry.get_or_create(&reference.name, u64::from(reference.length)));
            lengths.push(i64::from(reference.length));
        }
        Self { registry, ids, lengths, current: None, window_start: 1, window: VecDeque::new(), reads_used: 0 }
    }

    /// Number of reads that contributed depth.
    #[must_use]
    pub fn reads_used(&self) -> u64 {
        self.reads_used
    }

    /// Adds one read.
    ///
    /// # Errors
    ///
    /// Returns an error if the read refers to a reference missing from the
    /// header or arrives out of coordinate order.
    pub fn add_read(&mut self, read: &Read) -> Result<()> {
        if read.flags.intersects(SKIPPED_FLAGS) || read.cigar.is_empty() || read.alignment_start < 1 {
            return Ok(());
        }
        self.switch_to(read.reference_sequence_id)?;
        let start = read.alignment_start();
        if let Some(current) = self.current.as_mut() {
            if start < current.last_start {
                return Err(unsorted(format!(
                    "read '{}' at {start} follows a read at {}",
                    read.name, current.last_start
                )));
            }
            current.last_start = start;
        }

        self.flush_before(start);
        let mut position = start;
        for op in &read.cigar {
            let len = op.len() as i64;
            match op.kind() {
                Kind::Match | Kind::SequenceMatch | Kind::SequenceMismatch => {
                    let mismatch = op.kind() == Kind::SequenceMismatch;
                    for p in position..position + len {
                        let depth = self.at(p);
                        depth.depth += 1;
                        depth.has_mismatch |= mismatch;
                    }
                    position += len;
                }
                Kind::Insertion => {
                    if position - 1 >= self.window_start {
                        self.at(position - 1).has_indel = true;
                    }
                }
                Kind::Deletion => {
                    for p in position..position + len {
                        let depth = self.at(p);
                        depth.has_indel = true;
                        depth.has_deletion = true;
                    }
                    position += len;
                }
                Kind::Skip => position += len,
                Kind::SoftClip | Kind::HardClip | Kind::Pad => {}
            }
        }
        self.reads_used += 1;
        Ok(())
    }

    /// Folds the remaining window into the registry and returns it.
    #[must_use]
    pub fn finish(mut self) -> CoverageRegistry {
        self.flush_before(i64::MAX);
        debug!("Accumulated depth from {} reads", self.reads_used);
        self.registry
    }

    fn switch_to(&mut self, reference_sequence_id: i32) -> Result<()> {
        if self.current.as_ref().is_some_and(|c| c.reference_sequence_id == reference_sequence_id) {
            return Ok(());
        }
        let index = usize::try_from(reference_sequence_id)
            .ok()
            .filter(|&i| i < self.ids.len())
            .ok_or_else(|| ShardseqError::ReferenceNotFound { ref_name: reference_sequence_id.to_string() })?;
        if let Some(previous) = &self.current {
            if reference_sequence_id < previous.reference_sequence_id {
                return Err(unsorted(format!(
                    "reference {reference_sequence_id} follows reference {}",
                    previous.reference_sequence_id
                )));
            }
        }

        self.flush_before(i64::MAX);
        self.current = Some(CurrentChromosome {
            reference_sequence_id,
            id: self.ids[index],
            length: self.lengths[index],
            last_start: 1,
        });
        self.window_start = 1;
        Ok(())
    }

    /// Depth slot for 1-based `position`, growing the window as needed.
    fn at(&mut self, position: i64) -> &mut PositionDepth {
        if self.window.is_empty() {
            self.window_start = position;
        }
        let index = (position - self.window_start) as usize;
        if index >= self.window.len() {
            self.window.resize(index + 1, PositionDepth::default());
        }
        &mut self.window[index]
    }

    /// Records every windowed position before `limit`.
    fn flush_before(&mut self, limit: i64) {
        let Some(current) = &self.current else {
            self.window.clear();
            return;
        };
        let length = current.length;
        let mut entry = self.registry.get_mut(current.id);
        while self.window_start < limit {
            let Some(depth) = self.window.pop_front() else { break };
            if (1..=length).contains(&self.window_start) {
                if let Some(entry) = entry.as_deref_mut() {
                    entry.record_position(&depth);
                }
            }
            self.window_start += 1;
        }
    }
}

fn unsorted(reason: String) -> ShardseqError {
    ShardseqError::InvalidFileFormat {
        file_type: "BAM".to_string(),
        path: "input".to_string(),
        reason: format!("not coordinate sorted: {reason}"),
    }
}
