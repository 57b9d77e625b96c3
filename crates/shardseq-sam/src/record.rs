//! The decoded read record that flows through sharding and clipping.

use bstr::{BStr, BString};
use noodles::sam::alignment::record::Flags;
use noodles::sam::alignment::record::cigar::Op;
use noodles::sam::alignment::record::cigar::op::Kind;

use crate::cigar::{self, format_cigar};

/// Reference index used for reads without a reference.
pub const UNMAPPED_REFERENCE_ID: i32 = -1;

/// Quality value stored when a read has no qualities.
pub const MISSING_QUALITY: u8 = 0xff;

/// A single alignment record.
///
/// `sequence` and `quality_scores` always have the same length, equal to the
/// number of read bases described by `cigar` when the read has one. Qualities
/// are raw Phred values, not ASCII-offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Read {
    pub name: BString,
    pub flags: Flags,
    pub reference_sequence_id: i32,
    /// 1-based leftmost aligned position; 0 when unset.
    pub alignment_start: i32,
    pub mapping_quality: u8,
    pub cigar: Vec<Op>,
    pub mate_reference_sequence_id: i32,
    /// 1-based; 0 when unset.
    pub mate_alignment_start: i32,
    pub template_length: i32,
    pub sequence: Vec<u8>,
    pub quality_scores: Vec<u8>,
    /// Auxiliary fields in their BAM binary encoding, carried through untouched.
    pub data: Vec<u8>,
    /// The undecoded record bytes this read came from, if it has not been
    /// modified since. Used for hashing only.
    pub raw: Option<Vec<u8>>,
}

impl Default for Read {
    fn default() -> Self {
        Self {
            name: BString::default(),
            flags: Flags::UNMAPPED,
            reference_sequence_id: UNMAPPED_REFERENCE_ID,
            alignment_start: 0,
            mapping_quality: 0,
            cigar: Vec::new(),
            mate_reference_sequence_id: UNMAPPED_REFERENCE_ID,
            mate_alignment_start: 0,
            template_length: 0,
            sequence: Vec::new(),
            quality_scores: Vec::new(),
            data: Vec::new(),
            raw: None,
        }
    }
}

impl Read {
    /// The empty read derived from `read`: same name, reference, and mate
    /// information, no bases, no qualities, no CIGAR, alignment start 0.
    #[must_use]
    pub fn empty_from(read: &Read) -> Self {
        Self {
            name: read.name.clone(),
            flags: read.flags,
            reference_sequence_id: read.reference_sequence_id,
            alignment_start: 0,
            mapping_quality: 0,
            cigar: Vec::new(),
            mate_reference_sequence_id: read.mate_reference_sequence_id,
            mate_alignment_start: read.mate_alignment_start,
            template_length: read.template_length,
            sequence: Vec::new(),
            quality_scores: Vec::new(),
            data: Vec::new(),
            raw: None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &BStr {
        self.name.as_ref()
    }

    /// Read name as text for diagnostics.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.name.to_string()
    }

    /// Number of bases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    /// True for the empty read.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    #[must_use]
    pub fn is_unmapped(&self) -> bool {
        self.flags.is_unmapped()
    }

    #[must_use]
    pub fn is_reverse_complemented(&self) -> bool {
        self.flags.is_reverse_complemented()
    }

    #[must_use]
    pub fn is_paired(&self) -> bool {
        self.flags.is_segmented()
    }

    #[must_use]
    pub fn is_mate_unmapped(&self) -> bool {
        self.flags.is_mate_unmapped()
    }

    #[must_use]
    pub fn is_mate_reverse_complemented(&self) -> bool {
        self.flags.is_mate_reverse_complemented()
    }

    /// 1-based alignment start as a signed coordinate.
    #[must_use]
    pub fn alignment_start(&self) -> i64 {
        i64::from(self.alignment_start)
    }

    /// Reference bases covered by the alignment.
    #[must_use]
    pub fn reference_length(&self) -> usize {
        cigar::reference_length(&self.cigar)
    }

    /// 1-based inclusive end of the alignment; 0 for unmapped reads.
    ///
    /// A mapped read without reference-consuming operations ends one base
    /// before it starts.
    #[must_use]
    pub fn alignment_end(&self) -> i64 {
        if self.is_unmapped() {
            return 0;
        }
        self.alignment_start() + self.reference_length() as i64 - 1
    }

    /// Alignment start extended over leading soft clips.
    #[must_use]
    pub fn soft_start(&self) -> i64 {
        let mut start = self.alignment_start();
        for op in &self.cigar {
            match op.kind() {
                Kind::SoftClip => start -= op.len() as i64,
                Kind::HardClip => {}
                _ => break,
            }
        }
        start
    }

    /// Alignment end extended over trailing soft clips.
    #[must_use]
    pub fn soft_end(&self) -> i64 {
        let mut end = self.alignment_end();
        for op in self.cigar.iter().rev() {
            match op.kind() {
                Kind::SoftClip => end += op.len() as i64,
                Kind::HardClip => {}
                _ => break,
            }
        }
        end
    }

    /// Alignment start extended over leading soft and hard clips.
    #[must_use]
    pub fn unclipped_start(&self) -> i64 {
        let clipped: usize = self
            .cigar
            .iter()
            .take_while(|op| matches!(op.kind(), Kind::SoftClip | Kind::HardClip))
            .map(|op| op.len())
            .sum();
        self.alignment_start() - clipped as i64
    }

    /// Alignment end extended over trailing soft and hard clips.
    #[must_use]
    pub fn unclipped_end(&self) -> i64 {
        let clipped: usize = self
            .cigar
            .iter()
            .rev()
            .take_while(|op| matches!(op.kind(), Kind::SoftClip | Kind::HardClip))
            .map(|op| op.len())
            .sum();
        self.alignment_end() + clipped as i64
    }

    /// Canonical CIGAR text; `*` when there are no operations.
    #[must_use]
    pub fn cigar_string(&self) -> String {
        format_cigar(&self.cigar)
    }

    /// Total length of hard clip operations.
    #[must_use]
    pub fn hard_clipped_length(&self) -> usize {
        self.cigar.iter().filter(|op| op.kind() == Kind::HardClip).map(|op| op.len()).sum()
    }

    /// Copy of this read with the raw bytes dropped; every transformation
    /// starts from here.
    #[must_use]
    pub fn detached(&self) -> Self {
        Self { raw: None, ..self.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ReadBuilder;
    use rstest::rstest;

    #[rstest]
    #[case("10M", 100, 109, 100, 109)]
    #[case("5S10M", 100, 109, 95, 109)]
    #[case("2H3S10M4S1H", 100, 109, 97, 113)]
    #[case("5M2D5M", 100, 111, 100, 111)]
    fn test_alignment_bounds(
        #[case] cigar: &str,
        #[case] start: i32,
        #[case] end: i64,
        #[case] soft_start: i64,
        #[case] soft_end: i64,
    ) {
        let read = ReadBuilder::new().mapped(0, start, cigar).build();
        assert_eq!(read.alignment_end(), end);
        assert_eq!(read.soft_start(), soft_start);
        assert_eq!(read.soft_end(), soft_end);
    }

    #[test]
    fn test_unclipped_bounds_include_hard_clips() {
        let read = ReadBuilder::new().mapped(0, 100, "2H3S10M4S1H").build();
        assert_eq!(read.unclipped_start(), 95);
        assert_eq!(read.unclipped_end(), 114);
        assert_eq!(read.hard_clipped_length(), 3);
    }

    #[test]
    fn test_unmapped_read_has_no_end() {
        let read = ReadBuilder::new().bases("ACGT").build();
        assert!(read.is_unmapped());
        assert_eq!(read.alignment_end(), 0);
        assert_eq!(read.cigar_string(), "*");
    }

    #[test]
    fn test_empty_from_keeps_identity() {
        let read = ReadBuilder::new().name("q1").mapped(3, 100, "10M").raw(vec![1, 2, 3]).build();
        let empty = Read::empty_from(&read);
        assert!(empty.is_empty());
        assert_eq!(empty.name, "q1");
        assert_eq!(empty.reference_sequence_id, 3);
        assert_eq!(empty.alignment_start, 0);
        assert!(empty.cigar.is_empty());
        assert!(empty.quality_scores.is_empty());
        assert!(empty.raw.is_none());
    }

    #[test]
    fn test_detached_drops_raw() {
        let read = ReadBuilder::new().bases("AC").raw(vec![9]).build();
        assert!(read.detached().raw.is_none());
        assert_eq!(read.detached().sequence, read.sequence);
    }
}
