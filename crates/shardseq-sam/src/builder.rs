//! Fluent construction of [`Read`] values for tests and fixtures.
//!
//! ```rust
//! use shardseq_sam::builder::ReadBuilder;
//!
//! let read = ReadBuilder::new()
//!     .name("q1")
//!     .mapped(0, 100, "10M5S")
//!     .build();
//! assert_eq!(read.len(), 15);
//! assert_eq!(read.alignment_end(), 109);
//! ```

use bstr::BString;
use noodles::sam::alignment::record::Flags;

use crate::cigar::{parse_cigar, read_length};
use crate::record::{Read, UNMAPPED_REFERENCE_ID};

pub const DEFAULT_BASE_QUALITY: u8 = 30;
pub const DEFAULT_MAPQ: u8 = 60;

/// Builder for a single [`Read`].
///
/// Reads start out unmapped. When bases are not given, a mapped read gets as
/// many `A`s as its CIGAR consumes; when qualities are not given, every base
/// gets [`DEFAULT_BASE_QUALITY`].
#[derive(Debug, Clone)]
pub struct ReadBuilder {
    name: String,
    flags: Flags,
    reference_sequence_id: i32,
    alignment_start: i32,
    mapping_quality: u8,
    cigar: Option<String>,
    mate_reference_sequence_id: i32,
    mate_alignment_start: i32,
    template_length: i32,
    bases: Option<Vec<u8>>,
    qualities: Option<Vec<u8>>,
    data: Vec<u8>,
    raw: Option<Vec<u8>>,
}

impl Default for ReadBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: "read".to_string(),
            flags: Flags::UNMAPPED,
            reference_sequence_id: UNMAPPED_REFERENCE_ID,
            alignment_start: 0,
            mapping_quality: 0,
            cigar: None,
            mate_reference_sequence_id: UNMAPPED_REFERENCE_ID,
            mate_alignment_start: 0,
            template_length: 0,
            bases: None,
            qualities: None,
            data: Vec::new(),
            raw: None,
        }
    }

    #[must_use]
    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    #[must_use]
    pub fn bases(mut self, bases: &str) -> Self {
        self.bases = Some(bases.as_bytes().to_vec());
        self
    }

    #[must_use]
    pub fn qualities(mut self, qualities: &[u8]) -> Self {
        self.qualities = Some(qualities.to_vec());
        self
    }

    /// Places the read on reference `reference_sequence_id` at 1-based `start`.
    #[must_use]
    pub fn mapped(mut self, reference_sequence_id: i32, start: i32, cigar: &str) -> Self {
        self.flags.remove(Flags::UNMAPPED);
        self.reference_sequence_id = reference_sequence_id;
        self.alignment_start = start;
        self.mapping_quality = DEFAULT_MAPQ;
        self.cigar = Some(cigar.to_string());
        self
    }

    /// Marks the read unmapped but placed at the given coordinates, as
    /// aligners do for the unmapped mate of a mapped read.
    #[must_use]
    pub fn placed_unmapped(mut self, reference_sequence_id: i32, start: i32) -> Self {
        self.flags.insert(Flags::UNMAPPED);
        self.reference_sequence_id = reference_sequence_id;
        self.alignment_start = start;
        self.cigar = None;
        self
    }

    #[must_use]
    pub fn reverse(mut self, reverse: bool) -> Self {
        self.flags.set(Flags::REVERSE_COMPLEMENTED, reverse);
        self
    }

    /// Marks the read paired and sets its mate's position and strand.
    #[must_use]
    pub fn mate(mut self, reference_sequence_id: i32, start: i32, reverse: bool) -> Self {
        self.flags.insert(Flags::SEGMENTED);
        self.flags.remove(Flags::MATE_UNMAPPED);
        self.flags.set(Flags::MATE_REVERSE_COMPLEMENTED, reverse);
        self.mate_reference_sequence_id = reference_sequence_id;
        self.mate_alignment_start = start;
        self
    }

    #[must_use]
    pub fn mate_unmapped(mut self) -> Self {
        self.flags.insert(Flags::SEGMENTED | Flags::MATE_UNMAPPED);
        self
    }

    #[must_use]
    pub fn template_length(mut self, template_length: i32) -> Self {
        self.template_length = template_length;
        self
    }

    #[must_use]
    pub fn mapping_quality(mut self, mapping_quality: u8) -> Self {
        self.mapping_quality = mapping_quality;
        self
    }

    #[must_use]
    pub fn flags(mut self, flags: Flags) -> Self {
        self.flags = flags;
        self
    }

    #[must_use]
    pub fn data(mut self, data: Vec<u8>) -> Self {
        self.data = data;
        self
    }

    #[must_use]
    pub fn raw(mut self, raw: Vec<u8>) -> Self {
        self.raw = Some(raw);
        self
    }

    /// # Panics
    ///
    /// Panics if the CIGAR text does not parse.
    #[must_use]
    pub fn build(self) -> Read {
        let cigar = match &self.cigar {
            Some(text) => parse_cigar(text).unwrap_or_else(|e| panic!("bad test CIGAR: {e}")),
            None => Vec::new(),
        };
        let sequence = self.bases.unwrap_or_else(|| vec![b'A'; read_length(&cigar)]);
        let quality_scores = self.qualities.unwrap_or_else(|| vec![DEFAULT_BASE_QUALITY; sequence.len()]);

        Read {
            name: BString::from(self.name),
            flags: self.flags,
            reference_sequence_id: self.reference_sequence_id,
            alignment_start: self.alignment_start,
            mapping_quality: self.mapping_quality,
            cigar,
            mate_reference_sequence_id: self.mate_reference_sequence_id,
            mate_alignment_start: self.mate_alignment_start,
            template_length: self.template_length,
            sequence,
            quality_scores,
            data: self.data,
            raw: self.raw,
        }
    }
}
