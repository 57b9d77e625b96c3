//! Whole-genome coverage accounting.
//!
//! A [`CoverageRegistry`] owns one [`ChromosomeCoverage`] per chromosome,
//! created the first time the chromosome is seen and addressed afterwards by
//! its interned [`ChromosomeId`]. Registries built by separate workers are
//! combined with [`CoverageRegistry::merge`], or through the text form each
//! entry renders to with [`ChromosomeCoverage::to_reducer_line`].

use std::collections::HashMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Metric, format_float};

/// Result type alias for coverage accounting.
pub type Result<T> = std::result::Result<T, CoverageError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoverageError {
    #[error("Malformed coverage line '{line}': {reason}")]
    MalformedLine { line: String, reason: String },

    #[error("Unknown coverage counter '{key}'")]
    UnknownCounter { key: String },

    #[error("Chromosome {name} has length {expected} but {found} was given")]
    LengthMismatch { name: String, expected: u64, found: u64 },
}

/// Index of a chromosome within one [`CoverageRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChromosomeId(u32);

impl ChromosomeId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// What the reads say about one reference position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PositionDepth {
    /// Reads with an aligned base here.
    pub depth: u32,
    /// Some read has an insertion after, or a deletion over, this position.
    pub has_indel: bool,
    /// Some read has a mismatching base here.
    pub has_mismatch: bool,
    /// Some read deletes this position.
    pub has_deletion: bool,
}

const LENGTH: &str = "LENGTH";
const TOTAL_DEPTH: &str = "TOTAL_DEPTH";
const COVERED: &str = "COVERED";
const INDEL_REF: &str = "INDEL_REF";
const MISMATCH_REF: &str = "MISMATCH_REF";

/// Coverage counters for one chromosome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChromosomeCoverage {
    name: String,
    length: u64,
    total_depth: u64,
    covered_bases: u64,
    indel_bases: u64,
    mismatch_bases: u64,
}

impl ChromosomeCoverage {
    #[must_use]
    pub fn new(name: &str, length: u64) -> Self {
        Self {
            name: name.to_string(),
            length,
            total_depth: 0,
            covered_bases: 0,
            indel_bases: 0,
            mismatch_bases: 0,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn length(&self) -> u64 {
        self.length
    }

    #[must_use]
    pub fn total_depth(&self) -> u64 {
        self.total_depth
    }

    #[must_use]
    pub fn covered_bases(&self) -> u64 {
        self.covered_bases
    }

    #[must_use]
    pub fn indel_bases(&self) -> u64 {
        self.indel_bases
    }

    #[must_use]
    pub fn mismatch_bases(&self) -> u64 {
        self.mismatch_bases
    }

    /// Count one reference position.
    ///
    /// A position is covered when a read aligns a base to it or deletes it.
    /// Indel and mismatch support only count where some base is aligned.
    pub fn record_position(&mut self, position: &PositionDepth) {
        if position.depth > 0 {
            self.total_depth += u64::from(position.depth);
            self.covered_bases += 1;
            self.indel_bases += u64::from(position.has_indel);
            self.mismatch_bases += u64::from(position.has_mismatch);
        } else if position.has_deletion {
            self.covered_bases += 1;
        }
    }

    /// Add another entry's counters.
    ///
    /// # Errors
    ///
    /// Returns [`CoverageError::LengthMismatch`] if the lengths differ.
    pub fn merge(&mut self, other: &ChromosomeCoverage) -> Result<()> {
        if other.length != self.length {
            return Err(CoverageError::LengthMismatch {
                name: self.name.clone(),
                expected: self.length,
                found: other.length,
            });
        }
        self.total_depth += other.total_depth;
        self.covered_bases += other.covered_bases;
        self.indel_bases += other.indel_bases;
        self.mismatch_bases += other.mismatch_bases;
        Ok(())
    }

    /// Percentage of the chromosome that is covered.
    #[must_use]
    pub fn coverage_percent(&self) -> f64 {
        self.rate_of(self.covered_bases)
    }

    /// Mean depth over covered positions; 0 when nothing is covered.
    #[must_use]
    #[expect(clippy::cast_precision_loss, reason = "depth totals never exceed 2^53")]
    pub fn mean_depth(&self) -> f64 {
        if self.covered_bases == 0 {
            return 0.0;
        }
        self.total_depth as f64 / self.covered_bases as f64
    }

    /// `count` as a percentage of the chromosome length; 0 for an empty
    /// chromosome.
    #[must_use]
    #[expect(clippy::cast_precision_loss, reason = "chromosome lengths never exceed 2^53")]
    pub fn rate_of(&self, count: u64) -> f64 {
        if self.length == 0 {
            return 0.0;
        }
        100.0 * count as f64 / self.length as f64
    }

    /// One tab-separated line: the name followed by `KEY value` counters.
    #[must_use]
    pub fn to_reducer_line(&self) -> String {
        let mut line = self.name.clone();
        for (key, value) in [
            (LENGTH, self.length),
            (TOTAL_DEPTH, self.total_depth),
            (COVERED, self.covered_bases),
            (INDEL_REF, self.indel_bases),
            (MISMATCH_REF, self.mismatch_bases),
        ] {
            let _ = write!(line, "\t{key} {value}");
        }
        line
    }

    /// Parse a line written by [`ChromosomeCoverage::to_reducer_line`].
    /// Counters that are missing from the line are zero.
    ///
    /// # Errors
    ///
    /// Returns [`CoverageError::MalformedLine`] for a field that is not
    /// `KEY value` or a value that is not a count, and
    /// [`CoverageError::UnknownCounter`] for an unrecognised key.
    pub fn parse(line: &str) -> Result<Self> {
        let malformed = |reason: &str| CoverageError::MalformedLine { line: line.to_string(), reason: reason.to_string() };

        let mut fields = line.trim_end().split('\t');
        let name = fields.next().filter(|name| !name.is_empty()).ok_or_else(|| malformed("missing chromosome name"))?;
        let mut coverage = Self::new(name, 0);

        for field in fields {
            let (key, value) = field.split_once(' ').ok_or_else(|| malformed("expected 'KEY value'"))?;
            let value: u64 = value.trim().parse().map_err(|_| malformed("counter value is not a count"))?;
            match key {
                LENGTH => coverage.length = value,
                TOTAL_DEPTH => coverage.total_depth = value,
                COVERED => coverage.covered_bases = value,
                INDEL_REF => coverage.indel_bases = value,
                MISMATCH_REF => coverage.mismatch_bases = value,
                _ => return Err(CoverageError::UnknownCounter { key: key.to_string() }),
            }
        }
        Ok(coverage)
    }
}

/// The owner of every chromosome's coverage entry.
#[derive(Debug, Clone, Default)]
pub struct CoverageRegistry {
    ids: HashMap<String, ChromosomeId>,
    entries: Vec<ChromosomeCoverage>,
}

impl CoverageRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of the entry for `name`, creating it with `length` if needed.
    pub fn get_or_create(&mut self, name: &str, length: u64) -> ChromosomeId {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        // BAM reference indices are i32, so the count always fits.
        let id = ChromosomeId(self.entries.len() as u32);
        self.entries.push(ChromosomeCoverage::new(name, length));
        self.ids.insert(name.to_string(), id);
        id
    }

    #[must_use]
    pub fn id(&self, name: &str) -> Option<ChromosomeId> {
        self.ids.get(name).copied()
    }

    #[must_use]
    pub fn get(&self, id: ChromosomeId) -> Option<&ChromosomeCoverage> {
        self.entries.get(id.index())
    }

    pub fn get_mut(&mut self, id: ChromosomeId) -> Option<&mut ChromosomeCoverage> {
        self.entries.get_mut(id.index())
    }

    /// Entries in the order they were created.
    pub fn iter(&self) -> impl Iterator<Item = (ChromosomeId, &ChromosomeCoverage)> {
        self.entries.iter().enumerate().map(|(i, entry)| (ChromosomeId(i as u32), entry))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fold one entry in by chromosome name.
    ///
    /// # Errors
    ///
    /// Returns [`CoverageError::LengthMismatch`] if the chromosome is already
    /// registered with a different length.
    pub fn absorb(&mut self, entry: &ChromosomeCoverage) -> Result<ChromosomeId> {
        let id = self.get_or_create(entry.name(), entry.length());
        self.entries[id.index()].merge(entry)?;
        Ok(id)
    }

    /// Fold a line written by [`ChromosomeCoverage::to_reducer_line`] in.
    ///
    /// # Errors
    ///
    /// Parsing errors, or a length mismatch with an existing entry.
    pub fn absorb_reducer_line(&mut self, line: &str) -> Result<ChromosomeId> {
        let entry = ChromosomeCoverage::parse(line)?;
        self.absorb(&entry)
    }

    /// Combine another registry into this one, by chromosome name.
    ///
    /// # Errors
    ///
    /// Returns [`CoverageError::LengthMismatch`] on the first chromosome whose
    /// lengths disagree.
    pub fn merge(&mut self, other: &CoverageRegistry) -> Result<()> {
        for entry in &other.entries {
            self.absorb(entry)?;
        }
        Ok(())
    }
}

/// Per-chromosome coverage summary row.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CoverageMetric {
    /// Chromosome name
    pub chromosome: String,
    /// Chromosome length
    pub length: u64,
    /// Positions covered by at least one read
    pub covered_bases: u64,
    /// Percentage of positions covered
    pub coverage: String,
    /// Mean depth over covered positions
    pub mean_depth: String,
    /// Percentage of positions with indel support
    pub indel_rate: String,
    /// Percentage of positions with mismatch support
    pub mismatch_rate: String,
}

impl From<&ChromosomeCoverage> for CoverageMetric {
    fn from(entry: &ChromosomeCoverage) -> Self {
        Self {
            chromosome: entry.name().to_string(),
            length: entry.length(),
            covered_bases: entry.covered_bases(),
            coverage: format_float(entry.coverage_percent()),
            mean_depth: format_float(entry.mean_depth()),
            indel_rate: format_float(entry.rate_of(entry.indel_bases())),
            mismatch_rate: format_float(entry.rate_of(entry.mismatch_bases())),
        }
    }
}

impl Metric for CoverageMetric {
    fn metric_name() -> &'static str {
        "coverage"
    }
}
