//! Base quality recalibration statistics.
//!
//! A [`RecalStatistic`] counts how many bases were observed in one bucket and
//! how many of them disagreed with the reference, together with the quality
//! the sequencer reported for them. Buckets are filled per worker and merged
//! with [`RecalStatistic::combine`] or [`RecalTable::merge`].

use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Metric, format_float};

/// Result type alias for recalibration statistics.
pub type Result<T> = std::result::Result<T, RecalError>;

/// Errors raised when constructing or updating a statistic.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecalError {
    /// A count or quality outside its valid range.
    #[error("Invalid {field}: {value} ({reason})")]
    InvalidArgument {
        /// Name of the offending argument
        field: &'static str,
        /// The value given
        value: String,
        /// What is wrong with it
        reason: &'static str,
    },
}

fn invalid(field: &'static str, value: impl fmt::Display, reason: &'static str) -> RecalError {
    RecalError::InvalidArgument { field, value: value.to_string(), reason }
}

/// Phred-scaled quality to error probability.
#[must_use]
pub fn quality_to_error_probability(quality: f64) -> f64 {
    10f64.powf(-quality / 10.0)
}

/// Error probability to Phred-scaled quality.
#[must_use]
pub fn error_probability_to_quality(probability: f64) -> f64 {
    -10.0 * probability.log10()
}

/// Smoothing and capping applied when turning counts into an empirical
/// quality.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmpiricalQualityModel {
    /// Pseudo-count added to the mismatches.
    pub prior_mismatches: f64,
    /// Pseudo-count added to the bases.
    pub prior_bases: f64,
    /// Highest empirical quality reported.
    pub quality_ceiling: f64,
}

impl EmpiricalQualityModel {
    pub const PRIOR_MISMATCHES: f64 = 1.0;
    pub const PRIOR_BASES: f64 = 2.0;
    pub const QUALITY_CEILING: f64 = 93.0;

    pub const DEFAULT: Self = Self {
        prior_mismatches: Self::PRIOR_MISMATCHES,
        prior_bases: Self::PRIOR_BASES,
        quality_ceiling: Self::QUALITY_CEILING,
    };

    /// Smoothed mismatch rate.
    #[must_use]
    #[expect(clippy::cast_precision_loss, reason = "base counts never exceed 2^53")]
    pub fn error_rate(&self, bases: u64, mismatches: u64) -> f64 {
        (mismatches as f64 + self.prior_mismatches) / (bases as f64 + self.prior_bases)
    }

    /// Phred quality of the smoothed mismatch rate, capped at the ceiling.
    #[must_use]
    pub fn quality(&self, bases: u64, mismatches: u64) -> f64 {
        error_probability_to_quality(self.error_rate(bases, mismatches)).min(self.quality_ceiling)
    }
}

impl Default for EmpiricalQualityModel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Observed bases and mismatches for one recalibration bucket.
#[derive(Debug, Clone)]
pub struct RecalStatistic {
    bases: u64,
    mismatches: u64,
    estimated_quality: f64,
    model: EmpiricalQualityModel,
    empirical_quality: OnceCell<f64>,
}

impl RecalStatistic {
    /// # Errors
    ///
    /// Returns [`RecalError::InvalidArgument`] if a count is negative, the
    /// quality is negative or not finite, or `mismatches > bases`.
    pub fn new(bases: i64, mismatches: i64, estimated_quality: f64) -> Result<Self> {
        let bases = u64::try_from(bases).map_err(|_| invalid("bases", bases, "must not be negative"))?;
        let mismatches =
            u64::try_from(mismatches).map_err(|_| invalid("mismatches", mismatches, "must not be negative"))?;
        Self::from_counts(bases, mismatches, estimated_quality)
    }

    /// # Errors
    ///
    /// As [`RecalStatistic::new`], for counts that are already unsigned.
    pub fn from_counts(bases: u64, mismatches: u64, estimated_quality: f64) -> Result<Self> {
        if mismatches > bases {
            return Err(invalid("mismatches", mismatches, "must not exceed bases"));
        }
        validate_quality(estimated_quality)?;
        Ok(Self {
            bases,
            mismatches,
            estimated_quality,
            model: EmpiricalQualityModel::DEFAULT,
            empirical_quality: OnceCell::new(),
        })
    }

    /// A previously reported row, with its empirical quality taken as given
    /// until the next mutation.
    ///
    /// # Errors
    ///
    /// As [`RecalStatistic::from_counts`]; the empirical quality must also be
    /// finite and non-negative.
    pub fn from_report_row(
        bases: u64,
        mismatches: u64,
        estimated_quality: f64,
        empirical_quality: f64,
    ) -> Result<Self> {
        validate_quality(empirical_quality)?;
        let statistic = Self::from_counts(bases, mismatches, estimated_quality)?;
        // A fresh cell always accepts its first value.
        let _ = statistic.empirical_quality.set(empirical_quality);
        Ok(statistic)
    }

    /// A single base observation.
    #[must_use]
    pub fn from_observation(quality: u8, is_error: bool) -> Self {
        Self {
            bases: 1,
            mismatches: u64::from(is_error),
            estimated_quality: f64::from(quality),
            model: EmpiricalQualityModel::DEFAULT,
            empirical_quality: OnceCell::new(),
        }
    }

    /// Replace the smoothing model.
    #[must_use]
    pub fn with_model(mut self, model: EmpiricalQualityModel) -> Self {
        self.model = model;
        self.invalidate();
        self
    }

    #[must_use]
    pub fn bases(&self) -> u64 {
        self.bases
    }

    #[must_use]
    pub fn mismatches(&self) -> u64 {
        self.mismatches
    }

    #[must_use]
    pub fn estimated_quality(&self) -> f64 {
        self.estimated_quality
    }

    #[must_use]
    pub fn model(&self) -> &EmpiricalQualityModel {
        &self.model
    }

    /// # Errors
    ///
    /// Returns [`RecalError::InvalidArgument`] for a negative or non-finite
    /// quality.
    pub fn set_estimated_quality(&mut self, quality: f64) -> Result<()> {
        validate_quality(quality)?;
        self.estimated_quality = quality;
        Ok(())
    }

    /// Count one more base.
    pub fn increment(&mut self, is_error: bool) {
        self.bases += 1;
        self.mismatches += u64::from(is_error);
        self.invalidate();
    }

    /// Add the other statistic's counts, leaving the estimated quality alone.
    pub fn add_counts(&mut self, other: &RecalStatistic) {
        self.bases += other.bases;
        self.mismatches += other.mismatches;
        self.invalidate();
    }

    /// Merge `other` into this statistic.
    ///
    /// The estimated qualities are combined through their expected error
    /// counts, so the result is the quality the pooled bases would have been
    /// reported at. With no bases on either side the estimate is unchanged.
    ///
    /// Error rates are scaled against the lower of the two qualities, so very
    /// high qualities whose error probability underflows still combine to a
    /// finite value between the inputs.
    pub fn combine(&mut self, other: &RecalStatistic) {
        let sides = [(self.bases, self.estimated_quality), (other.bases, other.estimated_quality)];
        let floor = sides.iter().filter(|(bases, _)| *bases > 0).map(|&(_, q)| q).reduce(f64::min);
        self.add_counts(other);
        let Some(floor) = floor else { return };

        #[expect(clippy::cast_precision_loss, reason = "base counts never exceed 2^53")]
        let scaled_errors: f64 =
            sides.iter().map(|&(bases, q)| bases as f64 * quality_to_error_probability(q - floor)).sum();
        #[expect(clippy::cast_precision_loss, reason = "base counts never exceed 2^53")]
        let bases = self.bases as f64;
        self.estimated_quality = floor + error_probability_to_quality(scaled_errors / bases);
    }

    /// Number of errors implied by the estimated quality.
    #[must_use]
    #[expect(clippy::cast_precision_loss, reason = "base counts never exceed 2^53")]
    pub fn expected_errors(&self) -> f64 {
        self.bases as f64 * quality_to_error_probability(self.estimated_quality)
    }

    #[must_use]
    pub fn empirical_error_rate(&self) -> f64 {
        self.model.error_rate(self.bases, self.mismatches)
    }

    /// Phred quality of the observed error rate; cached until the next
    /// mutation.
    #[must_use]
    pub fn empirical_quality(&self) -> f64 {
        *self.empirical_quality.get_or_init(|| self.model.quality(self.bases, self.mismatches))
    }

    fn invalidate(&mut self) {
        self.empirical_quality = OnceCell::new();
    }
}

fn validate_quality(quality: f64) -> Result<()> {
    if !quality.is_finite() {
        return Err(invalid("quality", quality, "must be finite"));
    }
    if quality < 0.0 {
        return Err(invalid("quality", quality, "must not be negative"));
    }
    Ok(())
}

impl PartialEq for RecalStatistic {
    fn eq(&self, other: &Self) -> bool {
        self.bases == other.bases
            && self.mismatches == other.mismatches
            && self.estimated_quality == other.estimated_quality
            && self.model == other.model
    }
}

impl fmt::Display for RecalStatistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}\t{:.4}", self.bases, self.mismatches, self.estimated_quality)
    }
}

/// Statistics grouped by a caller-defined key, iterated in key order.
#[derive(Debug, Clone, PartialEq)]
pub struct RecalTable<K: Ord> {
    entries: BTreeMap<K, RecalStatistic>,
}

impl<K: Ord> Default for RecalTable<K> {
    fn default() -> Self {
        Self { entries: BTreeMap::new() }
    }
}

impl<K: Ord> RecalTable<K> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one base in the bucket for `key`.
    pub fn observe(&mut self, key: K, quality: u8, is_error: bool) {
        let observation = RecalStatistic::from_observation(quality, is_error);
        match self.entries.entry(key) {
            std::collections::btree_map::Entry::Occupied(mut entry) => entry.get_mut().combine(&observation),
            std::collections::btree_map::Entry::Vacant(entry) => {
                entry.insert(observation);
            }
        }
    }

    /// Fold a whole statistic into the bucket for `key`.
    pub fn add(&mut self, key: K, statistic: &RecalStatistic) {
        match self.entries.get_mut(&key) {
            Some(existing) => existing.combine(statistic),
            None => {
                self.entries.insert(key, statistic.clone());
            }
        }
    }

    /// Combine every bucket of `other` into this table.
    pub fn merge(&mut self, other: RecalTable<K>) {
        for (key, statistic) in other.entries {
            self.add(key, &statistic);
        }
    }

    #[must_use]
    pub fn get(&self, key: &K) -> Option<&RecalStatistic> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &RecalStatistic)> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of every bucket.
    #[must_use]
    pub fn total(&self) -> Option<RecalStatistic> {
        let mut iter = self.entries.values();
        let mut total = iter.next()?.clone();
        for statistic in iter {
            total.combine(statistic);
        }
        Some(total)
    }
}

/// One row of a table keyed by reported quality and machine cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QualityByCycleMetric {
    /// Quality reported by the sequencer
    pub reported_quality: u8,
    /// 1-based cycle; negative for the second read of a pair
    pub cycle: i32,
    /// Bases observed
    pub bases: u64,
    /// Bases disagreeing with the reference
    pub mismatches: u64,
    /// Pooled reported quality
    pub estimated_quality: String,
    /// Quality derived from the observed mismatch rate
    pub empirical_quality: String,
}

impl QualityByCycleMetric {
    #[must_use]
    pub fn new(reported_quality: u8, cycle: i32, statistic: &RecalStatistic) -> Self {
        Self {
            reported_quality,
            cycle,
            bases: statistic.bases(),
            mismatches: statistic.mismatches(),
            estimated_quality: format_float(statistic.estimated_quality()),
            empirical_quality: format_float(statistic.empirical_quality()),
        }
    }
}

impl Metric for QualityByCycleMetric {
    fn metric_name() -> &'static str {
        "recalibration"
    }
}
