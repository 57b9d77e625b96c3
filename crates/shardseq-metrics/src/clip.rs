//! Summary counts for a clipping run.

use serde::{Deserialize, Serialize};

use crate::{Metric, format_float};

/// One row summarizing every read passed through a clipping pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClippingMetric {
    /// Reads seen.
    pub reads: u64,
    /// Reads changed by at least one clip.
    pub reads_clipped: u64,
    /// Reads left with no bases and dropped.
    pub reads_emptied: u64,
    /// Bases in the input reads.
    pub bases_in: u64,
    /// Bases in the output reads.
    pub bases_out: u64,
    /// `1 - bases_out / bases_in`.
    pub fraction_bases_removed: String,
}

impl ClippingMetric {
    /// Counts one read that had `bases_in` bases before clipping and
    /// `bases_out` after.
    pub fn record(&mut self, bases_in: usize, bases_out: usize, changed: bool) {
        self.reads += 1;
        self.reads_clipped += u64::from(changed);
        self.reads_emptied += u64::from(bases_out == 0 && bases_in > 0);
        self.bases_in += bases_in as u64;
        self.bases_out += bases_out as u64;
    }

    /// Adds another run's counts to this one.
    pub fn merge(&mut self, other: &ClippingMetric) {
        self.reads += other.reads;
        self.reads_clipped += other.reads_clipped;
        self.reads_emptied += other.reads_emptied;
        self.bases_in += other.bases_in;
        self.bases_out += other.bases_out;
    }

    /// Fills in the derived fraction.
    #[must_use]
    #[expect(clippy::cast_precision_loss, reason = "base counts stay far below 2^52")]
    pub fn finish(mut self) -> Self {
        let fraction = if self.bases_in == 0 { 0.0 } else { 1.0 - self.bases_out as f64 / self.bases_in as f64 };
        self.fraction_bases_removed = format_float(fraction);
        self
    }
}

impl Metric for ClippingMetric {
    fn metric_name() -> &'static str {
        "clipping"
    }
}
