#![deny(unsafe_code)]
#![allow(clippy::cast_possible_truncation)]

//! Statistics accumulated over reads and their TSV output.
//!
//! - [`recal`] - Mergeable base quality recalibration statistics
//! - [`coverage`] - Per-chromosome coverage registry
//! - [`clip`] - Clipping run summary
//! - [`writer`] - TSV metric output

pub mod clip;
pub mod coverage;
pub mod recal;
pub mod writer;

use serde::{Deserialize, Serialize};

/// Number of decimal places used for float metrics.
pub const FLOAT_PRECISION: usize = 6;

/// Formats a float value with the standard precision for metrics.
///
/// ```
/// use shardseq_metrics::format_float;
/// assert_eq!(format_float(0.9), "0.900000");
/// ```
#[must_use]
pub fn format_float(value: f64) -> String {
    format!("{value:.FLOAT_PRECISION$}")
}

/// A metric row type that can be written to and read from TSV.
pub trait Metric: Serialize + for<'de> Deserialize<'de> + Clone + Default {
    /// Human-readable name used in log and error messages.
    fn metric_name() -> &'static str;
}

pub use clip::ClippingMetric;
pub use coverage::{
    ChromosomeCoverage, ChromosomeId, CoverageError, CoverageMetric, CoverageRegistry, PositionDepth,
};
pub use recal::{EmpiricalQualityModel, QualityByCycleMetric, RecalError, RecalStatistic, RecalTable};
pub use writer::{write_metrics, write_metrics_auto};
