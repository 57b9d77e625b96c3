//! Writing metric rows to TSV files.

use anyhow::{Context, Result};
use fgoxide::io::DelimFile;
use log::debug;
use serde::Serialize;
use std::path::Path;

use crate::Metric;

/// Write `metrics` to a TSV file with a header row.
///
/// `description` names the metrics in the error message.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written to.
pub fn write_metrics<P: AsRef<Path>, T: Serialize>(path: P, metrics: &[T], description: &str) -> Result<()> {
    let path = path.as_ref();
    DelimFile::default()
        .write_tsv(&path, metrics)
        .with_context(|| format!("Failed to write {description} metrics: {}", path.display()))?;
    debug!("Wrote {} {description} metric rows to {}", metrics.len(), path.display());
    Ok(())
}

/// [`write_metrics`] using the metric type's own name.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written to.
pub fn write_metrics_auto<P: AsRef<Path>, T: Metric>(path: P, metrics: &[T]) -> Result<()> {
    write_metrics(path, metrics, T::metric_name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::{ChromosomeCoverage, CoverageMetric, PositionDepth};
    use std::fs;
    use tempfile::NamedTempFile;

    #[test]
    fn test_write_coverage_metrics() -> Result<()> {
        let temp_file = NamedTempFile::new()?;
        let mut coverage = ChromosomeCoverage::new("chr1", 10);
        coverage.record_position(&PositionDepth { depth: 2, ..PositionDepth::default() });
        let metrics = vec![CoverageMetric::from(&coverage)];

        write_metrics_auto(temp_file.path(), &metrics)?;

        let content = fs::read_to_string(temp_file.path())?;
        let mut lines = content.lines();
        assert_eq!(
            lines.next(),
            Some("chromosome\tlength\tcovered_bases\tcoverage\tmean_depth\tindel_rate\tmismatch_rate")
        );
        assert_eq!(lines.next(), Some("chr1\t10\t1\t10.000000\t2.000000\t0.000000\t0.000000"));
        Ok(())
    }

    #[test]
    fn test_round_trip() -> Result<()> {
        let temp_file = NamedTempFile::new()?;
        let metrics = vec![
            CoverageMetric { chromosome: "chr1".to_string(), length: 5, ..CoverageMetric::default() },
            CoverageMetric { chromosome: "chr2".to_string(), length: 7, ..CoverageMetric::default() },
        ];
        write_metrics(temp_file.path(), &metrics, "coverage")?;

        let read_back: Vec<CoverageMetric> = DelimFile::default().read_tsv(&temp_file.path())?;
        assert_eq!(read_back, metrics);
        Ok(())
    }

    #[test]
    fn test_invalid_path() {
        let metrics = vec![CoverageMetric::default()];
        let error = write_metrics("/invalid/path/metrics.txt", &metrics, "coverage").unwrap_err();
        assert!(error.to_string().contains("Failed to write coverage metrics"));
    }
}
