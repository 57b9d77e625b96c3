//! Validation of command-line inputs before any work starts.

use crate::errors::{Result, ShardseqError};
use crate::header::BamHeader;
use std::fmt::Display;
use std::path::Path;

/// Highest Phred score representable in SAM.
pub const MAX_PHRED_QUALITY: u8 = 93;

/// Validate that a file exists
///
/// ```
/// use shardseq_lib::validation::validate_file_exists;
///
/// assert!(validate_file_exists("/nonexistent/file.bam", "Input BAM").is_err());
/// ```
///
/// # Errors
/// Returns an error if the file does not exist
pub fn validate_file_exists<P: AsRef<Path>>(path: P, description: &str) -> Result<()> {
    let path_ref = path.as_ref();
    if !path_ref.exists() {
        return Err(ShardseqError::InvalidFileFormat {
            file_type: description.to_string(),
            path: path_ref.display().to_string(),
            reason: "File does not exist".to_string(),
        });
    }
    Ok(())
}

/// Validate that a quality score is in the Phred range [0, 93]
///
/// # Errors
/// Returns an error if the quality is above 93
pub fn validate_quality_score(quality: u8) -> Result<()> {
    if quality > MAX_PHRED_QUALITY {
        return Err(ShardseqError::InvalidQuality { value: quality, max: MAX_PHRED_QUALITY });
    }
    Ok(())
}

/// Validate that `start` does not come after `end`
///
/// # Errors
/// Returns an error naming `end_name` if `end < start`
#[allow(clippy::needless_pass_by_value)]
pub fn validate_range_order<T: Ord + Display>(start: T, end: T, start_name: &str, end_name: &str) -> Result<()> {
    if end < start {
        return Err(ShardseqError::InvalidParameter {
            parameter: end_name.to_string(),
            reason: format!("{end_name} ({end}) must be >= {start_name} ({start})"),
        });
    }
    Ok(())
}

/// A reference region given as `NAME:START-END`, 1-based and inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub name: String,
    pub start: i64,
    pub end: i64,
}

impl Region {
    /// Parses `NAME:START-END`. Names may themselves contain `:`.
    ///
    /// ```
    /// use shardseq_lib::validation::Region;
    ///
    /// let region = Region::parse("chr1:100-200").unwrap();
    /// assert_eq!((region.name.as_str(), region.start, region.end), ("chr1", 100, 200));
    /// ```
    ///
    /// # Errors
    /// Returns an error if the text is malformed or `START > END` or `START < 1`
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = |reason: &str| ShardseqError::InvalidParameter {
            parameter: "region".to_string(),
            reason: format!("{reason}: '{text}' (expected NAME:START-END)"),
        };

        let (name, span) = text.rsplit_once(':').ok_or_else(|| invalid("Missing ':'"))?;
        let (start, end) = span.split_once('-').ok_or_else(|| invalid("Missing '-'"))?;
        let start: i64 = start.replace(',', "").parse().map_err(|_| invalid("Invalid start"))?;
        let end: i64 = end.replace(',', "").parse().map_err(|_| invalid("Invalid end"))?;
        if name.is_empty() {
            return Err(invalid("Empty reference name"));
        }
        if start < 1 {
            return Err(invalid("Start must be >= 1"));
        }
        validate_range_order(start, end, "region start", "region end")?;
        Ok(Self { name: name.to_string(), start, end })
    }

    /// Index of the region's reference in `header`.
    ///
    /// # Errors
    /// Returns [`ShardseqError::ReferenceNotFound`] if the header lacks it
    pub fn reference_id(&self, header: &BamHeader) -> Result<i32> {
        header.reference_id(&self.name).ok_or_else(|| ShardseqError::ReferenceNotFound { ref_name: self.name.clone() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::ReferenceSequence;
    use rstest::rstest;
    use tempfile::NamedTempFile;

    #[test]
    fn test_validate_file_exists() {
        let temp_file = NamedTempFile::new().unwrap();
        validate_file_exists(temp_file.path(), "Test file").unwrap();

        let error = validate_file_exists("/nonexistent/file.bam", "Input BAM").unwrap_err();
        let msg = error.to_string();
        assert!(msg.contains("Input BAM"));
        assert!(msg.contains("File does not exist"));
    }

    #[rstest]
    #[case(0, true)]
    #[case(30, true)]
    #[case(93, true)]
    #[case(94, false)]
    #[case(255, false)]
    fn test_validate_quality_score(#[case] quality: u8, #[case] valid: bool) {
        assert_eq!(validate_quality_score(quality).is_ok(), valid);
    }

    #[test]
    fn test_validate_range_order() {
        validate_range_order(1, 1, "start", "end").unwrap();
        validate_range_order(1, 5, "start", "end").unwrap();
        let error = validate_range_order(5, 1, "start", "end").unwrap_err();
        assert!(error.to_string().contains("end (1) must be >= start (5)"));
    }

    #[rstest]
    #[case("chr1:1-10", "chr1", 1, 10)]
    #[case("chr2:1,000-2,000", "chr2", 1000, 2000)]
    #[case("HLA-A*01:01:5-5", "HLA-A*01:01", 5, 5)]
    fn test_region_parse(#[case] text: &str, #[case] name: &str, #[case] start: i64, #[case] end: i64) {
        assert_eq!(Region::parse(text).unwrap(), Region { name: name.to_string(), start, end });
    }

    #[rstest]
    #[case("chr1")]
    #[case("chr1:10")]
    #[case(":1-10")]
    #[case("chr1:0-10")]
    #[case("chr1:20-10")]
    #[case("chr1:a-10")]
    fn test_region_parse_rejects(#[case] text: &str) {
        assert!(Region::parse(text).is_err());
    }

    #[test]
    fn test_region_reference_id() {
        let header = BamHeader::from_references(vec![ReferenceSequence::new("chr1", 10)]);
        assert_eq!(Region::parse("chr1:1-5").unwrap().reference_id(&header).unwrap(), 0);
        let error = Region::parse("chrX:1-5").unwrap().reference_id(&header).unwrap_err();
        assert!(matches!(error, ShardseqError::ReferenceNotFound { .. }));
    }
}
