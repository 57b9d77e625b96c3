//! Locating the adaptor boundary of a paired read.
//!
//! When the fragment is shorter than the read, sequencing runs off the end of
//! the insert into adaptor. The boundary is the reference coordinate of the
//! first adaptor base on the side the read runs toward.

use crate::record::Read;

/// How far past the read's alignment a boundary may fall and still be used.
pub const MAXIMUM_ADAPTOR_LENGTH: i64 = 8;

/// Computes the adaptor boundary of a read.
pub trait AdaptorBoundary {
    /// Reference coordinate of the adaptor boundary, if one can be computed.
    fn adaptor_boundary(&self, read: &Read) -> Option<i64>;

    /// Whether `boundary` lies inside the read's alignment.
    fn is_inside_read(&self, read: &Read, boundary: i64) -> bool {
        boundary >= read.alignment_start() && boundary <= read.alignment_end()
    }
}

/// Boundary from the template length and mate position.
///
/// Forward reads: the adaptor starts just past the fragment, at
/// `start + |tlen|`. Reverse reads: it ends just before the mate, at
/// `mate_start - 1`.
#[derive(Debug, Clone, Copy, Default)]
pub struct InsertSizeAdaptorBoundary;

impl InsertSizeAdaptorBoundary {
    /// A pair on opposite strands whose mates face each other.
    fn has_well_defined_fragment_size(read: &Read) -> bool {
        if read.template_length == 0 || !read.is_paired() {
            return false;
        }
        if read.is_unmapped() || read.is_mate_unmapped() {
            return false;
        }
        if read.is_reverse_complemented() == read.is_mate_reverse_complemented() {
            return false;
        }

        let mate_start = i64::from(read.mate_alignment_start);
        if read.is_reverse_complemented() {
            read.alignment_end() > mate_start
        } else {
            read.alignment_start() <= mate_start + i64::from(read.template_length)
        }
    }
}

impl AdaptorBoundary for InsertSizeAdaptorBoundary {
    fn adaptor_boundary(&self, read: &Read) -> Option<i64> {
        if !Self::has_well_defined_fragment_size(read) {
            return None;
        }

        let insert_size = i64::from(read.template_length.unsigned_abs());
        if read.is_reverse_complemented() {
            let boundary = i64::from(read.mate_alignment_start) - 1;
            (boundary >= read.alignment_start() - MAXIMUM_ADAPTOR_LENGTH).then_some(boundary)
        } else {
            let boundary = read.alignment_start() + insert_size;
            (boundary <= read.alignment_end() + MAXIMUM_ADAPTOR_LENGTH).then_some(boundary)
        }
    }
}
