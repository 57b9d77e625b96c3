//! Read clipping.
//!
//! A [`ReadClipper`] queues [`ClipOp`]s against one read and applies them in
//! order with a single [`ClippingRepresentation`]. The free functions in this
//! module are the higher level operations (clip to a region, clip low-quality
//! tails, remove adaptor, and so on) built on top of it.
//!
//! Input reads are never modified. Every operation returns a new [`Read`]; a
//! clip that removes every base yields [`Read::empty_from`].
//!
//! Coordinates: clip intervals are 0-based inclusive read positions.
//! Reference coordinates are 1-based.

use log::trace;
use noodles::sam::alignment::record::cigar::op::Kind;

use crate::adaptor::AdaptorBoundary;
use crate::cigar::{
    self, CigarShift, ClippingTail, alignment_start_shift, clean_hard_clipped_cigar, hard_clip_cigar,
    leading_insertion, soft_clip_cigar, soft_clip_start_offset,
};
use crate::errors::{ClipError, Result};
use crate::record::Read;

/// Base written over clipped positions by the masking representations.
const MASK_BASE: u8 = b'N';

/// How a clip is expressed in the output read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClippingRepresentation {
    /// Replace clipped bases with `N`.
    WriteNs,
    /// Set clipped qualities to 0.
    WriteQ0s,
    /// Replace clipped bases with `N` and set their qualities to 0.
    WriteNsQ0s,
    /// Remove the bases and record an `H` operation.
    HardClipBases,
    /// Keep the bases and record an `S` operation.
    SoftClipBases,
    /// Turn soft clips back into aligned bases; the interval is ignored.
    RevertSoftClippedBases,
}

/// An inclusive interval of read positions to clip.
///
/// Built through [`ClipOp::new`], so `start <= stop` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipOp {
    start: usize,
    stop: usize,
}

impl ClipOp {
    /// # Errors
    ///
    /// Returns [`ClipError::InvertedInterval`] if `start > stop`.
    pub fn new(start: usize, stop: usize) -> Result<Self> {
        if start > stop {
            return Err(ClipError::InvertedInterval { start: start as i64, stop: stop as i64 });
        }
        Ok(Self { start, stop })
    }

    #[must_use]
    pub fn start(&self) -> usize {
        self.start
    }

    #[must_use]
    pub fn stop(&self) -> usize {
        self.stop
    }

    /// Apply this interval to `read`. `stop` must be a valid read position.
    fn apply(&self, representation: ClippingRepresentation, read: &Read) -> Result<Read> {
        match representation {
            ClippingRepresentation::WriteNs => Ok(self.mask(read, true, false)),
            ClippingRepresentation::WriteQ0s => Ok(self.mask(read, false, true)),
            ClippingRepresentation::WriteNsQ0s => Ok(self.mask(read, true, true)),
            ClippingRepresentation::HardClipBases => hard_clip(read, self.start, self.stop),
            ClippingRepresentation::SoftClipBases => soft_clip(read, self.start, self.stop),
            ClippingRepresentation::RevertSoftClippedBases => revert_soft_clipped_bases(read),
        }
    }

    fn mask(&self, read: &Read, bases: bool, qualities: bool) -> Read {
        let mut masked = read.detached();
        if bases {
            masked.sequence[self.start..=self.stop].fill(MASK_BASE);
        }
        if qualities {
            masked.quality_scores[self.start..=self.stop].fill(0);
        }
        masked
    }
}

/// Queue of clip operations against a single read.
#[derive(Debug, Clone)]
pub struct ReadClipper<'a> {
    read: &'a Read,
    ops: Vec<ClipOp>,
    was_clipped: bool,
}

impl<'a> ReadClipper<'a> {
    #[must_use]
    pub fn new(read: &'a Read) -> Self {
        Self { read, ops: Vec::new(), was_clipped: false }
    }

    #[must_use]
    pub fn read(&self) -> &Read {
        self.read
    }

    pub fn add_op(&mut self, op: ClipOp) {
        self.ops.push(op);
    }

    /// Operations still waiting to be applied.
    #[must_use]
    pub fn ops(&self) -> &[ClipOp] {
        &self.ops
    }

    /// True once any queued operation has been applied.
    #[must_use]
    pub fn was_clipped(&self) -> bool {
        self.was_clipped
    }

    /// Apply and drain the queued operations, in order.
    ///
    /// Each operation sees the result of the previous one, so callers queue
    /// right-tail clips before left-tail clips. Operations starting past the
    /// end of the current read are skipped; those running past it are
    /// truncated to the last base. With nothing queued the input read is
    /// returned as is.
    ///
    /// # Errors
    ///
    /// Returns [`ClipError::InvertedInterval`] for an operation with
    /// `start > stop`, and propagates the precondition failures of the chosen
    /// representation.
    pub fn clip_read(&mut self, representation: ClippingRepresentation) -> Result<Read> {
        let ops = std::mem::take(&mut self.ops);
        if ops.is_empty() {
            return Ok(self.read.clone());
        }

        let mut clipped = self.read.clone();
        for op in ops {
            if op.start > op.stop {
                return Err(ClipError::InvertedInterval { start: op.start as i64, stop: op.stop as i64 });
            }
            let read_length = clipped.len();
            if op.start >= read_length {
                trace!(
                    "Skipping clip [{}, {}] on read {} of length {read_length}",
                    op.start,
                    op.stop,
                    clipped.display_name()
                );
                continue;
            }
            let op = ClipOp { start: op.start, stop: op.stop.min(read_length - 1) };
            clipped = op.apply(representation, &clipped)?;
            self.was_clipped = true;
        }

        if clipped.is_empty() {
            return Ok(Read::empty_from(&clipped));
        }
        Ok(clipped)
    }
}

/// Apply `ops` to `read` in order.
///
/// # Errors
///
/// See [`ReadClipper::clip_read`].
pub fn clip_read(read: &Read, ops: &[ClipOp], representation: ClippingRepresentation) -> Result<Read> {
    let mut clipper = ReadClipper::new(read);
    for op in ops {
        clipper.add_op(*op);
    }
    clipper.clip_read(representation)
}

// ============================================================================
// Single-interval primitives
// ============================================================================

/// True when no aligned (`M`, `=`, `X`) base of `read` survives removing
/// positions `[start, stop]`. Unmapped reads survive unless every base goes.
fn removes_all_aligned_bases(read: &Read, start: usize, stop: usize) -> bool {
    if read.cigar.is_empty() {
        return start == 0 && stop + 1 >= read.len();
    }

    let mut position = 0usize;
    for op in &read.cigar {
        if !cigar::consumes_read(op.kind()) {
            continue;
        }
        let end = position + op.len();
        if cigar::is_aligned(op.kind()) && op.len() > 0 && (position < start || end - 1 > stop) {
            return false;
        }
        position = end;
    }
    true
}

fn hard_clip(read: &Read, start: usize, stop: usize) -> Result<Read> {
    let read_length = read.len();
    if start > 0 && stop + 1 < read_length {
        return Err(ClipError::InteriorClip { start: start as i64, stop: stop as i64, read_length });
    }
    if removes_all_aligned_bases(read, start, stop) {
        return Ok(Read::empty_from(read));
    }

    let shift = if read.cigar.is_empty() {
        CigarShift { cigar: Vec::new(), shift_from_start: 0, shift_from_end: 0 }
    } else {
        let clipped = hard_clip_cigar(&read.cigar, start, stop, &read.display_name())?;
        clean_hard_clipped_cigar(&clipped)
    };

    let removed = (stop - start + 1) + shift.shift_from_start + shift.shift_from_end;
    let new_length = match read.len().checked_sub(removed) {
        Some(0) | None => return Ok(Read::empty_from(read)),
        Some(n) => n,
    };
    let copy_start = if start == 0 { stop + 1 + shift.shift_from_start } else { shift.shift_from_start };
    let copy = copy_start..copy_start + new_length;

    let mut clipped = read.detached();
    clipped.sequence = read.sequence[copy.clone()].to_vec();
    clipped.quality_scores = read.quality_scores[copy].to_vec();
    if start == 0 && !read.is_unmapped() {
        let new_start = read.alignment_start() + alignment_start_shift(&read.cigar, &shift.cigar);
        clipped.alignment_start = new_start as i32;
    }
    clipped.cigar = shift.cigar;
    Ok(clipped)
}

fn soft_clip(read: &Read, start: usize, stop: usize) -> Result<Read> {
    if read.is_unmapped() {
        return Err(ClipError::SoftClipUnmapped { name: read.display_name() });
    }

    let read_length = read.len() as i64;
    let (start_i, mut my_stop) = (start as i64, stop as i64);
    // At least one base must stay aligned.
    if my_stop + 1 - start_i == read_length {
        my_stop -= 1;
    }
    if start_i > 0 && my_stop != read_length - 1 {
        return Err(ClipError::InteriorClip { start: start_i, stop: stop as i64, read_length: read.len() });
    }

    let (start_clip_end, end_clip_begin) =
        if start == 0 { ((my_stop + 1) as usize, read.len()) } else { (0, start) };
    let new_cigar = soft_clip_cigar(&read.cigar, start_clip_end, end_clip_begin);

    let mut clipped = read.detached();
    if start == 0 {
        let new_start = read.alignment_start() + soft_clip_start_offset(&new_cigar, &read.cigar);
        clipped.alignment_start = new_start as i32;
    }
    clipped.cigar = new_cigar;
    Ok(clipped)
}

fn revert_soft_clipped_bases(read: &Read) -> Result<Read> {
    if read.is_unmapped() || !read.cigar.iter().any(|op| op.kind() == Kind::SoftClip) {
        return Ok(read.detached());
    }

    let mut unclipped = read.detached();
    unclipped.cigar = cigar::revert_soft_clips(&read.cigar);
    let new_start = read.alignment_start() + alignment_start_shift(&read.cigar, &unclipped.cigar);
    unclipped.alignment_start = new_start as i32;

    // Bases that would land before the first reference position are hard clipped.
    if new_start <= 0 {
        return hard_clip(&unclipped, 0, new_start.unsigned_abs() as usize);
    }
    Ok(unclipped)
}

// ============================================================================
// Read-coordinate clipping
// ============================================================================

/// Hard clip read positions `[start, stop]`, which must include one end.
///
/// # Errors
///
/// Returns [`ClipError::InvertedInterval`], [`ClipError::OutOfBounds`], or
/// [`ClipError::InteriorClip`] for an unusable interval.
pub fn hard_clip_read_coordinates(read: &Read, start: usize, stop: usize) -> Result<Read> {
    if read.is_empty() {
        return Ok(Read::empty_from(read));
    }
    let read_length = read.len();
    if start > stop {
        return Err(ClipError::InvertedInterval { start: start as i64, stop: stop as i64 });
    }
    if stop >= read_length {
        return Err(ClipError::OutOfBounds { start: start as i64, stop: stop as i64, read_length });
    }
    if start == 0 && stop == read_length - 1 {
        return Ok(Read::empty_from(read));
    }
    if start > 0 && stop < read_length - 1 {
        return Err(ClipError::InteriorClip { start: start as i64, stop: stop as i64, read_length });
    }
    clip_read(read, &[ClipOp { start, stop }], ClippingRepresentation::HardClipBases)
}

// ============================================================================
// Reference-coordinate clipping
// ============================================================================

/// Read position of reference coordinate `ref_coord`, adjusted for the tail
/// being clipped.
///
/// A coordinate in a deletion resolves to the base after it when clipping the
/// right tail. A coordinate at the very first base of a read with a leading
/// insertion resolves past the insertion when clipping the left tail.
///
/// # Errors
///
/// Returns [`ClipError::CoordinateNotCovered`] if the read does not span the
/// coordinate.
pub fn read_coordinate_for_reference_coordinate(read: &Read, ref_coord: i64, tail: ClippingTail) -> Result<i64> {
    let (mut coordinate, in_gap) = cigar::read_coordinate_for_reference(&read.cigar, read.soft_start(), ref_coord)?;
    if in_gap && tail == ClippingTail::RightTail {
        coordinate += 1;
    }
    if coordinate == 0 && tail == ClippingTail::LeftTail {
        if let Some(insertion) = leading_insertion(&read.cigar) {
            coordinate = (insertion.len() as i64).min(read.len() as i64 - 1);
        }
    }
    Ok(coordinate)
}

/// Hard clip by reference coordinates; exactly one bound must be negative.
///
/// A negative `ref_start` clips the left tail through `ref_stop`; a negative
/// `ref_stop` clips the right tail from `ref_start`.
///
/// # Errors
///
/// Returns [`ClipError::AmbiguousTail`] unless exactly one bound is negative,
/// [`ClipError::UnmappedRead`] for unmapped reads, plus the errors of
/// [`hard_clip_read_coordinates`].
pub fn hard_clip_by_reference_coordinates(read: &Read, ref_start: i64, ref_stop: i64) -> Result<Read> {
    if read.is_empty() {
        return Ok(read.clone());
    }
    let (start, stop) = match (ref_start < 0, ref_stop < 0) {
        (true, false) | (false, true) if read.is_unmapped() => {
            return Err(ClipError::UnmappedRead { name: read.display_name() });
        }
        (true, false) => (0, read_coordinate_for_reference_coordinate(read, ref_stop, ClippingTail::LeftTail)?),
        (false, true) => (
            read_coordinate_for_reference_coordinate(read, ref_start, ClippingTail::RightTail)?,
            read.len() as i64 - 1,
        ),
        _ => return Err(ClipError::AmbiguousTail { ref_start, ref_stop }),
    };

    let read_length = read.len();
    if start < 0 || stop > read_length as i64 - 1 {
        return Err(ClipError::OutOfBounds { start, stop, read_length });
    }
    if start > stop {
        return Err(ClipError::InvertedInterval { start, stop });
    }
    if start > 0 && stop < read_length as i64 - 1 {
        return Err(ClipError::InteriorClip { start, stop, read_length });
    }

    clip_read(read, &[ClipOp { start: start as usize, stop: stop as usize }], ClippingRepresentation::HardClipBases)
}

/// Hard clip every base aligned at or before `ref_stop`.
///
/// # Errors
///
/// See [`hard_clip_by_reference_coordinates`].
pub fn hard_clip_reference_left_tail(read: &Read, ref_stop: i64) -> Result<Read> {
    hard_clip_by_reference_coordinates(read, -1, ref_stop)
}

/// Hard clip every base aligned at or after `ref_start`.
///
/// # Errors
///
/// See [`hard_clip_by_reference_coordinates`].
pub fn hard_clip_reference_right_tail(read: &Read, ref_start: i64) -> Result<Read> {
    hard_clip_by_reference_coordinates(read, ref_start, -1)
}

/// Hard clip everything up to and including `left` and from `right` on.
///
/// # Errors
///
/// Returns [`ClipError::BoundsOutsideAlignment`] unless
/// `alignment_start <= left <= right <= alignment_end`.
pub fn hard_clip_both_ends_by_reference(read: &Read, left: i64, right: i64) -> Result<Read> {
    if read.is_empty() {
        return Ok(Read::empty_from(read));
    }
    if read.is_unmapped() {
        return Err(ClipError::UnmappedRead { name: read.display_name() });
    }
    let (alignment_start, alignment_end) = (read.alignment_start(), read.alignment_end());
    if left > right || left < alignment_start || right > alignment_end {
        return Err(ClipError::BoundsOutsideAlignment { left, right, alignment_start, alignment_end });
    }
    if left == right {
        return Ok(Read::empty_from(read));
    }

    let right_clipped = hard_clip_reference_right_tail(read, right)?;
    // Cleaning up deletions next to the new clip can pull the end back past `left`.
    if right_clipped.is_empty() || left > right_clipped.alignment_end() {
        return Ok(Read::empty_from(read));
    }
    hard_clip_reference_left_tail(&right_clipped, left)
}

/// Clip the read down to the reference interval `[ref_start, ref_stop]`.
///
/// Reads that do not overlap the interval become empty.
///
/// # Errors
///
/// See [`hard_clip_by_reference_coordinates`].
pub fn hard_clip_to_region(read: &Read, ref_start: i64, ref_stop: i64) -> Result<Read> {
    let (alignment_start, alignment_end) = (read.alignment_start(), read.alignment_end());
    if read.is_empty() || read.is_unmapped() || alignment_start > ref_stop || alignment_end < ref_start {
        return Ok(Read::empty_from(read));
    }

    match (alignment_start < ref_start, alignment_end > ref_stop) {
        (true, true) => hard_clip_both_ends_by_reference(read, ref_start - 1, ref_stop + 1),
        (true, false) => hard_clip_reference_left_tail(read, ref_start - 1),
        (false, true) => hard_clip_reference_right_tail(read, ref_stop + 1),
        (false, false) => Ok(read.clone()),
    }
}

/// [`hard_clip_to_region`] over many reads, dropping those that become empty.
///
/// # Errors
///
/// Fails on the first read that cannot be clipped.
pub fn hard_clip_to_region_all<'r, I>(reads: I, ref_start: i64, ref_stop: i64) -> Result<Vec<Read>>
where
    I: IntoIterator<Item = &'r Read>,
{
    let mut clipped = Vec::new();
    for read in reads {
        let read = hard_clip_to_region(read, ref_start, ref_stop)?;
        if !read.is_empty() {
            clipped.push(read);
        }
    }
    Ok(clipped)
}

// ============================================================================
// Quality and CIGAR driven clipping
// ============================================================================

/// Clip the runs of bases with quality `<= threshold` at either end.
///
/// # Errors
///
/// Propagates errors of the representation, for example soft clipping an
/// unmapped read.
pub fn clip_low_quality_tails(
    read: &Read,
    representation: ClippingRepresentation,
    threshold: u8,
) -> Result<Read> {
    let qualities = &read.quality_scores;
    let read_length = qualities.len();

    let right = qualities.iter().rposition(|&q| q > threshold);
    let left = qualities.iter().position(|&q| q > threshold);
    let (Some(left), Some(right)) = (left, right) else {
        return Ok(Read::empty_from(read));
    };

    let mut clipper = ReadClipper::new(read);
    if right + 1 < read_length {
        clipper.add_op(ClipOp { start: right + 1, stop: read_length - 1 });
    }
    if left > 0 {
        clipper.add_op(ClipOp { start: 0, stop: left - 1 });
    }
    clipper.clip_read(representation)
}

/// [`clip_low_quality_tails`] with hard clipping.
///
/// # Errors
///
/// See [`clip_low_quality_tails`].
pub fn hard_clip_low_quality_tails(read: &Read, threshold: u8) -> Result<Read> {
    clip_low_quality_tails(read, ClippingRepresentation::HardClipBases, threshold)
}

/// Turn every soft clip into a hard clip.
///
/// # Errors
///
/// Propagates hard clipping errors.
pub fn hard_clip_soft_clipped_bases(read: &Read) -> Result<Read> {
    if read.is_empty() {
        return Ok(read.clone());
    }

    let mut position = 0usize;
    let mut cut_left = None;
    let mut cut_right = None;
    let mut past_left_clips = false;
    for op in &read.cigar {
        match op.kind() {
            Kind::SoftClip if past_left_clips => cut_right = Some(position),
            Kind::SoftClip => cut_left = Some(position + op.len() - 1),
            Kind::HardClip => {}
            _ => past_left_clips = true,
        }
        if cigar::consumes_read(op.kind()) {
            position += op.len();
        }
    }

    let mut clipper = ReadClipper::new(read);
    if let Some(start) = cut_right {
        clipper.add_op(ClipOp { start, stop: read.len() - 1 });
    }
    if let Some(stop) = cut_left {
        clipper.add_op(ClipOp { start: 0, stop });
    }
    clipper.clip_read(ClippingRepresentation::HardClipBases)
}

/// Hard clip insertions that precede every aligned base.
///
/// # Errors
///
/// Propagates hard clipping errors.
pub fn hard_clip_leading_insertions(read: &Read) -> Result<Read> {
    let mut clipper = ReadClipper::new(read);
    for op in &read.cigar {
        match op.kind() {
            Kind::Insertion => clipper.add_op(ClipOp { start: 0, stop: op.len().saturating_sub(1) }),
            Kind::HardClip | Kind::SoftClip => {}
            _ => break,
        }
    }
    clipper.clip_read(ClippingRepresentation::HardClipBases)
}

/// Hard clip the part of the read past its adaptor boundary.
///
/// Reads with no boundary, or a boundary outside the alignment, come back
/// unchanged.
///
/// # Errors
///
/// See [`hard_clip_by_reference_coordinates`].
pub fn hard_clip_adaptor_sequence<B>(read: &Read, boundary: &B) -> Result<Read>
where
    B: AdaptorBoundary + ?Sized,
{
    let Some(position) = boundary.adaptor_boundary(read) else {
        return Ok(read.clone());
    };
    if !boundary.is_inside_read(read, position) {
        return Ok(read.clone());
    }

    if read.is_reverse_complemented() {
        hard_clip_reference_left_tail(read, position)
    } else {
        hard_clip_reference_right_tail(read, position)
    }
}

// ============================================================================
// Soft clip reversion
// ============================================================================

/// Turn soft clips back into aligned bases, moving the alignment start left
/// over a leading clip. Bases that would fall before reference position 1
/// are hard clipped.
///
/// # Errors
///
/// Propagates hard clipping errors.
pub fn revert_soft_clips(read: &Read) -> Result<Read> {
    clip_read(read, &[ClipOp { start: 0, stop: 0 }], ClippingRepresentation::RevertSoftClippedBases)
}

/// Hard clip the soft-clipped bases that are not part of a run of quality
/// `>= min_quality` adjacent to the alignment.
///
/// On each side, the soft-clipped bases next to the aligned part are kept for
/// as long as their quality stays at or above `min_quality`; the rest of that
/// soft clip, from the first low-quality base outwards, is hard clipped.
///
/// # Errors
///
/// Propagates hard clipping errors.
pub fn hard_clip_low_quality_soft_clips(read: &Read, min_quality: u8) -> Result<Read> {
    if read.is_empty() {
        return Ok(Read::empty_from(read));
    }
    if read.is_unmapped() {
        return Ok(read.clone());
    }

    let read_length = read.len();
    let leading = (read.alignment_start() - read.soft_start()) as usize;
    let trailing = (read.soft_end() - read.alignment_end()) as usize;
    if leading + trailing > read_length {
        return Ok(Read::empty_from(read));
    }

    let qualities = &read.quality_scores;
    let mut keep_from = leading;
    while keep_from > 0 && qualities[keep_from - 1] >= min_quality {
        keep_from -= 1;
    }
    let mut keep_to = read_length - trailing;
    while keep_to < read_length && qualities[keep_to] >= min_quality {
        keep_to += 1;
    }

    let mut clipped = read.clone();
    if keep_to < read_length {
        clipped = hard_clip_read_coordinates(&clipped, keep_to, read_length - 1)?;
    }
    if keep_from > 0 {
        clipped = hard_clip_read_coordinates(&clipped, 0, keep_from - 1)?;
    }
    Ok(clipped)
}

/// Revert the soft clips that survive [`hard_clip_low_quality_soft_clips`].
///
/// # Errors
///
/// Propagates hard clipping errors.
pub fn revert_soft_clips_above_quality(read: &Read, min_quality: u8) -> Result<Read> {
    let trimmed = hard_clip_low_quality_soft_clips(read, min_quality)?;
    revert_soft_clips(&trimmed)
}
