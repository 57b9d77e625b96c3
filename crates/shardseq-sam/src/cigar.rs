//! CIGAR arithmetic used by the clipping engine.
//!
//! Operations are plain `noodles` [`Op`] values held in slices. Everything here
//! is a pure function from one operation list to another; reads are handled by
//! [`crate::clipper`].

use noodles::sam::alignment::record::cigar::Op;
use noodles::sam::alignment::record::cigar::op::Kind;

use crate::errors::{ClipError, Result};

/// Which end of a read a reference-coordinate clip removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClippingTail {
    /// Clip from the first base up to the coordinate.
    LeftTail,
    /// Clip from the coordinate to the last base.
    RightTail,
}

/// A CIGAR after hard clipping, along with the read bases that had to be
/// dropped because insertions were left dangling at an edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CigarShift {
    pub cigar: Vec<Op>,
    pub shift_from_start: usize,
    pub shift_from_end: usize,
}

// ============================================================================
// Operation properties
// ============================================================================

#[inline]
#[must_use]
pub fn consumes_read(kind: Kind) -> bool {
    matches!(
        kind,
        Kind::Match | Kind::Insertion | Kind::SoftClip | Kind::SequenceMatch | Kind::SequenceMismatch
    )
}

#[inline]
#[must_use]
pub fn consumes_reference(kind: Kind) -> bool {
    matches!(
        kind,
        Kind::Match | Kind::Deletion | Kind::Skip | Kind::SequenceMatch | Kind::SequenceMismatch
    )
}

/// True for operations that place a read base against a reference base.
#[inline]
#[must_use]
pub fn is_aligned(kind: Kind) -> bool {
    matches!(kind, Kind::Match | Kind::SequenceMatch | Kind::SequenceMismatch)
}

/// Number of read bases described by the CIGAR.
#[must_use]
pub fn read_length(ops: &[Op]) -> usize {
    ops.iter().filter(|op| consumes_read(op.kind())).map(|op| op.len()).sum()
}

/// Number of reference bases spanned by the CIGAR.
#[must_use]
pub fn reference_length(ops: &[Op]) -> usize {
    ops.iter().filter(|op| consumes_reference(op.kind())).map(|op| op.len()).sum()
}

/// Length of the leading hard clips plus the soft clips that follow them.
#[must_use]
pub fn hard_soft_offset(ops: &[Op]) -> usize {
    let hard = ops.iter().take_while(|op| op.kind() == Kind::HardClip);
    let soft = ops
        .iter()
        .skip_while(|op| op.kind() == Kind::HardClip)
        .take_while(|op| op.kind() == Kind::SoftClip);
    hard.chain(soft).map(|op| op.len()).sum()
}

/// Change in alignment start implied by replacing `old` with `new` when the
/// left end of the read was altered.
#[must_use]
pub fn alignment_start_shift(old: &[Op], new: &[Op]) -> i64 {
    hard_soft_offset(new) as i64 - hard_soft_offset(old) as i64
}

/// The first insertion of the CIGAR if it comes before any aligned operation,
/// looking through leading hard and soft clips.
#[must_use]
pub fn leading_insertion(ops: &[Op]) -> Option<Op> {
    for op in ops {
        match op.kind() {
            Kind::Insertion => return Some(*op),
            Kind::HardClip | Kind::SoftClip => {}
            _ => break,
        }
    }
    None
}

// ============================================================================
// Text form
// ============================================================================

#[must_use]
pub fn kind_to_char(kind: Kind) -> char {
    match kind {
        Kind::Match => 'M',
        Kind::Insertion => 'I',
        Kind::Deletion => 'D',
        Kind::Skip => 'N',
        Kind::SoftClip => 'S',
        Kind::HardClip => 'H',
        Kind::Pad => 'P',
        Kind::SequenceMatch => '=',
        Kind::SequenceMismatch => 'X',
    }
}

#[must_use]
pub fn char_to_kind(c: char) -> Option<Kind> {
    let kind = match c {
        'M' => Kind::Match,
        'I' => Kind::Insertion,
        'D' => Kind::Deletion,
        'N' => Kind::Skip,
        'S' => Kind::SoftClip,
        'H' => Kind::HardClip,
        'P' => Kind::Pad,
        '=' => Kind::SequenceMatch,
        'X' => Kind::SequenceMismatch,
        _ => return None,
    };
    Some(kind)
}

/// Canonical SAM rendering; the empty CIGAR renders as `*`.
#[must_use]
pub fn format_cigar(ops: &[Op]) -> String {
    use std::fmt::Write;

    if ops.is_empty() {
        return "*".to_string();
    }
    ops.iter().fold(String::new(), |mut acc, op| {
        let _ = write!(acc, "{}{}", op.len(), kind_to_char(op.kind()));
        acc
    })
}

/// Parse a SAM CIGAR string. `*` and the empty string parse to no operations.
///
/// # Errors
///
/// Returns [`ClipError::InvalidCigar`] for unknown operators, missing or zero
/// lengths, and trailing digits.
pub fn parse_cigar(text: &str) -> Result<Vec<Op>> {
    let invalid = |reason: &str| ClipError::InvalidCigar { cigar: text.to_string(), reason: reason.to_string() };

    if text.is_empty() || text == "*" {
        return Ok(Vec::new());
    }

    let mut ops = Vec::new();
    let mut len: Option<usize> = None;
    for c in text.chars() {
        if let Some(digit) = c.to_digit(10) {
            let current = len.unwrap_or(0);
            len = Some(
                current
                    .checked_mul(10)
                    .and_then(|v| v.checked_add(digit as usize))
                    .ok_or_else(|| invalid("operation length overflows"))?,
            );
            continue;
        }
        let kind = char_to_kind(c).ok_or_else(|| invalid(&format!("unknown operator '{c}'")))?;
        match len.take() {
            Some(0) | None => return Err(invalid(&format!("operator '{c}' has no length"))),
            Some(n) => ops.push(Op::new(kind, n)),
        }
    }
    if len.is_some() {
        return Err(invalid("trailing length without operator"));
    }
    Ok(ops)
}

// ============================================================================
// Hard clipping
// ============================================================================

/// How much a clipped operation moves the alignment relative to the number of
/// read bases removed: insertions give back what they consumed, deletions and
/// skips add their full reference span.
fn hard_clip_alignment_shift(op: Op, clipped_length: usize) -> i64 {
    match op.kind() {
        Kind::Insertion => -(clipped_length as i64),
        Kind::Deletion | Kind::Skip => op.len() as i64,
        _ => 0,
    }
}

fn hard_clip_op(len: i64) -> Op {
    Op::new(Kind::HardClip, len.max(0) as usize)
}

/// Replace read positions `[start, stop]` with a hard clip.
///
/// The clip must touch an end of the read (`start == 0` clips the left tail,
/// anything else clips through the last base). Existing hard clips on the
/// clipped side are folded into the new one; deletions swallowed by the clip
/// add their length and insertions subtract theirs, so the resulting `H`
/// length counts reference-consuming bases only.
///
/// # Errors
///
/// Returns [`ClipError::EntirelyHardClipped`] if the left-tail walk runs out
/// of operations, which happens only for CIGARs made of hard clips.
pub fn hard_clip_cigar(ops: &[Op], start: usize, stop: usize, name: &str) -> Result<Vec<Op>> {
    let exhausted = || ClipError::EntirelyHardClipped { name: name.to_string() };
    let mut new_cigar = Vec::with_capacity(ops.len() + 1);
    let mut iter = ops.iter().copied();
    let mut index = 0usize;
    let mut total_hard_clip = (stop - start + 1) as i64;
    let mut alignment_shift = 0i64;

    let mut op = iter.next().ok_or_else(exhausted)?;

    if start == 0 {
        while op.kind() == Kind::HardClip {
            total_hard_clip += op.len() as i64;
            op = iter.next().ok_or_else(exhausted)?;
        }

        loop {
            let shift = if consumes_read(op.kind()) { op.len() } else { 0 };

            if index + shift == stop + 1 {
                alignment_shift += hard_clip_alignment_shift(op, op.len());
                new_cigar.push(hard_clip_op(total_hard_clip + alignment_shift));
            } else if index + shift > stop + 1 {
                let clipped = stop + 1 - index;
                alignment_shift += hard_clip_alignment_shift(op, clipped);
                new_cigar.push(hard_clip_op(total_hard_clip + alignment_shift));
                new_cigar.push(Op::new(op.kind(), op.len() - clipped));
            }

            index += shift;
            alignment_shift += hard_clip_alignment_shift(op, shift);

            if index > stop {
                break;
            }
            match iter.next() {
                Some(next) => op = next,
                None => break,
            }
        }
        new_cigar.extend(iter);
    } else {
        loop {
            let shift = if consumes_read(op.kind()) { op.len() } else { 0 };

            if index + shift < start {
                new_cigar.push(op);
            } else {
                let kept = start - index;
                alignment_shift += hard_clip_alignment_shift(op, op.len() - kept);
                if op.kind() == Kind::HardClip {
                    total_hard_clip += kept as i64;
                } else if kept > 0 {
                    new_cigar.push(Op::new(op.kind(), kept));
                }
            }

            index += shift;
            if index >= start {
                break;
            }
            match iter.next() {
                Some(next) => op = next,
                None => break,
            }
        }

        for rest in iter {
            alignment_shift += hard_clip_alignment_shift(rest, rest.len());
            if rest.kind() == Kind::HardClip {
                total_hard_clip += rest.len() as i64;
            }
        }
        new_cigar.push(hard_clip_op(total_hard_clip + alignment_shift));
    }

    Ok(new_cigar)
}

/// Walks operations from one edge, folding leading hard clips and deletions
/// into a single hard clip and dropping leading insertions. Returns the kept
/// operations in walk order and the number of inserted read bases dropped.
fn strip_clipped_edge(ops: impl Iterator<Item = Op>) -> (Vec<Op>, usize) {
    let mut kept = Vec::new();
    let mut dropped_insertion = 0;
    let mut hard_clip = 0;
    let mut started = false;

    for op in ops {
        if !started {
            match op.kind() {
                Kind::HardClip | Kind::Deletion => {
                    hard_clip += op.len();
                    continue;
                }
                Kind::Insertion => {
                    dropped_insertion += op.len();
                    continue;
                }
                _ => {
                    started = true;
                    if hard_clip > 0 {
                        kept.push(Op::new(Kind::HardClip, hard_clip));
                    }
                }
            }
        }
        kept.push(op);
    }

    (kept, dropped_insertion)
}

/// Tidy both ends of a freshly hard-clipped CIGAR: a read may not start or end
/// with an insertion or deletion next to a hard clip.
#[must_use]
pub fn clean_hard_clipped_cigar(ops: &[Op]) -> CigarShift {
    let (reversed, shift_from_end) = strip_clipped_edge(ops.iter().rev().copied());
    let (cigar, shift_from_start) = strip_clipped_edge(reversed.into_iter().rev());
    CigarShift { cigar, shift_from_start, shift_from_end }
}

// ============================================================================
// Soft clipping
// ============================================================================

/// Soft clip read positions `[0, start_clip_end)` and `[end_clip_begin, len)`.
///
/// Non-read operations inside the clipped regions disappear (hard clips are
/// always kept). Adjacent operations of the same kind are merged.
#[must_use]
pub fn soft_clip_cigar(ops: &[Op], start_clip_end: usize, end_clip_begin: usize) -> Vec<Op> {
    if end_clip_begin <= start_clip_end {
        let total = ops.iter().map(|op| op.len()).sum();
        return vec![Op::new(Kind::SoftClip, total)];
    }

    let mut pieces = Vec::with_capacity(ops.len() + 2);
    let mut position = 0usize;
    for op in ops {
        let len = op.len();
        if !consumes_read(op.kind()) {
            if op.kind() == Kind::HardClip || (position > start_clip_end && position < end_clip_begin) {
                pieces.push(*op);
            }
            continue;
        }

        let s = position;
        let e = position + len;
        if e <= start_clip_end || s >= end_clip_begin {
            pieces.push(Op::new(Kind::SoftClip, len));
        } else if s >= start_clip_end && e <= end_clip_begin {
            pieces.push(*op);
        } else {
            let mut middle = len;
            let head = (s < start_clip_end).then(|| start_clip_end - s);
            let tail = (e > end_clip_begin).then(|| e - end_clip_begin);
            if let Some(h) = head {
                middle -= h;
                pieces.push(Op::new(Kind::SoftClip, h));
            }
            if let Some(t) = tail {
                middle -= t;
            }
            if middle > 0 {
                pieces.push(Op::new(op.kind(), middle));
            }
            if let Some(t) = tail {
                pieces.push(Op::new(Kind::SoftClip, t));
            }
        }
        position += len;
    }

    merge_adjacent(pieces)
}

fn merge_adjacent(ops: Vec<Op>) -> Vec<Op> {
    let mut merged: Vec<Op> = Vec::with_capacity(ops.len());
    for op in ops {
        match merged.last_mut() {
            Some(last) if last.kind() == op.kind() => *last = Op::new(op.kind(), last.len() + op.len()),
            _ => merged.push(op),
        }
    }
    merged
}

/// Number of reference bases the alignment start moves forward when `old` is
/// soft clipped into `new` on the left.
#[must_use]
pub fn soft_clip_start_offset(new: &[Op], old: &[Op]) -> i64 {
    let mut clipped_read_bases = 0usize;
    for op in new {
        if consumes_reference(op.kind()) {
            break;
        }
        if consumes_read(op.kind()) {
            clipped_read_bases += op.len();
        }
    }

    let mut offset = 0i64;
    let mut read_counter = 0usize;
    for op in old {
        let mut read_len = if consumes_read(op.kind()) { op.len() } else { 0 };
        let mut ref_len = op.len();
        let truncated = read_counter + read_len > clipped_read_bases;
        if truncated {
            read_len = clipped_read_bases - read_counter;
            ref_len = read_len;
        }
        if !consumes_reference(op.kind()) {
            ref_len = 0;
        }
        read_counter += read_len;
        offset += ref_len as i64;
        if truncated {
            break;
        }
    }
    offset
}

// ============================================================================
// Soft clip reversion
// ============================================================================

/// Turn soft clips back into matches, merging them with adjacent `M` runs.
#[must_use]
pub fn revert_soft_clips(ops: &[Op]) -> Vec<Op> {
    let mut reverted = Vec::with_capacity(ops.len());
    let mut matches = 0usize;
    for op in ops {
        if matches!(op.kind(), Kind::SoftClip | Kind::Match) {
            matches += op.len();
        } else {
            if matches > 0 {
                reverted.push(Op::new(Kind::Match, matches));
                matches = 0;
            }
            reverted.push(*op);
        }
    }
    if matches > 0 {
        reverted.push(Op::new(Kind::Match, matches));
    }
    reverted
}

// ============================================================================
// Coordinate translation
// ============================================================================

/// Translate a reference coordinate into a 0-based read coordinate.
///
/// `soft_start` is the reference position of the first (possibly soft
/// clipped) read base; soft clips are walked as if aligned. The second value
/// is true when the coordinate falls inside, or just before, a deletion or
/// skipped region; in that case the returned position is the last read base
/// before the gap.
///
/// # Errors
///
/// Returns [`ClipError::CoordinateNotCovered`] when the coordinate precedes the
/// read or lies past the last base the CIGAR can reach.
pub fn read_coordinate_for_reference(ops: &[Op], soft_start: i64, ref_coord: i64) -> Result<(i64, bool)> {
    let not_covered = || ClipError::CoordinateNotCovered {
        ref_coord,
        alignment_start: soft_start,
        cigar: format_cigar(ops),
    };

    let goal = ref_coord - soft_start;
    if goal < 0 {
        return Err(not_covered());
    }

    let mut read_bases = 0i64;
    let mut ref_bases = 0i64;
    let mut in_or_before_gap = false;
    let mut goal_reached = ref_bases == goal;

    let mut iter = ops.iter().copied().peekable();
    while !goal_reached {
        let Some(op) = iter.next() else { break };
        let len = op.len() as i64;
        let mut shift = 0i64;

        if consumes_reference(op.kind()) || op.kind() == Kind::SoftClip {
            shift = if ref_bases + len < goal { len } else { goal - ref_bases };
            ref_bases += shift;
        }
        goal_reached = ref_bases == goal;

        if !goal_reached {
            if consumes_read(op.kind()) {
                read_bases += len;
            }
            continue;
        }

        let ends_within = shift < len;
        let mut inside_gap = false;
        let mut before_gap = false;

        if ends_within {
            inside_gap = matches!(op.kind(), Kind::Deletion | Kind::Skip);
        } else {
            let mut next = iter.next().ok_or_else(not_covered)?;
            if next.kind() == Kind::Insertion {
                read_bases += next.len() as i64;
                next = iter.next().ok_or_else(not_covered)?;
            }
            before_gap = matches!(next.kind(), Kind::Deletion | Kind::Skip);
        }

        in_or_before_gap = inside_gap || before_gap;

        if !in_or_before_gap && consumes_read(op.kind()) {
            read_bases += shift;
        } else if before_gap && consumes_read(op.kind()) {
            read_bases += shift - 1;
        } else if in_or_before_gap {
            read_bases -= 1;
        }
    }

    if !goal_reached {
        return Err(not_covered());
    }
    Ok((read_bases, in_or_before_gap))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn cigar(text: &str) -> Vec<Op> {
        parse_cigar(text).unwrap()
    }

    #[rstest]
    #[case("10M5S", "10M5S")]
    #[case("*", "*")]
    #[case("3H2S10M1I4M2D6M", "3H2S10M1I4M2D6M")]
    #[case("5=1X4=", "5=1X4=")]
    fn test_parse_and_format(#[case] text: &str, #[case] expected: &str) {
        assert_eq!(format_cigar(&cigar(text)), expected);
    }

    #[rstest]
    #[case("10Q")]
    #[case("M")]
    #[case("0M")]
    #[case("10M5")]
    fn test_parse_rejects(#[case] text: &str) {
        assert!(matches!(parse_cigar(text), Err(ClipError::InvalidCigar { .. })));
    }

    #[rstest]
    #[case("10M5S", 15, 10)]
    #[case("2H3S10M2I5M3D4M", 24, 22)]
    #[case("5M100N5M", 10, 110)]
    fn test_lengths(#[case] text: &str, #[case] read: usize, #[case] reference: usize) {
        let ops = cigar(text);
        assert_eq!(read_length(&ops), read);
        assert_eq!(reference_length(&ops), reference);
    }

    #[rstest]
    #[case("10M", 0)]
    #[case("5S10M", 5)]
    #[case("3H5S10M", 8)]
    #[case("3H10M5S", 3)]
    fn test_hard_soft_offset(#[case] text: &str, #[case] expected: usize) {
        assert_eq!(hard_soft_offset(&cigar(text)), expected);
    }

    #[rstest]
    // left tail
    #[case("101M", 0, 49, "50H51M")]
    #[case("10M", 0, 0, "1H9M")]
    #[case("3H10M", 0, 1, "5H8M")]
    #[case("5S10M", 0, 2, "3H2S10M")]
    #[case("5M2D5M", 0, 4, "5H2D5M")]
    #[case("3M2I5M", 0, 4, "3H5M")]
    #[case("3M2I5M", 0, 3, "3H1I5M")]
    // right tail
    #[case("10M5S", 10, 14, "10M5H")]
    #[case("10M", 7, 9, "7M3H")]
    #[case("10M2H", 8, 9, "8M4H")]
    #[case("5M2I5M", 5, 11, "5M5H")]
    #[case("5M2D5M", 5, 9, "5M7H")]
    fn test_hard_clip_cigar(#[case] text: &str, #[case] start: usize, #[case] stop: usize, #[case] expected: &str) {
        let clipped = hard_clip_cigar(&cigar(text), start, stop, "r").unwrap();
        assert_eq!(format_cigar(&clipped), expected);
    }

    #[test]
    fn test_hard_clip_cigar_all_hard_clips() {
        let result = hard_clip_cigar(&cigar("5H"), 0, 0, "r");
        assert!(matches!(result, Err(ClipError::EntirelyHardClipped { .. })));
    }

    #[rstest]
    #[case("5H2D5M", "7H5M", 0, 0)]
    #[case("4H1I5M", "4H5M", 1, 0)]
    #[case("5M2I3H", "5M3H", 0, 2)]
    #[case("5M2D5H", "5M7H", 0, 0)]
    #[case("10M", "10M", 0, 0)]
    fn test_clean_hard_clipped_cigar(
        #[case] text: &str,
        #[case] expected: &str,
        #[case] from_start: usize,
        #[case] from_end: usize,
    ) {
        let shift = clean_hard_clipped_cigar(&cigar(text));
        assert_eq!(format_cigar(&shift.cigar), expected);
        assert_eq!(shift.shift_from_start, from_start);
        assert_eq!(shift.shift_from_end, from_end);
    }

    #[rstest]
    #[case("10M", 3, 10, "3S7M", 3)]
    #[case("10M", 0, 7, "7M3S", 0)]
    #[case("2S8M", 5, 10, "5S5M", 3)]
    #[case("3M2D7M", 5, 10, "5S5M", 7)]
    #[case("5M2D5M", 5, 10, "5S5M", 7)]
    #[case("2H10M", 4, 10, "2H4S6M", 4)]
    fn test_soft_clip_cigar(
        #[case] text: &str,
        #[case] left: usize,
        #[case] right: usize,
        #[case] expected: &str,
        #[case] start_offset: i64,
    ) {
        let old = cigar(text);
        let new = soft_clip_cigar(&old, left, right);
        assert_eq!(format_cigar(&new), expected);
        assert_eq!(soft_clip_start_offset(&new, &old), start_offset);
    }

    #[rstest]
    #[case("5S10M", "15M")]
    #[case("3H5S10M", "3H15M")]
    #[case("5S5M2I5M3S", "10M2I8M")]
    #[case("10M", "10M")]
    fn test_revert_soft_clips(#[case] text: &str, #[case] expected: &str) {
        assert_eq!(format_cigar(&revert_soft_clips(&cigar(text))), expected);
    }

    #[rstest]
    #[case("101M", 150, 199, 49, false)]
    #[case("101M", 150, 150, 0, false)]
    #[case("5M2D5M", 100, 104, 4, false)]
    #[case("5M2D5M", 100, 105, 4, true)]
    #[case("5M2D5M", 100, 106, 4, true)]
    #[case("5M2D5M", 100, 107, 5, false)]
    #[case("5M2I5M", 100, 105, 7, false)]
    #[case("5S10M", 95, 100, 5, false)]
    fn test_read_coordinate_for_reference(
        #[case] text: &str,
        #[case] soft_start: i64,
        #[case] ref_coord: i64,
        #[case] expected: i64,
        #[case] in_gap: bool,
    ) {
        let (coord, gap) = read_coordinate_for_reference(&cigar(text), soft_start, ref_coord).unwrap();
        assert_eq!(coord, expected);
        assert_eq!(gap, in_gap);
    }

    #[test]
    fn test_read_coordinate_before_read_fails() {
        let result = read_coordinate_for_reference(&cigar("10M"), 100, 99);
        assert!(matches!(result, Err(ClipError::CoordinateNotCovered { ref_coord: 99, .. })));
    }

    #[test]
    fn test_read_coordinate_past_read_fails() {
        let result = read_coordinate_for_reference(&cigar("10M"), 100, 110);
        assert!(matches!(result, Err(ClipError::CoordinateNotCovered { .. })));
    }

    #[test]
    fn test_leading_insertion() {
        assert_eq!(leading_insertion(&cigar("2S3I10M")), Some(Op::new(Kind::Insertion, 3)));
        assert_eq!(leading_insertion(&cigar("10M3I")), None);
    }
}
