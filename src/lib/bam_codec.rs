//! Conversion between BAM record bytes and [`Read`] values.
//!
//! # BAM Record Binary Layout
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0-3     4     refID (i32)
//! 4-7     4     pos (i32, 0-based, -1 when unset)
//! 8       1     l_read_name (u8, includes NUL)
//! 9       1     mapq (u8)
//! 10-11   2     bin (u16)
//! 12-13   2     n_cigar_op (u16)
//! 14-15   2     flag (u16)
//! 16-19   4     l_seq (u32)
//! 20-23   4     next_refID (i32)
//! 24-27   4     next_pos (i32)
//! 28-31   4     tlen (i32)
//! 32+     var   read_name, cigar, packed seq, qual, aux data
//! ```
//!
//! The bytes handled here exclude the leading 4-byte `block_size`.

use bstr::BString;
use noodles::sam::alignment::record::Flags;
use noodles::sam::alignment::record::cigar::Op;
use noodles::sam::alignment::record::cigar::op::Kind;
use shardseq_sam::cigar::read_length;
use shardseq_sam::{MISSING_QUALITY, Read};
use std::io;

/// Length of the fixed part of a record.
pub const FIXED_FIELDS_LEN: usize = 32;

/// Bin for reads without a position, `reg2bin(-1, 0)`.
const UNMAPPED_BIN: u16 = 4680;

const BASE_DECODE: [u8; 16] = *b"=ACMGRSVTWYHKDBN";

const SEQ_CODES: [u8; 256] = build_seq_codes();

const fn build_seq_codes() -> [u8; 256] {
    let mut codes = [0x0F; 256];
    let mut i = 0;
    while i < BASE_DECODE.len() {
        let base = BASE_DECODE[i];
        codes[base as usize] = i as u8;
        codes[base.to_ascii_lowercase() as usize] = i as u8;
        i += 1;
    }
    codes
}

/// CIGAR operation codes in BAM order.
const CIGAR_KINDS: [Kind; 9] = [
    Kind::Match,
    Kind::Insertion,
    Kind::Deletion,
    Kind::Skip,
    Kind::SoftClip,
    Kind::HardClip,
    Kind::Pad,
    Kind::SequenceMatch,
    Kind::SequenceMismatch,
];

fn kind_code(kind: Kind) -> u32 {
    match kind {
        Kind::Match => 0,
        Kind::Insertion => 1,
        Kind::Deletion => 2,
        Kind::Skip => 3,
        Kind::SoftClip => 4,
        Kind::HardClip => 5,
        Kind::Pad => 6,
        Kind::SequenceMatch => 7,
        Kind::SequenceMismatch => 8,
    }
}

fn invalid_data(message: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.into())
}

// ============================================================================
// Decoding
// ============================================================================

/// Cursor over record bytes that reports truncation as `InvalidData`.
struct Fields<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Fields<'a> {
    fn take(&mut self, n: usize, what: &str) -> io::Result<&'a [u8]> {
        let end = self.offset.checked_add(n).filter(|&end| end <= self.bytes.len()).ok_or_else(|| {
            invalid_data(format!(
                "Truncated BAM record: {what} needs {n} bytes at offset {}, record has {}",
                self.offset,
                self.bytes.len()
            ))
        })?;
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn rest(&self) -> &'a [u8] {
        &self.bytes[self.offset..]
    }
}

fn le_i32(bytes: &[u8], at: usize) -> i32 {
    i32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn le_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

/// Decodes a record, keeping a copy of `bytes` as the read's raw form.
///
/// # Errors
///
/// Returns `InvalidData` if the record is shorter than its fields claim,
/// carries an unknown or zero-length CIGAR operation, or has a CIGAR whose
/// read length disagrees with a non-empty sequence.
pub fn decode(bytes: &[u8]) -> io::Result<Read> {
    let mut fields = Fields { bytes, offset: 0 };
    let fixed = fields.take(FIXED_FIELDS_LEN, "fixed fields")?;

    let reference_sequence_id = le_i32(fixed, 0);
    let pos = le_i32(fixed, 4);
    let l_read_name = usize::from(fixed[8]);
    let mapping_quality = fixed[9];
    let n_cigar_op = usize::from(le_u16(fixed, 12));
    let flags = Flags::from(le_u16(fixed, 14));
    let l_seq = usize::try_from(le_i32(fixed, 16)).map_err(|_| invalid_data("Negative sequence length"))?;
    let mate_reference_sequence_id = le_i32(fixed, 20);
    let next_pos = le_i32(fixed, 24);
    let template_length = le_i32(fixed, 28);

    let mut name = fields.take(l_read_name, "read name")?;
    if name.last() == Some(&0) {
        name = &name[..name.len() - 1];
    }

    let raw_cigar = fields.take(n_cigar_op * 4, "CIGAR")?;
    let mut cigar = Vec::with_capacity(n_cigar_op);
    for chunk in raw_cigar.chunks_exact(4) {
        let value = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        let kind = CIGAR_KINDS
            .get((value & 0x0F) as usize)
            .copied()
            .ok_or_else(|| invalid_data(format!("Invalid CIGAR operation code {}", value & 0x0F)))?;
        let len = (value >> 4) as usize;
        if len == 0 {
            return Err(invalid_data(format!("CIGAR operation {kind:?} has length 0")));
        }
        cigar.push(Op::new(kind, len));
    }
    if l_seq > 0 && !cigar.is_empty() && read_length(&cigar) != l_seq {
        return Err(invalid_data(format!(
            "CIGAR read length {} does not match sequence length {l_seq}",
            read_length(&cigar)
        )));
    }

    let packed = fields.take(l_seq.div_ceil(2), "sequence")?;
    let sequence = (0..l_seq)
        .map(|i| {
            let byte = packed[i / 2];
            let code = if i.is_multiple_of(2) { byte >> 4 } else { byte & 0x0F };
            BASE_DECODE[usize::from(code)]
        })
        .collect();
    let quality_scores = fields.take(l_seq, "qualities")?.to_vec();
    let data = fields.rest().to_vec();

    Ok(Read {
        name: BString::from(name),
        flags,
        reference_sequence_id,
        alignment_start: pos.saturating_add(1).max(0),
        mapping_quality,
        cigar,
        mate_reference_sequence_id,
        mate_alignment_start: next_pos.saturating_add(1).max(0),
        template_length,
        sequence,
        quality_scores,
        data,
        raw: Some(bytes.to_vec()),
    })
}

// ============================================================================
// Encoding
// ============================================================================

/// BAI bin for the 0-based half-open interval `[beg, end)`.
#[must_use]
pub fn reg2bin(beg: i64, end: i64) -> u16 {
    let end = end - 1;
    let bin = if beg >> 14 == end >> 14 {
        ((1 << 15) - 1) / 7 + (beg >> 14)
    } else if beg >> 17 == end >> 17 {
        ((1 << 12) - 1) / 7 + (beg >> 17)
    } else if beg >> 20 == end >> 20 {
        ((1 << 9) - 1) / 7 + (beg >> 20)
    } else if beg >> 23 == end >> 23 {
        ((1 << 6) - 1) / 7 + (beg >> 23)
    } else if beg >> 26 == end >> 26 {
        ((1 << 3) - 1) / 7 + (beg >> 26)
    } else {
        0
    };
    bin as u16
}

fn record_bin(read: &Read) -> u16 {
    if read.alignment_start <= 0 {
        return UNMAPPED_BIN;
    }
    let beg = read.alignment_start() - 1;
    let span = if read.is_unmapped() { 1 } else { read.reference_length().max(1) as i64 };
    reg2bin(beg, beg + span)
}

/// Appends the BAM encoding of `read` to `output`, without the `block_size`
/// prefix. The raw form is ignored; the record is rebuilt from its fields.
///
/// # Errors
///
/// Returns `InvalidInput` if the name is longer than 254 bytes, there are
/// more than 65535 CIGAR operations, or qualities and bases differ in length.
pub fn encode_into(read: &Read, output: &mut Vec<u8>) -> io::Result<()> {
    let invalid_input = |message: String| io::Error::new(io::ErrorKind::InvalidInput, message);

    let name: &[u8] = if read.name.is_empty() { b"*" } else { read.name.as_ref() };
    let l_read_name = u8::try_from(name.len() + 1)
        .map_err(|_| invalid_input(format!("Read name too long ({} bytes, max 254)", name.len())))?;
    let n_cigar_op = u16::try_from(read.cigar.len())
        .map_err(|_| invalid_input(format!("Too many CIGAR operations: {}", read.cigar.len())))?;
    if !read.quality_scores.is_empty() && read.quality_scores.len() != read.sequence.len() {
        return Err(invalid_input(format!(
            "Read '{}' has {} bases but {} qualities",
            read.name,
            read.sequence.len(),
            read.quality_scores.len()
        )));
    }

    output.reserve(FIXED_FIELDS_LEN + name.len() + 1 + read.cigar.len() * 4 + read.len() * 2 + read.data.len());
    output.extend_from_slice(&read.reference_sequence_id.to_le_bytes());
    output.extend_from_slice(&(read.alignment_start - 1).to_le_bytes());
    output.push(l_read_name);
    output.push(read.mapping_quality);
    output.extend_from_slice(&record_bin(read).to_le_bytes());
    output.extend_from_slice(&n_cigar_op.to_le_bytes());
    output.extend_from_slice(&u16::from(read.flags).to_le_bytes());
    output.extend_from_slice(&(read.sequence.len() as u32).to_le_bytes());
    output.extend_from_slice(&read.mate_reference_sequence_id.to_le_bytes());
    output.extend_from_slice(&(read.mate_alignment_start - 1).to_le_bytes());
    output.extend_from_slice(&read.template_length.to_le_bytes());

    output.extend_from_slice(name);
    output.push(0);

    for op in &read.cigar {
        let value = ((op.len() as u32) << 4) | kind_code(op.kind());
        output.extend_from_slice(&value.to_le_bytes());
    }

    for pair in read.sequence.chunks(2) {
        let high = SEQ_CODES[usize::from(pair[0])];
        let low = pair.get(1).map_or(0, |&b| SEQ_CODES[usize::from(b)]);
        output.push((high << 4) | low);
    }

    if read.quality_scores.is_empty() {
        output.resize(output.len() + read.sequence.len(), MISSING_QUALITY);
    } else {
        output.extend_from_slice(&read.quality_scores);
    }

    output.extend_from_slice(&read.data);
    Ok(())
}

/// Encodes `read` into a fresh buffer.
///
/// # Errors
///
/// See [`encode_into`].
pub fn encode(read: &Read) -> io::Result<Vec<u8>> {
    let mut output = Vec::new();
    encode_into(read, &mut output)?;
    Ok(output)
}
