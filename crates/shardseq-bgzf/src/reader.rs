//! Raw BGZF block reading and inflation.
//!
//! A BGZF stream is a series of independent gzip members, each at most 64KB
//! uncompressed:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │ Header (18 bytes)                                               │
//! │  - Magic: 0x1f 0x8b, method 0x08, flags 0x04 (FEXTRA)           │
//! │  - MTIME, XFL, OS, XLEN (= 6)                                   │
//! │  - Subfield: "BC" + len(2) + BSIZE(2), BSIZE = block size - 1   │
//! ├─────────────────────────────────────────────────────────────────┤
//! │ Compressed data (raw deflate)                                   │
//! ├─────────────────────────────────────────────────────────────────┤
//! │ Footer (8 bytes): CRC32, ISIZE                                  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Blocks are read whole ([`read_raw_block`]) and inflated separately
//! ([`inflate_block_into`]) so that the caller always knows the compressed
//! size of the block it is positioned in. That size is what virtual offsets
//! are built from.

use libdeflater::Decompressor;
use std::io::{self, Read};

// ============================================================================
// Constants
// ============================================================================

/// Size of the BGZF block header.
pub const BGZF_HEADER_SIZE: usize = 18;

/// Size of the BGZF block footer (CRC32 + ISIZE).
pub const BGZF_FOOTER_SIZE: usize = 8;

/// Largest uncompressed payload a single block may carry.
pub const BGZF_MAX_UNCOMPRESSED_SIZE: usize = 1 << 16;

/// BGZF EOF marker block (empty block signaling end of file).
pub const BGZF_EOF: [u8; 28] = [
    0x1f, 0x8b, 0x08, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0x06, 0x00, 0x42, 0x43, 0x02, 0x00,
    0x1b, 0x00, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

// ============================================================================
// Raw Block Type
// ============================================================================

/// A raw BGZF block (compressed, not yet inflated).
#[derive(Debug, Clone)]
pub struct RawBgzfBlock {
    /// Complete raw block data: header + compressed data + footer.
    pub data: Vec<u8>,
}

impl RawBgzfBlock {
    /// Total compressed size of the block, header and footer included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Check if this is the BGZF EOF marker block.
    #[must_use]
    pub fn is_eof(&self) -> bool {
        self.data == BGZF_EOF
    }

    /// The deflate payload between header and footer.
    #[must_use]
    pub fn compressed_data(&self) -> &[u8] {
        if self.data.len() <= BGZF_HEADER_SIZE + BGZF_FOOTER_SIZE {
            return &[];
        }
        &self.data[BGZF_HEADER_SIZE..self.data.len() - BGZF_FOOTER_SIZE]
    }

    /// Uncompressed size recorded in the footer (ISIZE).
    #[must_use]
    pub fn uncompressed_size(&self) -> usize {
        self.footer_u32(4) as usize
    }

    /// CRC32 of the uncompressed payload recorded in the footer.
    #[must_use]
    pub fn crc32(&self) -> u32 {
        self.footer_u32(8)
    }

    fn footer_u32(&self, from_end: usize) -> u32 {
        let len = self.data.len();
        if len < BGZF_FOOTER_SIZE {
            return 0;
        }
        let at = len - from_end;
        u32::from_le_bytes([self.data[at], self.data[at + 1], self.data[at + 2], self.data[at + 3]])
    }
}

// ============================================================================
// Reading
// ============================================================================

fn invalid_data(message: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.into())
}

/// Fills `buf` as far as the reader allows and returns the number of bytes read.
fn read_up_to<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Validates an 18-byte block header and returns the total block size.
///
/// # Errors
///
/// Returns `InvalidData` if any fixed header field is wrong.
pub fn parse_block_header(header: &[u8; BGZF_HEADER_SIZE]) -> io::Result<usize> {
    if header[0] != 0x1f || header[1] != 0x8b {
        return Err(invalid_data(format!(
            "Invalid BGZF magic: expected 0x1f 0x8b, got 0x{:02x} 0x{:02x}",
            header[0], header[1]
        )));
    }

    if header[2] != 0x08 {
        return Err(invalid_data(format!(
            "Invalid compression method: expected 0x08, got 0x{:02x}",
            header[2]
        )));
    }

    if header[3] & 0x04 == 0 {
        return Err(invalid_data("BGZF block missing FEXTRA flag"));
    }

    if header[12] != b'B' || header[13] != b'C' {
        return Err(invalid_data(format!(
            "Invalid BGZF subfield ID: expected 'BC', got '{}{}'",
            header[12] as char, header[13] as char
        )));
    }

    let block_size = u16::from_le_bytes([header[16], header[17]]) as usize + 1;
    if block_size < BGZF_HEADER_SIZE + BGZF_FOOTER_SIZE {
        return Err(invalid_data(format!("BGZF block too small: {block_size} bytes")));
    }

    Ok(block_size)
}

/// Read a single raw BGZF block.
///
/// Returns `Ok(None)` when the reader is exhausted exactly at a block
/// boundary. A partial header or a block cut short by the end of the stream
/// is reported as `UnexpectedEof`.
///
/// # Errors
///
/// Returns an error if reading fails or the header is malformed.
pub fn read_raw_block<R: Read + ?Sized>(reader: &mut R) -> io::Result<Option<RawBgzfBlock>> {
    let mut header = [0u8; BGZF_HEADER_SIZE];
    match read_up_to(reader, &mut header)? {
        0 => return Ok(None),
        BGZF_HEADER_SIZE => {}
        n => {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("Truncated BGZF header: {n} of {BGZF_HEADER_SIZE} bytes"),
            ));
        }
    }

    let block_size = parse_block_header(&header)?;
    let mut data = vec![0u8; block_size];
    data[..BGZF_HEADER_SIZE].copy_from_slice(&header);

    let body = read_up_to(reader, &mut data[BGZF_HEADER_SIZE..])?;
    if body != block_size - BGZF_HEADER_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!(
                "Truncated BGZF block: expected {block_size} bytes, got {}",
                BGZF_HEADER_SIZE + body
            ),
        ));
    }

    Ok(Some(RawBgzfBlock { data }))
}

// ============================================================================
// Inflation
// ============================================================================

/// Inflate a block, appending the payload to `output`.
///
/// The payload is checked against both the ISIZE and CRC32 footer fields.
///
/// # Errors
///
/// Returns `InvalidData` if inflation fails, the size is wrong, or the CRC
/// does not match.
pub fn inflate_block_into(
    block: &RawBgzfBlock,
    decompressor: &mut Decompressor,
    output: &mut Vec<u8>,
) -> io::Result<()> {
    let uncompressed_size = block.uncompressed_size();
    if block.is_eof() || uncompressed_size == 0 {
        return Ok(());
    }
    if uncompressed_size > BGZF_MAX_UNCOMPRESSED_SIZE {
        return Err(invalid_data(format!(
            "BGZF block claims {uncompressed_size} uncompressed bytes"
        )));
    }

    let start = output.len();
    output.resize(start + uncompressed_size, 0);

    let written = decompressor
        .deflate_decompress(block.compressed_data(), &mut output[start..])
        .map_err(|e| invalid_data(format!("BGZF decompression failed: {e:?}")))?;
    if written != uncompressed_size {
        output.truncate(start);
        return Err(invalid_data(format!(
            "BGZF block inflated to {written} bytes, footer says {uncompressed_size}"
        )));
    }

    let expected_crc = block.crc32();
    let actual_crc = crc32fast::hash(&output[start..]);
    if expected_crc != actual_crc {
        output.truncate(start);
        return Err(invalid_data(format!(
            "BGZF CRC32 mismatch: expected 0x{expected_crc:08x}, got 0x{actual_crc:08x}, block_size={}",
            block.len()
        )));
    }

    Ok(())
}

/// Inflate a block into a fresh buffer.
///
/// # Errors
///
/// See [`inflate_block_into`].
pub fn inflate_block(block: &RawBgzfBlock, decompressor: &mut Decompressor) -> io::Result<Vec<u8>> {
    let mut output = Vec::with_capacity(block.uncompressed_size());
    inflate_block_into(block, decompressor, &mut output)?;
    Ok(output)
}

// ============================================================================
// Tests
// ============================================================================
