//! Inline BGZF compression.
//!
//! [`InlineBgzfCompressor`] buffers uncompressed bytes and turns them into
//! complete BGZF blocks, either when 64KB accumulates or when the caller
//! flushes. Explicit flushes are how callers put a block boundary exactly
//! where they want one, e.g. between the BAM header and the first record.
//!
//! Uses libdeflate (via the `bgzf` crate) for the deflate step.

use bgzf::{CompressionLevel, Compressor as BgzfCompressor};
use std::io;

use crate::reader::BGZF_EOF;

/// Maximum uncompressed size buffered before a block is emitted.
const BGZF_MAX_BLOCK_SIZE: usize = bgzf::BGZF_BLOCK_SIZE;

/// Fallback level when the requested one is rejected.
const DEFAULT_COMPRESSION_LEVEL: u8 = 6;

/// A compressed BGZF block ready for writing.
#[derive(Debug, Clone)]
pub struct CompressedBlock {
    /// Number of uncompressed bytes the block carries.
    pub uncompressed_len: usize,
    /// Complete BGZF block (header + compressed data + footer).
    pub data: Vec<u8>,
}

/// Buffering BGZF compressor.
///
/// ```ignore
/// let mut compressor = InlineBgzfCompressor::new(6);
/// compressor.write_all(&encoded_record)?;
/// compressor.flush()?;
/// compressor.write_blocks_to(&mut file)?;
/// ```
pub struct InlineBgzfCompressor {
    buffer: Vec<u8>,
    compressor: BgzfCompressor,
    completed_blocks: Vec<CompressedBlock>,
}

impl InlineBgzfCompressor {
    /// Create a compressor. Levels are clamped to `1..=12`.
    ///
    /// # Panics
    ///
    /// Panics if the `bgzf` crate rejects the default level 6, which it never does.
    #[must_use]
    pub fn new(compression_level: u32) -> Self {
        let requested = u8::try_from(compression_level.clamp(1, 12)).unwrap_or(DEFAULT_COMPRESSION_LEVEL);
        let level = CompressionLevel::new(requested).unwrap_or_else(|_| {
            CompressionLevel::new(DEFAULT_COMPRESSION_LEVEL).expect("level 6 is always valid")
        });
        Self {
            buffer: Vec::with_capacity(BGZF_MAX_BLOCK_SIZE),
            compressor: BgzfCompressor::new(level),
            completed_blocks: Vec::new(),
        }
    }

    /// Number of uncompressed bytes waiting in the current block.
    #[inline]
    #[must_use]
    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    /// Buffer data, emitting a block every time 64KB accumulates.
    ///
    /// # Errors
    ///
    /// Returns an error if BGZF compression fails.
    pub fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        let mut offset = 0;
        while offset < data.len() {
            let room = BGZF_MAX_BLOCK_SIZE - self.buffer.len();
            let take = room.min(data.len() - offset);
            self.buffer.extend_from_slice(&data[offset..offset + take]);
            offset += take;

            if self.buffer.len() >= BGZF_MAX_BLOCK_SIZE {
                self.compress_current_buffer()?;
            }
        }
        Ok(())
    }

    /// Emit a block for whatever is buffered, even if it is small.
    ///
    /// # Errors
    ///
    /// Returns an error if BGZF compression fails.
    pub fn flush(&mut self) -> io::Result<()> {
        self.compress_current_buffer()
    }

    /// Take all completed blocks.
    pub fn take_blocks(&mut self) -> Vec<CompressedBlock> {
        std::mem::take(&mut self.completed_blocks)
    }

    /// Write all completed blocks to `output`, returning the compressed bytes written.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to the output fails.
    pub fn write_blocks_to<W: io::Write + ?Sized>(&mut self, output: &mut W) -> io::Result<u64> {
        let mut written = 0u64;
        for block in self.completed_blocks.drain(..) {
            output.write_all(&block.data)?;
            written += block.data.len() as u64;
        }
        Ok(written)
    }

    /// Flush, write every pending block, then the EOF marker.
    ///
    /// # Errors
    ///
    /// Returns an error if compression or writing fails.
    pub fn finish<W: io::Write + ?Sized>(&mut self, output: &mut W) -> io::Result<u64> {
        self.flush()?;
        let written = self.write_blocks_to(output)?;
        output.write_all(&BGZF_EOF)?;
        output.flush()?;
        Ok(written + BGZF_EOF.len() as u64)
    }

    fn compress_current_buffer(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let mut data = Vec::with_capacity(self.buffer.len() / 2 + 64);
        self.compressor
            .compress(&self.buffer, &mut data)
            .map_err(|e| io::Error::other(format!("BGZF compression failed: {e}")))?;

        self.completed_blocks.push(CompressedBlock { uncompressed_len: self.buffer.len(), data });
        self.buffer.clear();
        Ok(())
    }
}
