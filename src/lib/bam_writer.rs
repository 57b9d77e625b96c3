//! BAM output for transformed reads.
//!
//! Records are encoded with [`bam_codec`](crate::bam_codec) and framed as
//! `block_size` + bytes inside BGZF blocks. The header always ends its own
//! block, so the first record starts at `(header block size, 0)`.

use log::debug;
use noodles::bgzf::VirtualPosition;
use shardseq_bgzf::InlineBgzfCompressor;
use shardseq_sam::Read;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::bam_codec;
use crate::header::BamHeader;

/// Default deflate level for BAM output.
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

pub struct BamWriter<W: Write> {
    inner: W,
    compressor: InlineBgzfCompressor,
    compressed_written: u64,
    record: Vec<u8>,
    records_written: u64,
}

impl BamWriter<BufWriter<File>> {
    /// Creates `path` and writes `header` to it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    pub fn create<P: AsRef<Path>>(path: P, header: &BamHeader, compression_level: u32) -> io::Result<Self> {
        let file = File::create(path.as_ref())?;
        debug!("Writing BAM to {}", path.as_ref().display());
        Self::new(BufWriter::new(file), header, compression_level)
    }
}

impl<W: Write> BamWriter<W> {
    /// Wraps `inner` and writes `header` in its own block.
    ///
    /// # Errors
    ///
    /// Returns an error if writing the header fails.
    pub fn new(inner: W, header: &BamHeader, compression_level: u32) -> io::Result<Self> {
        let mut writer = Self {
            inner,
            compressor: InlineBgzfCompressor::new(compression_level),
            compressed_written: 0,
            record: Vec::new(),
            records_written: 0,
        };
        let mut bytes = Vec::new();
        header.write_to(&mut bytes)?;
        writer.compressor.write_all(&bytes)?;
        writer.flush_block()?;
        Ok(writer)
    }

    /// Virtual offset at which the next record will start.
    #[must_use]
    pub fn virtual_position(&self) -> VirtualPosition {
        VirtualPosition::from((self.compressed_written << 16) | self.compressor.buffer_len() as u64)
    }

    #[must_use]
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Appends one record.
    ///
    /// # Errors
    ///
    /// Returns an error if the read cannot be encoded or writing fails.
    pub fn write_read(&mut self, read: &Read) -> io::Result<()> {
        self.record.clear();
        bam_codec::encode_into(read, &mut self.record)?;
        let block_size = u32::try_from(self.record.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "BAM record larger than 4GB"))?;
        self.compressor.write_all(&block_size.to_le_bytes())?;
        self.compressor.write_all(&self.record)?;
        self.drain()?;
        self.records_written += 1;
        Ok(())
    }

    /// Ends the current BGZF block so the next record starts a new one.
    ///
    /// # Errors
    ///
    /// Returns an error if compression or writing fails.
    pub fn flush_block(&mut self) -> io::Result<()> {
        self.compressor.flush()?;
        self.drain()
    }

    /// Writes the remaining data and the EOF marker, returning the inner writer.
    ///
    /// # Errors
    ///
    /// Returns an error if compression or writing fails.
    pub fn finish(mut self) -> io::Result<W> {
        self.compressor.finish(&mut self.inner)?;
        debug!("Wrote {} BAM records", self.records_written);
        Ok(self.inner)
    }

    fn drain(&mut self) -> io::Result<()> {
        self.compressed_written += self.compressor.write_blocks_to(&mut self.inner)?;
        Ok(())
    }
}
