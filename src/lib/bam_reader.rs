//! Range-bounded BAM decoding over raw BGZF blocks.
//!
//! [`CompressedBlockReader`] walks a BAM file block by block with
//! `shardseq_bgzf`, tracking the virtual offset of every byte it hands out so
//! a caller can decode exactly the records between two virtual offsets.
//!
//! ```no_run
//! use noodles::bgzf::VirtualPosition;
//! use shardseq_lib::bam_reader::CompressedBlockReader;
//!
//! # fn main() -> shardseq_lib::errors::Result<()> {
//! let mut reader = CompressedBlockReader::open("input.bam")?;
//! reader.set_end(VirtualPosition::from(1 << 16));
//! while let Some(read) = reader.decode_next()? {
//!     println!("{}", read.name);
//! }
//! # Ok(())
//! # }
//! ```

use libdeflater::Decompressor;
use log::debug;
use noodles::bgzf::VirtualPosition;
use shardseq_bgzf::{inflate_block_into, read_raw_block};
use shardseq_sam::Read as AlignedRead;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::bam_codec;
use crate::errors::{Result, ShardseqError};
use crate::header::BamHeader;
use crate::progress::ProgressTracker;

/// `block_size` values smaller than this cannot hold a record.
const MIN_BLOCK_SIZE: usize = bam_codec::FIXED_FIELDS_LEN;

// ============================================================================
// Block stream
// ============================================================================

/// Decompressed view of a BGZF file, one block at a time.
struct BlockStream<R> {
    inner: R,
    decompressor: Decompressor,
    block: Vec<u8>,
    position: usize,
    block_offset: u64,
    next_block_offset: u64,
}

impl<R: Read + Seek> BlockStream<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            decompressor: Decompressor::new(),
            block: Vec::new(),
            position: 0,
            block_offset: 0,
            next_block_offset: 0,
        }
    }

    /// Virtual offset of the next byte; `(next block, 0)` when the current
    /// block is used up.
    fn virtual_position(&self) -> VirtualPosition {
        if self.position >= self.block.len() {
            VirtualPosition::from(self.next_block_offset << 16)
        } else {
            VirtualPosition::from((self.block_offset << 16) | self.position as u64)
        }
    }

    /// Loads the block that starts at the stream's current file position.
    /// Returns `false` at end of file.
    fn load_next_block(&mut self) -> io::Result<bool> {
        self.block_offset = self.next_block_offset;
        self.block.clear();
        self.position = 0;
        let Some(raw) = read_raw_block(&mut self.inner)? else {
            return Ok(false);
        };
        inflate_block_into(&raw, &mut self.decompressor, &mut self.block)?;
        self.next_block_offset = self.block_offset + raw.len() as u64;
        Ok(true)
    }

    /// Positions the stream at `block_offset` and loads that block.
    /// Returns `false` if there is no block there.
    fn load_block_at(&mut self, block_offset: u64) -> io::Result<bool> {
        self.inner.seek(SeekFrom::Start(block_offset))?;
        self.next_block_offset = block_offset;
        self.load_next_block()
    }
}

impl<R: Read + Seek> Read for BlockStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.position >= self.block.len() {
            // Empty blocks, such as the EOF marker, are skipped.
            if !self.load_next_block()? {
                return Ok(0);
            }
        }
        let n = buf.len().min(self.block.len() - self.position);
        buf[..n].copy_from_slice(&self.block[self.position..self.position + n]);
        self.position += n;
        Ok(n)
    }
}

// ============================================================================
// Reader
// ============================================================================

/// Sequential BAM record decoder bounded by a virtual offset range.
///
/// Decoding stops once the current virtual offset reaches the end offset, so
/// records that start before `end` are returned even when they extend past
/// it. The reader is forward-only: after the first [`seek`](Self::seek), later
/// seeks may not move before that target.
pub struct CompressedBlockReader<R = BufReader<File>> {
    stream: BlockStream<R>,
    header: BamHeader,
    first_record: VirtualPosition,
    start: Option<VirtualPosition>,
    end: VirtualPosition,
    file_length: u64,
    progress: ProgressTracker,
    failed: bool,
}

impl CompressedBlockReader<BufReader<File>> {
    /// Opens a BAM file and reads its header.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or its header is corrupt.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        debug!("Opened {}", path.display());
        Self::new(BufReader::new(file))
    }
}

impl<R: Read + Seek> CompressedBlockReader<R> {
    /// Wraps a seekable BGZF source and reads its header.
    ///
    /// # Errors
    ///
    /// Returns [`ShardseqError::CorruptStream`] if the header cannot be decoded.
    pub fn new(mut inner: R) -> Result<Self> {
        let file_length = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;

        let mut stream = BlockStream::new(inner);
        let header = BamHeader::read_from(&mut stream).map_err(|e| corrupt(&stream, &e))?;
        let first_record = stream.virtual_position();
        debug!(
            "BAM header has {} references; first record at {}",
            header.references().len(),
            format_offset(first_record)
        );

        Ok(Self {
            stream,
            header,
            first_record,
            start: None,
            end: VirtualPosition::from(u64::MAX),
            file_length,
            progress: ProgressTracker::new("Decoded records").with_interval(1_000_000),
            failed: false,
        })
    }

    /// Sets the exclusive end of the range to decode.
    pub fn set_end(&mut self, end: VirtualPosition) {
        self.end = end;
    }

    #[must_use]
    pub fn with_progress_interval(mut self, interval: u64) -> Self {
        self.progress = ProgressTracker::new("Decoded records").with_interval(interval);
        self
    }

    #[must_use]
    pub fn header(&self) -> &BamHeader {
        &self.header
    }

    /// Virtual offset of the first record, just past the header.
    #[must_use]
    pub fn first_record_offset(&self) -> VirtualPosition {
        self.first_record
    }

    /// Virtual offset of the next record to decode.
    #[must_use]
    pub fn current_offset(&self) -> VirtualPosition {
        self.stream.virtual_position()
    }

    /// Moves to `target`, which must be a record boundary.
    ///
    /// # Errors
    ///
    /// Returns [`ShardseqError::InvalidOffset`] if `target` lies past the end of
    /// the file, inside the header, beyond its block's decompressed length,
    /// or before the first seek target; [`ShardseqError::CorruptStream`] if the
    /// block at `target` cannot be decoded.
    pub fn seek(&mut self, target: VirtualPosition) -> Result<()> {
        let invalid = |reason: String| ShardseqError::InvalidOffset {
            compressed: target.compressed(),
            uncompressed: target.uncompressed(),
            reason,
        };

        if target.compressed() > self.file_length {
            return Err(invalid(format!("beyond end of file ({} bytes)", self.file_length)));
        }
        if target < self.first_record {
            return Err(invalid(format!(
                "points into the header (first record at {})",
                format_offset(self.first_record)
            )));
        }
        if let Some(start) = self.start {
            if target < start {
                return Err(invalid(format!("rewinds below the first seek target {}", format_offset(start))));
            }
        }

        let loaded = self.stream.load_block_at(target.compressed()).map_err(|e| corrupt(&self.stream, &e))?;
        let available = if loaded { self.stream.block.len() } else { 0 };
        let within = usize::from(target.uncompressed());
        if within > available {
            return Err(invalid(format!("block holds only {available} decompressed bytes")));
        }
        self.stream.position = within;

        if self.start.is_none() {
            self.start = Some(target);
        }
        debug!("Seeked to {}", format_offset(target));
        Ok(())
    }

    /// Decodes the next record, or returns `None` at the end of the range or
    /// the end of the file.
    ///
    /// # Errors
    ///
    /// Returns [`ShardseqError::CorruptStream`] if a block or record is corrupt
    /// or the stream ends inside a record.
    pub fn decode_next(&mut self) -> Result<Option<AlignedRead>> {
        if self.current_offset() >= self.end {
            return Ok(None);
        }

        let mut size = [0u8; 4];
        match self.fill(&mut size)? {
            0 => return Ok(None),
            4 => {}
            n => {
                return Err(ShardseqError::corrupt(
                    self.stream.block_offset,
                    format!("truncated record length: {n} of 4 bytes"),
                ));
            }
        }

        let block_size = u32::from_le_bytes(size) as usize;
        if block_size < MIN_BLOCK_SIZE {
            return Err(ShardseqError::corrupt(
                self.stream.block_offset,
                format!("record size {block_size} is smaller than the fixed fields"),
            ));
        }

        let mut record = vec![0u8; block_size];
        let filled = self.fill(&mut record)?;
        if filled != block_size {
            return Err(ShardseqError::corrupt(
                self.stream.block_offset,
                format!("truncated record: expected {block_size} bytes, got {filled}"),
            ));
        }

        let read = bam_codec::decode(&record).map_err(|e| corrupt(&self.stream, &e))?;
        self.progress.log_if_needed(1);
        Ok(Some(read))
    }

    /// Fraction of the compressed range consumed, in `[0, 1]`.
    #[must_use]
    pub fn progress(&self) -> f64 {
        let current = self.current_offset();
        if current >= self.end {
            return 1.0;
        }
        let start = self.start.unwrap_or(self.first_record).compressed() as f64;
        let end = self.end.compressed() as f64;
        let fraction = (current.compressed() as f64 - start) / (end - start + 1.0);
        fraction.clamp(0.0, 1.0)
    }

    /// Number of records decoded so far.
    #[must_use]
    pub fn records_decoded(&self) -> u64 {
        self.progress.count()
    }

    /// Releases the file and returns the number of records decoded.
    pub fn close(self) -> u64 {
        self.progress.log_final();
        self.progress.count()
    }

    fn fill(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.stream.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(corrupt(&self.stream, &e)),
            }
        }
        Ok(filled)
    }
}

impl<R: Read + Seek> Iterator for CompressedBlockReader<R> {
    type Item = Result<AlignedRead>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let result = self.decode_next().transpose();
        if matches!(result, Some(Err(_))) {
            self.failed = true;
        }
        result
    }
}

/// `compressed/uncompressed` rendering of a virtual offset.
#[must_use]
pub fn format_offset(offset: VirtualPosition) -> String {
    format!("{}/{}", offset.compressed(), offset.uncompressed())
}

/// Maps block-level I/O failures to [`ShardseqError::CorruptStream`].
fn corrupt<R>(stream: &BlockStream<R>, error: &io::Error) -> ShardseqError {
    match error.kind() {
        io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => {
            ShardseqError::corrupt(stream.block_offset, error.to_string())
        }
        kind => ShardseqError::Io(io::Error::new(kind, error.to_string())),
    }
}
