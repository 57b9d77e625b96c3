//! 64-bit sort keys that partition reads by genomic position.
//!
//! Mapped reads get `reference index << 32 | zero-based start`, so keys sort
//! by coordinate. Everything else gets `i32::MAX << 32 | hash`, which sorts
//! after every mapped key and spreads unmapped reads across partitions.

use murmur3::murmur3_32;
use shardseq_sam::Read;
use std::io::Cursor;

use crate::errors::Result;

/// Upper 32 bits of every unmapped read's key.
pub const UNMAPPED_KEY_PREFIX: u64 = (i32::MAX as u64) << 32;

/// Seed of the first hash in the chain.
pub const HASH_SEED: u32 = 0;

/// Computes shard keys for reads.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShardKeyEncoder;

impl ShardKeyEncoder {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Key for `read`.
    ///
    /// # Errors
    ///
    /// Only fails if hashing an in-memory buffer reports an I/O error.
    pub fn encode(&self, read: &Read) -> Result<u64> {
        if is_placed(read) {
            let reference = u64::from(read.reference_sequence_id.unsigned_abs());
            let position = u64::from((read.alignment_start - 1).unsigned_abs());
            return Ok((reference << 32) | position);
        }
        Ok(UNMAPPED_KEY_PREFIX | u64::from(unmapped_hash(read)?))
    }
}

/// True for keys in the unmapped partition.
#[must_use]
pub fn is_unmapped_key(key: u64) -> bool {
    key >> 32 == UNMAPPED_KEY_PREFIX >> 32
}

fn is_placed(read: &Read) -> bool {
    read.reference_sequence_id >= 0 && read.alignment_start >= 1 && !read.is_unmapped()
}

fn hash(bytes: &[u8], seed: u32) -> Result<u32> {
    Ok(murmur3_32(&mut Cursor::new(bytes), seed)?)
}

/// Absolute value of the 32-bit hash of the raw record, or of its name, bases,
/// qualities, and CIGAR text hashed in sequence with each hash seeding the next.
fn unmapped_hash(read: &Read) -> Result<u32> {
    let value = if let Some(raw) = &read.raw {
        hash(raw, HASH_SEED)?
    } else {
        let mut value = hash(read.name.as_ref(), HASH_SEED)?;
        value = hash(&read.sequence, value)?;
        value = hash(&read.quality_scores, value)?;
        hash(read.cigar_string().as_bytes(), value)?
    };
    Ok((value as i32).unsigned_abs())
}
