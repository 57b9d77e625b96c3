#![deny(unsafe_code)]

//! BGZF (Blocked GZIP Format) block I/O.
//!
//! - [`reader`] - Raw block reading and inflation using libdeflater
//! - [`writer`] - Inline BGZF compression using the `bgzf` crate

pub mod reader;
pub mod writer;

pub use reader::{
    BGZF_EOF, BGZF_FOOTER_SIZE, BGZF_HEADER_SIZE, BGZF_MAX_UNCOMPRESSED_SIZE, RawBgzfBlock,
    inflate_block, inflate_block_into, parse_block_header, read_raw_block,
};
pub use writer::{CompressedBlock, InlineBgzfCompressor};
