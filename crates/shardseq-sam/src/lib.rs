#![deny(unsafe_code)]
// CIGAR arithmetic moves between usize read positions and i64 reference
// coordinates throughout.
#![allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_sign_loss)]

//! Alignment records and read clipping.
//!
//! - [`record`] - The [`Read`] value decoded from a BAM record
//! - [`cigar`] - CIGAR arithmetic and text conversion
//! - [`clipper`] - Hard/soft clipping, masking, and soft clip reversion
//! - [`adaptor`] - Adaptor boundary computation for paired reads
//! - [`builder`] - Fluent [`Read`] construction for tests

pub mod adaptor;
pub mod builder;
pub mod cigar;
pub mod clipper;
pub mod errors;
pub mod record;

pub use adaptor::{AdaptorBoundary, InsertSizeAdaptorBoundary};
pub use builder::ReadBuilder;
pub use cigar::{ClippingTail, format_cigar, parse_cigar};
pub use clipper::{ClipOp, ClippingRepresentation, ReadClipper};
pub use errors::ClipError;
pub use record::{MISSING_QUALITY, Read, UNMAPPED_REFERENCE_ID};
