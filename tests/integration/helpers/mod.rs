//! Helper utilities for integration tests.

pub mod bam_fixture;

pub use bam_fixture::*;
