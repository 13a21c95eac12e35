//! Shared utilities.
//!
//! Checksums, single-flight memoization, directory copying and test helpers.

pub mod fs;
pub mod hash;
pub mod singleflight;

#[cfg(test)]
pub mod testutil;
