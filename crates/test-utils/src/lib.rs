//! Shared test utilities for the tiler workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Deterministic volume generators
//! - An in-memory [`SourceReader`](tile_processor::SourceReader)
//! - Common test fixtures
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{fixtures, InMemorySource};
//! ```

pub mod fixtures;
pub mod generators;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;

/// Macro asserting that a block holds the generated test pattern.
///
/// `$offset` is the absolute TCZYX coordinate of the block's first voxel.
/// The first differing voxel is reported with both coordinates.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_matches_pattern;
///
/// let block = store.read_region(&region)?;
/// assert_matches_pattern!(block, region.start());
/// ```
#[macro_export]
macro_rules! assert_matches_pattern {
    ($block:expr, $offset:expr) => {{
        if let Some((local, expected, actual)) = $crate::first_pattern_mismatch(&$block, $offset) {
            panic!(
                "assertion failed: block differs from test pattern\n  at local: `{}`,\n expected: `{}`,\n   actual: `{}`",
                local, expected, actual
            );
        }
    }};
}
