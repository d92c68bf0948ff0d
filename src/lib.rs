//! lapcat - cross-marketplace laptop catalog synchronization
//!
//! Merges manufacturer datasheet specifications with live marketplace data
//! into a single deduplicated record per SKU, refreshed on a schedule and
//! tolerant of partial failures in either source.

// Module declarations
pub mod application;
pub mod domain;
pub mod infrastructure;

pub mod test_utils;
