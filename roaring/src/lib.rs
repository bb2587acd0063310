//! Compressed bitmaps over 32-bit values.
//!
//! # Architecture
//!
//! Each 32-bit value is split into a high 16-bit key (selecting a container) and a low 16-bit
//! index (stored within that container):
//!
//! ```text
//! 32-bit value
//! +-----------------------+-----------------------+
//! |   high 16 bits (key)  |     low 16 bits       |
//! +-----------------------+-----------------------+
//!             |                       |
//!             v                       v
//!      Directory key           Container index
//! ```
//!
//! A [`RoaringBitmap`] owns a [`Directory`]: parallel sorted arrays of keys and containers.
//!
//! ```text
//! Directory
//! +-----------------+-----------------+-----------------+
//! |  key 0          |  key 1          |  key 7          |
//! +-----------------+-----------------+-----------------+
//!         |                 |                 |
//!         v                 v                 v
//! +--------------+  +--------------+  +--------------+
//! |    Array     |  |    Bitmap    |  |     Run      |
//! | [3, 7, 42]   |  | 1011010...   |  | [0-9999]     |
//! +--------------+  +--------------+  +--------------+
//!   <= 4096 vals      > 4096 vals       when smaller
//! ```
//!
//! | Type | Storage | Used when |
//! |------|---------|-----------|
//! | Array | Sorted `Vec<u16>` | cardinality <= 4096 |
//! | Bitmap | `[u64; 1024]` (8KB) | cardinality > 4096 |
//! | Run | Sorted `(start, end)` pairs | `run_optimize` finds it strictly smaller |
//!
//! # Modules
//!
//! - [`ops`]: pairwise set algebra, also available through `&`, `|`, `^` and `-`.
//! - [`aggregation`]: N-way intersections, unions and symmetric differences.
//! - [`parallel`]: N-way unions and symmetric differences on a [`rayon::ThreadPool`].
//! - [`codec`]: the portable serialization format.
//! - [`rank`]: an immutable snapshot with constant-time rank queries.
//! - [`fast_rank`]: a mutable bitmap caching cumulative cardinalities.
//! - [`batch`]: iteration in caller-provided buffers.
//!
//! # Example
//!
//! ```
//! use commonware_roaring::RoaringBitmap;
//!
//! let mut bitmap = RoaringBitmap::new();
//! bitmap.add(42);
//! bitmap.add_range(1000, 2000).unwrap();
//!
//! assert!(bitmap.contains(42));
//! assert!(bitmap.contains(1500));
//! assert_eq!(bitmap.len(), 1001);
//! assert_eq!(bitmap.select(1).unwrap(), 1000);
//! ```
//!
//! # References
//!
//! * <https://arxiv.org/pdf/1402.6407>: Better bitmap performance with Roaring bitmaps
//! * <https://arxiv.org/pdf/1603.06549>: Consistently faster and smaller compressed bitmaps with Roaring
//! * <https://github.com/RoaringBitmap/RoaringFormatSpec>: Roaring Bitmap Format Specification

pub mod aggregation;
pub mod batch;
pub mod bitmap;
pub mod codec;
pub mod container;
pub mod directory;
mod error;
pub mod fast_rank;
pub mod ops;
pub mod parallel;
pub mod rank;

pub use batch::BatchIterator;
pub use bitmap::{Iter, RoaringBitmap, MAX_RANGE_END};
pub use container::{Container, Kind, RangeConsumer};
pub use directory::Directory;
pub use error::Error;
pub use fast_rank::FastRankBitmap;
pub use rank::SuccinctRank;

/// Extracts the high 16 bits (container key) from a value.
#[inline]
pub(crate) const fn high_bits(value: u32) -> u16 {
    (value >> 16) as u16
}

/// Extracts the low 16 bits (container index) from a value.
#[inline]
pub(crate) const fn low_bits(value: u32) -> u16 {
    value as u16
}

/// Combines a container key and index into a value.
#[inline]
pub(crate) const fn combine(key: u16, index: u16) -> u32 {
    ((key as u32) << 16) | (index as u32)
}
