//! Thresholds and size functions that decide which representation a container uses.
//!
//! The values are heuristics shared with other deployed implementations of the format. They are
//! preserved for compatibility of behavior and encoded size, but nothing else in the crate depends
//! on their exact magnitude.

/// Number of values a single container covers (the low 16 bits of a value).
pub const CONTAINER_CAPACITY: u32 = 1 << 16;

/// Largest cardinality stored as an array container.
pub const ARRAY_MAX_CARDINALITY: u32 = 4096;

/// Number of 64-bit words in a bitmap container.
pub const BITMAP_WORDS: usize = 1024;

/// Ranges covering at most this many values are created as arrays instead of runs.
pub const RANGE_ARRAY_THRESHOLD: u32 = 2;

/// Encoded size of a bitmap container payload in bytes.
pub const BITMAP_SIZE: usize = BITMAP_WORDS * 8;

/// Largest run count for which a run payload can still be smaller than a bitmap payload.
pub const MAX_USEFUL_RUNS: usize = (BITMAP_SIZE - 2) / 4;

/// The representation of a container.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Array,
    Bitmap,
    Run,
}

/// Encoded size of an array payload holding `cardinality` values.
pub const fn array_size(cardinality: u32) -> usize {
    2 * cardinality as usize
}

/// Encoded size of a run payload holding `runs` runs (run count header included).
pub const fn run_size(runs: usize) -> usize {
    2 + 4 * runs
}

/// Representation used for `cardinality` values when runs are not considered.
pub const fn dense_kind(cardinality: u32) -> Kind {
    if cardinality > ARRAY_MAX_CARDINALITY {
        Kind::Bitmap
    } else {
        Kind::Array
    }
}

/// Whether a run-optimize pass should convert a container of `kind` holding `cardinality` values
/// in `runs` runs. Conversion happens only when the run encoding is strictly smaller.
pub const fn should_run_optimize(kind: Kind, cardinality: u32, runs: usize) -> bool {
    let current = match kind {
        Kind::Array => array_size(cardinality),
        Kind::Bitmap => BITMAP_SIZE,
        Kind::Run => return true,
    };
    run_size(runs) < current
}

/// Whether a run container holding `cardinality` values in `runs` runs should stay a run container.
///
/// Ties favor the run encoding.
pub const fn keep_run(cardinality: u32, runs: usize) -> bool {
    let array = 2 + array_size(cardinality);
    let smallest = if array < BITMAP_SIZE { array } else { BITMAP_SIZE };
    run_size(runs) <= smallest
}

/// Representation used for a freshly created range of `cardinality` consecutive values.
pub const fn range_kind(cardinality: u32) -> Kind {
    if cardinality <= RANGE_ARRAY_THRESHOLD {
        Kind::Array
    } else {
        Kind::Run
    }
}
