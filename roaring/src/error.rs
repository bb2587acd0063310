/// Errors caused by invalid arguments to bitmap operations.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Ranges are half-open, must not be reversed and must end at or before 2^32.
    #[error("invalid range [{start}, {end})")]
    InvalidRange { start: u64, end: u64 },

    /// `select` was asked for a position at or beyond the cardinality.
    #[error("select index ({index}) >= cardinality ({cardinality})")]
    SelectOutOfBounds { index: u64, cardinality: u64 },

    /// Appended keys must all exceed the existing maximum key.
    #[error("appended key ({next}) <= previous key ({previous})")]
    NonMonotonicKeys { previous: u16, next: u16 },
}
