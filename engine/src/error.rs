//! Error types for the Groundbook engine.

use thiserror::Error;

/// All possible errors from the Groundbook engine.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    // Calendar parsing
    #[error("invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("invalid time '{0}': expected HH:MM")]
    InvalidTime(String),

    #[error("invalid duration: {0} hours (minimum is 1)")]
    InvalidDuration(u32),

    #[error("a {0}-hour booking runs past the supported calendar range")]
    DurationOutOfRange(u32),

    // Validation
    #[error("rating {0} is outside 0..=5")]
    InvalidRating(f64),

    #[error("unknown entity kind: {0}")]
    UnknownKind(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
