//! Unified error types for the flatpeach runtime.
//!
//! Every fallible operation in the crate reports one of the error kinds below
//! and propagates it immediately to the caller. There is no internal retry and
//! no partial-result recovery: an absent table field (vtable entry 0) is the
//! only case where a missing value produces a default instead of an error.

use thiserror::Error;

/// Main error type for flatpeach operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A read or write would run past the end of the buffer.
    ///
    /// Malformed length prefixes surface as this error: every length-prefixed
    /// read checks the computed end position against the buffer length before
    /// trusting it.
    #[error("out of bounds: access of {len} byte(s) at offset {offset} exceeds buffer of {available} byte(s)")]
    OutOfBounds {
        offset: usize,
        len: usize,
        available: usize,
    },

    /// A vector access with `index >= count` (or a struct member index past
    /// the layout). Fatal to the single access, recoverable by the caller.
    #[error("index out of range: {index} not in 0..{count}")]
    IndexOutOfRange { index: usize, count: usize },

    /// Mutation attempted on an immutable strategy, a read-only buffer, or a
    /// field whose context does not permit write-through.
    #[error("not mutable: {0}")]
    NotMutable(&'static str),

    /// Structural mismatch in the wire format itself, e.g. a union vector
    /// whose discriminator and value vectors disagree on length, or a
    /// malformed vtable. The input cannot be trusted past this point.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// The nesting budget was exhausted before a required descent. Signals
    /// either malicious input or a schema allowing deeper nesting than the
    /// configured limit.
    #[error("recursion depth limit of {max} exceeded")]
    DepthLimitExceeded { max: u32 },

    /// A string payload was not valid UTF-8.
    #[error("invalid UTF-8 in string payload: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}

/// Result type for flatpeach operations.
pub type Result<T> = std::result::Result<T, Error>;
