//! Error types for observable list operations.

/// Errors that can occur while reading, mutating, or observing a list.
///
/// Every error is surfaced synchronously to the caller that triggered it.
/// Nothing is retried internally.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ListError {
    /// A positional accessor or mutator was given an index outside the
    /// valid bound. Indices are never clamped.
    #[error("index {index} out of range for list of length {len}")]
    IndexOutOfRange {
        /// The offending index.
        index: usize,
        /// The list length at the time of the call.
        len: usize,
    },

    /// A change assembler call arrived out of sequence, e.g. a commit
    /// without a matching begin. This is a programming error.
    #[error("list event protocol violation: {0}")]
    ProtocolViolation(&'static str),

    /// An argument was missing or unusable where a value is required.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl ListError {
    pub(crate) fn out_of_range(index: usize, len: usize) -> Self {
        Self::IndexOutOfRange { index, len }
    }
}
