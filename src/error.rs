//! All error types for the locfilter crate.
//!
//! These are returned from all fallible operations (opening and iterating
//! filters, coordinate mapping, skeleton replay, serialization, etc.).
//! Checker findings are deliberately *not* errors; see [`crate::checker`].

use thiserror::Error;

use crate::locale::LocaleId;

#[derive(Error, Debug)]
pub enum Error {
    /// The reader could not make sense of the byte stream. Fatal to the
    /// current iteration; the filter returns to a closed state on `close()`.
    #[error("malformed input: {0}")]
    BadInput(String),

    /// Source/target structure disagrees during merge, or a skeleton
    /// reference could not be resolved during replay. Whether this aborts
    /// the run or is logged-and-skipped is the caller's policy.
    #[error("merge error: {0}")]
    Merge(String),

    /// A position fell outside a fragment, or strictly inside a two-element
    /// code marker where a coordinate conversion is ambiguous.
    #[error("position {position} out of range (length {len})")]
    PositionOutOfRange { position: usize, len: usize },

    /// An embedded skeleton writer was asked for a target-locale buffer that
    /// was never initialized at start-document time.
    #[error("unexpected target output requested for `{0}`")]
    UnexpectedTargetOutput(LocaleId),

    /// `next_event()` was called without a prior successful `has_next()`.
    #[error("no more events: call has_next() before next_event()")]
    NoSuchElement,

    /// A locale tag failed to parse as a language identifier.
    #[error("invalid locale identifier `{0}`")]
    InvalidLocale(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Creates a new bad-input error.
    pub fn bad_input(message: impl Into<String>) -> Self {
        Error::BadInput(message.into())
    }

    /// Creates a new merge error.
    pub fn merge(message: impl Into<String>) -> Self {
        Error::Merge(message.into())
    }

    /// Creates a new out-of-range position error.
    pub fn position_out_of_range(position: usize, len: usize) -> Self {
        Error::PositionOutOfRange { position, len }
    }
}
