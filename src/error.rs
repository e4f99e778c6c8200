//! The error taxonomy raised by the core. Every fallible entry point returns
//! [`Result<T>`], an alias over [`Error`].
//!
//! The core never retries a finder or a memory callback, and never inspects
//! the *cause* of an `Err` they return — it only validates the *shape* of an
//! `Ok` value (kind, classification, buffer length) before handing it back
//! to the caller.

use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

/// Memory read covered at least one byte with no registered segment.
///
/// Carries the address that faulted so callers can report it, even though
/// the message itself (matched by callers and tests) does not include it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultError {
    pub address: u64,
}

impl fmt::Display for FaultError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "could not find memory segment")
    }
}

impl std::error::Error for FaultError {}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Fault(#[from] FaultError),
    /// A type or symbol finder chain returned nothing for the requested name.
    #[error("{0}")]
    Lookup(String),
    /// `Program` indexed container-style by a name with no matching symbol.
    /// Textually the same shape as `Lookup`, but a distinct kind so callers
    /// can tell container-style access apart from an explicit lookup call.
    #[error("{0}")]
    Key(String),
    /// A finder returned a value of the wrong kind/classification.
    #[error("{0}")]
    Type(String),
    /// A callback returned a malformed value, memory was re-initialized, or
    /// no integer type fits `size_t`/`ptrdiff_t`.
    #[error("{0}")]
    Value(String),
    /// A core-dump file's header is not an ELF header.
    #[error("{0}")]
    FileFormat(String),
}

impl Error {
    pub(crate) fn fault(address: u64) -> Self {
        FaultError { address }.into()
    }

    pub(crate) fn lookup(message: impl Into<String>) -> Self {
        Error::Lookup(message.into())
    }

    pub(crate) fn key(message: impl Into<String>) -> Self {
        Error::Key(message.into())
    }

    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        Error::Type(message.into())
    }

    pub(crate) fn value(message: impl Into<String>) -> Self {
        Error::Value(message.into())
    }

    pub(crate) fn file_format(message: impl Into<String>) -> Self {
        Error::FileFormat(message.into())
    }

    /// Format a `could not find <thing> '<name>'[ in '<filename>']` lookup error.
    pub(crate) fn not_found(thing: &str, name: &str, filename: Option<&str>) -> Self {
        match filename {
            Some(filename) => {
                Error::lookup(format!("could not find {thing} '{name}' in '{filename}'"))
            }
            None => Error::lookup(format!("could not find {thing} '{name}'")),
        }
    }
}
