//! Engine Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// An engine error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong
/// internally. A target that resolves but belongs to another user reports
/// [`NotFound`](Self::NotFound), never anything ownership-shaped. Upload
/// sessions are the exception: there a mismatch is an explicit
/// [`Unauthorized`](Self::Unauthorized).
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Target id does not resolve, or resolves but is not owned by the caller.
    #[display("not found")]
    NotFound,
    /// Bad id, disallowed name characters, missing required field.
    #[display("invalid argument: {_0}")]
    InvalidArgument(#[error(not(source))] &'static str),
    /// Operation contradicts current state (no-op move, duplicate chunk,
    /// terminal session).
    #[display("conflict: {_0}")]
    Conflict(#[error(not(source))] &'static str),
    /// Session owned by a different user.
    #[display("unauthorized")]
    Unauthorized,
    /// I/O failure in the physical store or temp area.
    #[display("storage failure")]
    Storage,
    /// Catalog database failure.
    #[display("catalog failure")]
    Catalog,
    /// An expected row vanished mid-operation.
    #[display("integrity failure: {_0}")]
    Integrity(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    ///
    /// The lifecycle traversals are built to be safely re-runnable, so a
    /// retry after a mid-traversal `Storage`/`Catalog` failure picks up
    /// where the last run left off.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage | Self::Catalog)
    }
}
