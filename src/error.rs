//! This module defines the error types for the library.
//!
//! Every failure that can arise from shapes, lazy evaluation, windowing or the
//! IQR solver is collected in a single public type, [`InfiniteArrayError`],
//! which wraps an [`ErrorKind`]. The wrapper keeps the `Display` messages in one
//! place, while the kind stays inspectable so callers can branch on it.
//!
//! Propagation follows the moment of detection: shape and size problems are
//! returned by the constructing call, index problems by the `evaluate`/`window`
//! call that saw them. Numerical breakdown inside the solver is absorbed by the
//! adaptive growth path and only surfaces through [`crate::solvers::SolveFailure`].
use thiserror::Error;

/// Represents all possible errors raised by lazy arrays, operators and the solver.
#[derive(Error, Debug, Clone)]
#[error(transparent)]
pub struct InfiniteArrayError(#[from] ErrorKind);

impl InfiniteArrayError {
    /// Returns the kind of this error.
    pub fn kind(&self) -> &ErrorKind {
        &self.0
    }
}

/// The distinct kinds of errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ErrorKind {
    /// An operation needed a finite count from an axis or object without one.
    #[error("{operation} requires a finite extent, but the object is unbounded.")]
    NotFinite { operation: &'static str },

    /// A truncation size, prefix length or solver parameter is out of its valid range.
    #[error("Invalid size: {0}")]
    InvalidSize(String),

    /// Access on a finite axis beyond its declared bound.
    #[error("Index {index} is out of range for axis {axis} with extent {bound}.")]
    IndexOutOfRange {
        index: usize,
        bound: usize,
        axis: usize,
    },

    /// An index tuple whose arity differs from the number of axes.
    #[error("Index arity mismatch: expected {expected} components, got {actual}.")]
    ArityMismatch { expected: usize, actual: usize },

    /// Two shapes that cannot be broadcast against each other.
    #[error("Shape mismatch: cannot broadcast {lhs} against {rhs}.")]
    ShapeMismatch { lhs: String, rhs: String },

    /// The QR iteration produced non-finite values.
    #[error("Numerical breakdown at truncation size {size} after {iteration} QR steps.")]
    NumericalBreakdown { size: usize, iteration: usize },
}

impl ErrorKind {
    pub(crate) fn invalid_size(message: impl Into<String>) -> Self {
        ErrorKind::InvalidSize(message.into())
    }
}

impl PartialEq for InfiniteArrayError {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, InfiniteArrayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_finite_message() {
        let error = InfiniteArrayError::from(ErrorKind::NotFinite { operation: "len()" });
        assert_eq!(
            error.to_string(),
            "len() requires a finite extent, but the object is unbounded."
        );
    }

    #[test]
    fn test_index_out_of_range_message() {
        let error = InfiniteArrayError(ErrorKind::IndexOutOfRange {
            index: 7,
            bound: 5,
            axis: 1,
        });
        assert_eq!(
            error.to_string(),
            "Index 7 is out of range for axis 1 with extent 5."
        );
    }

    #[test]
    fn test_shape_mismatch_message() {
        let error = InfiniteArrayError(ErrorKind::ShapeMismatch {
            lhs: "(∞,)".to_string(),
            rhs: "(3,)".to_string(),
        });
        assert_eq!(
            error.to_string(),
            "Shape mismatch: cannot broadcast (∞,) against (3,)."
        );
    }

    #[test]
    fn test_breakdown_message_and_kind() {
        let error = InfiniteArrayError(ErrorKind::NumericalBreakdown {
            size: 40,
            iteration: 3,
        });
        assert_eq!(
            error.to_string(),
            "Numerical breakdown at truncation size 40 after 3 QR steps."
        );
        assert!(matches!(
            error.kind(),
            ErrorKind::NumericalBreakdown { size: 40, .. }
        ));
    }
}
