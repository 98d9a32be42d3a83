//! # Errors of matrix operations
//!
//! Every condition that aborts an operation, local or distributed. Non-convergence of an iterative
//! solver is not in here: it is reported through the returned residual.
use thiserror::Error;

/// An operation on a matrix or vector could not be completed.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MatrixError {
    /// The shapes of the operands are not compatible with the operation.
    ///
    /// Dimensions are given as (width, height).
    #[error("dimensions of operands of {operation} do not match: {left:?} and {right:?}")]
    DimensionMismatch {
        /// Name of the operation that was attempted.
        operation: &'static str,
        /// (width, height) of the left operand.
        left: (usize, usize),
        /// (width, height) of the right operand.
        right: (usize, usize),
    },
    /// A vector was accessed beyond its length.
    #[error("index {index} out of bounds for length {length}")]
    IndexOutOfBounds {
        /// The index that was accessed.
        index: usize,
        /// Length of the vector.
        length: usize,
    },
    /// Division by a scalar zero.
    #[error("division by zero")]
    DivisionByZero,
    /// A zero was found on the diagonal during elimination or substitution.
    ///
    /// No pivoting is attempted.
    #[error("zero pivot at index {index}")]
    SingularPivot {
        /// Diagonal index of the pivot.
        index: usize,
    },
    /// A factorization was requested for a matrix that is not square.
    #[error("matrix of {width}x{height} is not square")]
    NotSquare {
        /// Width of the matrix.
        width: usize,
        /// Height of the matrix.
        height: usize,
    },
    /// An operand is stored in the wrong direction for the operation.
    #[error("operand of {operation} must be stored {expected:?}")]
    DirectionMismatch {
        /// Name of the operation that was attempted.
        operation: &'static str,
        /// The direction the operand should have.
        expected: super::Direction,
    },
    /// A message could not be encoded or decoded.
    #[error("wire encoding: {0}")]
    Encoding(String),
    /// A rank received something it did not expect at this point of the protocol.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
    /// Another rank failed while this rank was waiting on it.
    #[error("rank {rank} failed: {message}")]
    RemoteFailure {
        /// The rank that failed.
        rank: usize,
        /// Description of the failure on that rank.
        message: String,
    },
    /// The channel to another rank was closed.
    #[error("rank {rank} disconnected")]
    Disconnected {
        /// The rank that can no longer be reached.
        rank: usize,
    },
    /// The coordinator rejected the operation before distributing it.
    #[error("operation aborted by the coordinator")]
    Aborted,
    /// A rank panicked while running.
    #[error("rank {rank} panicked")]
    RankPanicked {
        /// The rank whose thread panicked.
        rank: usize,
    },
}

impl MatrixError {
    /// Create a `DimensionMismatch` from two (width, height) pairs.
    pub(crate) fn dimensions(operation: &'static str, left: (usize, usize), right: (usize, usize)) -> Self {
        MatrixError::DimensionMismatch { operation, left, right }
    }
}
