//! # Sparse linear algebra over a fixed set of ranks
//!
//! Sparse matrices and vectors, partitioned over cooperating ranks that share no memory. Rank `0`
//! coordinates every operation: it decides whether an operation is small enough to run locally,
//! broadcasts that decision, and otherwise scatters blocks to the workers and reduces their
//! partial results.
//!
//! Available operations are matrix addition, subtraction and multiplication, matrix-vector
//! products, LU and incomplete LU factorization, triangular solves (and through them the inverse
//! of a lower triangular matrix) and a conjugate gradient solver with optional preconditioning.
#![warn(missing_docs)]

pub mod algorithm;
pub mod config;
pub mod data;
pub mod distributed;
pub mod io;

#[cfg(test)]
mod tests;
