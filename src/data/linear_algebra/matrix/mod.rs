//! # Matrix implementations
//!
//! A sparse matrix is an ordered sequence of sparse vectors, either the columns or the rows of
//! the matrix. The dense mirror is only used to cross-check results.
pub use dense::Dense as DenseMatrix;
pub use partition::{Block, block_sizes};
pub use sparse::Sparse as SparseMatrix;

mod dense;
pub mod generator;
mod partition;
mod sparse;
