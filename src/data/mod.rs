//! # Storing of sparse matrices in memory
//!
//! This module provides the data structures used to represent sparse matrices and vectors in
//! memory. Algorithms may introduce their specific data structures in `algorithm::my_algorithm`.

pub mod linear_algebra;
