//! # Vector types
//!
//! Sparse vectors that know whether they are a column or a row, and the result of multiplying
//! two of them.
pub use sparse::Sparse as SparseVector;

use crate::data::linear_algebra::Element;

mod sparse;

/// The result of multiplying two vectors.
///
/// Which variant is produced depends on the directions of the operands, see
/// `SparseVector::product`.
#[derive(Clone, Debug, PartialEq)]
pub enum Product {
    /// A row times a column.
    Scalar(f64),
    /// Two vectors of the same direction, multiplied elementwise.
    Vector(SparseVector),
    /// A column times a row, as the nonzero elements of the outer product matrix.
    Matrix(Vec<Element>),
}

impl Product {
    /// The product as a list of elements.
    ///
    /// A scalar becomes a single element at `(0, 0)`. A column vector becomes column `0`, a row
    /// vector row `0`.
    #[must_use]
    pub fn into_elements(self) -> Vec<Element> {
        match self {
            Product::Scalar(value) => vec![Element::new(0, 0, value)],
            Product::Vector(vector) => vector.get_elements(vector.direction(), 0),
            Product::Matrix(elements) => elements,
        }
    }
}
