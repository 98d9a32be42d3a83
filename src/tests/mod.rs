//! # Fixtures shared by the unit tests
//!
//! Small matrices that are easy to verify by hand.
use crate::data::linear_algebra::{Direction, Element};
use crate::data::linear_algebra::matrix::SparseMatrix;
use crate::data::linear_algebra::vector::SparseVector;

/// Elements of a matrix given as rows, zeros omitted.
///
/// Value `rows[i][j]` becomes the element at column `j` and row `i`.
pub fn dense_elements(rows: &[Vec<f64>]) -> Vec<Element> {
    rows.iter()
        .enumerate()
        .flat_map(|(i, row)| row.iter()
            .enumerate()
            .filter(|&(_, &value)| value != 0_f64)
            .map(move |(j, &value)| Element::new(j, i, value)))
        .collect()
}

/// A 3x3 matrix without zero pivots.
///
/// ```text
/// 4 -1 2
/// 1  3 0
/// 2  0 5
/// ```
pub fn small_square(direction: Direction) -> SparseMatrix {
    SparseMatrix::from_elements(dense_elements(&[
        vec![4_f64, -1_f64, 2_f64],
        vec![1_f64, 3_f64, 0_f64],
        vec![2_f64, 0_f64, 5_f64],
    ]), direction)
}

/// The symmetric positive definite system `[[4, 1], [1, 3]]`.
pub fn spd_system() -> SparseMatrix {
    SparseMatrix::from_elements(dense_elements(&[
        vec![4_f64, 1_f64],
        vec![1_f64, 3_f64],
    ]), Direction::ColumnWise)
}

/// Right hand side `[1, 2]` for `spd_system`, the solution is `[1 / 11, 7 / 11]`.
pub fn spd_rhs() -> SparseVector {
    SparseVector::from_dense(&[1_f64, 2_f64], Direction::ColumnWise)
}
