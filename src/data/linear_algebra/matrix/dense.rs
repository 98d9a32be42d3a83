//! # Dense mirror
//!
//! A plain row-major matrix, only used to check the results of the sparse code.
use std::ops::{Add, Mul};

use approx::AbsDiffEq;

use crate::data::linear_algebra::{Direction, Element, EQUALITY_TOLERANCE};
use crate::data::linear_algebra::matrix::SparseMatrix;

/// Uses a `Vec<Vec<f64>>` of rows as underlying data structure. Dimensions are fixed at creation.
#[derive(Clone, Debug)]
pub struct Dense {
    data: Vec<Vec<f64>>,
    nr_rows: usize,
    nr_columns: usize,
}

impl Dense {
    /// Create a `Dense` matrix from rows of equal length.
    #[must_use]
    pub fn from_data(data: Vec<Vec<f64>>) -> Self {
        let nr_rows = data.len();
        let nr_columns = data.first().map_or(0, Vec::len);
        debug_assert!(data.iter().all(|row| row.len() == nr_columns));

        Self { data, nr_rows, nr_columns }
    }

    /// Create a dense matrix of zeros of dimension `rows` x `columns`.
    #[must_use]
    pub fn zeros(rows: usize, columns: usize) -> Self {
        Self::from_data(vec![vec![0_f64; columns]; rows])
    }

    /// Create a dense square identity matrix of size `len`.
    #[must_use]
    pub fn identity(len: usize) -> Self {
        let mut result = Self::zeros(len, len);
        for i in 0..len {
            result.data[i][i] = 1_f64;
        }
        result
    }

    /// Mirror of a sparse matrix.
    #[must_use]
    pub fn from_sparse(matrix: &SparseMatrix) -> Self {
        let mut result = Self::zeros(matrix.height(), matrix.width());
        for Element { col, row, value } in matrix.elements() {
            result.data[row][col] = value;
        }
        result
    }

    /// Sparse copy, stored in `direction`.
    #[must_use]
    pub fn to_sparse(&self, direction: Direction) -> SparseMatrix {
        let elements = self.data.iter()
            .enumerate()
            .flat_map(|(i, row)| row.iter()
                .enumerate()
                .filter(|(_, v)| **v != 0_f64)
                .map(move |(j, &v)| Element::new(j, i, v)));

        SparseMatrix::with_dimensions(elements, self.nr_columns, self.nr_rows, direction)
    }

    /// Get the value at coordinate (`i`, `j`).
    #[must_use]
    pub fn get_value(&self, i: usize, j: usize) -> f64 {
        debug_assert!(i < self.nr_rows);
        debug_assert!(j < self.nr_columns);

        self.data[i][j]
    }

    /// Set the value at coordinate (`i`, `j`) to `value`.
    pub fn set_value(&mut self, i: usize, j: usize, value: f64) {
        debug_assert!(i < self.nr_rows);
        debug_assert!(j < self.nr_columns);

        self.data[i][j] = value;
    }

    /// Get the number of rows in this matrix.
    #[must_use]
    pub fn nr_rows(&self) -> usize {
        self.nr_rows
    }

    /// Get the number of columns in this matrix.
    #[must_use]
    pub fn nr_columns(&self) -> usize {
        self.nr_columns
    }
}

impl Add for &Dense {
    type Output = Dense;

    fn add(self, rhs: Self) -> Self::Output {
        assert_eq!((self.nr_rows, self.nr_columns), (rhs.nr_rows, rhs.nr_columns));

        Dense::from_data(self.data.iter()
            .zip(&rhs.data)
            .map(|(x, y)| x.iter().zip(y).map(|(a, b)| a + b).collect())
            .collect())
    }
}

impl Mul for &Dense {
    type Output = Dense;

    fn mul(self, rhs: Self) -> Self::Output {
        assert_eq!(self.nr_columns, rhs.nr_rows);

        let mut result = Dense::zeros(self.nr_rows, rhs.nr_columns);
        for i in 0..self.nr_rows {
            for k in 0..self.nr_columns {
                let x = self.data[i][k];
                if x != 0_f64 {
                    for j in 0..rhs.nr_columns {
                        result.data[i][j] += x * rhs.data[k][j];
                    }
                }
            }
        }
        result
    }
}

impl AbsDiffEq for Dense {
    type Epsilon = f64;

    fn default_epsilon() -> Self::Epsilon {
        EQUALITY_TOLERANCE
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: Self::Epsilon) -> bool {
        (self.nr_rows, self.nr_columns) == (other.nr_rows, other.nr_columns)
            && self.data.iter().flatten()
                .zip(other.data.iter().flatten())
                .all(|(x, y)| (x - y).abs() <= epsilon)
    }
}

impl PartialEq for Dense {
    fn eq(&self, other: &Self) -> bool {
        self.abs_diff_eq(other, Self::default_epsilon())
    }
}

impl PartialEq<SparseMatrix> for Dense {
    fn eq(&self, other: &SparseMatrix) -> bool {
        *self == Dense::from_sparse(other)
    }
}

#[cfg(test)]
mod test {
    use crate::data::linear_algebra::Direction;
    use crate::data::linear_algebra::matrix::{DenseMatrix, generator};

    #[test]
    fn mirror_round_trip() {
        let sparse = generator::uniform(5, 4, 9, Direction::ColumnWise, Some(11));
        let dense = DenseMatrix::from_sparse(&sparse);
        assert_eq!(dense.nr_rows(), 4);
        assert_eq!(dense.nr_columns(), 5);
        assert_eq!(dense.to_sparse(Direction::RowWise), sparse);
    }

    #[test]
    fn sparse_agrees_with_dense() {
        let a = generator::uniform(6, 5, 14, Direction::RowWise, Some(2));
        let b = generator::uniform(4, 6, 10, Direction::ColumnWise, Some(3));
        let c = generator::uniform(6, 5, 8, Direction::ColumnWise, Some(4));

        let (dense_a, dense_b, dense_c) =
            (DenseMatrix::from_sparse(&a), DenseMatrix::from_sparse(&b), DenseMatrix::from_sparse(&c));
        assert_eq!(&dense_a * &dense_b, &a * &b);
        assert_eq!(&dense_a + &dense_c, &a + &c);
    }

    #[test]
    fn identity() {
        let mut identity = DenseMatrix::identity(3);
        assert_eq!(identity.get_value(1, 1), 1_f64);
        identity.set_value(0, 2, 4_f64);
        assert_eq!(&identity * &DenseMatrix::identity(3), identity);
    }
}
