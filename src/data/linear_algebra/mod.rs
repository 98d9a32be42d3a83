//! # Linear algebra primitives
//!
//! Sparse vectors and matrices, tagged with the axis along which they are stored, together with
//! the `Element` triple that is used to move values between them, between ranks and between files.
use enum_map::Enum;
use serde::{Deserialize, Serialize};

pub use error::MatrixError;

pub mod error;
pub mod matrix;
pub mod vector;

/// Values with an absolute value below this tolerance are considered noise by `clean`.
pub const CLEAN_TOLERANCE: f64 = 1e-6;
/// Default absolute tolerance used when comparing vectors and matrices for equality.
///
/// Partial sums computed on different ranks are added up in a different order than the
/// sequential code path does, so exact comparisons are not meaningful.
pub const EQUALITY_TOLERANCE: f64 = 0.01;

/// An index together with a value, the unit of storage within a sparse vector.
pub type SparseTuple = (usize, f64);

/// The axis that the outer sequence of a matrix runs along.
///
/// For a vector, the direction is its natural axis: a column vector stores values by row index.
#[derive(Enum, Serialize, Deserialize, Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    /// The outer sequence of a matrix indexes the columns; a column vector.
    ColumnWise,
    /// The outer sequence of a matrix indexes the rows; a row vector.
    RowWise,
}

impl Direction {
    /// The other direction.
    #[must_use]
    pub fn flip(self) -> Self {
        match self {
            Direction::ColumnWise => Direction::RowWise,
            Direction::RowWise => Direction::ColumnWise,
        }
    }
}

/// A single value of a matrix at a (column, row) coordinate.
///
/// This is the canonical representation for anything that moves between matrices, ranks and
/// files. Zero values are never materialized as elements by the data structures in this crate.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Element {
    /// Column index, starting at `0`.
    pub col: usize,
    /// Row index, starting at `0`.
    pub row: usize,
    /// Value at this position.
    pub value: f64,
}

impl Element {
    /// Create a new element.
    #[must_use]
    pub fn new(col: usize, row: usize, value: f64) -> Self {
        Self { col, row, value }
    }

    /// Index along the outer sequence of a matrix stored in `direction`.
    ///
    /// That is the column for a column-wise matrix and the row for a row-wise one.
    #[must_use]
    pub fn major(&self, direction: Direction) -> usize {
        match direction {
            Direction::ColumnWise => self.col,
            Direction::RowWise => self.row,
        }
    }

    /// Index within a vector of a matrix stored in `direction`.
    #[must_use]
    pub fn minor(&self, direction: Direction) -> usize {
        self.major(direction.flip())
    }

    /// Create an element from major and minor indices with respect to `direction`.
    #[must_use]
    pub fn from_major_minor(direction: Direction, major: usize, minor: usize, value: f64) -> Self {
        match direction {
            Direction::ColumnWise => Self::new(major, minor, value),
            Direction::RowWise => Self::new(minor, major, value),
        }
    }
}

#[cfg(test)]
mod test {
    use crate::data::linear_algebra::{Direction, Element};

    #[test]
    fn major_minor() {
        let element = Element::new(3, 5, 1.5);
        assert_eq!(element.major(Direction::ColumnWise), 3);
        assert_eq!(element.minor(Direction::ColumnWise), 5);
        assert_eq!(element.major(Direction::RowWise), 5);
        assert_eq!(element.minor(Direction::RowWise), 3);

        assert_eq!(Element::from_major_minor(Direction::RowWise, 5, 3, 1.5), element);
        assert_eq!(Element::from_major_minor(Direction::ColumnWise, 3, 5, 1.5), element);
    }

    #[test]
    fn flip() {
        assert_eq!(Direction::ColumnWise.flip(), Direction::RowWise);
        assert_eq!(Direction::RowWise.flip().flip(), Direction::RowWise);
    }
}
