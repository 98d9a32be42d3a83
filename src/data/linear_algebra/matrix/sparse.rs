//! # Sparse matrix
//!
//! Columns or rows, each a `SparseVector`, kept in a `Vec`.
use std::fmt;
use std::fmt::Display;
use std::ops::{Add, Index, Mul, Sub};

use approx::AbsDiffEq;
use enum_map::{enum_map, EnumMap};

use crate::data::linear_algebra::{Direction, Element, EQUALITY_TOLERANCE, MatrixError};
use crate::data::linear_algebra::vector::SparseVector;

/// A sparse matrix stored as columns or as rows.
///
/// If the direction is `ColumnWise`, there are `width` vectors of length `height`, otherwise
/// there are `height` vectors of length `width`. Every vector has the direction of the matrix.
#[derive(Clone, Debug)]
pub struct Sparse {
    direction: Direction,
    /// Number of columns at `ColumnWise`, number of rows at `RowWise`.
    dimensions: EnumMap<Direction, usize>,
    vectors: Vec<SparseVector>,
}

impl Sparse {
    /// A matrix without any nonzero values.
    #[must_use]
    pub fn new(width: usize, height: usize, direction: Direction) -> Self {
        let dimensions = enum_map! {
            Direction::ColumnWise => width,
            Direction::RowWise => height,
        };
        let vectors = vec![
            SparseVector::empty(dimensions[direction.flip()], direction);
            dimensions[direction]
        ];

        Self { direction, dimensions, vectors }
    }

    /// Build a matrix from elements, sized to fit the largest indices.
    ///
    /// Values at the same position are summed.
    pub fn from_elements<I: IntoIterator<Item=Element>>(elements: I, direction: Direction) -> Self {
        Self::with_dimensions(elements, 0, 0, direction)
    }

    /// Build a matrix from elements with at least the given dimensions.
    ///
    /// # Arguments
    ///
    /// * `elements`: Values to place. The matrix grows when they don't fit `width` x `height`.
    /// * `width`: Minimal number of columns.
    /// * `height`: Minimal number of rows.
    /// * `direction`: Storage direction of the new matrix.
    pub fn with_dimensions<I: IntoIterator<Item=Element>>(
        elements: I,
        width: usize,
        height: usize,
        direction: Direction,
    ) -> Self {
        let elements = elements.into_iter().collect::<Vec<_>>();
        let width = elements.iter().map(|e| e.col + 1).fold(width, usize::max);
        let height = elements.iter().map(|e| e.row + 1).fold(height, usize::max);

        let mut per_vector = vec![Vec::new(); match direction {
            Direction::ColumnWise => width,
            Direction::RowWise => height,
        }];
        for element in elements {
            per_vector[element.major(direction)].push(element);
        }

        let minor_len = match direction {
            Direction::ColumnWise => height,
            Direction::RowWise => width,
        };
        let vectors = per_vector.into_iter()
            .map(|elements| SparseVector::from_elements(elements, minor_len, direction))
            .collect();

        Self::from_vectors(vectors, width, height, direction)
    }

    /// Wrap vectors that already have the right length and direction.
    pub(crate) fn from_vectors(
        vectors: Vec<SparseVector>,
        width: usize,
        height: usize,
        direction: Direction,
    ) -> Self {
        let dimensions = enum_map! {
            Direction::ColumnWise => width,
            Direction::RowWise => height,
        };
        debug_assert_eq!(vectors.len(), dimensions[direction]);
        debug_assert!(vectors.iter().all(|v| v.len() == dimensions[direction.flip()]));
        debug_assert!(vectors.iter().all(|v| v.direction() == direction));

        Self { direction, dimensions, vectors }
    }

    /// Square matrix with ones on the diagonal.
    #[must_use]
    pub fn identity(size: usize, direction: Direction) -> Self {
        let vectors = (0..size)
            .map(|i| SparseVector::standard_basis(i, size, direction))
            .collect();

        Self::from_vectors(vectors, size, size, direction)
    }

    /// Number of columns.
    #[must_use]
    pub fn width(&self) -> usize {
        self.dimensions[Direction::ColumnWise]
    }

    /// Number of rows.
    #[must_use]
    pub fn height(&self) -> usize {
        self.dimensions[Direction::RowWise]
    }

    /// (width, height)
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.width(), self.height())
    }

    /// Whether this matrix has as many columns as rows.
    #[must_use]
    pub fn is_square(&self) -> bool {
        self.width() == self.height()
    }

    /// Whether the outer sequence indexes columns or rows.
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Number of vectors in the outer sequence.
    #[must_use]
    pub fn major_len(&self) -> usize {
        self.dimensions[self.direction]
    }

    /// Length of each of the vectors in the outer sequence.
    #[must_use]
    pub fn minor_len(&self) -> usize {
        self.dimensions[self.direction.flip()]
    }

    /// The columns (or rows, depending on the direction) of this matrix.
    #[must_use]
    pub fn vectors(&self) -> &[SparseVector] {
        &self.vectors
    }

    /// Mutable access to a single column (or row, depending on the direction).
    pub fn vector_mut(&mut self, i: usize) -> &mut SparseVector {
        &mut self.vectors[i]
    }

    /// Number of values stored.
    #[must_use]
    pub fn nnz(&self) -> usize {
        self.vectors.iter().map(SparseVector::nnz).sum()
    }

    fn check_position(&self, col: usize, row: usize) -> Result<(), MatrixError> {
        if col >= self.width() {
            Err(MatrixError::IndexOutOfBounds { index: col, length: self.width() })
        } else if row >= self.height() {
            Err(MatrixError::IndexOutOfBounds { index: row, length: self.height() })
        } else {
            Ok(())
        }
    }

    /// Retrieve the value at a position.
    pub fn get(&self, col: usize, row: usize) -> Result<f64, MatrixError> {
        self.check_position(col, row)?;

        let element = Element::new(col, row, 0_f64);
        self.vectors[element.major(self.direction)].get(element.minor(self.direction))
    }

    /// Set the value at a position, growing the matrix if it doesn't fit.
    pub fn set(&mut self, col: usize, row: usize, value: f64) {
        self.resize(self.width().max(col + 1), self.height().max(row + 1));

        let element = Element::new(col, row, value);
        self.vectors[element.major(self.direction)].set(element.minor(self.direction), value);
    }

    /// Add a value at a position that is known to be in bounds.
    pub(crate) fn shift_value(&mut self, element: Element) {
        self.vectors[element.major(self.direction)]
            .shift_value(element.minor(self.direction), element.value);
    }

    /// Grow the matrix to the given dimensions.
    ///
    /// Dimensions never shrink: a smaller value than the current one is ignored.
    pub fn resize(&mut self, width: usize, height: usize) {
        self.dimensions[Direction::ColumnWise] = self.width().max(width);
        self.dimensions[Direction::RowWise] = self.height().max(height);

        let (major, minor, direction) = (self.major_len(), self.minor_len(), self.direction);
        for vector in &mut self.vectors {
            vector.reset(minor, direction);
        }
        self.vectors.resize(major, SparseVector::empty(minor, direction));
    }

    /// All nonzero values of this matrix.
    ///
    /// The elements are ordered by vector and within each vector by index.
    #[must_use]
    pub fn elements(&self) -> Vec<Element> {
        self.vectors.iter()
            .enumerate()
            .flat_map(|(i, vector)| vector.get_elements(self.direction, i))
            .collect()
    }

    /// The transposed matrix.
    ///
    /// The columns of this matrix become the rows of the result, so the storage direction flips.
    #[must_use]
    pub fn transpose(self) -> Self {
        let (width, height) = self.shape();
        let direction = self.direction.flip();
        let vectors = self.vectors.into_iter().map(SparseVector::transpose).collect();

        Self::from_vectors(vectors, height, width, direction)
    }

    /// The same matrix, stored in `direction`.
    #[must_use]
    pub fn to_direction(self, direction: Direction) -> Self {
        if self.direction == direction {
            self
        } else {
            Self::with_dimensions(self.elements(), self.width(), self.height(), direction)
        }
    }

    /// Drop all values within `tolerance` of zero.
    pub fn clean_with(&mut self, tolerance: f64) {
        for vector in &mut self.vectors {
            vector.clean_with(tolerance);
        }
    }

    /// Drop all values within the default tolerance of zero.
    pub fn clean(&mut self) {
        for vector in &mut self.vectors {
            vector.clean();
        }
    }

    /// The unit lower triangular part of a matrix holding LU factors in place.
    ///
    /// The diagonal is one, below it are the values of this matrix, above it is zero.
    #[must_use]
    pub fn lower(&self) -> Self {
        let diagonal = (0..self.width().min(self.height())).map(|i| Element::new(i, i, 1_f64));
        let below = self.elements().into_iter().filter(|e| e.row > e.col);

        Self::with_dimensions(diagonal.chain(below), self.width(), self.height(), self.direction)
    }

    /// The upper triangular part, including the diagonal.
    #[must_use]
    pub fn upper(&self) -> Self {
        let upper = self.elements().into_iter().filter(|e| e.row <= e.col);

        Self::with_dimensions(upper, self.width(), self.height(), self.direction)
    }

    fn check_same_shape(&self, operation: &'static str, other: &Sparse) -> Result<(), MatrixError> {
        if self.shape() == other.shape() {
            Ok(())
        } else {
            Err(MatrixError::dimensions(operation, self.shape(), other.shape()))
        }
    }

    fn combine(
        &self,
        operation: &'static str,
        other: &Sparse,
        f: impl Fn(&SparseVector, &SparseVector) -> Result<SparseVector, MatrixError>,
    ) -> Result<Sparse, MatrixError> {
        self.check_same_shape(operation, other)?;

        let converted;
        let other = if other.direction == self.direction {
            other
        } else {
            converted = other.clone().to_direction(self.direction);
            &converted
        };

        let vectors = self.vectors.iter()
            .zip(&other.vectors)
            .map(|(left, right)| f(left, right))
            .collect::<Result<_, _>>()?;
        Ok(Self::from_vectors(vectors, self.width(), self.height(), self.direction))
    }

    /// Elementwise sum, stored in the direction of `self`.
    pub fn try_add(&self, other: &Sparse) -> Result<Sparse, MatrixError> {
        self.combine("add", other, SparseVector::try_add)
    }

    /// Elementwise difference, stored in the direction of `self`.
    pub fn try_sub(&self, other: &Sparse) -> Result<Sparse, MatrixError> {
        self.combine("sub", other, SparseVector::try_sub)
    }

    /// Matrix product `self * other`.
    ///
    /// Computed as the sum over the inner dimension of the outer products of column `k` of `self`
    /// and row `k` of `other`. The result is stored in the direction of `self`.
    pub fn try_mul(&self, other: &Sparse) -> Result<Sparse, MatrixError> {
        if self.width() != other.height() {
            return Err(MatrixError::dimensions("mul", self.shape(), other.shape()));
        }

        let columns = self.clone().to_direction(Direction::ColumnWise);
        let rows = other.clone().to_direction(Direction::RowWise);

        let mut result = Sparse::new(other.width(), self.height(), self.direction);
        for (column, row) in columns.vectors.iter().zip(&rows.vectors) {
            for element in column.product(row)?.into_elements() {
                result.shift_value(element);
            }
        }

        Ok(result)
    }

    /// Matrix times column vector.
    ///
    /// # Return value
    ///
    /// A column vector of length `height`.
    pub fn try_mul_vector(&self, vector: &SparseVector) -> Result<SparseVector, MatrixError> {
        if self.width() != vector.len() {
            return Err(MatrixError::dimensions("mul_vector", self.shape(), vector.shape()));
        }

        match self.direction {
            Direction::ColumnWise => {
                let mut result = SparseVector::empty(self.height(), Direction::ColumnWise);
                for &(j, x) in vector.iter() {
                    result.add_multiple(x, &self.vectors[j])?;
                }
                Ok(result)
            },
            Direction::RowWise => {
                let values = self.vectors.iter()
                    .map(|row| row.dot(vector))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(SparseVector::from_dense(&values, Direction::ColumnWise))
            },
        }
    }
}

impl Index<usize> for Sparse {
    type Output = SparseVector;

    /// Column or row `index`, depending on the direction.
    fn index(&self, index: usize) -> &Self::Output {
        &self.vectors[index]
    }
}

/// Panics when the shapes differ.
impl Add for &Sparse {
    type Output = Sparse;

    fn add(self, rhs: Self) -> Self::Output {
        self.try_add(rhs).unwrap_or_else(|error| panic!("{error}"))
    }
}

/// Panics when the shapes differ.
impl Sub for &Sparse {
    type Output = Sparse;

    fn sub(self, rhs: Self) -> Self::Output {
        self.try_sub(rhs).unwrap_or_else(|error| panic!("{error}"))
    }
}

/// Panics when the width of the left operand differs from the height of the right one.
impl Mul for &Sparse {
    type Output = Sparse;

    fn mul(self, rhs: Self) -> Self::Output {
        self.try_mul(rhs).unwrap_or_else(|error| panic!("{error}"))
    }
}

/// Panics when the width of the matrix differs from the length of the vector.
impl Mul<&SparseVector> for &Sparse {
    type Output = SparseVector;

    fn mul(self, rhs: &SparseVector) -> Self::Output {
        self.try_mul_vector(rhs).unwrap_or_else(|error| panic!("{error}"))
    }
}

impl AbsDiffEq for Sparse {
    type Epsilon = f64;

    fn default_epsilon() -> Self::Epsilon {
        EQUALITY_TOLERANCE
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: Self::Epsilon) -> bool {
        if self.shape() != other.shape() {
            return false;
        }

        if self.direction == other.direction {
            self.vectors.iter().zip(&other.vectors).all(|(x, y)| x.abs_diff_eq(y, epsilon))
        } else {
            let other = other.clone().to_direction(self.direction);
            self.vectors.iter().zip(&other.vectors).all(|(x, y)| x.abs_diff_eq(y, epsilon))
        }
    }
}

/// Equal up to `EQUALITY_TOLERANCE` per value, regardless of the storage direction.
impl PartialEq for Sparse {
    fn eq(&self, other: &Self) -> bool {
        self.abs_diff_eq(other, Self::default_epsilon())
    }
}

/// One `col row value` line per nonzero value.
impl Display for Sparse {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for element in self.elements() {
            writeln!(f, "{} {} {}", element.col, element.row, element.value)?;
        }
        Ok(())
    }
}
