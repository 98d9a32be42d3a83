//! # Sparse vector
//!
//! Wrapping a `Vec<(usize, f64)>` that is kept sorted by index, tagged with the direction of the
//! vector.
use std::fmt;
use std::fmt::Display;
use std::ops::{AddAssign, Deref, Index, MulAssign, SubAssign};
use std::slice::Iter;
use std::vec::IntoIter;

use approx::AbsDiffEq;
use itertools::{EitherOrBoth, Itertools};
use num_traits::Zero;

use crate::data::linear_algebra::{CLEAN_TOLERANCE, Direction, Element, EQUALITY_TOLERANCE, MatrixError, SparseTuple};
use crate::data::linear_algebra::vector::Product;

/// A sparse vector using a `Vec` with (index, value) combinations as back-end. Indices start at
/// `0`.
///
/// Exact zeros are never stored. Values that are merely close to zero are kept until `clean` is
/// called.
#[derive(Clone, Debug)]
pub struct Sparse {
    data: Vec<SparseTuple>,
    len: usize,
    direction: Direction,
}

impl Sparse {
    /// Create a vector of length `len` from `data`.
    ///
    /// Requires that the data is sorted by index and that exact zeros are already filtered.
    #[must_use]
    pub fn new(data: Vec<SparseTuple>, len: usize, direction: Direction) -> Self {
        debug_assert!(data.iter().all(|&(i, _)| i < len));
        debug_assert!(data.is_sorted_by_key(|&(i, _)| i));
        debug_assert!(data.windows(2).all(|w| w[0].0 != w[1].0));
        debug_assert!(data.iter().all(|&(_, v)| !v.is_zero()));

        Self { data, len, direction }
    }

    /// A vector of length `len` without any nonzero values.
    #[must_use]
    pub fn empty(len: usize, direction: Direction) -> Self {
        Self::new(Vec::new(), len, direction)
    }

    /// Collect elements into a vector.
    ///
    /// The index of each element is read along the natural axis of the vector: the row for a
    /// column vector, the column for a row vector. Values for the same index are summed.
    ///
    /// # Arguments
    ///
    /// * `elements`: Values to collect. Their index should be below `len`, but `len` grows to fit
    /// them otherwise.
    /// * `len`: Minimal length of the vector.
    /// * `direction`: Direction of the new vector.
    pub fn from_elements<I: IntoIterator<Item=Element>>(
        elements: I,
        len: usize,
        direction: Direction,
    ) -> Self {
        let mut data = elements.into_iter()
            .map(|element| (element.minor(direction), element.value))
            .collect::<Vec<_>>();
        data.sort_by_key(|&(i, _)| i);

        let data = data.into_iter()
            .coalesce(|(i, x), (j, y)| if i == j { Ok((i, x + y)) } else { Err(((i, x), (j, y))) })
            .filter(|&(_, v)| !v.is_zero())
            .collect::<Vec<_>>();
        let len = data.last().map_or(len, |&(i, _)| len.max(i + 1));

        Self::new(data, len, direction)
    }

    /// Create a sparse vector from dense values, dropping the zeros.
    #[must_use]
    pub fn from_dense(values: &[f64], direction: Direction) -> Self {
        let data = values.iter()
            .enumerate()
            .filter(|(_, v)| !v.is_zero())
            .map(|(i, &v)| (i, v))
            .collect();

        Self::new(data, values.len(), direction)
    }

    /// Create a `SparseVector` representation of standard basis unit vector e_i.
    ///
    /// # Arguments
    ///
    /// * `i`: Only index where there should be a 1. Note that indexing starts at zero, and runs
    /// until (not through) `len`.
    /// * `len`: Size of the `SparseVector`.
    /// * `direction`: Direction of the vector.
    #[must_use]
    pub fn standard_basis(i: usize, len: usize, direction: Direction) -> Self {
        debug_assert!(i < len);

        Self::new(vec![(i, 1_f64)], len, direction)
    }

    /// All values, including the zeros.
    #[must_use]
    pub fn to_dense(&self) -> Vec<f64> {
        let mut values = vec![0_f64; self.len];
        for &(i, v) in &self.data {
            values[i] = v;
        }
        values
    }

    fn get_data_index(&self, i: usize) -> Result<usize, usize> {
        self.data.binary_search_by_key(&i, |&(index, _)| index)
    }

    fn check_bounds(&self, i: usize) -> Result<(), MatrixError> {
        if i < self.len {
            Ok(())
        } else {
            Err(MatrixError::IndexOutOfBounds { index: i, length: self.len })
        }
    }

    fn check_len(&self, operation: &'static str, other: &Sparse) -> Result<(), MatrixError> {
        if self.len == other.len {
            Ok(())
        } else {
            Err(MatrixError::dimensions(operation, self.shape(), other.shape()))
        }
    }

    /// (width, height) of this vector when seen as a matrix.
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        match self.direction {
            Direction::ColumnWise => (1, self.len),
            Direction::RowWise => (self.len, 1),
        }
    }

    /// Retrieve the value at an index.
    ///
    /// # Return value
    ///
    /// The value, `0` if nothing is stored at `i`, or an error if `i` is not below the length.
    pub fn get(&self, i: usize) -> Result<f64, MatrixError> {
        self.check_bounds(i)?;

        Ok(self.get_data_index(i).map_or(0_f64, |index| self.data[index].1))
    }

    /// Set the value at index `i` to `value`.
    ///
    /// Setting a zero removes the value. Setting beyond the length grows the vector.
    ///
    /// # Arguments
    ///
    /// * `i`: Index of the value. New tuple will be inserted, potentially causing many values to
    /// be shifted.
    /// * `value`: Value to be taken at index `i`.
    pub fn set(&mut self, i: usize, value: f64) {
        if i >= self.len {
            self.len = i + 1;
        }

        match (self.get_data_index(i), value.is_zero()) {
            (Ok(index), false) => self.data[index].1 = value,
            (Ok(index), true) => { self.data.remove(index); },
            (Err(index), false) => self.data.insert(index, (i, value)),
            (Err(_), true) => {},
        }
    }

    /// Add `value` to the value at index `i`.
    pub fn add(&mut self, i: usize, value: f64) -> Result<(), MatrixError> {
        self.check_bounds(i)?;
        self.shift_value(i, value);
        Ok(())
    }

    /// Subtract `value` from the value at index `i`.
    pub fn sub(&mut self, i: usize, value: f64) -> Result<(), MatrixError> {
        self.add(i, -value)
    }

    /// Multiply the value at index `i` by `value`.
    pub fn mul(&mut self, i: usize, value: f64) -> Result<(), MatrixError> {
        self.check_bounds(i)?;

        if let Ok(index) = self.get_data_index(i) {
            if value.is_zero() {
                self.data.remove(index);
            } else {
                self.data[index].1 *= value;
            }
        }
        Ok(())
    }

    /// Divide the value at index `i` by `value`.
    pub fn div(&mut self, i: usize, value: f64) -> Result<(), MatrixError> {
        if value.is_zero() {
            return Err(MatrixError::DivisionByZero);
        }
        self.check_bounds(i)?;

        if let Ok(index) = self.get_data_index(i) {
            self.data[index].1 /= value;
        }
        Ok(())
    }

    /// Add a value at an index that is known to be in bounds, removing the entry when the result
    /// is exactly zero.
    pub(crate) fn shift_value(&mut self, i: usize, value: f64) {
        debug_assert!(i < self.len);

        if value.is_zero() {
            return;
        }

        match self.get_data_index(i) {
            Ok(index) => {
                self.data[index].1 += value;
                if self.data[index].1.is_zero() {
                    self.data.remove(index);
                }
            },
            Err(index) => self.data.insert(index, (i, value)),
        }
    }

    /// Change the length and direction of this vector.
    ///
    /// Values at indices that no longer fit are dropped; the others are kept.
    pub fn reset(&mut self, len: usize, direction: Direction) {
        self.data.retain(|&(i, _)| i < len);
        self.len = len;
        self.direction = direction;
    }

    /// Remove all values.
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Drop the values that are within `CLEAN_TOLERANCE` of zero.
    pub fn clean(&mut self) {
        self.clean_with(CLEAN_TOLERANCE);
    }

    /// Drop the values that are within `tolerance` of zero.
    pub fn clean_with(&mut self, tolerance: f64) {
        self.data.retain(|&(_, v)| v.abs() > tolerance);
    }

    /// The length of this vector.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether this vector has zero length.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of values stored.
    #[must_use]
    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    /// The natural axis of this vector.
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Relabel the natural axis of this vector without touching the values.
    #[must_use]
    pub fn transpose(mut self) -> Self {
        self.direction = self.direction.flip();
        self
    }

    /// Iterate over the stored (index, value) pairs in increasing index order.
    pub fn iter(&self) -> Iter<SparseTuple> {
        self.data.iter()
    }

    /// Materialize this vector as elements.
    ///
    /// # Arguments
    ///
    /// * `direction`: The axis the vector lies on within the matrix: with `ColumnWise` the vector
    /// is column `fixed`, with `RowWise` it is row `fixed`.
    /// * `fixed`: Index of the vector along the other axis.
    #[must_use]
    pub fn get_elements(&self, direction: Direction, fixed: usize) -> Vec<Element> {
        self.data.iter()
            .map(|&(i, value)| Element::from_major_minor(direction, fixed, i, value))
            .collect()
    }

    /// The part `[offset, offset + count)` of this vector, reindexed to start at zero.
    #[must_use]
    pub fn segment(&self, offset: usize, count: usize) -> Self {
        debug_assert!(offset + count <= self.len);

        let start = self.get_data_index(offset).unwrap_or_else(|i| i);
        let end = self.get_data_index(offset + count).unwrap_or_else(|i| i);
        let data = self.data[start..end].iter()
            .map(|&(i, v)| (i - offset, v))
            .collect();

        Self::new(data, count, self.direction)
    }

    /// Calculate the inner product between two vectors of equal length.
    ///
    /// The directions are not considered.
    pub fn dot(&self, other: &Sparse) -> Result<f64, MatrixError> {
        self.check_len("dot", other)?;

        Ok(self.data.iter()
            .merge_join_by(&other.data, |(i, _), (j, _)| i.cmp(j))
            .filter_map(|pair| match pair {
                EitherOrBoth::Both((_, x), (_, y)) => Some(x * y),
                _ => None,
            })
            .fold(0_f64, |total, product| total + product))
    }

    /// Sum of the squares of all values.
    #[must_use]
    pub fn squared_norm(&self) -> f64 {
        self.data.iter()
            .map(|(_, value)| value * value)
            .fold(0_f64, |total, value| total + value)
    }

    /// Euclidean norm.
    #[must_use]
    pub fn l2_norm(&self) -> f64 {
        self.squared_norm().sqrt()
    }

    /// Sum of all values.
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.data.iter().fold(0_f64, |total, &(_, v)| total + v)
    }

    /// Combine the values of two sorted sparse sequences, dropping exact zeros.
    fn merge_with(&self, other: &Sparse, f: impl Fn(f64, f64) -> f64) -> Vec<SparseTuple> {
        self.data.iter()
            .merge_join_by(&other.data, |(i, _), (j, _)| i.cmp(j))
            .map(|pair| match pair {
                EitherOrBoth::Both(&(i, x), &(_, y)) => (i, f(x, y)),
                EitherOrBoth::Left(&(i, x)) => (i, f(x, 0_f64)),
                EitherOrBoth::Right(&(j, y)) => (j, f(0_f64, y)),
            })
            .filter(|&(_, v)| !v.is_zero())
            .collect()
    }

    /// Add the multiple of another vector to this vector.
    ///
    /// # Arguments
    ///
    /// * `multiple`: Constant that all elements of the `other` vector are multiplied with.
    /// * `other`: Vector of the same length to add a multiple of to this vector.
    pub fn add_multiple(&mut self, multiple: f64, other: &Sparse) -> Result<(), MatrixError> {
        self.check_len("add_multiple", other)?;
        if multiple.is_zero() {
            return Ok(());
        }

        let merged = self.merge_with(other, |x, y| x + multiple * y);
        self.data = merged;
        Ok(())
    }

    /// Sum of two vectors of equal length, cleaned of values close to zero.
    ///
    /// # Return value
    ///
    /// A new vector with the direction of `other`.
    pub fn try_add(&self, other: &Sparse) -> Result<Sparse, MatrixError> {
        self.check_len("add", other)?;

        let mut result = Self::new(self.merge_with(other, |x, y| x + y), self.len, other.direction);
        result.clean();
        Ok(result)
    }

    /// Difference of two vectors of equal length, cleaned of values close to zero.
    ///
    /// # Return value
    ///
    /// A new vector with the direction of `other`.
    pub fn try_sub(&self, other: &Sparse) -> Result<Sparse, MatrixError> {
        self.check_len("sub", other)?;

        let mut result = Self::new(self.merge_with(other, |x, y| x - y), self.len, other.direction);
        result.clean();
        Ok(result)
    }

    /// Product of two vectors, of which the kind depends on the directions.
    ///
    /// * row times column: the inner product, the lengths should be equal.
    /// * equal directions: the elementwise product, the lengths should be equal.
    /// * column times row: the outer product, with `self.len()` rows and `other.len()` columns.
    pub fn product(&self, other: &Sparse) -> Result<Product, MatrixError> {
        match (self.direction, other.direction) {
            (Direction::RowWise, Direction::ColumnWise) => self.dot(other).map(Product::Scalar),
            (left, right) if left == right => {
                self.check_len("elementwise product", other)?;

                let data = self.data.iter()
                    .merge_join_by(&other.data, |(i, _), (j, _)| i.cmp(j))
                    .filter_map(|pair| match pair {
                        EitherOrBoth::Both(&(i, x), &(_, y)) => Some((i, x * y)),
                        _ => None,
                    })
                    .filter(|&(_, v)| !v.is_zero())
                    .collect();
                Ok(Product::Vector(Self::new(data, self.len, self.direction)))
            },
            _ => {
                let elements = self.data.iter()
                    .cartesian_product(&other.data)
                    .map(|(&(row, x), &(col, y))| Element::new(col, row, x * y))
                    .filter(|element| !element.value.is_zero())
                    .collect();
                Ok(Product::Matrix(elements))
            },
        }
    }

    /// Add a scalar to every index, also the ones that are not stored.
    pub fn add_scalar(&mut self, value: f64) {
        if value.is_zero() {
            return;
        }

        let mut dense = self.to_dense();
        for v in &mut dense {
            *v += value;
        }
        *self = Self::from_dense(&dense, self.direction);
        self.clean();
    }

    /// Multiply every value by a scalar.
    pub fn mul_scalar(&mut self, value: f64) {
        if value.is_zero() {
            self.data.clear();
        } else {
            for (_, v) in &mut self.data {
                *v *= value;
            }
        }
    }

    /// Divide every value by a scalar.
    pub fn div_scalar(&mut self, value: f64) -> Result<(), MatrixError> {
        if value.is_zero() {
            return Err(MatrixError::DivisionByZero);
        }

        for (_, v) in &mut self.data {
            *v /= value;
        }
        Ok(())
    }
}

impl IntoIterator for Sparse {
    type Item = SparseTuple;
    type IntoIter = IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.into_iter()
    }
}

impl<'a> IntoIterator for &'a Sparse {
    type Item = &'a SparseTuple;
    type IntoIter = Iter<'a, SparseTuple>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.iter()
    }
}

impl Deref for Sparse {
    type Target = [SparseTuple];

    fn deref(&self) -> &Self::Target {
        self.data.deref()
    }
}

impl Index<usize> for Sparse {
    type Output = f64;

    /// Panics when `index` is out of bounds.
    fn index(&self, index: usize) -> &Self::Output {
        assert!(index < self.len, "index {index} out of bounds for length {}", self.len);

        match self.get_data_index(index) {
            Ok(data_index) => &self.data[data_index].1,
            Err(_) => &0_f64,
        }
    }
}

impl AddAssign<f64> for Sparse {
    fn add_assign(&mut self, rhs: f64) {
        self.add_scalar(rhs);
    }
}

impl SubAssign<f64> for Sparse {
    fn sub_assign(&mut self, rhs: f64) {
        self.add_scalar(-rhs);
    }
}

impl MulAssign<f64> for Sparse {
    fn mul_assign(&mut self, rhs: f64) {
        self.mul_scalar(rhs);
    }
}

impl std::ops::Add for &Sparse {
    type Output = Sparse;

    /// Panics when the lengths differ.
    fn add(self, rhs: Self) -> Self::Output {
        match self.try_add(rhs) {
            Ok(sum) => sum,
            Err(error) => panic!("{error}"),
        }
    }
}

impl std::ops::Sub for &Sparse {
    type Output = Sparse;

    /// Panics when the lengths differ.
    fn sub(self, rhs: Self) -> Self::Output {
        match self.try_sub(rhs) {
            Ok(difference) => difference,
            Err(error) => panic!("{error}"),
        }
    }
}

impl AbsDiffEq for Sparse {
    type Epsilon = f64;

    fn default_epsilon() -> Self::Epsilon {
        EQUALITY_TOLERANCE
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: Self::Epsilon) -> bool {
        self.len == other.len && self.direction == other.direction && self.data.iter()
            .merge_join_by(&other.data, |(i, _), (j, _)| i.cmp(j))
            .all(|pair| match pair {
                EitherOrBoth::Both((_, x), (_, y)) => (x - y).abs() <= epsilon,
                EitherOrBoth::Left((_, v)) | EitherOrBoth::Right((_, v)) => v.abs() <= epsilon,
            })
    }
}

/// Equal up to `EQUALITY_TOLERANCE` per value.
impl PartialEq for Sparse {
    fn eq(&self, other: &Self) -> bool {
        self.abs_diff_eq(other, Self::default_epsilon())
    }
}

impl Display for Sparse {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[")?;
        for (position, (index, value)) in self.data.iter().enumerate() {
            if position > 0 {
                write!(f, ", ")?;
            }
            write!(f, "({index} {value})")?;
        }
        write!(f, "]")
    }
}
