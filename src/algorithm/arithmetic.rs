//! # Distributed arithmetic
//!
//! Sums, differences and products of matrices, and matrix-vector products. The coordinator cuts
//! the operands into one block per worker, every worker computes a partial result and the
//! coordinator puts those back together: by reassembling the blocks for elementwise operations, or
//! by summing for products.
use std::marker::PhantomData;

use tracing::debug;

use crate::algorithm::{receive_matrix, send_matrix};
use crate::data::linear_algebra::{Direction, MatrixError};
use crate::data::linear_algebra::matrix::{Block, SparseMatrix};
use crate::data::linear_algebra::vector::SparseVector;
use crate::distributed::{COORDINATOR, Communicator, Operation, Tag};
use crate::distributed::wire;

/// How two matrices of equal shape are combined elementwise.
pub trait Combine {
    /// Name used in errors and logging.
    const NAME: &'static str;

    /// Combine two matrices of equal shape.
    fn combine(left: &SparseMatrix, right: &SparseMatrix) -> Result<SparseMatrix, MatrixError>;
}

/// Elementwise sum.
#[derive(Debug)]
pub struct Sum;
impl Combine for Sum {
    const NAME: &'static str = "add";

    fn combine(left: &SparseMatrix, right: &SparseMatrix) -> Result<SparseMatrix, MatrixError> {
        left.try_add(right)
    }
}

/// Elementwise difference.
#[derive(Debug)]
pub struct Difference;
impl Combine for Difference {
    const NAME: &'static str = "sub";

    fn combine(left: &SparseMatrix, right: &SparseMatrix) -> Result<SparseMatrix, MatrixError> {
        left.try_sub(right)
    }
}

/// Elementwise combination of two matrices of equal shape.
///
/// The result is stored in the direction of the left operand. Both operands are split along that
/// direction, so each worker combines matching blocks.
#[derive(Debug)]
pub struct Elementwise<C> {
    left: SparseMatrix,
    right: SparseMatrix,
    combine: PhantomData<C>,
}

impl<C: Combine> Elementwise<C> {
    /// Combine `left` with `right`.
    #[must_use]
    pub fn new(left: SparseMatrix, right: SparseMatrix) -> Self {
        Self { left, right, combine: PhantomData }
    }
}

impl<C: Combine> Operation for Elementwise<C> {
    const NAME: &'static str = C::NAME;
    type Output = SparseMatrix;

    fn validate(&self) -> Result<(), MatrixError> {
        if self.left.shape() != self.right.shape() {
            return Err(MatrixError::dimensions(C::NAME, self.left.shape(), self.right.shape()));
        }
        wire::check_dimensions(self.left.width(), self.left.height())
    }

    fn extent(&self) -> usize {
        self.left.major_len()
    }

    fn sequential(self) -> Result<Self::Output, MatrixError> {
        C::combine(&self.left, &self.right)
    }

    fn coordinate(self, communicator: &Communicator) -> Result<Self::Output, MatrixError> {
        let (width, height, direction) = (self.left.width(), self.left.height(), self.left.direction());
        let right = self.right.to_direction(direction);

        let workers = communicator.size() - 1;
        let left_blocks = self.left.split_to_n(workers);
        let right_blocks = right.split_to_n(workers);
        for ((worker, left), right) in communicator.workers().zip(&left_blocks).zip(&right_blocks) {
            debug!(operation = C::NAME, worker, offset = left.offset, count = left.count(), "sending blocks");
            send_matrix(communicator, worker, &left.matrix)?;
            send_matrix(communicator, worker, &right.matrix)?;
        }

        let results = communicator.workers()
            .zip(&left_blocks)
            .map(|(worker, block)| Ok(Block {
                matrix: receive_matrix(communicator, worker)?,
                offset: block.offset,
            }))
            .collect::<Result<Vec<_>, MatrixError>>()?;

        SparseMatrix::from_blocks(results, width, height, direction)
    }

    fn work(communicator: &Communicator) -> Result<(), MatrixError> {
        let left = receive_matrix(communicator, COORDINATOR)?;
        let right = receive_matrix(communicator, COORDINATOR)?;

        send_matrix(communicator, COORDINATOR, &C::combine(&left, &right)?)
    }
}

/// Matrix product.
///
/// The work is split along the inner dimension: each worker multiplies a range of the columns of
/// the left operand with the matching rows of the right operand. The partial products all have
/// the shape of the result and are summed by the coordinator.
#[derive(Debug)]
pub struct Multiply {
    left: SparseMatrix,
    right: SparseMatrix,
}

impl Multiply {
    /// Compute `left * right`.
    #[must_use]
    pub fn new(left: SparseMatrix, right: SparseMatrix) -> Self {
        Self { left, right }
    }
}

impl Operation for Multiply {
    const NAME: &'static str = "mul";
    type Output = SparseMatrix;

    fn validate(&self) -> Result<(), MatrixError> {
        if self.left.width() != self.right.height() {
            return Err(MatrixError::dimensions("mul", self.left.shape(), self.right.shape()));
        }
        wire::check_dimensions(self.left.width(), self.left.height())?;
        wire::check_dimensions(self.right.width(), self.right.height())
    }

    fn extent(&self) -> usize {
        self.left.width()
    }

    fn sequential(self) -> Result<Self::Output, MatrixError> {
        self.left.try_mul(&self.right)
    }

    fn coordinate(self, communicator: &Communicator) -> Result<Self::Output, MatrixError> {
        let direction = self.left.direction();
        let (width, height) = (self.right.width(), self.left.height());
        let columns = self.left.to_direction(Direction::ColumnWise);
        let rows = self.right.to_direction(Direction::RowWise);

        let workers = communicator.size() - 1;
        for ((worker, column_block), row_block) in communicator.workers()
            .zip(columns.split_to_n(workers))
            .zip(rows.split_to_n(workers)) {
            debug!(operation = "mul", worker, offset = column_block.offset, count = column_block.count(), "sending blocks");
            send_matrix(communicator, worker, &column_block.matrix)?;
            send_matrix(communicator, worker, &row_block.matrix)?;
        }

        let mut result = SparseMatrix::new(width, height, direction);
        for worker in communicator.workers() {
            let partial = receive_matrix(communicator, worker)?;
            if partial.shape() != result.shape() {
                return Err(MatrixError::dimensions("mul", result.shape(), partial.shape()));
            }
            for element in partial.elements() {
                result.shift_value(element);
            }
        }

        Ok(result)
    }

    fn work(communicator: &Communicator) -> Result<(), MatrixError> {
        let columns = receive_matrix(communicator, COORDINATOR)?;
        let rows = receive_matrix(communicator, COORDINATOR)?;

        send_matrix(communicator, COORDINATOR, &columns.try_mul(&rows)?)
    }
}

/// Matrix times column vector.
///
/// Each worker gets a range of the columns of the matrix and the matching part of the vector. It
/// returns a full length partial result, which the coordinator sums.
#[derive(Debug)]
pub struct MultiplyVector {
    matrix: SparseMatrix,
    vector: SparseVector,
}

impl MultiplyVector {
    /// Compute `matrix * vector`.
    #[must_use]
    pub fn new(matrix: SparseMatrix, vector: SparseVector) -> Self {
        Self { matrix, vector }
    }
}

impl Operation for MultiplyVector {
    const NAME: &'static str = "mul_vector";
    type Output = SparseVector;

    fn validate(&self) -> Result<(), MatrixError> {
        if self.matrix.width() != self.vector.len() {
            return Err(MatrixError::dimensions("mul_vector", self.matrix.shape(), self.vector.shape()));
        }
        wire::check_dimensions(self.matrix.width(), self.matrix.height())
    }

    fn extent(&self) -> usize {
        self.matrix.width()
    }

    fn sequential(self) -> Result<Self::Output, MatrixError> {
        self.matrix.try_mul_vector(&self.vector)
    }

    fn coordinate(self, communicator: &Communicator) -> Result<Self::Output, MatrixError> {
        let height = self.matrix.height();
        let columns = self.matrix.to_direction(Direction::ColumnWise);

        for (worker, block) in communicator.workers().zip(columns.split_to_n(communicator.size() - 1)) {
            send_matrix(communicator, worker, &block.matrix)?;
            let segment = self.vector.segment(block.offset, block.count());
            communicator.send(worker, Tag::Vector, wire::encode_vector(&segment)?)?;
        }

        let mut result = SparseVector::empty(height, Direction::ColumnWise);
        for worker in communicator.workers() {
            let partial = wire::decode_vector(&communicator.receive(worker, Tag::Vector)?)?;
            result.add_multiple(1_f64, &partial)?;
        }

        Ok(result)
    }

    fn work(communicator: &Communicator) -> Result<(), MatrixError> {
        let block = receive_matrix(communicator, COORDINATOR)?;
        let segment = wire::decode_vector(&communicator.receive(COORDINATOR, Tag::Vector)?)?;

        let partial = block.try_mul_vector(&segment)?;
        communicator.send(COORDINATOR, Tag::Vector, wire::encode_vector(&partial)?)
    }
}
