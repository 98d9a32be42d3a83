//! # Triangular systems
//!
//! Forward and back substitution on column-wise triangular matrices, and solving a lower
//! triangular system for many right hand sides at once by dividing the columns of the right hand
//! side over the workers. With the identity as right hand side, that gives the inverse.
use std::borrow::Cow;

use tracing::debug;

use crate::algorithm::{receive_matrix, send_matrix};
use crate::data::linear_algebra::{Direction, MatrixError};
use crate::data::linear_algebra::matrix::{Block, SparseMatrix};
use crate::data::linear_algebra::vector::SparseVector;
use crate::distributed::{COORDINATOR, Communicator, Operation};
use crate::distributed::wire;

fn column_wise(matrix: &SparseMatrix) -> Cow<'_, SparseMatrix> {
    match matrix.direction() {
        Direction::ColumnWise => Cow::Borrowed(matrix),
        Direction::RowWise => Cow::Owned(matrix.clone().to_direction(Direction::ColumnWise)),
    }
}

fn check_system(
    operation: &'static str,
    matrix: &SparseMatrix,
    rhs: &SparseVector,
) -> Result<(), MatrixError> {
    if !matrix.is_square() {
        return Err(MatrixError::NotSquare { width: matrix.width(), height: matrix.height() });
    }
    if matrix.height() != rhs.len() {
        return Err(MatrixError::dimensions(operation, matrix.shape(), rhs.shape()));
    }
    Ok(())
}

/// Solve `Lx = b` for a lower triangular `L` by forward substitution.
///
/// Values above the diagonal are ignored.
///
/// # Arguments
///
/// * `lower`: Square lower triangular matrix with a nonzero diagonal.
/// * `rhs`: Right hand side of the same length.
///
/// # Return value
///
/// The solution as a column vector.
pub fn solve_lower(lower: &SparseMatrix, rhs: &SparseVector) -> Result<SparseVector, MatrixError> {
    check_system("solve_lower", lower, rhs)?;
    let lower = column_wise(lower);

    let mut x = rhs.to_dense();
    for (c, column) in lower.vectors().iter().enumerate() {
        let diagonal = column[c];
        if diagonal == 0_f64 {
            return Err(MatrixError::SingularPivot { index: c });
        }

        x[c] /= diagonal;
        if x[c] != 0_f64 {
            for &(r, value) in column.iter().filter(|&&(r, _)| r > c) {
                x[r] -= value * x[c];
            }
        }
    }

    Ok(SparseVector::from_dense(&x, Direction::ColumnWise))
}

/// Solve `Ux = b` for an upper triangular `U` by back substitution.
///
/// Values below the diagonal are ignored.
pub fn solve_upper(upper: &SparseMatrix, rhs: &SparseVector) -> Result<SparseVector, MatrixError> {
    check_system("solve_upper", upper, rhs)?;
    let upper = column_wise(upper);

    let mut x = rhs.to_dense();
    for (c, column) in upper.vectors().iter().enumerate().rev() {
        let diagonal = column[c];
        if diagonal == 0_f64 {
            return Err(MatrixError::SingularPivot { index: c });
        }

        x[c] /= diagonal;
        if x[c] != 0_f64 {
            for &(r, value) in column.iter().take_while(|&&(r, _)| r < c) {
                x[r] -= value * x[c];
            }
        }
    }

    Ok(SparseVector::from_dense(&x, Direction::ColumnWise))
}

/// Solve `LUx = b`, a forward pass on `L` followed by a backward pass on `U`.
pub fn solve_lower_upper(
    lower: &SparseMatrix,
    upper: &SparseMatrix,
    rhs: &SparseVector,
) -> Result<SparseVector, MatrixError> {
    let y = solve_lower(lower, rhs)?;
    solve_upper(upper, &y)
}

fn solve_columns(lower: &SparseMatrix, rhs: &SparseMatrix) -> Result<SparseMatrix, MatrixError> {
    let solutions = rhs.vectors().iter()
        .map(|column| solve_lower(lower, column))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SparseMatrix::from_vectors(solutions, rhs.width(), rhs.height(), Direction::ColumnWise))
}

/// Solve `LX = B` for a lower triangular `L` and every column of `B`.
///
/// Each worker gets all of `L` and a range of the columns of `B`.
#[derive(Debug)]
pub struct SolveMany {
    lower: SparseMatrix,
    rhs: SparseMatrix,
}

impl SolveMany {
    /// Solve `lower * X = rhs`, where `rhs` should be stored column-wise.
    #[must_use]
    pub fn new(lower: SparseMatrix, rhs: SparseMatrix) -> Self {
        Self { lower, rhs }
    }

    /// Invert a lower triangular matrix.
    #[must_use]
    pub fn inverse(lower: SparseMatrix) -> Self {
        let size = lower.width();
        Self::new(lower, SparseMatrix::identity(size, Direction::ColumnWise))
    }
}

impl Operation for SolveMany {
    const NAME: &'static str = "solve_many";
    type Output = SparseMatrix;

    fn validate(&self) -> Result<(), MatrixError> {
        if !self.lower.is_square() {
            return Err(MatrixError::NotSquare { width: self.lower.width(), height: self.lower.height() });
        }
        if self.lower.height() != self.rhs.height() {
            return Err(MatrixError::dimensions("solve_many", self.lower.shape(), self.rhs.shape()));
        }
        if self.rhs.direction() != Direction::ColumnWise {
            return Err(MatrixError::DirectionMismatch {
                operation: "solve_many",
                expected: Direction::ColumnWise,
            });
        }
        wire::check_dimensions(self.rhs.width(), self.rhs.height())
    }

    fn extent(&self) -> usize {
        self.rhs.width()
    }

    fn sequential(self) -> Result<Self::Output, MatrixError> {
        let lower = self.lower.to_direction(Direction::ColumnWise);
        solve_columns(&lower, &self.rhs)
    }

    fn coordinate(self, communicator: &Communicator) -> Result<Self::Output, MatrixError> {
        let (width, height) = self.rhs.shape();
        let lower = self.lower.to_direction(Direction::ColumnWise);

        let blocks = self.rhs.split_to_n(communicator.size() - 1);
        for (worker, block) in communicator.workers().zip(&blocks) {
            debug!(operation = "solve_many", worker, offset = block.offset, count = block.count(), "sending columns");
            send_matrix(communicator, worker, &lower)?;
            send_matrix(communicator, worker, &block.matrix)?;
        }

        let solved = communicator.workers()
            .zip(&blocks)
            .map(|(worker, block)| Ok(Block {
                matrix: receive_matrix(communicator, worker)?,
                offset: block.offset,
            }))
            .collect::<Result<Vec<_>, MatrixError>>()?;

        SparseMatrix::from_blocks(solved, width, height, Direction::ColumnWise)
    }

    fn work(communicator: &Communicator) -> Result<(), MatrixError> {
        let lower = receive_matrix(communicator, COORDINATOR)?;
        let rhs = receive_matrix(communicator, COORDINATOR)?;

        send_matrix(communicator, COORDINATOR, &solve_columns(&lower, &rhs)?)
    }
}
