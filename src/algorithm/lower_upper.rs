//! # LU decomposition
//!
//! Gaussian elimination without pivoting on a column-wise copy of a square matrix, computing the
//! factors in place: the strictly lower part holds `L` (which has a unit diagonal) and the rest
//! holds `U`.
//!
//! The distributed variant divides the columns over the workers and runs as a wavefront. Column
//! `k` is final as soon as pivot `k` has been eliminated, and every column to the right of it
//! needs it. The owner of column `k` eliminates it and sends it to all workers of a higher rank,
//! which receive it in whatever order it arrives relative to the pivot columns of other workers.
//! The last worker ends up with every column and returns the result.
use std::marker::PhantomData;

use tracing::{debug, trace};

use crate::algorithm::{receive_matrix, send_matrix};
use crate::data::linear_algebra::{Direction, MatrixError};
use crate::data::linear_algebra::matrix::SparseMatrix;
use crate::data::linear_algebra::vector::SparseVector;
use crate::distributed::{COORDINATOR, Communicator, Operation, Tag};
use crate::distributed::router::PivotRouter;
use crate::distributed::wire;

/// Which entries the elimination is allowed to create.
pub trait Fill {
    /// Name used in errors and logging.
    const NAME: &'static str;

    /// Whether an update may write to an entry that is currently zero.
    fn creates(target: &SparseVector, index: usize) -> bool;
}

/// Full LU: all fill-in is created.
#[derive(Debug)]
pub struct Complete;
impl Fill for Complete {
    const NAME: &'static str = "lu";

    fn creates(_: &SparseVector, _: usize) -> bool {
        true
    }
}

/// ILU(0): only entries that are already nonzero are updated, the sparsity pattern of the matrix
/// is kept.
#[derive(Debug)]
pub struct Incomplete;
impl Fill for Incomplete {
    const NAME: &'static str = "ilu";

    fn creates(target: &SparseVector, index: usize) -> bool {
        target[index] != 0_f64
    }
}

/// Divide the part of column `k` below the diagonal by the pivot.
fn eliminate(column: &mut SparseVector, k: usize) -> Result<(), MatrixError> {
    let pivot = column.get(k)?;
    if pivot == 0_f64 {
        return Err(MatrixError::SingularPivot { index: k });
    }

    let below = column.iter()
        .map(|&(i, _)| i)
        .filter(|&i| i > k)
        .collect::<Vec<_>>();
    for i in below {
        column.div(i, pivot)?;
    }

    Ok(())
}

/// Update column `target` with the eliminated pivot column `k`.
fn update<F: Fill>(target: &mut SparseVector, pivot_column: &SparseVector, k: usize) {
    let factor = target[k];
    if factor == 0_f64 {
        return;
    }

    for &(j, value) in pivot_column.iter().filter(|&&(j, _)| j > k) {
        if F::creates(target, j) {
            target.shift_value(j, -factor * value);
        }
    }
}

/// Factorize a square matrix on a single rank.
///
/// # Return value
///
/// Both factors in one column-wise matrix.
pub fn factorize<F: Fill>(matrix: SparseMatrix) -> Result<SparseMatrix, MatrixError> {
    debug_assert!(matrix.is_square());

    let mut local = matrix.to_direction(Direction::ColumnWise);
    let size = local.width();
    for k in 0..size {
        eliminate(local.vector_mut(k), k)?;
        let pivot_column = local[k].clone();
        for i in k + 1..size {
            update::<F>(local.vector_mut(i), &pivot_column, k);
        }
    }

    Ok(local)
}

/// The factors of `A = LU`.
#[derive(Clone, Debug, PartialEq)]
pub struct Factors {
    /// Unit lower triangular.
    pub lower: SparseMatrix,
    /// Upper triangular.
    pub upper: SparseMatrix,
}

impl Factors {
    fn split(combined: &SparseMatrix) -> Self {
        Self { lower: combined.lower(), upper: combined.upper() }
    }
}

/// LU decomposition of a square matrix, either complete or incomplete.
#[derive(Debug)]
pub struct Decomposition<F> {
    matrix: SparseMatrix,
    fill: PhantomData<F>,
}

impl<F: Fill> Decomposition<F> {
    /// Factorize `matrix`.
    #[must_use]
    pub fn new(matrix: SparseMatrix) -> Self {
        Self { matrix, fill: PhantomData }
    }
}

impl<F: Fill> Operation for Decomposition<F> {
    const NAME: &'static str = F::NAME;
    type Output = Factors;

    fn validate(&self) -> Result<(), MatrixError> {
        if !self.matrix.is_square() {
            return Err(MatrixError::NotSquare { width: self.matrix.width(), height: self.matrix.height() });
        }
        wire::check_dimensions(self.matrix.width(), self.matrix.height())
    }

    fn extent(&self) -> usize {
        self.matrix.width()
    }

    fn sequential(self) -> Result<Self::Output, MatrixError> {
        factorize::<F>(self.matrix).map(|combined| Factors::split(&combined))
    }

    fn coordinate(self, communicator: &Communicator) -> Result<Self::Output, MatrixError> {
        let size = self.matrix.width();
        let columns = self.matrix.to_direction(Direction::ColumnWise);

        for (worker, block) in communicator.workers().zip(columns.split_to_n(communicator.size() - 1)) {
            debug!(operation = F::NAME, worker, offset = block.offset, count = block.count(), "sending columns");
            send_matrix(communicator, worker, &block.matrix)?;
            communicator.send(worker, Tag::Index, wire::encode_index(block.offset)?)?;
        }

        let last = communicator.size() - 1;
        let combined = receive_matrix(communicator, last)?;
        if combined.shape() != (size, size) {
            return Err(MatrixError::dimensions(F::NAME, (size, size), combined.shape()));
        }

        Ok(Factors::split(&combined))
    }

    fn work(communicator: &Communicator) -> Result<(), MatrixError> {
        let block = receive_matrix(communicator, COORDINATOR)?;
        let offset = wire::decode_index(&communicator.receive(COORDINATOR, Tag::Index)?)?;

        let result = eliminate_block::<F>(communicator, block, offset);
        if let Err(error) = &result {
            // Workers after this one might be waiting for a pivot that will never come.
            for rank in communicator.rank() + 1..communicator.size() {
                communicator.send_failure(rank, error);
            }
        }
        let local = result?;

        if communicator.rank() == communicator.size() - 1 {
            send_matrix(communicator, COORDINATOR, &local)?;
        }
        Ok(())
    }
}

/// The part of the wavefront run by one worker.
///
/// # Arguments
///
/// * `block`: The columns owned by this worker.
/// * `offset`: Index of the first owned column.
///
/// # Return value
///
/// A square matrix with the factored columns of this worker and all workers before it.
fn eliminate_block<F: Fill>(
    communicator: &Communicator,
    block: SparseMatrix,
    offset: usize,
) -> Result<SparseMatrix, MatrixError> {
    let (rank, size) = (communicator.rank(), communicator.size());
    let n = block.height();
    let end = offset + block.width();
    if block.direction() != Direction::ColumnWise || end > n {
        return Err(MatrixError::ProtocolViolation(format!(
            "rank {rank} can't factor columns {offset}..{end} of a matrix of height {n}",
        )));
    }

    let mut local = SparseMatrix::new(n, n, Direction::ColumnWise);
    for (i, column) in block.vectors().iter().enumerate() {
        *local.vector_mut(offset + i) = column.clone();
    }

    let mut router = PivotRouter::new(communicator, (1..rank).collect());
    for k in 0..end {
        if k >= offset {
            eliminate(local.vector_mut(k), k)?;
            let payload = wire::encode_pivot(k, &local[k])?;
            for consumer in rank + 1..size {
                communicator.send(consumer, Tag::Pivot, payload.clone())?;
            }
            trace!(rank, pivot = k, "eliminated");
        } else {
            let column = router.wait_for(k)?;
            if column.len() != n {
                return Err(MatrixError::dimensions(F::NAME, (1, n), column.shape()));
            }
            *local.vector_mut(k) = column;
        }

        let pivot_column = local[k].clone();
        for i in (k + 1).max(offset)..end {
            update::<F>(local.vector_mut(i), &pivot_column, k);
        }
    }

    Ok(local)
}
