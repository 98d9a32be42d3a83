//! # Algorithms
//!
//! Every operation in here is collective: all ranks call it at the same point in their program,
//! the coordinator with the operands and the workers without. Only the coordinator gets a result.
//!
//! ```
//! use sparse_spmd::algorithm::Node;
//! use sparse_spmd::data::linear_algebra::Direction;
//! use sparse_spmd::data::linear_algebra::matrix::SparseMatrix;
//! use sparse_spmd::distributed::World;
//!
//! let results = World::new(3).run(|communicator| {
//!     let node = Node::new(communicator);
//!     let identity = SparseMatrix::identity(4, Direction::ColumnWise);
//!     node.mul(node.role(|| (identity.clone(), identity.clone())))
//! }).unwrap();
//!
//! assert_eq!(results[0], Ok(Some(SparseMatrix::identity(4, Direction::ColumnWise))));
//! assert_eq!(results[1], Ok(None));
//! ```
use tracing::debug;

use crate::algorithm::arithmetic::{Combine, Difference, Elementwise, Multiply, MultiplyVector, Sum};
use crate::algorithm::lower_upper::{Complete, Decomposition, Factors, Incomplete};
use crate::algorithm::triangular::SolveMany;
use crate::config::SolverConfig;
use crate::data::linear_algebra::MatrixError;
use crate::data::linear_algebra::matrix::SparseMatrix;
use crate::data::linear_algebra::vector::SparseVector;
use crate::distributed::{COORDINATOR, Communicator, Operation, Protocol, Role, Tag};
use crate::distributed::wire;

pub use conjugate_gradient::Solution;

pub mod arithmetic;
pub mod conjugate_gradient;
pub mod lower_upper;
pub mod triangular;

/// One rank, ready to take part in collective operations.
pub struct Node {
    communicator: Communicator,
    config: SolverConfig,
}

impl Node {
    /// A rank using the default solver configuration.
    #[must_use]
    pub fn new(communicator: Communicator) -> Self {
        Self::with_config(communicator, SolverConfig::default())
    }

    /// A rank with a specific solver configuration.
    ///
    /// All ranks should use the same configuration.
    #[must_use]
    pub fn with_config(communicator: Communicator, config: SolverConfig) -> Self {
        Self { communicator, config }
    }

    /// The endpoints of this rank.
    #[must_use]
    pub fn communicator(&self) -> &Communicator {
        &self.communicator
    }

    /// Solver settings.
    #[must_use]
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Whether this rank is the coordinator.
    #[must_use]
    pub fn is_coordinator(&self) -> bool {
        self.communicator.is_coordinator()
    }

    /// The role of this rank, with the operands only built on the coordinator.
    pub fn role<T>(&self, operands: impl FnOnce() -> T) -> Role<T> {
        if self.is_coordinator() {
            Role::Coordinator(operands())
        } else {
            Role::Worker
        }
    }

    /// Run any operation.
    pub fn execute<O: Operation>(&self, role: Role<O>) -> Result<Option<O::Output>, MatrixError> {
        Protocol::new(&self.communicator).execute(role)
    }

    /// Sum of two matrices of equal shape, stored in the direction of the left one.
    pub fn add(&self, operands: Role<(SparseMatrix, SparseMatrix)>) -> Result<Option<SparseMatrix>, MatrixError> {
        self.execute(operands.map(|(left, right)| Elementwise::<Sum>::new(left, right)))
    }

    /// Difference of two matrices of equal shape, stored in the direction of the left one.
    pub fn sub(&self, operands: Role<(SparseMatrix, SparseMatrix)>) -> Result<Option<SparseMatrix>, MatrixError> {
        self.execute(operands.map(|(left, right)| Elementwise::<Difference>::new(left, right)))
    }

    /// Add a matrix to another one in place.
    ///
    /// # Arguments
    ///
    /// * `operands`: The matrix that is changed and the matrix that is added to it. They should be
    /// of the same shape.
    pub fn add_to(&self, operands: Role<(&mut SparseMatrix, &SparseMatrix)>) -> Result<(), MatrixError> {
        self.accumulate::<Sum>(operands)
    }

    /// Subtract a matrix from another one in place.
    pub fn sub_to(&self, operands: Role<(&mut SparseMatrix, &SparseMatrix)>) -> Result<(), MatrixError> {
        self.accumulate::<Difference>(operands)
    }

    fn accumulate<C: Combine>(&self, operands: Role<(&mut SparseMatrix, &SparseMatrix)>) -> Result<(), MatrixError> {
        match operands {
            Role::Coordinator((to, what)) => {
                let operation = Elementwise::<C>::new(to.clone(), what.clone());
                *to = coordinator_output(self.execute(Role::Coordinator(operation))?)?;
                Ok(())
            },
            Role::Worker => self.execute(Role::<Elementwise<C>>::Worker).map(|_| ()),
        }
    }

    /// Matrix product, stored in the direction of the left operand.
    pub fn mul(&self, operands: Role<(SparseMatrix, SparseMatrix)>) -> Result<Option<SparseMatrix>, MatrixError> {
        self.execute(operands.map(|(left, right)| Multiply::new(left, right)))
    }

    /// Matrix times column vector.
    pub fn mul_vector(&self, operands: Role<(SparseMatrix, SparseVector)>) -> Result<Option<SparseVector>, MatrixError> {
        self.execute(operands.map(|(matrix, vector)| MultiplyVector::new(matrix, vector)))
    }

    /// LU decomposition without pivoting.
    pub fn lu(&self, matrix: Role<SparseMatrix>) -> Result<Option<Factors>, MatrixError> {
        self.execute(matrix.map(Decomposition::<Complete>::new))
    }

    /// Incomplete LU decomposition that keeps the sparsity pattern of the matrix.
    pub fn ilu(&self, matrix: Role<SparseMatrix>) -> Result<Option<Factors>, MatrixError> {
        self.execute(matrix.map(Decomposition::<Incomplete>::new))
    }

    /// Solve `LX = B` for a lower triangular `L` and a column-wise `B`.
    pub fn solve_many(&self, operands: Role<(SparseMatrix, SparseMatrix)>) -> Result<Option<SparseMatrix>, MatrixError> {
        self.execute(operands.map(|(lower, rhs)| SolveMany::new(lower, rhs)))
    }

    /// Inverse of a lower triangular matrix, stored column-wise.
    pub fn inverse(&self, lower: Role<SparseMatrix>) -> Result<Option<SparseMatrix>, MatrixError> {
        self.execute(lower.map(SolveMany::inverse))
    }

    /// Make sure all ranks leave a failed composite operation in the same step.
    ///
    /// The coordinator starts a step that only carries its error. Workers that failed for another
    /// reason wait for that step, so that nothing of the failed operation is left over when the
    /// next operation starts.
    fn conclude<T>(&self, result: Result<T, MatrixError>) -> Result<T, MatrixError> {
        let error = match result {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        let communicator = &self.communicator;
        if communicator.is_coordinator() {
            let epoch = communicator.begin_step();
            debug!(epoch, %error, "abandoning operation");
            for worker in communicator.workers() {
                communicator.send_failure(worker, &error);
            }
        } else if !matches!(error, MatrixError::RemoteFailure { rank: COORDINATOR, .. }) {
            while communicator.await_step(Tag::Residual).is_ok() {}
        }

        Err(error)
    }
}

/// The result that the protocol gives to the coordinator.
fn coordinator_output<T>(output: Option<T>) -> Result<T, MatrixError> {
    output.ok_or_else(|| MatrixError::ProtocolViolation("coordinator received no result".to_string()))
}

pub(crate) fn send_matrix(
    communicator: &Communicator,
    destination: usize,
    matrix: &SparseMatrix,
) -> Result<(), MatrixError> {
    communicator.send(destination, Tag::Matrix, wire::encode_matrix(matrix)?)
}

pub(crate) fn receive_matrix(communicator: &Communicator, source: usize) -> Result<SparseMatrix, MatrixError> {
    wire::decode_matrix(&communicator.receive(source, Tag::Matrix)?)
}
