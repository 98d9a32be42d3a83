//! # Conjugate gradients
//!
//! Iterative solver for symmetric positive definite systems `Ax = b`. The coordinator keeps all
//! vectors and scalars; the product `Ap` of every iteration is computed by all ranks together.
//! Before each iteration the coordinator broadcasts the current residual together with whether to
//! stop, so that all ranks leave the loop after the same iteration.
//!
//! Not reaching the tolerance within the maximum number of iterations is not an error. The
//! residual of the returned solution tells whether it is any good.
use tracing::{debug, info, warn};

use crate::algorithm::{coordinator_output, Node};
use crate::algorithm::lower_upper::Factors;
use crate::algorithm::triangular::solve_lower_upper;
use crate::config::Preconditioner;
use crate::data::linear_algebra::{Direction, MatrixError};
use crate::data::linear_algebra::matrix::SparseMatrix;
use crate::data::linear_algebra::vector::SparseVector;
use crate::distributed::{Role, Tag};
use crate::distributed::wire;

/// Result of an iterative solve.
#[derive(Clone, Debug, PartialEq)]
pub struct Solution {
    /// The last iterate.
    pub x: SparseVector,
    /// Number of iterations done.
    pub iterations: usize,
    /// Relative residual `|b - Ax| / |b|` of `x`.
    pub residual: f64,
}

/// Applied to the residual in every iteration.
enum Apply {
    Identity,
    Factors(Factors),
}

impl Apply {
    fn apply(&self, residual: &SparseVector) -> Result<SparseVector, MatrixError> {
        match self {
            Apply::Identity => Ok(residual.clone()),
            Apply::Factors(Factors { lower, upper }) => solve_lower_upper(lower, upper, residual),
        }
    }
}

/// `|b - Ax| / |b|`, or `|b - Ax|` when `b` is zero.
pub fn relative_residual(
    matrix: &SparseMatrix,
    rhs: &SparseVector,
    x: &SparseVector,
) -> Result<f64, MatrixError> {
    let mut residual = rhs.clone();
    residual.add_multiple(-1_f64, &matrix.try_mul_vector(x)?)?;

    Ok(residual.l2_norm() / nonzero_norm(rhs))
}

fn nonzero_norm(vector: &SparseVector) -> f64 {
    match vector.l2_norm() {
        norm if norm > 0_f64 => norm,
        _ => 1_f64,
    }
}

fn check_system(matrix: &SparseMatrix, rhs: &SparseVector) -> Result<(), MatrixError> {
    if !matrix.is_square() {
        return Err(MatrixError::NotSquare { width: matrix.width(), height: matrix.height() });
    }
    if matrix.height() != rhs.len() {
        return Err(MatrixError::dimensions("cg", matrix.shape(), rhs.shape()));
    }
    Ok(())
}

impl Node {
    /// Solve `Ax = b` with conjugate gradients, preconditioned as configured.
    ///
    /// # Arguments
    ///
    /// * `operands`: A square symmetric positive definite matrix and the right hand side.
    ///
    /// # Return value
    ///
    /// The last iterate on the coordinator, with its residual on the original system.
    pub fn cg(&self, operands: Role<(SparseMatrix, SparseVector)>) -> Result<Option<Solution>, MatrixError> {
        let result = match self.config.preconditioner {
            Preconditioner::None => self.iterate(operands.map(|(matrix, rhs)| (matrix, rhs, Apply::Identity))),
            Preconditioner::Ilu => self.ilu_preconditioned(operands),
            Preconditioner::IluTransform => self.transformed(operands),
        };
        let result = self.conclude(result);

        if let Ok(Some(solution)) = &result {
            if solution.residual <= self.config.tolerance {
                info!(iterations = solution.iterations, residual = solution.residual, "converged");
            } else {
                warn!(
                    iterations = solution.iterations,
                    residual = solution.residual,
                    tolerance = self.config.tolerance,
                    "did not converge",
                );
            }
        }
        result
    }

    fn ilu_preconditioned(&self, operands: Role<(SparseMatrix, SparseVector)>) -> Result<Option<Solution>, MatrixError> {
        match operands {
            Role::Coordinator((matrix, rhs)) => {
                check_system(&matrix, &rhs)?;
                let factors = coordinator_output(self.ilu(Role::Coordinator(matrix.clone()))?)?;
                self.iterate(Role::Coordinator((matrix, rhs, Apply::Factors(factors))))
            },
            Role::Worker => {
                self.ilu(Role::Worker)?;
                self.iterate(Role::Worker)
            },
        }
    }

    /// Solve `(L^-1 A L^-T) y = L^-1 b` with plain conjugate gradients and return `x = L^-T y`.
    ///
    /// `L` is the lower factor of the incomplete LU decomposition of `A`.
    fn transformed(&self, operands: Role<(SparseMatrix, SparseVector)>) -> Result<Option<Solution>, MatrixError> {
        let (matrix, rhs) = match operands {
            Role::Coordinator(operands) => operands,
            Role::Worker => {
                self.ilu(Role::Worker)?;
                self.inverse(Role::Worker)?;
                self.mul(Role::Worker)?;
                self.mul(Role::Worker)?;
                self.mul_vector(Role::Worker)?;
                self.iterate(Role::Worker)?;
                self.mul_vector(Role::Worker)?;
                return Ok(None);
            },
        };

        check_system(&matrix, &rhs)?;
        let Factors { lower, .. } = coordinator_output(self.ilu(Role::Coordinator(matrix.clone()))?)?;
        let inverse = coordinator_output(self.inverse(Role::Coordinator(lower))?)?;
        let inverse_transposed = inverse.clone().transpose();

        let left = coordinator_output(self.mul(Role::Coordinator((inverse.clone(), matrix.clone())))?)?;
        let mut transformed = coordinator_output(self.mul(Role::Coordinator((left, inverse_transposed.clone())))?)?;
        let mut transformed_rhs = coordinator_output(self.mul_vector(Role::Coordinator((inverse, rhs.clone())))?)?;
        transformed.clean_with(self.config.clean_tolerance);
        transformed_rhs.clean_with(self.config.clean_tolerance);
        debug!(nnz = transformed.nnz(), "transformed system");

        let Solution { x: y, iterations, .. } = coordinator_output(
            self.iterate(Role::Coordinator((transformed, transformed_rhs, Apply::Identity)))?,
        )?;
        let x = coordinator_output(self.mul_vector(Role::Coordinator((inverse_transposed, y)))?)?;
        let residual = relative_residual(&matrix, &rhs, &x)?;

        Ok(Some(Solution { x, iterations, residual }))
    }

    fn iterate(&self, system: Role<(SparseMatrix, SparseVector, Apply)>) -> Result<Option<Solution>, MatrixError> {
        match system {
            Role::Coordinator((matrix, rhs, preconditioner)) => {
                self.lead(matrix, rhs, &preconditioner).map(Some)
            },
            Role::Worker => {
                loop {
                    let (_, stop) = wire::decode_residual(&self.communicator.await_step(Tag::Residual)?)?;
                    if stop {
                        return Ok(None);
                    }
                    self.mul_vector(Role::Worker)?;
                }
            },
        }
    }

    fn lead(
        &self,
        matrix: SparseMatrix,
        rhs: SparseVector,
        preconditioner: &Apply,
    ) -> Result<Solution, MatrixError> {
        check_system(&matrix, &rhs)?;
        let (tolerance, max_iterations) = (self.config.tolerance, self.config.max_iterations);

        let rhs = match rhs.direction() {
            Direction::ColumnWise => rhs,
            Direction::RowWise => rhs.transpose(),
        };
        let norm = nonzero_norm(&rhs);

        let mut x = SparseVector::empty(rhs.len(), Direction::ColumnWise);
        let mut r = rhs;
        let mut p = preconditioner.apply(&r)?;
        let mut rho = r.dot(&p)?;
        let mut residual = r.l2_norm() / norm;
        let mut iterations = 0;
        let mut breakdown = false;

        loop {
            let stop = residual <= tolerance || iterations >= max_iterations || breakdown;
            self.communicator.begin_step();
            self.communicator.broadcast(Tag::Residual, &wire::encode_residual(residual, stop))?;
            if stop {
                break;
            }

            let q = coordinator_output(self.mul_vector(Role::Coordinator((matrix.clone(), p.clone())))?)?;
            let pq = p.dot(&q)?;
            if pq == 0_f64 || !pq.is_finite() {
                warn!(iterations, residual, "search direction broke down");
                breakdown = true;
                continue;
            }

            let alpha = rho / pq;
            x.add_multiple(alpha, &p)?;
            r.add_multiple(-alpha, &q)?;

            let z = preconditioner.apply(&r)?;
            let next_rho = r.dot(&z)?;
            let beta = next_rho / rho;
            rho = next_rho;

            let mut next_p = z;
            next_p.add_multiple(beta, &p)?;
            p = next_p;

            iterations += 1;
            residual = r.l2_norm() / norm;
            debug!(iterations, residual, "iteration");
        }

        Ok(Solution { x, iterations, residual })
    }
}
