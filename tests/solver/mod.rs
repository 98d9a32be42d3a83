use approx::assert_abs_diff_eq;

use sparse_spmd::algorithm::conjugate_gradient::relative_residual;
use sparse_spmd::config::{Preconditioner, SolverConfig};
use sparse_spmd::data::linear_algebra::{Direction, Element};
use sparse_spmd::data::linear_algebra::matrix::{SparseMatrix, generator};
use sparse_spmd::data::linear_algebra::vector::SparseVector;

use crate::{MAX_RANKS, on_coordinator};

const PRECONDITIONERS: [Preconditioner; 3] = [
    Preconditioner::None,
    Preconditioner::Ilu,
    Preconditioner::IluTransform,
];

#[test]
fn two_by_two() {
    let matrix = SparseMatrix::from_elements(vec![
        Element::new(0, 0, 4_f64),
        Element::new(1, 0, 1_f64),
        Element::new(0, 1, 1_f64),
        Element::new(1, 1, 3_f64),
    ], Direction::ColumnWise);
    let rhs = SparseVector::from_dense(&[1_f64, 2_f64], Direction::ColumnWise);

    for preconditioner in PRECONDITIONERS {
        let config = SolverConfig::default().with_preconditioner(preconditioner);
        for size in 1..=MAX_RANKS {
            let solution = on_coordinator(size, &config, |node| {
                node.cg(node.role(|| (matrix.clone(), rhs.clone())))
            }).unwrap();

            assert!(solution.residual <= config.tolerance);
            assert!(solution.iterations <= config.max_iterations);
            assert_abs_diff_eq!(solution.x.to_dense()[0], 1_f64 / 11_f64, epsilon = 1e-5);
            assert_abs_diff_eq!(solution.x.to_dense()[1], 7_f64 / 11_f64, epsilon = 1e-5);
        }
    }
}

#[test]
fn random_systems() {
    for seed in 0..3 {
        let matrix = generator::diagonally_dominant(15, 25, Direction::ColumnWise, Some(seed));
        let rhs = SparseVector::from_dense(
            &(0..15).map(|i| (i % 4) as f64 - 1_f64).collect::<Vec<_>>(),
            Direction::ColumnWise,
        );

        for preconditioner in PRECONDITIONERS {
            let config = SolverConfig::default().with_preconditioner(preconditioner);
            let solution = on_coordinator(4, &config, |node| {
                node.cg(node.role(|| (matrix.clone(), rhs.clone())))
            }).unwrap();

            assert!(solution.residual <= 1e-5, "{preconditioner:?} left residual {}", solution.residual);
            assert_abs_diff_eq!(
                relative_residual(&matrix, &rhs, &solution.x).unwrap(),
                solution.residual,
                epsilon = 1e-8,
            );
        }
    }
}

#[test]
fn ranks_are_reusable() {
    let matrix = generator::diagonally_dominant(6, 8, Direction::ColumnWise, Some(9));
    let rhs = SparseVector::from_dense(&[1_f64; 6], Direction::ColumnWise);
    let config = SolverConfig::default();

    let results = on_coordinator(3, &config, |node| {
        let first = node.cg(node.role(|| (matrix.clone(), rhs.clone())))?;
        let product = node.mul(node.role(|| (matrix.clone(), matrix.clone())))?;
        let second = node.cg(node.role(|| (matrix.clone(), rhs.clone())))?;
        Ok(first.zip(product).zip(second))
    }).unwrap();

    let ((first, product), second) = results;
    assert_eq!(first, second);
    assert_eq!(product, matrix.try_mul(&matrix).unwrap());
}
