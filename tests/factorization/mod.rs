use sparse_spmd::algorithm::triangular::solve_lower_upper;
use sparse_spmd::config::SolverConfig;
use sparse_spmd::data::linear_algebra::{Direction, Element, MatrixError};
use sparse_spmd::data::linear_algebra::matrix::{DenseMatrix, SparseMatrix, generator};
use sparse_spmd::data::linear_algebra::vector::SparseVector;

use crate::{MAX_RANKS, on_coordinator};

#[test]
fn lu_reconstructs() {
    let matrix = generator::diagonally_dominant(12, 20, Direction::RowWise, Some(31));

    for size in 1..=MAX_RANKS {
        let factors = on_coordinator(size, &SolverConfig::default(), |node| {
            node.lu(node.role(|| matrix.clone()))
        }).unwrap();

        for element in factors.lower.elements() {
            assert!(element.row >= element.col);
            if element.row == element.col {
                assert_eq!(element.value, 1_f64);
            }
        }
        assert!(factors.upper.elements().iter().all(|element| element.row <= element.col));
        assert_eq!(factors.lower.try_mul(&factors.upper).unwrap(), matrix);
    }
}

#[test]
fn lu_solves() {
    let matrix = generator::diagonally_dominant(8, 10, Direction::ColumnWise, Some(2));
    let x = SparseVector::from_dense(
        &[1_f64, -1_f64, 2_f64, 0_f64, 0.5, 3_f64, -2_f64, 1_f64],
        Direction::ColumnWise,
    );
    let rhs = matrix.try_mul_vector(&x).unwrap();

    let factors = on_coordinator(3, &SolverConfig::default(), |node| {
        node.lu(node.role(|| matrix.clone()))
    }).unwrap();

    assert_eq!(solve_lower_upper(&factors.lower, &factors.upper, &rhs).unwrap(), x);
}

#[test]
fn ilu_keeps_the_pattern() {
    let matrix = generator::diagonally_dominant(10, 12, Direction::ColumnWise, Some(17));

    for size in 1..=MAX_RANKS {
        let factors = on_coordinator(size, &SolverConfig::default(), |node| {
            node.ilu(node.role(|| matrix.clone()))
        }).unwrap();

        // Off the diagonal, values only appear where the matrix has them.
        for element in factors.lower.elements().into_iter().filter(|e| e.row > e.col) {
            assert_ne!(matrix.get(element.col, element.row), Ok(0_f64));
        }
        for element in factors.upper.elements().into_iter().filter(|e| e.row < e.col) {
            assert_ne!(matrix.get(element.col, element.row), Ok(0_f64));
        }
    }
}

#[test]
fn zero_pivot_fails() {
    let matrix = SparseMatrix::from_elements(vec![
        Element::new(1, 0, 1_f64),
        Element::new(0, 1, 1_f64),
        Element::new(2, 2, 1_f64),
    ], Direction::ColumnWise);

    let result = on_coordinator(1, &SolverConfig::default(), |node| {
        node.lu(node.role(|| matrix.clone()))
    });
    assert_eq!(result, Err(MatrixError::SingularPivot { index: 0 }));
}

#[test]
fn inverse_of_lower_triangular() {
    let matrix = generator::diagonally_dominant(9, 14, Direction::ColumnWise, Some(4));
    let lower = {
        let factors = on_coordinator(1, &SolverConfig::default(), |node| {
            node.lu(node.role(|| matrix.clone()))
        }).unwrap();
        // Scale the diagonal away from one.
        factors.lower.try_add(&SparseMatrix::identity(9, Direction::ColumnWise)).unwrap()
    };

    for size in 1..=MAX_RANKS {
        let inverse = on_coordinator(size, &SolverConfig::default(), |node| {
            node.inverse(node.role(|| lower.clone()))
        }).unwrap();

        assert_eq!(inverse.direction(), Direction::ColumnWise);
        assert_eq!(DenseMatrix::identity(9), lower.try_mul(&inverse).unwrap());
    }
}
