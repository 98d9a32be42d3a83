use approx::assert_abs_diff_eq;

use sparse_spmd::config::SolverConfig;
use sparse_spmd::data::linear_algebra::{Direction, MatrixError};
use sparse_spmd::data::linear_algebra::matrix::{DenseMatrix, SparseMatrix, generator};
use sparse_spmd::data::linear_algebra::vector::SparseVector;

use crate::{MAX_RANKS, on_coordinator};

#[test]
fn sum_matches_sequential() {
    let left = generator::uniform(7, 6, 20, Direction::ColumnWise, Some(11));
    let right = generator::uniform(7, 6, 20, Direction::RowWise, Some(12));
    let expected = &DenseMatrix::from_sparse(&left) + &DenseMatrix::from_sparse(&right);

    for size in 1..=MAX_RANKS {
        let sum = on_coordinator(size, &SolverConfig::default(), |node| {
            node.add(node.role(|| (left.clone(), right.clone())))
        }).unwrap();

        assert_eq!(sum.direction(), Direction::ColumnWise);
        assert_eq!(expected, sum);
    }
}

#[test]
fn difference_with_itself_is_empty() {
    let matrix = generator::uniform(9, 4, 15, Direction::RowWise, Some(5));

    for size in 1..=MAX_RANKS {
        let difference = on_coordinator(size, &SolverConfig::default(), |node| {
            node.sub(node.role(|| (matrix.clone(), matrix.clone())))
        }).unwrap();

        assert_eq!(difference.shape(), (9, 4));
        assert_eq!(difference.nnz(), 0);
    }
}

#[test]
fn product_matches_dense() {
    let left = generator::uniform(8, 5, 16, Direction::ColumnWise, Some(1));
    let right = generator::uniform(6, 8, 18, Direction::RowWise, Some(2));
    let expected = &DenseMatrix::from_sparse(&left) * &DenseMatrix::from_sparse(&right);

    for size in 1..=MAX_RANKS {
        let product = on_coordinator(size, &SolverConfig::default(), |node| {
            node.mul(node.role(|| (left.clone(), right.clone())))
        }).unwrap();

        assert_eq!(product.shape(), (6, 5));
        assert_eq!(expected, product);
    }
}

#[test]
fn product_with_identity() {
    let matrix = generator::uniform(6, 6, 12, Direction::ColumnWise, Some(3));

    for size in 1..=MAX_RANKS {
        let product = on_coordinator(size, &SolverConfig::default(), |node| {
            node.mul(node.role(|| (matrix.clone(), SparseMatrix::identity(6, Direction::RowWise))))
        }).unwrap();

        assert_eq!(product, matrix);
    }
}

#[test]
fn matrix_vector_matches_sequential() {
    let matrix = generator::uniform(10, 7, 30, Direction::RowWise, Some(21));
    let vector = SparseVector::from_dense(
        &[1_f64, 0_f64, -2_f64, 0.5, 0_f64, 3_f64, 1_f64, 0_f64, 0_f64, 4_f64],
        Direction::ColumnWise,
    );
    let expected = matrix.try_mul_vector(&vector).unwrap();

    for size in 1..=MAX_RANKS {
        let product = on_coordinator(size, &SolverConfig::default(), |node| {
            node.mul_vector(node.role(|| (matrix.clone(), vector.clone())))
        }).unwrap();

        assert_eq!(product.len(), 7);
        for (x, y) in product.to_dense().into_iter().zip(expected.to_dense()) {
            assert_abs_diff_eq!(x, y, epsilon = 1e-10);
        }
    }
}

#[test]
fn mismatch_is_reported_on_every_size() {
    let left = SparseMatrix::identity(3, Direction::ColumnWise);
    let right = SparseMatrix::identity(4, Direction::ColumnWise);

    for size in 1..=MAX_RANKS {
        let result = on_coordinator(size, &SolverConfig::default(), |node| {
            let outcome = node.add(node.role(|| (left.clone(), right.clone())));
            // Workers are told to abort; report that as a clean finish.
            match outcome {
                Err(MatrixError::Aborted) => Ok(None),
                other => other,
            }
        });

        assert!(matches!(result, Err(MatrixError::DimensionMismatch { .. })));
    }
}

#[test]
fn transpose_is_an_involution() {
    for seed in 0..5 {
        let matrix = generator::uniform(7, 3, 10, Direction::ColumnWise, Some(seed));
        let transposed = matrix.clone().transpose();

        assert_eq!(transposed.shape(), (3, 7));
        for element in matrix.elements() {
            assert_eq!(transposed.get(element.row, element.col), Ok(element.value));
        }
        assert_eq!(transposed.transpose(), matrix);
    }
}

#[test]
fn split_and_reassemble() {
    let matrix = generator::uniform(11, 9, 40, Direction::ColumnWise, Some(8));

    for n in 1..=MAX_RANKS {
        let blocks = matrix.split_to_n(n);
        let counts = blocks.iter().map(|block| block.count()).collect::<Vec<_>>();
        assert_eq!(counts.iter().sum::<usize>(), 11);
        assert!(counts.iter().max().unwrap() - counts.iter().min().unwrap() <= 1);

        let back = SparseMatrix::from_blocks(blocks, 11, 9, Direction::ColumnWise).unwrap();
        assert_eq!(back, matrix);
    }
}
