//! # Random matrices
//!
//! Used to produce test input of arbitrary size.
use std::collections::HashSet;

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::data::linear_algebra::{Direction, Element};
use crate::data::linear_algebra::matrix::SparseMatrix;

fn rng(seed: Option<u64>) -> StdRng {
    seed.map(StdRng::seed_from_u64).unwrap_or_else(StdRng::from_entropy)
}

/// A matrix with `nnz` nonzero values at distinct, uniformly drawn positions.
///
/// The values are integers from `1` through `9`.
///
/// # Arguments
///
/// * `width`, `height`: Dimensions of the matrix.
/// * `nnz`: Number of nonzero values, capped at `width * height`.
/// * `direction`: Storage direction.
/// * `seed`: Seed for reproducible output, or `None` to draw from entropy.
#[must_use]
pub fn uniform(
    width: usize,
    height: usize,
    nnz: usize,
    direction: Direction,
    seed: Option<u64>,
) -> SparseMatrix {
    let mut rng = rng(seed);
    let nnz = nnz.min(width * height);

    let mut positions = HashSet::with_capacity(nnz);
    let mut elements = Vec::with_capacity(nnz);
    while elements.len() < nnz {
        let (col, row) = (rng.gen_range(0..width), rng.gen_range(0..height));
        if positions.insert((col, row)) {
            elements.push(Element::new(col, row, f64::from(rng.gen_range(1..=9_u8))));
        }
    }

    SparseMatrix::with_dimensions(elements, width, height, direction)
}

/// A symmetric, strictly diagonally dominant matrix with a positive diagonal.
///
/// Such a matrix is positive definite and has no zero pivots, so it can be factorized without
/// pivoting and solved with conjugate gradients.
///
/// # Arguments
///
/// * `size`: Number of rows and columns.
/// * `off_diagonal`: Number of nonzero pairs below (and mirrored above) the diagonal.
/// * `direction`: Storage direction.
/// * `seed`: Seed for reproducible output, or `None` to draw from entropy.
#[must_use]
pub fn diagonally_dominant(
    size: usize,
    off_diagonal: usize,
    direction: Direction,
    seed: Option<u64>,
) -> SparseMatrix {
    let mut rng = rng(seed);
    let off_diagonal = off_diagonal.min(size * size.saturating_sub(1) / 2);

    let mut positions = HashSet::with_capacity(off_diagonal);
    let mut row_sums = vec![0_f64; size];
    let mut elements = Vec::with_capacity(2 * off_diagonal + size);
    while positions.len() < off_diagonal {
        let (col, row) = (rng.gen_range(0..size), rng.gen_range(0..size));
        if col < row && positions.insert((col, row)) {
            let value = -f64::from(rng.gen_range(1..=9_u8));
            elements.push(Element::new(col, row, value));
            elements.push(Element::new(row, col, value));
            row_sums[row] += value.abs();
            row_sums[col] += value.abs();
        }
    }
    elements.extend(row_sums.into_iter()
        .enumerate()
        .map(|(i, sum)| Element::new(i, i, sum + f64::from(rng.gen_range(1..=9_u8)))));

    SparseMatrix::with_dimensions(elements, size, size, direction)
}

#[cfg(test)]
mod test {
    use crate::data::linear_algebra::Direction;
    use crate::data::linear_algebra::matrix::generator::{diagonally_dominant, uniform};

    #[test]
    fn uniform_count_and_range() {
        let m = uniform(6, 4, 10, Direction::RowWise, Some(1));
        assert_eq!(m.shape(), (6, 4));
        assert_eq!(m.nnz(), 10);
        assert!(m.elements().iter().all(|e| (1_f64..=9_f64).contains(&e.value)));

        assert_eq!(uniform(2, 2, 100, Direction::ColumnWise, Some(1)).nnz(), 4);
        assert_eq!(uniform(6, 4, 10, Direction::RowWise, Some(1)), m);
    }

    #[test]
    fn dominant_is_symmetric() {
        let m = diagonally_dominant(8, 10, Direction::ColumnWise, Some(5));
        assert_eq!(m.nnz(), 28);
        assert_eq!(m.clone().transpose(), m);
        for i in 0..8 {
            let diagonal = m.get(i, i).unwrap();
            let off = m[i].iter().filter(|&&(j, _)| j != i).map(|(_, v)| v.abs()).sum::<f64>();
            assert!(diagonal > off);
        }
    }
}
