//! # Partitioning
//!
//! Cutting a matrix into contiguous blocks along its outer sequence, so that each worker gets a
//! range of columns (or rows), and putting such blocks back together.
use crate::data::linear_algebra::{Direction, Element, MatrixError};
use crate::data::linear_algebra::matrix::SparseMatrix;

/// A contiguous range of the vectors of a larger matrix.
///
/// The matrix inside uses local indices along the outer sequence: its vector `0` is vector
/// `offset` of the matrix it was cut from. The inner dimension is not changed.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    /// The vectors of this block.
    pub matrix: SparseMatrix,
    /// Index of the first vector of this block within the original matrix.
    pub offset: usize,
}

impl Block {
    /// Number of vectors in this block.
    #[must_use]
    pub fn count(&self) -> usize {
        self.matrix.major_len()
    }

    /// Whether global vector index `index` falls within this block.
    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        self.offset <= index && index < self.offset + self.count()
    }

    /// The values of this block at their position in the original matrix.
    #[must_use]
    pub fn global_elements(&self) -> Vec<Element> {
        let direction = self.matrix.direction();
        self.matrix.elements().into_iter()
            .map(|element| Element::from_major_minor(
                direction,
                element.major(direction) + self.offset,
                element.minor(direction),
                element.value,
            ))
            .collect()
    }
}

/// Sizes of `n` contiguous parts of `total` items, differing by at most one.
///
/// The first `total % n` parts get the extra item.
#[must_use]
pub fn block_sizes(total: usize, n: usize) -> Vec<usize> {
    debug_assert!(n > 0);

    let (base, remainder) = (total / n, total % n);
    (0..n).map(|i| base + usize::from(i < remainder)).collect()
}

impl SparseMatrix {
    /// Partition the outer sequence into `n` contiguous blocks.
    ///
    /// The columns are partitioned for a column-wise matrix, the rows for a row-wise one. Block
    /// sizes differ by at most one, and blocks are empty when there are fewer vectors than blocks.
    ///
    /// # Arguments
    ///
    /// * `n`: Number of blocks, at least one.
    ///
    /// # Return value
    ///
    /// The blocks, ordered by offset.
    #[must_use]
    pub fn split_to_n(&self, n: usize) -> Vec<Block> {
        let direction = self.direction();
        let mut offset = 0;

        block_sizes(self.major_len(), n).into_iter()
            .map(|count| {
                let vectors = self.vectors()[offset..offset + count].to_vec();
                let (width, height) = match direction {
                    Direction::ColumnWise => (count, self.height()),
                    Direction::RowWise => (self.width(), count),
                };
                let block = Block {
                    matrix: SparseMatrix::from_vectors(vectors, width, height, direction),
                    offset,
                };
                offset += count;
                block
            })
            .collect()
    }

    /// Put blocks cut by `split_to_n` back together.
    ///
    /// # Arguments
    ///
    /// * `blocks`: Blocks in any order, all of the same direction and inner dimension.
    /// * `width`: Number of columns of the result.
    /// * `height`: Number of rows of the result.
    ///
    /// # Return value
    ///
    /// The matrix, or an error if a block doesn't fit within the given dimensions.
    pub fn from_blocks(
        blocks: Vec<Block>,
        width: usize,
        height: usize,
        direction: Direction,
    ) -> Result<Self, MatrixError> {
        let mut result = SparseMatrix::new(width, height, direction);
        for block in blocks {
            let (block_width, block_height) = block.matrix.shape();
            let fits = match direction {
                Direction::ColumnWise => block.offset + block_width <= width && block_height == height,
                Direction::RowWise => block.offset + block_height <= height && block_width == width,
            };
            if !fits || block.matrix.direction() != direction {
                return Err(MatrixError::dimensions("from_blocks", (width, height), (block_width, block_height)));
            }

            for element in block.global_elements() {
                result.shift_value(element);
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use crate::data::linear_algebra::{Direction, Element};
    use crate::data::linear_algebra::matrix::{generator, SparseMatrix};
    use crate::data::linear_algebra::matrix::partition::block_sizes;

    fn element_set(elements: Vec<Element>) -> HashSet<(usize, usize, u64)> {
        elements.into_iter().map(|e| (e.col, e.row, e.value.to_bits())).collect()
    }

    #[test]
    fn sizes() {
        assert_eq!(block_sizes(10, 3), vec![4, 3, 3]);
        assert_eq!(block_sizes(2, 4), vec![1, 1, 0, 0]);
        assert_eq!(block_sizes(0, 2), vec![0, 0]);
        assert_eq!(block_sizes(7, 1), vec![7]);
    }

    #[test]
    fn split_reassemble() {
        for direction in [Direction::ColumnWise, Direction::RowWise] {
            let m = generator::uniform(7, 5, 12, direction, Some(3));
            for n in 1..=8 {
                let blocks = m.split_to_n(n);
                assert_eq!(blocks.len(), n);

                let counts = blocks.iter().map(|b| b.count()).collect::<Vec<_>>();
                let (min, max) = (counts.iter().min().unwrap(), counts.iter().max().unwrap());
                assert!(max - min <= 1);
                assert_eq!(counts.iter().sum::<usize>(), m.major_len());

                let mut offset = 0;
                for block in &blocks {
                    assert_eq!(block.offset, offset);
                    assert_eq!(block.matrix.minor_len(), m.minor_len());
                    offset += block.count();
                }

                let elements = blocks.iter().flat_map(|b| b.global_elements()).collect::<Vec<_>>();
                assert_eq!(elements.len(), m.nnz());
                assert_eq!(element_set(elements), element_set(m.elements()));

                let (width, height) = m.shape();
                assert_eq!(SparseMatrix::from_blocks(blocks, width, height, direction).unwrap(), m);
            }
        }
    }

    #[test]
    fn contains() {
        let m = SparseMatrix::identity(5, Direction::ColumnWise);
        let blocks = m.split_to_n(2);
        assert!(blocks[0].contains(2));
        assert!(!blocks[0].contains(3));
        assert!(blocks[1].contains(3));
        assert_eq!(blocks[1].global_elements()[0], Element::new(3, 3, 1_f64));
    }

    #[test]
    fn reassemble_rejects_foreign_block() {
        let m = SparseMatrix::identity(4, Direction::ColumnWise);
        let blocks = m.split_to_n(2);
        assert!(SparseMatrix::from_blocks(blocks, 3, 4, Direction::ColumnWise).is_err());
    }
}
