//! # Pivot routing
//!
//! During a distributed factorization, every worker needs the eliminated pivot columns of all
//! workers before it, one pivot index at a time. Which of them sends a given pivot is known only
//! from the partition, and columns from different senders can arrive in any order. The router
//! collects whatever arrives and hands out columns by pivot index.
use std::collections::HashMap;

use tracing::trace;

use crate::data::linear_algebra::MatrixError;
use crate::data::linear_algebra::vector::SparseVector;
use crate::distributed::communicator::{Communicator, Tag};
use crate::distributed::wire;

/// Buffers pivot columns keyed by pivot index.
pub struct PivotRouter<'a> {
    communicator: &'a Communicator,
    producers: Vec<usize>,
    arrived: HashMap<usize, SparseVector>,
}

impl<'a> PivotRouter<'a> {
    /// Route the pivot columns sent by `producers`.
    pub fn new(communicator: &'a Communicator, producers: Vec<usize>) -> Self {
        Self { communicator, producers, arrived: HashMap::new() }
    }

    /// Number of columns that arrived but were not asked for yet.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.arrived.len()
    }

    /// Block until the column of pivot `pivot` is available.
    ///
    /// Columns of other pivots that arrive in the meantime are kept for later.
    pub fn wait_for(&mut self, pivot: usize) -> Result<SparseVector, MatrixError> {
        loop {
            if let Some(column) = self.arrived.remove(&pivot) {
                return Ok(column);
            }

            let (source, payload) = self.communicator.receive_any(&self.producers, Tag::Pivot)?;
            let (index, column) = wire::decode_pivot(&payload)?;
            trace!(rank = self.communicator.rank(), source, index, waiting_for = pivot, "pivot arrived");

            if self.arrived.insert(index, column).is_some() {
                return Err(MatrixError::ProtocolViolation(format!("pivot {index} arrived twice")));
            }
        }
    }
}

#[cfg(test)]
mod test {
    use crate::data::linear_algebra::{Direction, MatrixError};
    use crate::data::linear_algebra::vector::SparseVector;
    use crate::distributed::communicator::{Communicator, Tag};
    use crate::distributed::router::PivotRouter;
    use crate::distributed::wire::encode_pivot;

    fn column(value: f64) -> SparseVector {
        SparseVector::from_dense(&[value, 0_f64, 1_f64], Direction::ColumnWise)
    }

    #[test]
    fn out_of_order() {
        let communicators = Communicator::connect(4);
        communicators[2].send(3, Tag::Pivot, encode_pivot(2, &column(2_f64)).unwrap()).unwrap();
        communicators[1].send(3, Tag::Pivot, encode_pivot(0, &column(0.5)).unwrap()).unwrap();
        communicators[1].send(3, Tag::Pivot, encode_pivot(1, &column(1_f64)).unwrap()).unwrap();

        let mut router = PivotRouter::new(&communicators[3], vec![1, 2]);
        assert_eq!(router.wait_for(0).unwrap()[0], 0.5);
        assert_eq!(router.wait_for(1).unwrap()[0], 1_f64);
        assert_eq!(router.wait_for(2).unwrap()[0], 2_f64);
        assert_eq!(router.buffered(), 0);
    }

    #[test]
    fn failure_upstream() {
        let communicators = Communicator::connect(3);
        communicators[1].send_failure(2, &MatrixError::SingularPivot { index: 0 });

        let mut router = PivotRouter::new(&communicators[2], vec![1]);
        assert!(matches!(router.wait_for(0), Err(MatrixError::RemoteFailure { rank: 1, .. })));
    }
}
