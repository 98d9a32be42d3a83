//! # Protocol driver
//!
//! Every distributed operation runs the same three steps on every rank: the coordinator decides
//! how to run it, broadcasts that decision, and then all ranks branch into the matching code.
//! Operations only describe their own part of each step by implementing `Operation`; the driver
//! makes sure no rank ever takes a different branch than the others.
use tracing::debug;

use crate::data::linear_algebra::MatrixError;
use crate::distributed::communicator::{COORDINATOR, Communicator, Tag};
use crate::distributed::wire;

/// What a rank brings to an operation.
#[derive(Clone, Debug, PartialEq)]
pub enum Role<T> {
    /// The coordinator holds the operands.
    Coordinator(T),
    /// Workers get everything they need over the wire.
    Worker,
}

impl<T> Role<T> {
    /// Transform the operands, if any.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Role<U> {
        match self {
            Role::Coordinator(operands) => Role::Coordinator(f(operands)),
            Role::Worker => Role::Worker,
        }
    }
}

/// How all ranks are going to run an operation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Decision {
    /// The coordinator computes the result alone; workers are idle.
    Sequential,
    /// The operands are split over the workers.
    Distributed,
    /// The operands are invalid; nobody computes anything.
    Abort,
}

/// An operation that can be run sequentially or by the coordinator together with all workers.
pub trait Operation: Sized {
    /// Name used in log messages.
    const NAME: &'static str;
    /// What the coordinator ends up with.
    type Output;

    /// Check the operands before any work is done.
    ///
    /// An error here is returned to the caller on the coordinator, while workers are told to
    /// abort.
    fn validate(&self) -> Result<(), MatrixError>;
    /// Size of the dimension the work is split along.
    fn extent(&self) -> usize;
    /// Compute the result on the coordinator alone.
    fn sequential(self) -> Result<Self::Output, MatrixError>;
    /// The coordinator side of the distributed computation.
    ///
    /// Everything the workers need is sent before anything is received from them, so a failure
    /// on the coordinator never leaves a worker waiting for its input.
    fn coordinate(self, communicator: &Communicator) -> Result<Self::Output, MatrixError>;
    /// The worker side of the distributed computation.
    fn work(communicator: &Communicator) -> Result<(), MatrixError>;
}

/// Runs operations on one rank.
pub struct Protocol<'a> {
    communicator: &'a Communicator,
}

impl<'a> Protocol<'a> {
    /// Drive operations over `communicator`.
    pub fn new(communicator: &'a Communicator) -> Self {
        Self { communicator }
    }

    /// Whether an operation of `extent` is worth distributing.
    ///
    /// Distribution needs at least one worker, and every worker should get at least one vector.
    #[must_use]
    pub fn decide(&self, extent: usize) -> Decision {
        let size = self.communicator.size();
        if size == 1 || extent < size {
            Decision::Sequential
        } else {
            Decision::Distributed
        }
    }

    /// Run an operation, all ranks should call this at the same point in their program.
    ///
    /// # Arguments
    ///
    /// * `role`: The operands on the coordinator, nothing on the workers.
    ///
    /// # Return value
    ///
    /// The result on the coordinator, `None` on the workers.
    pub fn execute<O: Operation>(&self, role: Role<O>) -> Result<Option<O::Output>, MatrixError> {
        let communicator = self.communicator;
        match role {
            Role::Coordinator(operation) => {
                let epoch = communicator.begin_step();

                if let Err(error) = operation.validate() {
                    debug!(operation = O::NAME, epoch, %error, "aborting");
                    communicator.broadcast(Tag::Decision, &wire::encode_decision(Decision::Abort))?;
                    return Err(error);
                }

                let decision = self.decide(operation.extent());
                debug!(operation = O::NAME, epoch, extent = operation.extent(), ?decision, "decided");
                communicator.broadcast(Tag::Decision, &wire::encode_decision(decision))?;

                match decision {
                    Decision::Distributed => operation.coordinate(communicator).map(Some),
                    _ => operation.sequential().map(Some),
                }
            },
            Role::Worker => {
                let decision = wire::decode_decision(&communicator.await_step(Tag::Decision)?)?;
                debug!(operation = O::NAME, rank = communicator.rank(), epoch = communicator.epoch(), ?decision, "received decision");

                match decision {
                    Decision::Sequential => Ok(None),
                    Decision::Abort => Err(MatrixError::Aborted),
                    Decision::Distributed => match O::work(communicator) {
                        Ok(()) => Ok(None),
                        Err(error) => {
                            debug!(operation = O::NAME, rank = communicator.rank(), %error, "work failed");
                            communicator.send_failure(COORDINATOR, &error);
                            Err(error)
                        },
                    },
                }
            },
        }
    }
}

#[cfg(test)]
mod test {
    use crate::data::linear_algebra::MatrixError;
    use crate::data::linear_algebra::matrix::block_sizes;
    use crate::distributed::communicator::{COORDINATOR, Communicator, Tag, World};
    use crate::distributed::protocol::{Decision, Operation, Protocol, Role};
    use crate::distributed::wire::{decode_index, encode_index};

    /// Sums numbers, workers refuse anything above a hundred.
    struct Total(Vec<usize>);

    impl Operation for Total {
        const NAME: &'static str = "total";
        type Output = usize;

        fn validate(&self) -> Result<(), MatrixError> {
            if self.0.is_empty() {
                Err(MatrixError::dimensions("total", (0, 0), (1, 1)))
            } else {
                Ok(())
            }
        }

        fn extent(&self) -> usize {
            self.0.len()
        }

        fn sequential(self) -> Result<Self::Output, MatrixError> {
            Ok(self.0.into_iter().sum())
        }

        fn coordinate(self, communicator: &Communicator) -> Result<Self::Output, MatrixError> {
            let mut values = self.0.into_iter();
            for (worker, count) in communicator.workers().zip(block_sizes(values.len(), communicator.size() - 1)) {
                communicator.send(worker, Tag::Index, encode_index(count)?)?;
                for value in values.by_ref().take(count) {
                    communicator.send(worker, Tag::Index, encode_index(value)?)?;
                }
            }

            communicator.workers()
                .map(|worker| decode_index(&communicator.receive(worker, Tag::Index)?))
                .sum()
        }

        fn work(communicator: &Communicator) -> Result<(), MatrixError> {
            let count = decode_index(&communicator.receive(COORDINATOR, Tag::Index)?)?;
            let mut total = 0;
            for _ in 0..count {
                let value = decode_index(&communicator.receive(COORDINATOR, Tag::Index)?)?;
                if value > 100 {
                    return Err(MatrixError::IndexOutOfBounds { index: value, length: 100 });
                }
                total += value;
            }
            communicator.send(COORDINATOR, Tag::Index, encode_index(total)?)
        }
    }

    fn run(size: usize, values: Vec<usize>) -> Vec<Result<Option<usize>, MatrixError>> {
        World::new(size).run(|communicator| {
            let role = if communicator.is_coordinator() {
                Role::Coordinator(Total(values.clone()))
            } else {
                Role::Worker
            };
            Protocol::new(&communicator).execute(role)
        }).unwrap()
    }

    #[test]
    fn decide() {
        let communicators = Communicator::connect(3);
        let protocol = Protocol::new(&communicators[0]);
        assert_eq!(protocol.decide(2), Decision::Sequential);
        assert_eq!(protocol.decide(3), Decision::Distributed);

        let alone = Communicator::connect(1);
        assert_eq!(Protocol::new(&alone[0]).decide(100), Decision::Sequential);
    }

    #[test]
    fn map() {
        assert_eq!(Role::Coordinator(2).map(|x| x * 3), Role::Coordinator(6));
        assert_eq!(Role::<i32>::Worker.map(|x| x * 3), Role::Worker);
    }

    #[test]
    fn sequential_and_distributed_agree() {
        let values = (1..=10).collect::<Vec<_>>();
        for size in 1..=5 {
            let results = run(size, values.clone());
            assert_eq!(results[0], Ok(Some(55)));
            for result in &results[1..] {
                assert_eq!(*result, Ok(None));
            }
        }
    }

    #[test]
    fn abort() {
        let results = run(3, Vec::new());
        assert!(matches!(results[0], Err(MatrixError::DimensionMismatch { .. })));
        assert_eq!(results[1], Err(MatrixError::Aborted));
        assert_eq!(results[2], Err(MatrixError::Aborted));
    }

    #[test]
    fn worker_failure() {
        let results = run(3, vec![1, 2, 3, 400]);
        assert!(matches!(results[0], Err(MatrixError::RemoteFailure { rank: 2, .. })));
        assert_eq!(results[1], Ok(None));
        assert!(matches!(results[2], Err(MatrixError::IndexOutOfBounds { index: 400, .. })));
    }

    #[test]
    fn consecutive_operations() {
        let results = World::new(3).run(|communicator| {
            let protocol = Protocol::new(&communicator);
            let role = |values: Vec<usize>| if communicator.is_coordinator() {
                Role::Coordinator(Total(values))
            } else {
                Role::Worker
            };

            let failed = protocol.execute(role(vec![500, 1, 1]));
            let next = protocol.execute(role(vec![4, 5, 6]));
            (failed.is_err(), next)
        }).unwrap();

        assert!(results[0].0);
        assert_eq!(results[0].1, Ok(Some(15)));
        assert_eq!(results[1].1, Ok(None));
        assert_eq!(results[2].1, Ok(None));
    }
}
