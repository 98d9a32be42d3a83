//! # Communicator
//!
//! Point-to-point messaging between a fixed set of ranks that share no memory. Each rank owns a
//! `Communicator` with a private channel to and from every other rank, so messages between two
//! ranks arrive in the order they were sent.
//!
//! Every step of the protocol runs in an epoch chosen by the coordinator. Workers adopt the epoch
//! of the step they are told to start, which lets them recognize leftovers of a step that was
//! abandoned halfway.
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::ops::Range;
use std::thread;

use crossbeam::channel::{Receiver, Select, Sender, unbounded};
use tracing::{debug, trace};

use crate::data::linear_algebra::MatrixError;

/// The rank that decides, distributes and reduces.
pub const COORDINATOR: usize = 0;

/// What a message contains.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Tag {
    /// Sequential, distributed or abort.
    Decision,
    /// Residual of an iteration and whether to stop.
    Residual,
    /// A matrix or matrix block.
    Matrix,
    /// A vector.
    Vector,
    /// A single index, like the offset of a block.
    Index,
    /// An eliminated pivot column with its index.
    Pivot,
    /// The text of an error on the sending rank.
    Failure,
}

/// A message together with where it came from.
#[derive(Clone, Debug)]
pub struct Envelope {
    /// Epoch of the step the message belongs to.
    pub epoch: u64,
    /// Rank of the sender.
    pub source: usize,
    /// Kind of content.
    pub tag: Tag,
    /// Encoded content.
    pub payload: Vec<u8>,
}

enum Sorted {
    Current(Vec<u8>),
    Stale,
    Early(Envelope),
}

/// The endpoints of one rank.
pub struct Communicator {
    rank: usize,
    size: usize,
    epoch: Cell<u64>,
    /// Indexed by destination.
    senders: Vec<Sender<Envelope>>,
    /// Indexed by source.
    receivers: Vec<Receiver<Envelope>>,
    /// Envelopes of a later epoch that were received before this rank got there, by source.
    early: RefCell<Vec<VecDeque<Envelope>>>,
}

impl Communicator {
    /// Connect `size` ranks with each other.
    ///
    /// # Return value
    ///
    /// One communicator per rank, in rank order.
    #[must_use]
    pub fn connect(size: usize) -> Vec<Self> {
        debug_assert!(size > 0);

        let mut senders = vec![Vec::with_capacity(size); size];
        let mut receivers = vec![Vec::with_capacity(size); size];
        for source in 0..size {
            for destination in 0..size {
                let (sender, receiver) = unbounded();
                senders[source].push(sender);
                receivers[destination].push(receiver);
            }
        }

        senders.into_iter()
            .zip(receivers)
            .enumerate()
            .map(|(rank, (senders, receivers))| Self {
                rank,
                size,
                epoch: Cell::new(0),
                senders,
                receivers,
                early: RefCell::new(vec![VecDeque::new(); size]),
            })
            .collect()
    }

    /// Index of this rank.
    #[must_use]
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Total number of ranks.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether this rank is the coordinator.
    #[must_use]
    pub fn is_coordinator(&self) -> bool {
        self.rank == COORDINATOR
    }

    /// Ranks of all workers.
    pub fn workers(&self) -> Range<usize> {
        1..self.size
    }

    /// The epoch of the step this rank is in.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch.get()
    }

    /// Start a new step. Only called by the coordinator.
    pub fn begin_step(&self) -> u64 {
        debug_assert!(self.is_coordinator());

        let epoch = self.epoch.get() + 1;
        self.epoch.set(epoch);
        epoch
    }

    /// Send a message to another rank.
    pub fn send(&self, destination: usize, tag: Tag, payload: Vec<u8>) -> Result<(), MatrixError> {
        debug_assert_ne!(destination, self.rank);
        trace!(rank = self.rank, destination, ?tag, bytes = payload.len(), "send");

        let envelope = Envelope { epoch: self.epoch.get(), source: self.rank, tag, payload };
        self.senders[destination].send(envelope)
            .map_err(|_| MatrixError::Disconnected { rank: destination })
    }

    /// Send the same message to all workers. Only called by the coordinator.
    pub fn broadcast(&self, tag: Tag, payload: &[u8]) -> Result<(), MatrixError> {
        debug_assert!(self.is_coordinator());

        for worker in self.workers() {
            self.send(worker, tag, payload.to_vec())?;
        }
        Ok(())
    }

    /// Tell another rank that this rank failed.
    ///
    /// A rank that is gone doesn't need to be told, so that is not an error.
    pub fn send_failure(&self, destination: usize, error: &MatrixError) {
        if self.send(destination, Tag::Failure, error.to_string().into_bytes()).is_err() {
            debug!(rank = self.rank, destination, "could not report failure, rank is gone");
        }
    }

    fn sort(&self, envelope: Envelope, tag: Tag) -> Result<Sorted, MatrixError> {
        let epoch = self.epoch.get();
        if envelope.epoch < epoch {
            trace!(rank = self.rank, source = envelope.source, tag = ?envelope.tag, epoch = envelope.epoch, "discarding stale message");
            return Ok(Sorted::Stale);
        }
        if envelope.epoch > epoch {
            return Ok(Sorted::Early(envelope));
        }

        match envelope.tag {
            Tag::Failure => Err(MatrixError::RemoteFailure {
                rank: envelope.source,
                message: String::from_utf8_lossy(&envelope.payload).into_owned(),
            }),
            received if received == tag => Ok(Sorted::Current(envelope.payload)),
            received => Err(MatrixError::ProtocolViolation(format!(
                "rank {} expected {tag:?} from rank {} but received {received:?}",
                self.rank, envelope.source,
            ))),
        }
    }

    fn next_from(&self, source: usize) -> Result<Envelope, MatrixError> {
        let early = self.early.borrow_mut()[source].pop_front();
        match early {
            Some(envelope) => Ok(envelope),
            None => self.receivers[source].recv().map_err(|_| MatrixError::Disconnected { rank: source }),
        }
    }

    /// Receive a message of the current step from a specific rank.
    pub fn receive(&self, source: usize, tag: Tag) -> Result<Vec<u8>, MatrixError> {
        debug_assert_ne!(source, self.rank);

        loop {
            let envelope = self.next_from(source)?;
            match self.sort(envelope, tag)? {
                Sorted::Current(payload) => {
                    trace!(rank = self.rank, source, ?tag, bytes = payload.len(), "receive");
                    return Ok(payload);
                },
                Sorted::Stale => {},
                Sorted::Early(envelope) => {
                    let epoch = envelope.epoch;
                    self.early.borrow_mut()[source].push_front(envelope);
                    return Err(MatrixError::ProtocolViolation(format!(
                        "rank {} expected {tag:?} from rank {source} in epoch {} but it is already in epoch {epoch}",
                        self.rank, self.epoch.get(),
                    )));
                },
            }
        }
    }

    /// Receive a message of the current step from whichever of `sources` sends one first.
    ///
    /// Sources that are closed, or that already moved on to a later step, are no longer waited
    /// on.
    ///
    /// # Return value
    ///
    /// The rank that sent the message and the message.
    pub fn receive_any(&self, sources: &[usize], tag: Tag) -> Result<(usize, Vec<u8>), MatrixError> {
        let mut active = sources.iter()
            .copied()
            .filter(|&source| self.early.borrow()[source].is_empty())
            .collect::<Vec<_>>();

        loop {
            if active.is_empty() {
                return Err(MatrixError::ProtocolViolation(format!(
                    "rank {} waits for {tag:?} but none of ranks {sources:?} can send it", self.rank,
                )));
            }

            let mut select = Select::new();
            for &source in &active {
                select.recv(&self.receivers[source]);
            }
            let operation = select.select();
            let position = operation.index();
            let source = active[position];

            let Ok(envelope) = operation.recv(&self.receivers[source]) else {
                active.remove(position);
                continue;
            };
            match self.sort(envelope, tag)? {
                Sorted::Current(payload) => {
                    trace!(rank = self.rank, source, ?tag, bytes = payload.len(), "receive");
                    return Ok((source, payload));
                },
                Sorted::Stale => {},
                Sorted::Early(envelope) => {
                    self.early.borrow_mut()[source].push_back(envelope);
                    active.remove(position);
                },
            }
        }
    }

    /// Wait until the coordinator starts the next step. Only called by workers.
    ///
    /// Anything left over from the coordinator in the current or an older step is skipped. The
    /// epoch of the new step is adopted.
    ///
    /// # Return value
    ///
    /// The first message of the step, or the error the coordinator reported instead.
    pub fn await_step(&self, tag: Tag) -> Result<Vec<u8>, MatrixError> {
        debug_assert!(!self.is_coordinator());

        loop {
            let envelope = self.next_from(COORDINATOR)?;
            if envelope.epoch <= self.epoch.get() {
                trace!(rank = self.rank, tag = ?envelope.tag, epoch = envelope.epoch, "skipping message of a finished step");
                continue;
            }

            self.epoch.set(envelope.epoch);
            return match self.sort(envelope, tag)? {
                Sorted::Current(payload) => Ok(payload),
                Sorted::Stale | Sorted::Early(_) => Err(MatrixError::ProtocolViolation(
                    "epoch changed while adopting it".to_string(),
                )),
            };
        }
    }
}

/// A fixed number of ranks running the same program.
#[derive(Copy, Clone, Debug)]
pub struct World {
    size: usize,
}

impl World {
    /// A world of `size` ranks, at least one.
    #[must_use]
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "a world needs at least one rank");

        Self { size }
    }

    /// Number of ranks.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Run `program` on every rank, each on its own thread.
    ///
    /// # Return value
    ///
    /// The result of every rank in rank order, or an error if a rank panicked.
    pub fn run<T, F>(&self, program: F) -> Result<Vec<T>, MatrixError>
    where
        F: Fn(Communicator) -> T + Sync,
        T: Send,
    {
        let program = &program;
        thread::scope(|scope| {
            let handles = Communicator::connect(self.size).into_iter()
                .map(|communicator| scope.spawn(move || program(communicator)))
                .collect::<Vec<_>>();

            handles.into_iter()
                .enumerate()
                .map(|(rank, handle)| handle.join().map_err(|_| MatrixError::RankPanicked { rank }))
                .collect()
        })
    }
}

#[cfg(test)]
mod test {
    use crate::data::linear_algebra::MatrixError;
    use crate::distributed::communicator::{Communicator, Tag, World};

    #[test]
    fn connect() {
        let communicators = Communicator::connect(3);
        assert_eq!(communicators.len(), 3);
        for (rank, communicator) in communicators.iter().enumerate() {
            assert_eq!(communicator.rank(), rank);
            assert_eq!(communicator.size(), 3);
        }
        assert_eq!(communicators[0].workers().collect::<Vec<_>>(), vec![1, 2]);

        communicators[2].send(1, Tag::Index, vec![4]).unwrap();
        communicators[0].send(1, Tag::Index, vec![5]).unwrap();
        assert_eq!(communicators[1].receive(0, Tag::Index), Ok(vec![5]));
        assert_eq!(communicators[1].receive(2, Tag::Index), Ok(vec![4]));
    }

    #[test]
    fn stale_messages_are_skipped() {
        let communicators = Communicator::connect(2);
        let (coordinator, worker) = (&communicators[0], &communicators[1]);

        coordinator.begin_step();
        coordinator.broadcast(Tag::Decision, &[1]).unwrap();
        assert_eq!(worker.await_step(Tag::Decision), Ok(vec![1]));
        worker.send(0, Tag::Matrix, vec![1, 2, 3]).unwrap();

        // The coordinator abandons the step without reading the matrix.
        coordinator.begin_step();
        coordinator.broadcast(Tag::Decision, &[1]).unwrap();
        assert_eq!(worker.await_step(Tag::Decision), Ok(vec![1]));
        worker.send(0, Tag::Matrix, vec![4]).unwrap();
        assert_eq!(coordinator.receive(1, Tag::Matrix), Ok(vec![4]));
    }

    #[test]
    fn workers_skip_to_the_latest_step() {
        let communicators = Communicator::connect(2);
        let (coordinator, worker) = (&communicators[0], &communicators[1]);

        coordinator.begin_step();
        coordinator.broadcast(Tag::Decision, &[1]).unwrap();
        coordinator.send(1, Tag::Matrix, vec![0]).unwrap();
        coordinator.begin_step();
        coordinator.broadcast(Tag::Residual, &[9]).unwrap();

        assert_eq!(worker.await_step(Tag::Decision), Ok(vec![1]));
        assert_eq!(worker.await_step(Tag::Residual), Ok(vec![9]));
        assert_eq!(worker.epoch(), 2);
    }

    #[test]
    fn failures_and_violations() {
        let communicators = Communicator::connect(2);
        let (coordinator, worker) = (&communicators[0], &communicators[1]);

        worker.send_failure(0, &MatrixError::SingularPivot { index: 2 });
        assert_eq!(
            coordinator.receive(1, Tag::Matrix),
            Err(MatrixError::RemoteFailure { rank: 1, message: "zero pivot at index 2".to_string() }),
        );

        worker.send(0, Tag::Vector, Vec::new()).unwrap();
        assert!(matches!(coordinator.receive(1, Tag::Matrix), Err(MatrixError::ProtocolViolation(_))));
    }

    #[test]
    fn receive_any() {
        let communicators = Communicator::connect(4);
        communicators[2].send(3, Tag::Pivot, vec![2]).unwrap();
        assert_eq!(communicators[3].receive_any(&[1, 2], Tag::Pivot), Ok((2, vec![2])));
    }

    #[test]
    fn receive_any_without_sources() {
        let mut communicators = Communicator::connect(3);
        let last = communicators.pop().unwrap();
        drop(communicators);
        assert!(matches!(last.receive_any(&[1], Tag::Pivot), Err(MatrixError::ProtocolViolation(_))));
        assert_eq!(last.receive(0, Tag::Index), Err(MatrixError::Disconnected { rank: 0 }));
    }

    #[test]
    fn world() {
        let ranks = World::new(4).run(|communicator| communicator.rank() * 10).unwrap();
        assert_eq!(ranks, vec![0, 10, 20, 30]);

        let result = World::new(2).run(|communicator| {
            assert_ne!(communicator.rank(), 1);
        });
        assert_eq!(result, Err(MatrixError::RankPanicked { rank: 1 }));
    }
}
