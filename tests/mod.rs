//! # Integration tests
//!
//! Integration tests completely external from the crate. All code written in this module could be
//! written by an external user of the crate.
//!
//! Every test runs the same program on worlds of one up to `MAX_RANKS` ranks, so that both the
//! sequential and the distributed paths are covered.
use sparse_spmd::algorithm::Node;
use sparse_spmd::config::SolverConfig;
use sparse_spmd::data::linear_algebra::MatrixError;
use sparse_spmd::distributed::World;

mod arithmetic;
mod factorization;
mod solver;

/// Largest world size tested.
const MAX_RANKS: usize = 5;

/// Run `program` on `size` ranks and return what the coordinator got.
///
/// Panics when a worker ends with an error or with a result.
fn on_coordinator<T, F>(size: usize, config: &SolverConfig, program: F) -> Result<T, MatrixError>
where
    T: Send,
    F: Fn(&Node) -> Result<Option<T>, MatrixError> + Sync,
{
    let mut results = World::new(size).run(|communicator| {
        let node = Node::with_config(communicator, config.clone());
        program(&node)
    }).unwrap();

    for (rank, result) in results.iter().enumerate().skip(1) {
        assert!(matches!(result, Ok(None)), "rank {rank} did not finish cleanly");
    }
    results.swap_remove(0).map(|output| output.unwrap())
}
