//! # Distribution
//!
//! Ranks, the messages they exchange and the protocol that every distributed operation follows.
pub use communicator::{COORDINATOR, Communicator, Tag, World};
pub use protocol::{Decision, Operation, Protocol, Role};

pub mod communicator;
pub mod protocol;
pub mod router;
pub mod wire;
