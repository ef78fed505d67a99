//! Decentralized mutual exclusion for the replica group.
//!
//! Implements the Ricart-Agrawala algorithm: a replica that wants the
//! critical section asks every peer for permission, and a peer withholds its
//! REPLY only while it has a better claim. Lamport timestamps with the node
//! id as tie-breaker give a total priority order, so exactly one replica can
//! hold the section at a time without any central coordinator.

pub mod node;
pub mod transport;

pub use node::{NodeState, RaNode};
pub use transport::{HttpTransport, MessageTransport, PeerDirectory};
