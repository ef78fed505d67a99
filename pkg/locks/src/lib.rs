//! Centralized lock coordination.
//!
//! One coordinator process holds the authoritative lease table; replicas
//! acquire a lease before mutating a seat and release it afterwards. Leases
//! self-terminate at their expiry, reaped by a background sweep, so a crashed
//! holder cannot strand a resource forever.

pub mod coordinator;

pub use coordinator::LockCoordinator;
