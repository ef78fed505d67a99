//! The seat-reservation state machine and the critical-section primitives it
//! runs under.
//!
//! Every mutation follows the same shape (lock the seat's critical section,
//! read the authoritative row, decide, write it back, release) and only the
//! lock primitive differs between the centralized and decentralized variants.

pub mod lock;
pub mod service;

pub use lock::{CoordinatorLock, LockFailure, RaLock, SeatLock};
pub use service::{ReservationError, ReservationService};
