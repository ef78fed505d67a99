//! Durable-store access for seats and lock leases.
//!
//! Both stores are traits so the coordinator and the reservation service can
//! run against MongoDB in a deployment and against [`memory::MemoryStore`]
//! in tests.

pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use thiserror::Error;

use pkg_types::lease::Lease;
use pkg_types::seat::Seat;

/// Errors surfaced by a store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),
    #[error("store serialization error: {0}")]
    Serialization(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Seat inventory, shared by every replica in a deployment.
#[async_trait]
pub trait SeatStore: Send + Sync {
    /// The seat with this number, if it exists.
    async fn get(&self, numero: u32) -> StoreResult<Option<Seat>>;

    /// Insert or replace the row for `seat.numero`.
    async fn upsert(&self, seat: &Seat) -> StoreResult<()>;

    /// Every seat in the store.
    async fn all(&self) -> StoreResult<Vec<Seat>>;
}

/// Write-through persistence for the coordinator's lease table.
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Insert or replace the document for `lease.id`.
    async fn put(&self, lease: &Lease) -> StoreResult<()>;

    /// Remove the document for this lease id. Removing an absent id is not
    /// an error.
    async fn delete(&self, lease_id: &str) -> StoreResult<()>;
}
