use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use pkg_types::lease::Lease;
use pkg_types::seat::Seat;

use crate::{LeaseStore, SeatStore, StoreError, StoreResult};

/// HashMap-backed store implementing both [`SeatStore`] and [`LeaseStore`].
///
/// Used by tests; `set_fail_writes` forces every write to fail so the revert
/// paths can be driven deterministically.
#[derive(Default)]
pub struct MemoryStore {
    seats: RwLock<HashMap<u32, Seat>>,
    leases: RwLock<HashMap<String, Lease>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write return an error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("writes disabled".to_string()));
        }
        Ok(())
    }

    /// Number of persisted leases (test inspection).
    pub async fn lease_count(&self) -> usize {
        self.leases.read().await.len()
    }

    /// Persisted lease by id (test inspection).
    pub async fn lease(&self, lease_id: &str) -> Option<Lease> {
        self.leases.read().await.get(lease_id).cloned()
    }
}

#[async_trait]
impl SeatStore for MemoryStore {
    async fn get(&self, numero: u32) -> StoreResult<Option<Seat>> {
        Ok(self.seats.read().await.get(&numero).cloned())
    }

    async fn upsert(&self, seat: &Seat) -> StoreResult<()> {
        self.check_writable()?;
        self.seats.write().await.insert(seat.numero, seat.clone());
        Ok(())
    }

    async fn all(&self) -> StoreResult<Vec<Seat>> {
        Ok(self.seats.read().await.values().cloned().collect())
    }
}

#[async_trait]
impl LeaseStore for MemoryStore {
    async fn put(&self, lease: &Lease) -> StoreResult<()> {
        self.check_writable()?;
        self.leases
            .write()
            .await
            .insert(lease.id.clone(), lease.clone());
        Ok(())
    }

    async fn delete(&self, lease_id: &str) -> StoreResult<()> {
        self.check_writable()?;
        self.leases.write().await.remove(lease_id);
        Ok(())
    }
}
