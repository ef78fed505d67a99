use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

use pkg_constants::seats::SEAT_RESOURCE_PREFIX;
use pkg_state::{SeatStore, StoreError, StoreResult};
use pkg_types::seat::Seat;

use crate::lock::{LockFailure, SeatLock};

/// Errors a reservation operation can surface to the HTTP edge.
#[derive(Debug, Error)]
pub enum ReservationError {
    #[error("seat not found")]
    NotFound,
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    LockDenied(String),
    #[error("lock service unavailable: {0}")]
    LockUnavailable(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// The seat state machine, executed inside the critical section.
///
/// The authoritative seat row lives in the shared store; the in-memory cache
/// only feeds reads outside any critical section and is refreshed on every
/// successful mutation and wholesale on [`list`].
///
/// [`list`]: ReservationService::list
pub struct ReservationService {
    server_id: String,
    store: Arc<dyn SeatStore>,
    lock: Arc<dyn SeatLock>,
    cache: RwLock<HashMap<u32, Seat>>,
}

impl ReservationService {
    pub fn new(server_id: String, store: Arc<dyn SeatStore>, lock: Arc<dyn SeatLock>) -> Self {
        Self {
            server_id,
            store,
            lock,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    /// Load existing seats and, if the store is empty, create `total`
    /// available seats. Restarting against a seeded store adds nothing.
    /// Returns how many seats were created.
    pub async fn seed(&self, total: u32) -> StoreResult<usize> {
        let existing = self.store.all().await?;
        let mut cache = self.cache.write().await;

        if !existing.is_empty() {
            info!("Loaded {} seats from the store", existing.len());
            for seat in existing {
                cache.insert(seat.numero, seat);
            }
            return Ok(0);
        }

        for numero in 1..=total {
            let seat = Seat::available(numero, &self.server_id);
            self.store.upsert(&seat).await?;
            cache.insert(numero, seat);
        }
        info!("Seeded {} seats for server {}", total, self.server_id);
        Ok(total as usize)
    }

    /// Reserve seat `numero` for `cliente`.
    pub async fn reserve(&self, numero: u32, cliente: &str) -> Result<String, ReservationError> {
        let resource = seat_resource(numero);
        self.acquire(&resource).await?;
        let result = self.reserve_locked(numero, cliente).await;
        self.lock.release(&resource).await;
        result
    }

    /// Return seat `numero` to the available pool.
    pub async fn free(&self, numero: u32) -> Result<String, ReservationError> {
        let resource = seat_resource(numero);
        self.acquire(&resource).await?;
        let result = self.free_locked(numero).await;
        self.lock.release(&resource).await;
        result
    }

    /// Refresh the cache from the store and return the snapshot ordered by
    /// seat number. Doubling as read-repair, this hides any divergence the
    /// cache accumulated since the last call.
    pub async fn list(&self) -> StoreResult<Vec<Seat>> {
        let mut seats = self.store.all().await?;

        let mut cache = self.cache.write().await;
        cache.clear();
        for seat in &seats {
            cache.insert(seat.numero, seat.clone());
        }
        drop(cache);

        seats.sort_by_key(|seat| seat.numero);
        Ok(seats)
    }

    /// Number of seats currently cached; used by the health endpoint.
    pub async fn seats_cached(&self) -> usize {
        self.cache.read().await.len()
    }

    async fn acquire(&self, resource: &str) -> Result<(), ReservationError> {
        self.lock.acquire(resource).await.map_err(|e| match e {
            LockFailure::Denied(message) => ReservationError::LockDenied(message),
            LockFailure::Unavailable(message) => ReservationError::LockUnavailable(message),
        })
    }

    /// The reserve step proper. Runs with the seat's critical section held:
    /// the read, the decision and the write must not interleave with another
    /// replica's.
    async fn reserve_locked(
        &self,
        numero: u32,
        cliente: &str,
    ) -> Result<String, ReservationError> {
        let Some(mut seat) = self.store.get(numero).await? else {
            return Err(ReservationError::NotFound);
        };
        if !seat.disponible {
            return Err(ReservationError::Conflict(format!(
                "seat {} is already taken",
                numero
            )));
        }

        seat.disponible = false;
        seat.cliente = cliente.to_string();
        seat.server_id = self.server_id.clone();
        seat.updated_at = Utc::now();

        // A failed write leaves the cache untouched, so the caller sees the
        // store's (unchanged) truth on the next read.
        self.store.upsert(&seat).await?;
        self.cache.write().await.insert(numero, seat);

        info!("Server {}: seat {} reserved by {}", self.server_id, numero, cliente);
        Ok(format!("seat {} reserved", numero))
    }

    async fn free_locked(&self, numero: u32) -> Result<String, ReservationError> {
        let Some(mut seat) = self.store.get(numero).await? else {
            return Err(ReservationError::NotFound);
        };
        if seat.disponible {
            return Err(ReservationError::Conflict(format!(
                "seat {} is already free",
                numero
            )));
        }

        seat.disponible = true;
        seat.cliente.clear();
        seat.server_id = self.server_id.clone();
        seat.updated_at = Utc::now();

        self.store.upsert(&seat).await?;
        self.cache.write().await.insert(numero, seat);

        info!("Server {}: seat {} freed", self.server_id, numero);
        Ok(format!("seat {} freed", numero))
    }
}

fn seat_resource(numero: u32) -> String {
    format!("{}{}", SEAT_RESOURCE_PREFIX, numero)
}
