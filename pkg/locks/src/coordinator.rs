use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use pkg_constants::locks::{DEFAULT_LOCK_TTL_SECS, SWEEP_INTERVAL_SECS};
use pkg_state::{LeaseStore, StoreResult};
use pkg_types::lease::{Lease, LockResponse, LockStatusResponse};

type LeaseTable = Arc<RwLock<HashMap<String, Lease>>>;

/// Coordinates exclusive access to named resources through time-bounded
/// leases.
///
/// All mutations serialize on the lease-table guard; granted leases are
/// written through to the durable store so operators can inspect them. The
/// coordinator is non-reentrant: a client's own live lease denies its
/// re-acquire like anyone else's.
pub struct LockCoordinator {
    leases: LeaseTable,
    store: Arc<dyn LeaseStore>,
}

impl LockCoordinator {
    pub fn new(store: Arc<dyn LeaseStore>) -> Self {
        Self {
            leases: Arc::new(RwLock::new(HashMap::new())),
            store,
        }
    }

    /// Try to acquire a lease on `resource` for `client_id`.
    ///
    /// A TTL of zero or less falls back to the coordinator default. An
    /// expired lease found in the way is evicted first. The new lease is
    /// installed in memory and written through; a store failure rolls the
    /// install back and surfaces as an operational error.
    pub async fn acquire(
        &self,
        resource: &str,
        client_id: &str,
        ttl_secs: i64,
    ) -> StoreResult<LockResponse> {
        let ttl = if ttl_secs <= 0 {
            DEFAULT_LOCK_TTL_SECS
        } else {
            ttl_secs
        };

        let mut leases = self.leases.write().await;
        let now = Utc::now();

        if let Some(existing) = leases.get(resource).cloned() {
            if !existing.is_expired_at(now) {
                return Ok(LockResponse::denied(format!(
                    "resource {} is already locked by client {}",
                    resource, existing.client_id
                )));
            }
            // Stale lease left behind by a holder that never released.
            leases.remove(resource);
            if let Err(e) = self.store.delete(&existing.id).await {
                warn!(
                    "Failed to delete expired lease {} from store: {}",
                    existing.id, e
                );
            }
            info!(
                "Evicted expired lease on {} (was held by {})",
                resource, existing.client_id
            );
        }

        let lease = Lease::new(resource, client_id, ttl);
        leases.insert(resource.to_string(), lease.clone());
        if let Err(e) = self.store.put(&lease).await {
            leases.remove(resource);
            return Err(e);
        }

        info!(
            "Granted lock on {} to {} until {}",
            resource, client_id, lease.expires_at
        );
        Ok(LockResponse::granted(&lease, "lock acquired"))
    }

    /// Release the lease on `resource` held by `client_id`.
    ///
    /// Only the holder may release; a mismatched client gets a refusal and
    /// the lease stays in place. A store delete failure is logged but the
    /// in-memory release still succeeds.
    pub async fn release(&self, resource: &str, client_id: &str) -> LockResponse {
        let mut leases = self.leases.write().await;

        let Some(lease) = leases.get(resource) else {
            return LockResponse::denied("no lock found for this resource".to_string());
        };
        if lease.client_id != client_id {
            return LockResponse::denied("lock belongs to a different client".to_string());
        }

        let lease_id = lease.id.clone();
        leases.remove(resource);
        if let Err(e) = self.store.delete(&lease_id).await {
            warn!("Failed to delete lease {} from store: {}", lease_id, e);
        }

        info!("Released lock on {} held by {}", resource, client_id);
        LockResponse {
            success: true,
            lock_id: None,
            message: Some("lock released".to_string()),
            expires_at: None,
        }
    }

    /// Extend the expiry of a live lease held by `client_id`.
    ///
    /// Long critical sections would otherwise lose their lease silently;
    /// holders call this as a heartbeat.
    pub async fn renew(
        &self,
        resource: &str,
        client_id: &str,
        ttl_secs: i64,
    ) -> StoreResult<LockResponse> {
        let ttl = if ttl_secs <= 0 {
            DEFAULT_LOCK_TTL_SECS
        } else {
            ttl_secs
        };

        let mut leases = self.leases.write().await;
        let now = Utc::now();

        let Some(lease) = leases.get_mut(resource) else {
            return Ok(LockResponse::denied(
                "no lock found for this resource".to_string(),
            ));
        };
        if lease.client_id != client_id {
            return Ok(LockResponse::denied(
                "lock belongs to a different client".to_string(),
            ));
        }
        if lease.is_expired_at(now) {
            return Ok(LockResponse::denied("lease has expired".to_string()));
        }

        let previous_expiry = lease.expires_at;
        lease.expires_at = now + chrono::Duration::seconds(ttl);
        let renewed = lease.clone();

        if let Err(e) = self.store.put(&renewed).await {
            if let Some(lease) = leases.get_mut(resource) {
                lease.expires_at = previous_expiry;
            }
            return Err(e);
        }

        info!(
            "Renewed lock on {} for {} until {}",
            resource, client_id, renewed.expires_at
        );
        Ok(LockResponse::granted(&renewed, "lease renewed"))
    }

    /// Current lock state of `resource`.
    ///
    /// An expired lease is reported as unlocked and evicted in the
    /// background; the read path never waits for the write guard.
    pub async fn status(&self, resource: &str) -> LockStatusResponse {
        let leases = self.leases.read().await;

        match leases.get(resource) {
            Some(lease) if !lease.is_expired() => LockStatusResponse {
                resource: resource.to_string(),
                locked: true,
                lease: Some(lease.clone()),
            },
            Some(lease) => {
                self.evict_later(resource.to_string(), lease.id.clone());
                LockStatusResponse {
                    resource: resource.to_string(),
                    locked: false,
                    lease: None,
                }
            }
            None => LockStatusResponse {
                resource: resource.to_string(),
                locked: false,
                lease: None,
            },
        }
    }

    /// Remove an expired lease once the write guard is free. The table is
    /// re-checked under the guard in case the lease was replaced meanwhile.
    fn evict_later(&self, resource: String, lease_id: String) {
        let leases = self.leases.clone();
        let store = self.store.clone();
        tokio::spawn(async move {
            let mut leases = leases.write().await;
            if leases
                .get(&resource)
                .is_some_and(|lease| lease.id == lease_id)
            {
                leases.remove(&resource);
                if let Err(e) = store.delete(&lease_id).await {
                    warn!("Failed to delete expired lease {} from store: {}", lease_id, e);
                }
                info!("Evicted expired lease on {}", resource);
            }
        });
    }

    /// One sweep pass: drop every lease whose expiry has passed, from the
    /// table and the store. Returns how many were removed.
    pub async fn sweep_expired(&self) -> usize {
        Self::sweep_pass(&self.leases, &self.store).await
    }

    async fn sweep_pass(leases: &LeaseTable, store: &Arc<dyn LeaseStore>) -> usize {
        let mut leases = leases.write().await;
        let now = Utc::now();

        let expired: Vec<(String, String)> = leases
            .iter()
            .filter(|(_, lease)| lease.is_expired_at(now))
            .map(|(resource, lease)| (resource.clone(), lease.id.clone()))
            .collect();

        for (resource, lease_id) in &expired {
            leases.remove(resource);
            if let Err(e) = store.delete(lease_id).await {
                warn!("Failed to delete expired lease {} from store: {}", lease_id, e);
            }
            info!("Cleaned up expired lock on {}", resource);
        }
        expired.len()
    }

    /// Start the periodic sweep as a background task. The handle is kept by
    /// the binary and aborted at shutdown.
    pub fn start_sweeper(&self) -> JoinHandle<()> {
        let leases = self.leases.clone();
        let store = self.store.clone();
        tokio::spawn(async move {
            info!("Lease sweeper started (interval={}s)", SWEEP_INTERVAL_SECS);
            let mut interval = tokio::time::interval(Duration::from_secs(SWEEP_INTERVAL_SECS));
            loop {
                interval.tick().await;
                Self::sweep_pass(&leases, &store).await;
            }
        })
    }
}
