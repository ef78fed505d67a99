use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use pkg_constants::locks::{CS_WAIT_TIMEOUT_SECS, SEAT_LOCK_TTL_SECS};
use pkg_mutex::RaNode;
use pkg_types::lease::{LockRequest, LockResponse, ReleaseRequest};

/// Why a critical section could not be entered.
#[derive(Debug, Error)]
pub enum LockFailure {
    /// Somebody else has the section; the caller may retry.
    #[error("{0}")]
    Denied(String),
    /// The lock service itself could not be reached.
    #[error("lock service unavailable: {0}")]
    Unavailable(String),
}

/// The critical-section primitive guarding seat mutations.
///
/// `acquire` must succeed before any read of the seat, and `release` is
/// called on every exit path, including failed mutations.
#[async_trait]
pub trait SeatLock: Send + Sync {
    async fn acquire(&self, resource: &str) -> Result<(), LockFailure>;
    async fn release(&self, resource: &str);
}

// --- Centralized variant ---

/// Lease client of the lock coordinator.
pub struct CoordinatorLock {
    client: reqwest::Client,
    base_url: String,
    client_id: String,
}

impl CoordinatorLock {
    pub fn new(base_url: &str, client_id: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            client_id: client_id.to_string(),
        })
    }
}

#[async_trait]
impl SeatLock for CoordinatorLock {
    async fn acquire(&self, resource: &str) -> Result<(), LockFailure> {
        let req = LockRequest {
            resource: resource.to_string(),
            client_id: self.client_id.clone(),
            ttl: SEAT_LOCK_TTL_SECS,
        };

        let url = format!("{}/acquire", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&req)
            .send()
            .await
            .map_err(|e| LockFailure::Unavailable(e.to_string()))?;
        let lock: LockResponse = resp
            .json()
            .await
            .map_err(|e| LockFailure::Unavailable(e.to_string()))?;

        if lock.success {
            Ok(())
        } else {
            Err(LockFailure::Denied(
                lock.message.unwrap_or_else(|| "lock denied".to_string()),
            ))
        }
    }

    async fn release(&self, resource: &str) {
        let req = ReleaseRequest {
            resource: resource.to_string(),
            client_id: self.client_id.clone(),
        };

        // Best effort: a lost release only costs the lease TTL.
        let url = format!("{}/release", self.base_url);
        if let Err(e) = self.client.post(&url).json(&req).send().await {
            warn!("Failed to release lock on {}: {}", resource, e);
        }
    }
}

// --- Decentralized variant ---

/// Node-wide critical section driven by the Ricart-Agrawala engine. The
/// resource name is not used: the group serializes all seat mutations
/// through one section.
pub struct RaLock {
    node: Arc<RaNode>,
}

impl RaLock {
    pub fn new(node: Arc<RaNode>) -> Self {
        Self { node }
    }
}

#[async_trait]
impl SeatLock for RaLock {
    async fn acquire(&self, _resource: &str) -> Result<(), LockFailure> {
        let wait = Duration::from_secs(CS_WAIT_TIMEOUT_SECS);
        match tokio::time::timeout(wait, self.node.request_cs()).await {
            Ok(()) => Ok(()),
            Err(_) => {
                if !self.node.cancel_request_cs().await {
                    // The grant raced in just as we gave up; hand it back.
                    self.node.release_cs().await;
                }
                Err(LockFailure::Denied(
                    "timed out waiting for the critical section".to_string(),
                ))
            }
        }
    }

    async fn release(&self, _resource: &str) {
        self.node.release_cs().await;
    }
}
