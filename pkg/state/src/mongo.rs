use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use mongodb::bson::doc;
use mongodb::{Client, Collection};
use serde::{Deserialize, Serialize};
use tracing::info;

use pkg_constants::state::{LOCKS_COLLECTION, LOCKS_DB, SEATS_COLLECTION, SEATS_DB};
use pkg_types::lease::Lease;
use pkg_types::seat::Seat;

use crate::{LeaseStore, SeatStore, StoreError, StoreResult};

/// Lease document as stored in `locks_db.locks`, keyed by the lease id.
#[derive(Debug, Serialize, Deserialize)]
struct LeaseDoc {
    #[serde(rename = "_id")]
    id: String,
    resource: String,
    client_id: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl From<&Lease> for LeaseDoc {
    fn from(lease: &Lease) -> Self {
        Self {
            id: lease.id.clone(),
            resource: lease.resource.clone(),
            client_id: lease.client_id.clone(),
            created_at: lease.created_at,
            expires_at: lease.expires_at,
        }
    }
}

/// MongoDB-backed store for both the seat inventory and the lease table.
#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    seats: Collection<Seat>,
    leases: Collection<LeaseDoc>,
}

impl MongoStore {
    /// Connect and ping the deployment. An unreachable store is a startup
    /// failure for every binary, so this propagates rather than retrying.
    pub async fn connect(uri: &str) -> StoreResult<Self> {
        let client = Client::with_uri_str(uri)
            .await
            .map_err(|e| StoreError::Backend(format!("failed to connect to {}: {}", uri, e)))?;

        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| StoreError::Backend(format!("failed to ping {}: {}", uri, e)))?;

        info!("Connected to store at {}", uri);

        let seats = client.database(SEATS_DB).collection(SEATS_COLLECTION);
        let leases = client.database(LOCKS_DB).collection(LOCKS_COLLECTION);
        Ok(Self {
            client,
            seats,
            leases,
        })
    }

    /// Gracefully shut the client down on the way out.
    pub async fn close(&self) {
        info!("Closing store connection");
        self.client.clone().shutdown().await;
    }
}

#[async_trait]
impl SeatStore for MongoStore {
    async fn get(&self, numero: u32) -> StoreResult<Option<Seat>> {
        self.seats
            .find_one(doc! { "numero": numero as i64 })
            .await
            .map_err(|e| StoreError::Backend(format!("seat lookup failed: {}", e)))
    }

    async fn upsert(&self, seat: &Seat) -> StoreResult<()> {
        self.seats
            .replace_one(doc! { "numero": seat.numero as i64 }, seat)
            .upsert(true)
            .await
            .map_err(|e| StoreError::Backend(format!("seat write failed: {}", e)))?;
        Ok(())
    }

    async fn all(&self) -> StoreResult<Vec<Seat>> {
        let mut cursor = self
            .seats
            .find(doc! {})
            .await
            .map_err(|e| StoreError::Backend(format!("seat scan failed: {}", e)))?;

        let mut seats = Vec::new();
        while let Some(seat) = cursor
            .try_next()
            .await
            .map_err(|e| StoreError::Serialization(format!("seat decode failed: {}", e)))?
        {
            seats.push(seat);
        }
        Ok(seats)
    }
}

#[async_trait]
impl LeaseStore for MongoStore {
    async fn put(&self, lease: &Lease) -> StoreResult<()> {
        self.leases
            .replace_one(doc! { "_id": &lease.id }, LeaseDoc::from(lease))
            .upsert(true)
            .await
            .map_err(|e| StoreError::Backend(format!("lease write failed: {}", e)))?;
        Ok(())
    }

    async fn delete(&self, lease_id: &str) -> StoreResult<()> {
        self.leases
            .delete_one(doc! { "_id": lease_id })
            .await
            .map_err(|e| StoreError::Backend(format!("lease delete failed: {}", e)))?;
        Ok(())
    }
}
