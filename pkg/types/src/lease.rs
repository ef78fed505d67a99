use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Persisted lease ---

/// A granted lock lease as held by the coordinator and persisted in
/// `locks_db.locks`.
///
/// For any resource at most one lease with `expires_at` in the future exists
/// in the coordinator's table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lease {
    pub id: String,
    pub resource: String,
    pub client_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Lease {
    /// Build a lease granted now, expiring `ttl_secs` from now.
    ///
    /// The id embeds the grant's nanosecond timestamp so repeated grants for
    /// the same resource/client pair stay distinct.
    pub fn new(resource: &str, client_id: &str, ttl_secs: i64) -> Self {
        let now = Utc::now();
        let nanos = now.timestamp_nanos_opt().unwrap_or_default();
        Self {
            id: format!("{}_{}_{}", resource, client_id, nanos),
            resource: resource.to_string(),
            client_id: client_id.to_string(),
            created_at: now,
            expires_at: now + chrono::Duration::seconds(ttl_secs),
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

// --- Coordinator wire messages ---

/// Body of `/acquire` and `/renew`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockRequest {
    pub resource: String,
    pub client_id: String,
    /// TTL in seconds; zero or negative means the coordinator default.
    #[serde(default)]
    pub ttl: i64,
}

/// Body of `/release`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseRequest {
    pub resource: String,
    pub client_id: String,
}

/// Reply to `/acquire`, `/release` and `/renew`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Expiry as Unix seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl LockResponse {
    pub fn granted(lease: &Lease, message: &str) -> Self {
        Self {
            success: true,
            lock_id: Some(lease.id.clone()),
            message: Some(message.to_string()),
            expires_at: Some(lease.expires_at.timestamp()),
        }
    }

    pub fn denied(message: String) -> Self {
        Self {
            success: false,
            lock_id: None,
            message: Some(message),
            expires_at: None,
        }
    }
}

/// Reply to `/status/{resource}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockStatusResponse {
    pub resource: String,
    pub locked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease: Option<Lease>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_lease_expires_after_ttl() {
        let lease = Lease::new("seat_1", "server-1", 30);
        assert_eq!(lease.resource, "seat_1");
        assert_eq!(lease.client_id, "server-1");
        assert!(!lease.is_expired());
        let lifetime = lease.expires_at - lease.created_at;
        assert_eq!(lifetime.num_seconds(), 30);
    }

    #[test]
    fn lease_ids_are_distinct() {
        let a = Lease::new("seat_1", "server-1", 30);
        let b = Lease::new("seat_1", "server-1", 30);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn expiry_is_inclusive_at_the_boundary() {
        let lease = Lease::new("seat_1", "server-1", 30);
        assert!(lease.is_expired_at(lease.expires_at));
        assert!(!lease.is_expired_at(lease.expires_at - chrono::Duration::seconds(1)));
    }

    #[test]
    fn denied_response_carries_no_lock_id() {
        let resp = LockResponse::denied("resource busy".to_string());
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["success"], false);
        assert!(json.get("lock_id").is_none());
        assert!(json.get("expires_at").is_none());
    }
}
