//! Network-related constants.

/// Default port for the lock coordinator.
pub const DEFAULT_COORDINATOR_PORT: u16 = 8080;

/// Default port for a reservation replica.
pub const DEFAULT_REPLICA_PORT: u16 = 8081;

/// Default lock coordinator base URL (HTTP).
pub const DEFAULT_COORDINATOR_URL: &str = "http://coordinator:8080";

/// Default MongoDB connection string.
pub const DEFAULT_STORE_URI: &str = "mongodb://mongo:27017";

/// Path replicas expose for mutual-exclusion traffic.
pub const INTERNAL_MESSAGE_PATH: &str = "/internal/message";

/// Per-attempt deadline for a peer message send, in seconds.
pub const MESSAGE_SEND_TIMEOUT_SECS: u64 = 2;

/// How many times a peer message send is attempted before giving up.
pub const MESSAGE_SEND_ATTEMPTS: u32 = 3;

/// Delay before the first peer-message retry; doubles on each attempt.
pub const MESSAGE_RETRY_BASE_DELAY_MS: u64 = 100;
