//! Lock coordinator / critical-section constants.

/// Lease TTL applied when a client requests zero or a negative TTL, in seconds.
pub const DEFAULT_LOCK_TTL_SECS: i64 = 300;

/// Lease TTL a replica requests when locking a single seat, in seconds.
pub const SEAT_LOCK_TTL_SECS: i64 = 30;

/// Period of the coordinator's expired-lease sweep, in seconds.
pub const SWEEP_INTERVAL_SECS: u64 = 30;

/// How long a replica waits for the decentralized critical section before
/// cancelling its request, in seconds.
pub const CS_WAIT_TIMEOUT_SECS: u64 = 30;
