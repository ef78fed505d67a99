//! Durable-store layout constants.

/// Database holding the seat inventory.
pub const SEATS_DB: &str = "reservations_db";

/// Collection holding seat rows, keyed by `numero`.
pub const SEATS_COLLECTION: &str = "seats";

/// Database holding granted lock leases.
pub const LOCKS_DB: &str = "locks_db";

/// Collection holding lease documents, keyed by lease id.
pub const LOCKS_COLLECTION: &str = "locks";
