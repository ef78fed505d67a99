//! Seat inventory constants.

/// Number of seats seeded into an empty store.
pub const DEFAULT_SEAT_COUNT: u32 = 20;

/// Prefix of the lock resource guarding a single seat, e.g. `seat_42`.
pub const SEAT_RESOURCE_PREFIX: &str = "seat_";
