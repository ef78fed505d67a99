use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Persisted Seat row ---

/// A seat as persisted in `reservations_db.seats` and served to clients.
///
/// `disponible` and `cliente` mirror each other: an available seat has no
/// client, a taken seat always names one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seat {
    pub numero: u32,
    pub disponible: bool,
    #[serde(default)]
    pub cliente: String,
    /// Replica that most recently wrote this row.
    pub server_id: String,
    pub updated_at: DateTime<Utc>,
}

impl Seat {
    /// A fresh, available seat as written at seed time.
    pub fn available(numero: u32, server_id: &str) -> Self {
        Self {
            numero,
            disponible: true,
            cliente: String::new(),
            server_id: server_id.to_string(),
            updated_at: Utc::now(),
        }
    }

    /// `disponible` must hold exactly when `cliente` is empty.
    pub fn is_consistent(&self) -> bool {
        self.disponible == self.cliente.is_empty()
    }
}

// --- Reservation wire messages ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReserveRequest {
    pub numero: u32,
    pub cliente: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreeRequest {
    pub numero: u32,
}

/// Envelope returned by `/reservar` and `/liberar`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
    pub server_id: String,
}

/// Envelope returned by `/asientos`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatListResponse {
    pub asientos: Vec<Seat>,
    pub server_id: String,
}
