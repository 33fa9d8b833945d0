//! Reservation collaborator contract.
//!
//! The engine does not store reservations itself: it consults the
//! reservation engine through this narrow interface and toggles the
//! per-connector `reserved` flag only on ReservationStart/ReservationEnd
//! session events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::connector::ConnectorState;
use crate::types::ConnectorId;

/// A reservation record handed over by the reservation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: i32,
    pub id_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id_token: Option<String>,
    pub expiry_time: DateTime<Utc>,
}

/// Outcome of a reservation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationStatus {
    Accepted,
    Faulted,
    Occupied,
    Rejected,
    Unavailable,
}

/// Matching and storage side of the reservation engine.
///
/// All four calls are synchronous and non-blocking from the engine's
/// point of view.
pub trait ReservationArbiter: Send + Sync {
    /// Ask the reservation engine to reserve `connector_id`, given the
    /// connector's current availability.
    fn reserve(
        &self,
        connector_id: ConnectorId,
        state: ConnectorState,
        is_reservable: bool,
        reservation: &Reservation,
    ) -> ReservationStatus;

    /// Cancel by reservation id; returns the connector it was held on.
    fn cancel_reservation(&self, reservation_id: i32) -> Option<ConnectorId>;

    /// Whether `id_token` or `parent_id_token` matches the reservation
    /// held on `connector_id`.
    fn matches_reserved_identifier(
        &self,
        connector_id: ConnectorId,
        id_token: &str,
        parent_id_token: Option<&str>,
    ) -> bool;

    /// Mark the reservation on `connector_id` as consumed.
    fn on_reservation_used(&self, connector_id: ConnectorId);
}
