//! Collaborator interfaces towards the EVSE backplane and the validation
//! backends.
//!
//! Both are injected at engine construction; the engine calls out and
//! never polls.

use async_trait::async_trait;

use crate::types::{EvseIndex, StopTransactionReason, ValidationResult};

/// Commands the engine issues to the EVSE backplane.
///
/// All calls are fire-and-forget: implementations forward or enqueue and
/// must not block the caller.
pub trait EvseCommands: Send + Sync {
    /// Grant authorization for `id_token` on the EVSE.
    fn authorize(&self, evse_index: EvseIndex, id_token: &str);

    /// Revoke an authorization that was granted but never used.
    fn withdraw_authorization(&self, evse_index: EvseIndex);

    /// Stop the transaction running on the EVSE.
    fn stop_transaction(&self, evse_index: EvseIndex, reason: StopTransactionReason);

    /// Forward an accepted reservation to the EVSE.
    fn reserve(&self, evse_index: EvseIndex, reservation_id: i32);

    /// Forward a reservation cancellation to the EVSE.
    fn cancel_reservation(&self, evse_index: EvseIndex);
}

/// A token validation backend.
///
/// Backends are queried in registration order and each returns its
/// results in decreasing precedence; the engine concatenates them.
#[async_trait]
pub trait TokenValidator: Send + Sync {
    /// Validate a raw token string.
    async fn validate_token(&self, id_token: &str) -> Vec<ValidationResult>;
}
