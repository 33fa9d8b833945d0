//! The token authorization engine.
//!
//! [`AuthArbiter`] owns the per-connector state and decides, for every
//! presented token, whether a connector may be unlocked:
//!
//! 1. concurrent swipes of the same token are coalesced into one attempt,
//! 2. a token that already owns a running transaction stops it instead,
//! 3. otherwise the token is validated, a connector is selected (waiting
//!    for a plug-in when so configured), the reservation is checked, and
//!    the grant is issued together with a withdrawal timeout.
//!
//! Session lifecycle events reported by the backplane drive the connector
//! state machines and the plug-in queue; every externally visible effect
//! is a command on the injected [`EvseCommands`] collaborator.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::backplane::{EvseCommands, TokenValidator};
use crate::config::{AuthConfig, SelectionAlgorithm};
use crate::connector::{ConnectorContext, ConnectorEvent, ConnectorState};
use crate::error::AuthError;
use crate::reservation::{Reservation, ReservationArbiter, ReservationStatus};
use crate::selection::{select_connector, PlugInQueue};
use crate::timer::OneShotTimer;
use crate::types::{
    AuthorizationStatus, ConnectorId, EvseIndex, Identifier, IdentifierToken, SessionEventKind,
    StopTransactionReason, ValidationResult,
};

/// Removes a token from the in-process set when the attempt ends,
/// whichever way it ends.
struct InProcessGuard<'a> {
    tokens: &'a Mutex<HashSet<String>>,
    id_token: &'a str,
}

impl Drop for InProcessGuard<'_> {
    fn drop(&mut self) {
        self.tokens.lock().remove(self.id_token);
    }
}

/// Authorization and connector arbitration for one charging station.
///
/// Construct with [`AuthArbiter::new`], register connectors and
/// validation backends, then share behind an [`Arc`]. Token providers
/// spawn one task per presented token calling [`AuthArbiter::on_token`];
/// the backplane feeds [`AuthArbiter::handle_session_event`].
pub struct AuthArbiter {
    selection_algorithm: SelectionAlgorithm,
    connection_timeout_secs: AtomicU64,
    prioritize_authorization: AtomicBool,

    /// Fixed after bring-up; iteration is in increasing connector id order.
    connectors: BTreeMap<ConnectorId, ConnectorContext>,
    tokens_in_process: Mutex<HashSet<String>>,
    plug_in_queue: Arc<PlugInQueue>,
    /// One timer per connector. The table lock serializes all timer
    /// starts and stops across the grant and session-event paths.
    timers: Mutex<BTreeMap<ConnectorId, OneShotTimer>>,

    validators: Vec<Arc<dyn TokenValidator>>,
    commands: Arc<dyn EvseCommands>,
    reservations: Arc<dyn ReservationArbiter>,
}

impl AuthArbiter {
    pub fn new(
        config: AuthConfig,
        commands: Arc<dyn EvseCommands>,
        reservations: Arc<dyn ReservationArbiter>,
    ) -> Self {
        Self {
            selection_algorithm: config.selection_algorithm,
            connection_timeout_secs: AtomicU64::new(config.connection_timeout_secs),
            prioritize_authorization: AtomicBool::new(
                config.prioritize_authorization_over_stopping_transaction,
            ),
            connectors: BTreeMap::new(),
            tokens_in_process: Mutex::new(HashSet::new()),
            plug_in_queue: Arc::new(PlugInQueue::new()),
            timers: Mutex::new(BTreeMap::new()),
            validators: Vec::new(),
            commands,
            reservations,
        }
    }

    /// Register a physical connector. Called once per connector at
    /// bring-up; the set is fixed afterwards.
    pub fn add_connector(
        &mut self,
        connector_id: ConnectorId,
        evse_index: EvseIndex,
    ) -> Result<(), AuthError> {
        if self.connectors.contains_key(&connector_id) {
            return Err(AuthError::DuplicateConnector(connector_id));
        }
        self.connectors
            .insert(connector_id, ConnectorContext::new(evse_index));
        self.timers.lock().insert(connector_id, OneShotTimer::new());
        Ok(())
    }

    /// Register a validation backend; backends are queried in
    /// registration order.
    pub fn add_validator(&mut self, validator: Arc<dyn TokenValidator>) {
        self.validators.push(validator);
    }

    /// Seconds a granted authorization (or a selection wait) stays alive.
    pub fn set_connection_timeout(&self, secs: u64) {
        self.connection_timeout_secs.store(secs, Ordering::Relaxed);
    }

    pub fn set_prioritize_authorization_over_stopping_transaction(&self, prioritize: bool) {
        self.prioritize_authorization.store(prioritize, Ordering::Relaxed);
    }

    /// Snapshot of a connector's availability state.
    pub fn connector_state(&self, connector_id: ConnectorId) -> Option<ConnectorState> {
        self.connectors
            .get(&connector_id)
            .map(|ctx| ctx.connector.lock().state)
    }

    /// Whether the connector currently holds a reservation.
    pub fn is_reserved(&self, connector_id: ConnectorId) -> Option<bool> {
        self.connectors
            .get(&connector_id)
            .map(|ctx| ctx.connector.lock().reserved)
    }

    fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs.load(Ordering::Relaxed))
    }

    /// Entry point for a presented token.
    ///
    /// Spawn one task per token event; a token swiped again while still
    /// in process is dropped silently. Nothing is reported back to the
    /// caller: every effect goes through the [`EvseCommands`]
    /// collaborator.
    pub async fn on_token(&self, token: IdentifierToken) {
        info!("Received new token: {}", token);
        {
            let mut in_process = self.tokens_in_process.lock();
            if !in_process.insert(token.id_token.clone()) {
                info!(
                    "Received token {} repeatedly while still processing it",
                    token.id_token
                );
                return;
            }
        }
        let _guard = InProcessGuard {
            tokens: &self.tokens_in_process,
            id_token: &token.id_token,
        };
        self.handle_token(&token).await;
    }

    async fn handle_token(&self, token: &IdentifierToken) {
        let referenced_connectors = self.referenced_connectors(token);

        // A token that already owns a transaction stops it. This takes
        // precedence over validation entirely.
        if let Some(connector_id) =
            self.used_for_transaction(&referenced_connectors, &token.id_token)
        {
            self.commands
                .stop_transaction(self.evse_index(connector_id), StopTransactionReason::Local);
            info!(
                "Transaction on connector {} stopped: presented token owns it",
                connector_id
            );
            return;
        }

        let validation_results = if token.prevalidated.unwrap_or(false) {
            vec![ValidationResult::accepted()]
        } else {
            let mut results = Vec::new();
            for validator in &self.validators {
                results.extend(validator.validate_token(&token.id_token).await);
            }
            results
        };

        let attempt_stop_with_parent = if self.prioritize_authorization.load(Ordering::Relaxed) {
            !self.any_connector_available(&referenced_connectors)
        } else {
            true
        };

        if attempt_stop_with_parent {
            for result in &validation_results {
                let Some(parent_id_token) = result.parent_id_token.as_deref() else {
                    continue;
                };
                if let Some(connector_id) =
                    self.used_for_transaction(&referenced_connectors, parent_id_token)
                {
                    self.commands.stop_transaction(
                        self.evse_index(connector_id),
                        StopTransactionReason::Local,
                    );
                    info!(
                        "Transaction on connector {} stopped: parent token owns it",
                        connector_id
                    );
                    return;
                }
            }
        }

        if !self.any_connector_available(&referenced_connectors) {
            debug!("No connector available for token {}", token.id_token);
            return;
        }

        if validation_results.is_empty() {
            warn!("No validation result was received by any validator");
            return;
        }

        let mut authorized = false;
        for result in &validation_results {
            if result.authorization_status != AuthorizationStatus::Accepted {
                continue;
            }

            let Some(connector_id) = select_connector(
                self.selection_algorithm,
                &referenced_connectors,
                &self.plug_in_queue,
                self.connection_timeout(),
            )
            .await
            else {
                info!(
                    "Timeout while selecting connector for token {}",
                    token.id_token
                );
                return;
            };
            debug!(
                "Selected connector {} for token {}",
                connector_id, token.id_token
            );

            let identifier = Identifier::from_validation(result, &token.id_token);
            let reserved = self.connectors[&connector_id].connector.lock().reserved;
            if !reserved {
                info!("Providing authorization to connector {}", connector_id);
                self.authorize_connector(connector_id, identifier);
                authorized = true;
                break;
            }

            if self.reservations.matches_reserved_identifier(
                connector_id,
                &token.id_token,
                result.parent_id_token.as_deref(),
            ) {
                info!(
                    "Connector {} is reserved and token matches the reservation",
                    connector_id
                );
                self.reservations.on_reservation_used(connector_id);
                self.authorize_connector(connector_id, identifier);
                authorized = true;
                break;
            }
            info!(
                "Connector {} is reserved but token does not match the reservation",
                connector_id
            );
        }

        if !authorized {
            debug!(
                "Token {} could not be authorized by any validator result",
                token.id_token
            );
        }
    }

    /// Connectors the token applies to, minus unknown and unavailable ids.
    fn referenced_connectors(&self, token: &IdentifierToken) -> Vec<ConnectorId> {
        match &token.connectors {
            Some(ids) => ids
                .iter()
                .copied()
                .filter(|id| match self.connectors.get(id) {
                    Some(ctx) => !ctx.connector.lock().is_unavailable(),
                    None => {
                        warn!("Token references connector {} which does not exist", id);
                        false
                    }
                })
                .collect(),
            None => self
                .connectors
                .iter()
                .filter(|(_, ctx)| !ctx.connector.lock().is_unavailable())
                .map(|(id, _)| *id)
                .collect(),
        }
    }

    /// Connector whose bound identifier (or its parent) equals `token`.
    fn used_for_transaction(
        &self,
        connector_ids: &[ConnectorId],
        token: &str,
    ) -> Option<ConnectorId> {
        for &connector_id in connector_ids {
            let connector = self.connectors[&connector_id].connector.lock();
            if let Some(identifier) = &connector.identifier {
                if identifier.id_token == token
                    || identifier.parent_id_token.as_deref() == Some(token)
                {
                    return Some(connector_id);
                }
            }
        }
        None
    }

    fn any_connector_available(&self, connector_ids: &[ConnectorId]) -> bool {
        connector_ids
            .iter()
            .any(|id| self.connectors[id].connector.lock().is_available())
    }

    fn evse_index(&self, connector_id: ConnectorId) -> EvseIndex {
        self.connectors[&connector_id].evse_index
    }

    /// Bind the identifier, notify the backplane and arm the withdrawal
    /// timer. Re-authorizing a connector cancels its previous timer.
    fn authorize_connector(&self, connector_id: ConnectorId, identifier: Identifier) {
        let ctx = &self.connectors[&connector_id];
        let evse_index = ctx.evse_index;
        let id_token = identifier.id_token.clone();
        ctx.connector.lock().identifier = Some(identifier);
        self.commands.authorize(evse_index, &id_token);

        let timeout = self.connection_timeout();
        let commands = Arc::clone(&self.commands);
        {
            let mut timers = self.timers.lock();
            if let Some(timer) = timers.get_mut(&connector_id) {
                timer.start(timeout, move || {
                    info!("Authorization timeout for evse {}", evse_index);
                    commands.withdraw_authorization(evse_index);
                });
            }
        }
        self.plug_in_queue.remove(connector_id);
    }

    /// Apply a backplane lifecycle event to the connector it names.
    ///
    /// Must be called from within a Tokio runtime (plug-in timers are
    /// armed here). The timer table lock is held for the whole call.
    pub fn handle_session_event(&self, connector_id: ConnectorId, event: SessionEventKind) {
        let Some(ctx) = self.connectors.get(&connector_id) else {
            warn!(
                "Session event {:?} for unknown connector {}",
                event, connector_id
            );
            return;
        };
        debug!("Session event {:?} for connector {}", event, connector_id);

        let mut timers = self.timers.lock();
        match event {
            SessionEventKind::SessionStarted => {
                ctx.connector.lock().is_reservable = false;
                self.plug_in_queue.push(connector_id);

                let evse_index = ctx.evse_index;
                let commands = Arc::clone(&self.commands);
                let queue = Arc::clone(&self.plug_in_queue);
                if let Some(timer) = timers.get_mut(&connector_id) {
                    timer.start(self.connection_timeout(), move || {
                        debug!("Plug-in timeout for connector {}", connector_id);
                        queue.remove(connector_id);
                        commands.withdraw_authorization(evse_index);
                    });
                }
            }
            SessionEventKind::TransactionStarted => {
                ctx.connector
                    .lock()
                    .submit_event(ConnectorEvent::TransactionStarted);
                if let Some(timer) = timers.get_mut(&connector_id) {
                    timer.stop();
                }
            }
            SessionEventKind::TransactionFinished => {
                ctx.connector.lock().identifier = None;
            }
            SessionEventKind::SessionFinished => {
                let mut connector = ctx.connector.lock();
                connector.is_reservable = true;
                connector.identifier = None;
                connector.submit_event(ConnectorEvent::SessionFinished);
            }
            SessionEventKind::PermanentFault | SessionEventKind::Error => {
                ctx.connector.lock().submit_event(ConnectorEvent::Faulted);
            }
            SessionEventKind::Disabled => {
                ctx.connector.lock().submit_event(ConnectorEvent::Disable);
            }
            SessionEventKind::Enabled => {
                ctx.connector.lock().submit_event(ConnectorEvent::Enable);
            }
            SessionEventKind::ReservationStart => {
                ctx.connector.lock().reserved = true;
            }
            SessionEventKind::ReservationEnd => {
                let mut connector = ctx.connector.lock();
                connector.is_reservable = true;
                connector.reserved = false;
            }
            _ => {}
        }
    }

    /// Forward a reservation request to the reservation engine.
    ///
    /// On acceptance the backplane is told to reserve the EVSE. The
    /// connector's `reserved` flag follows the ReservationStart event,
    /// not this call.
    pub fn handle_reservation(
        &self,
        connector_id: ConnectorId,
        reservation: &Reservation,
    ) -> ReservationStatus {
        let Some(ctx) = self.connectors.get(&connector_id) else {
            warn!(
                "Reservation {} names connector {} which does not exist",
                reservation.id, connector_id
            );
            return ReservationStatus::Rejected;
        };

        let (state, is_reservable) = {
            let connector = ctx.connector.lock();
            (connector.state, connector.is_reservable)
        };
        let status = self
            .reservations
            .reserve(connector_id, state, is_reservable, reservation);
        if status == ReservationStatus::Accepted {
            self.commands.reserve(ctx.evse_index, reservation.id);
        }
        status
    }

    /// Cancel a reservation; returns the connector it was held on.
    pub fn handle_cancel_reservation(&self, reservation_id: i32) -> Option<ConnectorId> {
        let connector_id = self.reservations.cancel_reservation(reservation_id)?;
        if let Some(ctx) = self.connectors.get(&connector_id) {
            self.commands.cancel_reservation(ctx.evse_index);
        }
        Some(connector_id)
    }
}
