//! Per-connector runtime state.
//!
//! Every physical connector carries an availability state machine plus two
//! reservation flags and the identifier bound to it while a session is
//! running. The set of connectors is fixed at bring-up.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{EvseIndex, Identifier};

/// Availability of a connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectorState {
    Available,
    Occupied,
    Faulted,
    Unavailable,
}

/// State machine triggers, mapped from backplane session events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConnectorEvent {
    TransactionStarted,
    SessionFinished,
    Faulted,
    Disable,
    Enable,
}

/// Mutable state of a single connector.
#[derive(Debug)]
pub(crate) struct Connector {
    pub(crate) state: ConnectorState,
    /// Cleared while a vehicle occupies the connector.
    pub(crate) is_reservable: bool,
    /// Toggled by ReservationStart/ReservationEnd events only.
    pub(crate) reserved: bool,
    pub(crate) identifier: Option<Identifier>,
}

impl Connector {
    pub(crate) fn new() -> Self {
        Self {
            state: ConnectorState::Available,
            is_reservable: true,
            reserved: false,
            identifier: None,
        }
    }

    /// Feed a lifecycle trigger through the state machine.
    ///
    /// Pairs with no defined transition leave the state untouched.
    pub(crate) fn submit_event(&mut self, event: ConnectorEvent) {
        use ConnectorState::*;

        let next = match (self.state, event) {
            (Available, ConnectorEvent::TransactionStarted) => Some(Occupied),
            (Available | Occupied, ConnectorEvent::SessionFinished) => Some(Available),
            (_, ConnectorEvent::Faulted) => Some(Faulted),
            (_, ConnectorEvent::Disable) => Some(Unavailable),
            (Unavailable | Faulted, ConnectorEvent::Enable) => Some(Available),
            _ => None,
        };

        match next {
            Some(next) => {
                if next != self.state {
                    debug!("Connector state {:?} -> {:?}", self.state, next);
                    self.state = next;
                }
            }
            None => debug!("Ignoring {:?} in state {:?}", event, self.state),
        }
    }

    /// Unavailable connectors are never offered as candidates.
    pub(crate) fn is_unavailable(&self) -> bool {
        matches!(self.state, ConnectorState::Unavailable | ConnectorState::Faulted)
    }

    pub(crate) fn is_available(&self) -> bool {
        matches!(self.state, ConnectorState::Available)
    }
}

/// A connector plus the backplane index it is wired to. Keyed by
/// connector id in the engine's connector table.
#[derive(Debug)]
pub(crate) struct ConnectorContext {
    pub(crate) evse_index: EvseIndex,
    pub(crate) connector: Mutex<Connector>,
}

impl ConnectorContext {
    pub(crate) fn new(evse_index: EvseIndex) -> Self {
        Self {
            evse_index,
            connector: Mutex::new(Connector::new()),
        }
    }
}
