//! Core data types shared across the authorization engine.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Connector id as assigned at station bring-up. Stable for the process lifetime.
pub type ConnectorId = i32;

/// Index of an EVSE as the backplane addresses it.
pub type EvseIndex = i32;

/// A credential presented at the station, as reported by a token provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifierToken {
    /// Raw token string as read from the credential.
    pub id_token: String,
    /// Capture method reported by the provider ("RFID", "PlugAndCharge", ...).
    #[serde(rename = "type")]
    pub token_type: String,
    /// Connector ids this token is restricted to; `None` means any connector.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connectors: Option<Vec<ConnectorId>>,
    /// Set when an upstream collaborator has already validated the token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prevalidated: Option<bool>,
}

impl IdentifierToken {
    /// Create a token with no connector restriction.
    pub fn new(id_token: impl Into<String>, token_type: impl Into<String>) -> Self {
        Self {
            id_token: id_token.into(),
            token_type: token_type.into(),
            connectors: None,
            prevalidated: None,
        }
    }

    /// Restrict the token to the given connector ids.
    pub fn with_connectors(mut self, connectors: Vec<ConnectorId>) -> Self {
        self.connectors = Some(connectors);
        self
    }

    /// Mark the token as validated upstream.
    pub fn prevalidated(mut self) -> Self {
        self.prevalidated = Some(true);
        self
    }
}

impl fmt::Display for IdentifierToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id_token, self.token_type)
    }
}

/// Authorization status as reported by a validation backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum AuthorizationStatus {
    Accepted,
    Blocked,
    Expired,
    Invalid,
    NoCredit,
    NotAllowedTypeEVSE,
    NotAtThisLocation,
    NotAtThisTime,
    Unknown,
}

/// One accept/reject decision for a presented token.
///
/// A single token submission yields one result per backend, evaluated in
/// backend registration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub authorization_status: AuthorizationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_time: Option<DateTime<Utc>>,
}

impl ValidationResult {
    /// An `Accepted` result with no parent token and no expiry.
    pub fn accepted() -> Self {
        Self {
            authorization_status: AuthorizationStatus::Accepted,
            parent_id_token: None,
            expiry_time: None,
        }
    }
}

/// The authorization record bound to a connector after a grant.
///
/// Owned by the connector it is attached to; cleared when the transaction
/// or session ends.
#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    pub id_token: String,
    pub authorization_status: AuthorizationStatus,
    pub expiry_time: Option<DateTime<Utc>>,
    pub parent_id_token: Option<String>,
}

impl Identifier {
    /// Combine a validation result with the token string it validated.
    pub fn from_validation(result: &ValidationResult, id_token: &str) -> Self {
        Self {
            id_token: id_token.to_string(),
            authorization_status: result.authorization_status,
            expiry_time: result.expiry_time,
            parent_id_token: result.parent_id_token.clone(),
        }
    }
}

/// Reason passed to the backplane when a transaction is stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum StopTransactionReason {
    DeAuthorized,
    EmergencyStop,
    EvDisconnected,
    HardReset,
    Local,
    Other,
    PowerLoss,
    Reboot,
    Remote,
    SoftReset,
    UnlockCommand,
}

/// Lifecycle event reported by the backplane for a single connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum SessionEventKind {
    SessionStarted,
    TransactionStarted,
    TransactionFinished,
    SessionFinished,
    PermanentFault,
    Error,
    Disabled,
    Enabled,
    ReservationStart,
    ReservationEnd,
    ChargingStarted,
    ChargingPausedEv,
    ChargingPausedEvse,
    ChargingResumed,
}
