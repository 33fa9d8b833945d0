//! Error types for the construction surface.

use thiserror::Error;

use crate::types::ConnectorId;

/// Errors raised while configuring or assembling the engine.
///
/// Runtime anomalies during an authorization attempt (duplicate in-flight
/// token, selection timeout, no validator response) are logged and the
/// attempt abandoned; they never surface through `on_token`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// The configured selection algorithm is not recognized.
    #[error("unknown selection algorithm: {0}")]
    UnknownSelectionAlgorithm(String),

    /// A connector id was registered twice.
    #[error("connector {0} is already registered")]
    DuplicateConnector(ConnectorId),
}
