//! Engine configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// How a connector is picked when a token could apply to several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionAlgorithm {
    /// Pick the connector a vehicle most recently plugged into, waiting
    /// for a plug-in up to the connection timeout if none is pending.
    PlugEvents,
    /// Let the user choose. Not implemented; falls back to the first
    /// candidate.
    UserInput,
}

impl FromStr for SelectionAlgorithm {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, AuthError> {
        match s {
            "PlugEvents" => Ok(SelectionAlgorithm::PlugEvents),
            "UserInput" => Ok(SelectionAlgorithm::UserInput),
            other => Err(AuthError::UnknownSelectionAlgorithm(other.to_string())),
        }
    }
}

impl fmt::Display for SelectionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionAlgorithm::PlugEvents => write!(f, "PlugEvents"),
            SelectionAlgorithm::UserInput => write!(f, "UserInput"),
        }
    }
}

/// Configuration consumed at engine construction.
///
/// `connection_timeout_secs` and the priority flag can be changed at
/// runtime through the engine's setters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Connector selection strategy.
    pub selection_algorithm: SelectionAlgorithm,
    /// Seconds a granted authorization (or a selection wait) stays alive
    /// without a plug-in or transaction start.
    pub connection_timeout_secs: u64,
    /// Prefer granting a new authorization over using a parent token to
    /// stop a running transaction.
    pub prioritize_authorization_over_stopping_transaction: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            selection_algorithm: SelectionAlgorithm::PlugEvents,
            connection_timeout_secs: 60,
            prioritize_authorization_over_stopping_transaction: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_algorithm_from_str() {
        assert_eq!(
            "PlugEvents".parse::<SelectionAlgorithm>().unwrap(),
            SelectionAlgorithm::PlugEvents
        );
        assert_eq!(
            "UserInput".parse::<SelectionAlgorithm>().unwrap(),
            SelectionAlgorithm::UserInput
        );
    }

    #[test]
    fn test_unknown_selection_algorithm_rejected() {
        let err = "RoundRobin".parse::<SelectionAlgorithm>().unwrap_err();
        assert_eq!(
            err,
            AuthError::UnknownSelectionAlgorithm("RoundRobin".to_string())
        );
    }

    #[test]
    fn test_config_from_json() {
        let config: AuthConfig = serde_json::from_str(
            r#"{
                "selection_algorithm": "PlugEvents",
                "connection_timeout_secs": 30,
                "prioritize_authorization_over_stopping_transaction": false
            }"#,
        )
        .unwrap();

        assert_eq!(config.selection_algorithm, SelectionAlgorithm::PlugEvents);
        assert_eq!(config.connection_timeout_secs, 30);
        assert!(!config.prioritize_authorization_over_stopping_transaction);
    }
}
