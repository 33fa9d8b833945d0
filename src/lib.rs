//! # EK-Auth
//!
//! Token authorization and connector arbitration for EK charging
//! stations.
//!
//! Given a credential presented at the station (RFID card, app session,
//! plate recognition), this crate decides whether and which physical
//! connector may be unlocked, arbitrates between concurrent swipes,
//! running transactions and reservations, and tracks per-connector
//! availability.
//!
//! ## Architecture
//!
//! ```text
//!  token providers          EVSE backplane         reservation engine
//!        │ on_token               │ session events        │
//!        ▼                        ▼                       ▼
//!  ┌──────────────────────────────────────────────────────────────┐
//!  │                         AuthArbiter                          │
//!  │   dedup → validate → select connector → reservation check    │
//!  │      │                    │                     │            │
//!  │  connector states    plug-in queue     withdrawal timers     │
//!  └──────────────────────────────┬───────────────────────────────┘
//!                                 │ authorize / withdraw /
//!                                 │ stop transaction
//!                                 ▼
//!                         EvseCommands (backplane)
//! ```
//!
//! The arbiter is driven entirely by its collaborators: token providers
//! spawn one task per presented token, the backplane reports session
//! lifecycle events, and every externally visible effect is a command on
//! the injected [`EvseCommands`] implementation. Nothing is ever
//! reported back to the token provider.
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use ek_auth::{AuthArbiter, AuthConfig, IdentifierToken};
//! # use ek_auth::{EvseCommands, ReservationArbiter};
//! # fn backplane() -> Arc<dyn EvseCommands> { unimplemented!() }
//! # fn reservations() -> Arc<dyn ReservationArbiter> { unimplemented!() }
//!
//! # async fn demo() {
//! let mut arbiter = AuthArbiter::new(AuthConfig::default(), backplane(), reservations());
//! arbiter.add_connector(1, 0).unwrap();
//! arbiter.add_connector(2, 1).unwrap();
//!
//! let arbiter = Arc::new(arbiter);
//! let token = IdentifierToken::new("04E5F2A1", "RFID");
//! tokio::spawn({
//!     let arbiter = Arc::clone(&arbiter);
//!     async move { arbiter.on_token(token).await }
//! });
//! # }
//! ```

pub mod backplane;
pub mod config;
pub mod connector;
pub mod engine;
pub mod error;
pub mod reservation;
pub mod types;

mod selection;
mod timer;

pub use backplane::{EvseCommands, TokenValidator};
pub use config::{AuthConfig, SelectionAlgorithm};
pub use connector::ConnectorState;
pub use engine::AuthArbiter;
pub use error::AuthError;
pub use reservation::{Reservation, ReservationArbiter, ReservationStatus};
pub use types::{
    AuthorizationStatus, ConnectorId, EvseIndex, Identifier, IdentifierToken, SessionEventKind,
    StopTransactionReason, ValidationResult,
};
