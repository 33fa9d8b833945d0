//! Connector selection.
//!
//! When a token could apply to several connectors, exactly one must be
//! picked. The `PlugEvents` strategy matches the token against the
//! connector a vehicle most recently plugged into and waits for a
//! plug-in, up to the connection timeout, when none is pending.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

use crate::config::SelectionAlgorithm;
use crate::types::ConnectorId;

/// Ordered record of plug-in events awaiting connector assignment.
///
/// The session event dispatcher pushes on SessionStarted and removes on
/// grant or plug-in timeout; selection waiters block on
/// [`PlugInQueue::wait_for_match`] until an entry for one of their
/// candidates shows up.
#[derive(Debug, Default)]
pub(crate) struct PlugInQueue {
    queue: Mutex<VecDeque<ConnectorId>>,
    plugged: Notify,
}

impl PlugInQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record a plug-in and wake all selection waiters.
    pub(crate) fn push(&self, connector_id: ConnectorId) {
        self.queue.lock().push_back(connector_id);
        self.plugged.notify_waiters();
    }

    /// Drop all entries for a connector and wake waiters to re-check.
    pub(crate) fn remove(&self, connector_id: ConnectorId) {
        self.queue.lock().retain(|id| *id != connector_id);
        self.plugged.notify_waiters();
    }

    /// First queued entry that is one of `candidates`, in queue order.
    pub(crate) fn first_match(&self, candidates: &[ConnectorId]) -> Option<ConnectorId> {
        self.queue
            .lock()
            .iter()
            .copied()
            .find(|id| candidates.contains(id))
    }

    /// Wait until a queued plug-in matches one of `candidates`.
    ///
    /// Returns `None` once `timeout` elapses without a match. The notified
    /// future is enabled before each predicate check, so a push between
    /// the check and the await cannot be lost; spurious wakeups only cause
    /// a re-check.
    pub(crate) async fn wait_for_match(
        &self,
        candidates: &[ConnectorId],
        timeout: Duration,
    ) -> Option<ConnectorId> {
        let deadline = Instant::now() + timeout;
        loop {
            let plugged = self.plugged.notified();
            tokio::pin!(plugged);
            plugged.as_mut().enable();

            if let Some(connector_id) = self.first_match(candidates) {
                return Some(connector_id);
            }
            if timeout_at(deadline, plugged).await.is_err() {
                return None;
            }
        }
    }
}

/// Pick exactly one connector out of `candidates`.
///
/// A single candidate is returned as-is without consulting the strategy.
/// Returns `None` when the `PlugEvents` wait times out.
pub(crate) async fn select_connector(
    algorithm: SelectionAlgorithm,
    candidates: &[ConnectorId],
    queue: &PlugInQueue,
    timeout: Duration,
) -> Option<ConnectorId> {
    if candidates.len() == 1 {
        return Some(candidates[0]);
    }

    match algorithm {
        SelectionAlgorithm::PlugEvents => {
            if let Some(connector_id) = queue.first_match(candidates) {
                return Some(connector_id);
            }
            debug!(
                "No plug-in queued for candidates {:?}, waiting up to {:?}",
                candidates, timeout
            );
            queue.wait_for_match(candidates, timeout).await
        }
        SelectionAlgorithm::UserInput => {
            warn!("Selection algorithm UserInput not implemented, taking first candidate");
            candidates.first().copied()
        }
    }
}
