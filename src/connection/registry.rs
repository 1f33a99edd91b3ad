//! Pending-operation registry keyed by correlation identifier.

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};

use crate::{correlation::CorrelationId, frame::Frame};

/// Handler registered for the responses to one correlation identifier.
#[derive(Debug)]
pub(crate) enum PendingOp {
    /// Completed and deregistered by the first matching response.
    OneShot(oneshot::Sender<Frame>),
    /// Stays registered until a terminal response or explicit removal.
    Subscription(mpsc::UnboundedSender<Frame>),
}

/// Map of outstanding operations for one connection.
///
/// Owned exclusively by its connection instance; never shared between
/// connections. At most one handler is registered per identifier, and an
/// identifier is never reused while its handler is registered.
#[derive(Debug, Default)]
pub(crate) struct PendingRegistry {
    entries: DashMap<CorrelationId, PendingOp>,
}

impl PendingRegistry {
    pub(crate) fn insert(&self, id: CorrelationId, op: PendingOp) { self.entries.insert(id, op); }

    pub(crate) fn remove(&self, id: CorrelationId) -> Option<PendingOp> {
        self.entries.remove(&id).map(|(_, op)| op)
    }

    /// Drop every entry, abandoning the registered handlers.
    pub(crate) fn clear(&self) { self.entries.clear(); }
}
