//! Catch-up subscriptions: replay a stream's history, then continue live.
//!
//! A catch-up subscription pages through historical events until it has
//! caught up, attaches a live subscription, closes the gap between the two,
//! and from then on delivers pushed events from a bounded queue. Consumers
//! observe one ordered event sequence across the whole transition.

mod engine;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::{
    connection::Connection, credentials::Credentials, event::ResolvedEvent,
    results::SubscriptionDropReason,
};

/// Boxed error carried out of a consumer event callback.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Hard cap on the per-batch history read size; page larger reads.
pub const MAX_READ_BATCH_SIZE: i32 = 4096;

const DEFAULT_READ_BATCH_SIZE: i32 = 500;
const DEFAULT_MAX_LIVE_QUEUE_SIZE: usize = 10_000;

/// Errors returned when building catch-up settings.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatchUpConfigError {
    #[error("read batch size {0} exceeds {MAX_READ_BATCH_SIZE}; page larger reads")]
    ReadBatchTooLarge(i32),
}

/// Tuning for a catch-up subscription.
#[derive(Clone, Copy, Debug)]
pub struct CatchUpSettings {
    /// Most events buffered from the live push before the subscription
    /// drops with [`DropReason::ProcessingQueueOverflow`].
    pub max_live_queue_size: usize,
    /// Events requested per history read.
    pub read_batch_size: i32,
    /// Whether the server resolves link events.
    pub resolve_link_tos: bool,
}

impl CatchUpSettings {
    /// # Errors
    /// Returns [`CatchUpConfigError::ReadBatchTooLarge`] when the batch size
    /// exceeds [`MAX_READ_BATCH_SIZE`].
    pub fn new(
        max_live_queue_size: usize,
        read_batch_size: i32,
        resolve_link_tos: bool,
    ) -> Result<Self, CatchUpConfigError> {
        if read_batch_size > MAX_READ_BATCH_SIZE {
            return Err(CatchUpConfigError::ReadBatchTooLarge(read_batch_size));
        }
        Ok(Self {
            max_live_queue_size,
            read_batch_size,
            resolve_link_tos,
        })
    }
}

impl Default for CatchUpSettings {
    fn default() -> Self {
        Self {
            max_live_queue_size: DEFAULT_MAX_LIVE_QUEUE_SIZE,
            read_batch_size: DEFAULT_READ_BATCH_SIZE,
            resolve_link_tos: false,
        }
    }
}

/// Why a catch-up subscription ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// [`CatchUpSubscription::stop`] was called.
    UserInitiated,
    /// The live queue hit its configured bound before draining.
    ProcessingQueueOverflow,
    /// The consumer's event callback returned an error.
    EventHandlerException,
    /// A read or subscribe step failed.
    CatchUpError,
    /// The server ended the underlying live subscription.
    ServerDropped(SubscriptionDropReason),
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UserInitiated => f.write_str("user-initiated"),
            Self::ProcessingQueueOverflow => f.write_str("processing queue overflow"),
            Self::EventHandlerException => f.write_str("event handler exception"),
            Self::CatchUpError => f.write_str("catch-up error"),
            Self::ServerDropped(reason) => write!(f, "dropped by server: {reason}"),
        }
    }
}

/// Consumer callbacks for a catch-up subscription.
///
/// Callbacks are invoked from the subscription's own task, one at a time.
/// They must not block indefinitely: a stalled callback stalls the whole
/// subscription.
pub trait CatchUpDelegate: Send + 'static {
    /// Called once per event, in ascending original event-number order,
    /// across both the history and live phases.
    ///
    /// # Errors
    /// Returning an error drops the subscription with
    /// [`DropReason::EventHandlerException`], carrying the error.
    fn event_appeared(&mut self, event: ResolvedEvent) -> Result<(), HandlerError>;

    /// Called exactly once, after history is exhausted and before the first
    /// live-only event.
    fn live_processing_started(&mut self) {}

    /// Called exactly once when the subscription ends, from any phase.
    fn subscription_dropped(&mut self, reason: DropReason, error: Option<HandlerError>) {
        let _ = (reason, error);
    }
}

/// Handle to a running catch-up subscription.
pub struct CatchUpSubscription {
    stream_id: String,
    stop: CancellationToken,
}

impl CatchUpSubscription {
    /// Stream this subscription follows.
    #[must_use]
    pub fn stream_id(&self) -> &str { &self.stream_id }

    /// Request a stop; returns immediately. Work already in flight (an
    /// outstanding read or subscribe confirmation) completes first, then the
    /// drop callback fires with [`DropReason::UserInitiated`]. Calling this
    /// after an earlier drop has no additional effect.
    pub fn stop(&self) { self.stop.cancel(); }
}

impl Connection {
    /// Start a catch-up subscription on `stream`, beginning after
    /// `from_event_number` (exclusive; `None` replays from the start).
    ///
    /// The engine runs on its own task; `delegate` observes events, the
    /// live-processing transition, and the final drop. An empty stream name
    /// means "the whole log", which this client does not implement: the
    /// subscription drops immediately through the normal error path.
    pub fn subscribe_to_stream_from<D: CatchUpDelegate>(
        &self,
        stream: &str,
        from_event_number: Option<i64>,
        credentials: Option<Credentials>,
        delegate: D,
        settings: CatchUpSettings,
    ) -> CatchUpSubscription {
        let stop = CancellationToken::new();
        let engine = engine::Engine::new(
            self.clone(),
            stream.to_owned(),
            from_event_number,
            credentials,
            delegate,
            settings,
            stop.clone(),
        );
        tokio::spawn(engine.run());
        CatchUpSubscription {
            stream_id: stream.to_owned(),
            stop,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CatchUpConfigError, CatchUpSettings, DropReason, MAX_READ_BATCH_SIZE};

    #[test]
    fn default_settings_match_the_documented_bounds() {
        let settings = CatchUpSettings::default();
        assert_eq!(settings.max_live_queue_size, 10_000);
        assert_eq!(settings.read_batch_size, 500);
        assert!(!settings.resolve_link_tos);
    }

    #[test]
    fn oversized_read_batch_is_rejected() {
        let err = CatchUpSettings::new(100, MAX_READ_BATCH_SIZE + 1, false).unwrap_err();
        assert_eq!(
            err,
            CatchUpConfigError::ReadBatchTooLarge(MAX_READ_BATCH_SIZE + 1)
        );
        assert!(CatchUpSettings::new(100, MAX_READ_BATCH_SIZE, false).is_ok());
    }

    #[test]
    fn drop_reasons_render_their_documented_text() {
        assert_eq!(DropReason::UserInitiated.to_string(), "user-initiated");
        assert_eq!(
            DropReason::ProcessingQueueOverflow.to_string(),
            "processing queue overflow"
        );
        assert_eq!(
            DropReason::EventHandlerException.to_string(),
            "event handler exception"
        );
    }
}
