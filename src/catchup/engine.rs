//! The catch-up state machine.
//!
//! One task drives the subscription through its phases; every consumer
//! callback and every live-queue mutation happens on this task, so the push
//! path and the drain path never race.

use std::collections::VecDeque;

use tokio::time::{Duration, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{CatchUpDelegate, CatchUpSettings, DropReason, HandlerError};
use crate::{
    connection::{Connection, Subscription, SubscriptionNotification},
    credentials::Credentials,
    error::Error,
    event::ResolvedEvent,
    results::ReadStreamResult,
};

/// Pause between reads once the server has reported end of stream but a
/// bounded target has not been reached yet (the server is still flushing).
const END_OF_STREAM_BACKOFF: Duration = Duration::from_millis(1);

/// Progress of the subscription through its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    ReplayingHistory,
    SubscribingLive,
    DrainingBacklog,
    Live,
    Dropped,
}

/// Entry in the bounded live queue.
enum LiveItem {
    Event(ResolvedEvent),
    /// Marker flushing the pending drop once earlier entries have drained.
    Drop,
}

/// The drop that ends the subscription: reason plus optional cause.
type DropData = (DropReason, Option<HandlerError>);

pub(super) struct Engine<D> {
    connection: Connection,
    stream_id: String,
    credentials: Option<Credentials>,
    delegate: D,
    settings: CatchUpSettings,
    stop: CancellationToken,
    phase: Phase,
    /// Exclusive lower bound: events numbered at or below are skipped.
    last_processed: i64,
    next_read: i64,
    live_queue: VecDeque<LiveItem>,
    /// First drop wins; set together with the queued [`LiveItem::Drop`].
    drop_data: Option<DropData>,
    subscription: Option<Subscription>,
}

impl<D: CatchUpDelegate> Engine<D> {
    pub(super) fn new(
        connection: Connection,
        stream_id: String,
        from_event_number: Option<i64>,
        credentials: Option<Credentials>,
        delegate: D,
        settings: CatchUpSettings,
        stop: CancellationToken,
    ) -> Self {
        Self {
            connection,
            stream_id,
            credentials,
            delegate,
            settings,
            stop,
            phase: Phase::ReplayingHistory,
            last_processed: from_event_number.unwrap_or(-1),
            next_read: from_event_number.unwrap_or(0),
            live_queue: VecDeque::new(),
            drop_data: None,
            subscription: None,
        }
    }

    pub(super) async fn run(mut self) {
        debug!(stream = %self.stream_id, from = self.last_processed, "catch-up subscription starting");
        if let Err((reason, error)) = self.drive().await {
            self.finish(reason, error).await;
        }
    }

    async fn drive(&mut self) -> Result<(), DropData> {
        if self.stream_id.is_empty() {
            // The whole-log variant needs a subscribe-to-all operation this
            // client does not speak; fail through the normal drop path.
            return Err((
                DropReason::CatchUpError,
                Some("catch-up subscription to all streams is not implemented".into()),
            ));
        }

        self.ensure_running()?;
        self.read_events_till(None).await?;

        self.set_phase(Phase::SubscribingLive);
        self.ensure_running()?;
        let subscription = match self
            .connection
            .subscribe_to_stream(
                &self.stream_id,
                self.settings.resolve_link_tos,
                self.credentials.clone(),
            )
            .await
        {
            Ok(subscription) => subscription,
            Err(Error::SubscriptionDropped(reason)) => {
                return Err((DropReason::ServerDropped(reason), None));
            }
            Err(e) => return Err((DropReason::CatchUpError, Some(e.into()))),
        };
        let target = subscription.last_event_number().unwrap_or(-1);
        debug!(stream = %self.stream_id, target, "live subscription confirmed");
        self.subscription = Some(subscription);

        self.set_phase(Phase::DrainingBacklog);
        self.ensure_running()?;
        self.read_events_till(Some(target)).await?;

        self.set_phase(Phase::Live);
        self.ensure_running()?;
        self.delegate.live_processing_started();
        self.process_live_queue()?;
        self.live_loop().await
    }

    /// Page forward through the stream until caught up.
    ///
    /// With no `target`, reads until the server reports end of stream. With
    /// a target (the backlog drain), reads until the cursor passes it,
    /// backing off briefly on end-of-stream pages while the server catches
    /// up. Live pushes that arrive while a read is in flight are moved into
    /// the bounded queue after each page.
    async fn read_events_till(&mut self, target: Option<i64>) -> Result<(), DropData> {
        loop {
            self.ensure_running()?;
            let slice = self
                .connection
                .read_stream_events_forward(
                    &self.stream_id,
                    self.next_read,
                    self.settings.read_batch_size,
                    self.settings.resolve_link_tos,
                    false,
                    self.credentials.clone(),
                )
                .await
                .map_err(|e| (DropReason::CatchUpError, Some(HandlerError::from(e))))?;
            self.pump_subscription();

            let end_of_stream = match slice.result {
                ReadStreamResult::Success => {
                    let end = slice.events.is_empty() || slice.is_end_of_stream;
                    for event in slice.events {
                        self.next_read = event.original_event_number() + 1;
                        self.try_process(event)?;
                    }
                    end
                }
                // Reading ahead of a stream that does not exist yet.
                ReadStreamResult::NoStream => true,
                other => {
                    return Err((
                        DropReason::CatchUpError,
                        Some(
                            format!(
                                "history read failed: {other:?}{}",
                                slice
                                    .error
                                    .map(|text| format!(" ({text})"))
                                    .unwrap_or_default()
                            )
                            .into(),
                        ),
                    ));
                }
            };

            let done = target.map_or(end_of_stream, |t| self.next_read > t);
            if done {
                debug!(stream = %self.stream_id, next_read = self.next_read, "finished reading events");
                return Ok(());
            }
            if end_of_stream {
                // Waiting for the server to flush its data.
                sleep(END_OF_STREAM_BACKOFF).await;
            }
        }
    }

    async fn live_loop(&mut self) -> Result<(), DropData> {
        enum Wake {
            Stop,
            Notification(Option<crate::error::Result<SubscriptionNotification>>),
        }

        loop {
            let stop = self.stop.clone();
            let Some(subscription) = self.subscription.as_mut() else {
                return Err((DropReason::CatchUpError, Some("live subscription lost".into())));
            };
            let wake = tokio::select! {
                biased;

                () = stop.cancelled() => Wake::Stop,
                notification = subscription.next() => Wake::Notification(notification),
            };
            match wake {
                Wake::Stop => self.enqueue_drop(DropReason::UserInitiated, None),
                Wake::Notification(Some(Ok(SubscriptionNotification::EventAppeared(event)))) => {
                    self.enqueue_live(event);
                }
                Wake::Notification(Some(Ok(SubscriptionNotification::Dropped(reason)))) => {
                    self.enqueue_drop(DropReason::ServerDropped(reason), None);
                }
                Wake::Notification(Some(Err(e))) => {
                    self.enqueue_drop(DropReason::CatchUpError, Some(e.into()));
                }
                Wake::Notification(None) => {
                    self.enqueue_drop(
                        DropReason::CatchUpError,
                        Some(Error::ConnectionClosed.into()),
                    );
                }
            }
            self.process_live_queue()?;
        }
    }

    /// Move pushes that arrived while a read was in flight into the bounded
    /// queue, so overflow is detected during the handoff window.
    fn pump_subscription(&mut self) {
        loop {
            let Some(subscription) = self.subscription.as_mut() else {
                return;
            };
            let Some(notification) = subscription.try_next() else {
                return;
            };
            match notification {
                Ok(SubscriptionNotification::EventAppeared(event)) => self.enqueue_live(event),
                Ok(SubscriptionNotification::Dropped(reason)) => {
                    self.enqueue_drop(DropReason::ServerDropped(reason), None);
                }
                Err(e) => self.enqueue_drop(DropReason::CatchUpError, Some(e.into())),
            }
        }
    }

    fn enqueue_live(&mut self, event: ResolvedEvent) {
        // A pending drop stops all further buffering.
        if self.drop_data.is_some() {
            return;
        }
        if self.live_queue.len() >= self.settings.max_live_queue_size {
            warn!(stream = %self.stream_id, "live queue overflow");
            self.enqueue_drop(DropReason::ProcessingQueueOverflow, None);
            return;
        }
        let original = event.original_event();
        debug!(
            stream = %original.stream_id,
            number = original.event_number,
            kind = %original.event_type,
            "live event buffered"
        );
        self.live_queue.push_back(LiveItem::Event(event));
    }

    /// Record the drop and queue its marker; the first drop reason wins.
    fn enqueue_drop(&mut self, reason: DropReason, error: Option<HandlerError>) {
        if self.drop_data.is_none() {
            self.drop_data = Some((reason, error));
            self.live_queue.push_back(LiveItem::Drop);
        }
    }

    /// Drain the live queue in arrival order. Hitting the drop marker ends
    /// the subscription after every earlier entry has been delivered.
    fn process_live_queue(&mut self) -> Result<(), DropData> {
        while let Some(item) = self.live_queue.pop_front() {
            match item {
                LiveItem::Drop => {
                    let drop_data = self.drop_data.take().unwrap_or_else(|| {
                        (
                            DropReason::CatchUpError,
                            Some("drop reason not specified".into()),
                        )
                    });
                    return Err(drop_data);
                }
                LiveItem::Event(event) => self.try_process(event)?,
            }
        }
        Ok(())
    }

    /// Deliver an event unless it was already seen; guards against events
    /// observed during both history replay and the live push.
    fn try_process(&mut self, event: ResolvedEvent) -> Result<(), DropData> {
        let number = event.original_event_number();
        if number <= self.last_processed {
            debug!(stream = %self.stream_id, number, "skipping already-processed event");
            return Ok(());
        }
        if let Err(error) = self.delegate.event_appeared(event) {
            return Err((DropReason::EventHandlerException, Some(error)));
        }
        self.last_processed = number;
        Ok(())
    }

    fn ensure_running(&self) -> Result<(), DropData> {
        if self.stop.is_cancelled() {
            Err((DropReason::UserInitiated, None))
        } else {
            Ok(())
        }
    }

    fn set_phase(&mut self, phase: Phase) {
        debug!(stream = %self.stream_id, from = ?self.phase, to = ?phase, "phase transition");
        self.phase = phase;
    }

    /// Terminal: unsubscribe the live subscription if one is attached and
    /// notify the consumer exactly once.
    async fn finish(&mut self, reason: DropReason, error: Option<HandlerError>) {
        self.set_phase(Phase::Dropped);
        if let Some(subscription) = self.subscription.take() {
            if let Err(e) = self
                .connection
                .unsubscribe_from_stream(subscription.correlation_id(), self.credentials.clone())
                .await
            {
                debug!(stream = %self.stream_id, "unsubscribe on drop failed: {e}");
            }
        }
        warn!(stream = %self.stream_id, %reason, "catch-up subscription dropped");
        self.delegate.subscription_dropped(reason, error);
    }
}
