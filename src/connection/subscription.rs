//! Live push subscriptions to a single stream.

use std::{
    pin::Pin,
    task::{Context, Poll},
};

use futures::Stream;
use tokio::sync::mpsc;

use super::{Connection, registry::PendingOp};
use crate::{
    codec,
    command::Command,
    correlation::CorrelationId,
    credentials::Credentials,
    error::{Error, Result},
    event::{ResolvedEvent, unpack_resolved_event},
    frame::Frame,
    messages::{
        StreamEventAppeared, SubscribeToStream, SubscriptionConfirmation, SubscriptionDropped,
        UnsubscribeFromStream,
    },
    results::SubscriptionDropReason,
};

/// One message pushed over a confirmed subscription.
#[derive(Clone, Debug)]
pub enum SubscriptionNotification {
    /// A new event became visible on the subscribed stream.
    EventAppeared(ResolvedEvent),
    /// The server ended the subscription.
    Dropped(SubscriptionDropReason),
}

/// A confirmed live subscription.
///
/// Notifications arrive in server push order. The handle also implements
/// [`futures::Stream`] for use with combinators. Dropping the handle
/// abandons the subscription; the dispatcher unhooks it on the next push.
#[derive(Debug)]
pub struct Subscription {
    correlation_id: CorrelationId,
    last_commit_position: i64,
    last_event_number: Option<i64>,
    inbound: mpsc::UnboundedReceiver<Frame>,
}

impl Subscription {
    /// Correlation identifier addressing this subscription.
    #[must_use]
    pub const fn correlation_id(&self) -> CorrelationId { self.correlation_id }

    /// Commit position of the log when the subscription attached.
    #[must_use]
    pub const fn last_commit_position(&self) -> i64 { self.last_commit_position }

    /// Number of the last event visible on the stream at attach time, if
    /// the stream had any events.
    #[must_use]
    pub const fn last_event_number(&self) -> Option<i64> { self.last_event_number }

    /// Await the next notification; `None` once the subscription has been
    /// deregistered or the connection closed.
    pub async fn next(&mut self) -> Option<Result<SubscriptionNotification>> {
        self.inbound.recv().await.map(interpret)
    }

    /// Drain a notification that has already arrived, without waiting.
    pub(crate) fn try_next(&mut self) -> Option<Result<SubscriptionNotification>> {
        self.inbound.try_recv().ok().map(interpret)
    }
}

impl Stream for Subscription {
    type Item = Result<SubscriptionNotification>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inbound.poll_recv(cx).map(|frame| frame.map(interpret))
    }
}

fn interpret(frame: Frame) -> Result<SubscriptionNotification> {
    match Command::from_u8(frame.command) {
        Some(Command::StreamEventAppeared) => {
            let message: StreamEventAppeared = codec::decode(&frame.payload)?;
            Ok(SubscriptionNotification::EventAppeared(
                unpack_resolved_event(message.event)?,
            ))
        }
        Some(Command::SubscriptionDropped) => {
            let message: SubscriptionDropped = codec::decode(&frame.payload)?;
            Ok(SubscriptionNotification::Dropped(message.reason))
        }
        // Bad or missing credentials surface as an access-denied drop.
        Some(Command::NotAuthenticated) => Ok(SubscriptionNotification::Dropped(
            SubscriptionDropReason::AccessDenied,
        )),
        _ => Err(Error::UnexpectedCommand(Command::describe(frame.command))),
    }
}

impl Connection {
    /// Subscribe to live events on one stream; resolves once the server
    /// confirms the subscription.
    ///
    /// # Errors
    /// Returns [`Error::SubscriptionDropped`] if the server drops or denies
    /// the subscription before confirming it, or a transport/codec error.
    pub async fn subscribe_to_stream(
        &self,
        stream: &str,
        resolve_link_tos: bool,
        credentials: Option<Credentials>,
    ) -> Result<Subscription> {
        let payload = codec::encode(&SubscribeToStream {
            event_stream_id: stream.to_owned(),
            resolve_link_tos,
        })?;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let correlation_id = self
            .send_message(
                Command::SubscribeToStream,
                credentials,
                payload,
                Some(PendingOp::Subscription(tx)),
            )
            .await?;

        let Some(first) = rx.recv().await else {
            return Err(Error::ConnectionClosed);
        };
        match Command::from_u8(first.command) {
            Some(Command::SubscriptionConfirmation) => {
                let confirmation: SubscriptionConfirmation = codec::decode(&first.payload)?;
                Ok(Subscription {
                    correlation_id,
                    last_commit_position: confirmation.last_commit_position,
                    last_event_number: confirmation.last_event_number,
                    inbound: rx,
                })
            }
            Some(Command::SubscriptionDropped) => {
                let message: SubscriptionDropped = codec::decode(&first.payload)?;
                Err(Error::SubscriptionDropped(message.reason))
            }
            Some(Command::NotAuthenticated) => Err(Error::SubscriptionDropped(
                SubscriptionDropReason::AccessDenied,
            )),
            _ => Err(Error::UnexpectedCommand(Command::describe(first.command))),
        }
    }

    /// Ask the server to drop the subscription addressed by
    /// `correlation_id`. The resulting drop notification is delivered
    /// through the subscription handle and deregisters it.
    ///
    /// # Errors
    /// Returns an error if the frame cannot be encoded or written.
    pub async fn unsubscribe_from_stream(
        &self,
        correlation_id: CorrelationId,
        credentials: Option<Credentials>,
    ) -> Result<()> {
        let payload = codec::encode(&UnsubscribeFromStream)?;
        self.send_with_id(
            correlation_id,
            Command::UnsubscribeFromStream,
            credentials,
            payload,
            None,
        )
        .await
    }
}
